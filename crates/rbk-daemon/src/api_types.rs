//! Request and response types for rbk-daemon HTTP endpoints that are not
//! plain domain records.
//!
//! Request bodies reject unknown fields so a typo never turns into a silent
//! no-op.

use chrono::{DateTime, Utc};
use rbk_schemas::{Role, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// /v1/health, /v1/status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub config_hash: String,
    pub db_ok: bool,
    /// False until `rbk db migrate` has run against the store.
    pub schema_ready: bool,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of every non-2xx response produced by a handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable kind, e.g. "CONFLICT", "NOT_FOUND", "UNAUTHENTICATED".
    pub error: String,
    pub msg: String,
}

// ---------------------------------------------------------------------------
// /v1/auth/*
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
}

// ---------------------------------------------------------------------------
// /v1/users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetRoleRequest {
    pub role: Role,
}

// ---------------------------------------------------------------------------
// /v1/rooms/:id/equipment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssignEquipmentRequest {
    pub equipment_id: Uuid,
    pub quantity: i32,
}

// ---------------------------------------------------------------------------
// /v1/reservations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateReservationRequest {
    pub room_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Holder; defaults to the caller. Only an ADMIN may name someone else.
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

/// Acknowledgement for deletes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub ok: bool,
    pub msg: String,
}
