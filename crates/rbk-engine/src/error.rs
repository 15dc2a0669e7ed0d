use chrono::{DateTime, Utc};
use uuid::Uuid;

pub type EngineResult<T> = Result<T, EngineError>;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// Which record a [`EngineError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Room,
    Reservation,
    Equipment,
    RoomEquipment,
    User,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Room => "room",
            Entity::Reservation => "reservation",
            Entity::Equipment => "equipment",
            Entity::RoomEquipment => "room equipment",
            Entity::User => "user",
        }
    }
}

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Failure kinds surfaced by every engine operation.
///
/// Only [`EngineError::Storage`] is safe to retry as-is: every other kind is
/// a deterministic rejection of the request. In all cases the surrounding
/// transaction has been rolled back and nothing was written.
#[derive(Debug)]
pub enum EngineError {
    /// Malformed input. Rejected before a transaction is opened.
    Validation(String),
    /// Caller lacks the role or ownership needed for the mutation.
    Authorization(String),
    /// Candidate interval overlaps an existing reservation on the room.
    Conflict {
        room_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Referenced record does not exist.
    NotFound { entity: Entity, id: String },
    /// Unique key already taken (equipment code, user email).
    Duplicate(String),
    /// Connection, transaction or lock-timeout failure.
    Storage(anyhow::Error),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        EngineError::Authorization(msg.into())
    }

    pub fn not_found(entity: Entity, id: impl std::fmt::Display) -> Self {
        EngineError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn storage(err: impl Into<anyhow::Error>) -> Self {
        EngineError::Storage(err.into())
    }

    /// Stable machine-readable kind, used in API error bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "VALIDATION",
            EngineError::Authorization(_) => "AUTHORIZATION",
            EngineError::Conflict { .. } => "CONFLICT",
            EngineError::NotFound { .. } => "NOT_FOUND",
            EngineError::Duplicate(_) => "DUPLICATE",
            EngineError::Storage(_) => "STORAGE",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Storage(_))
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "validation failed: {msg}"),
            EngineError::Authorization(msg) => write!(f, "not authorized: {msg}"),
            EngineError::Conflict {
                room_id,
                start,
                end,
            } => write!(
                f,
                "room {room_id} is already reserved within [{}, {})",
                start.to_rfc3339(),
                end.to_rfc3339()
            ),
            EngineError::NotFound { entity, id } => {
                write!(f, "{} not found: {id}", entity.as_str())
            }
            EngineError::Duplicate(msg) => write!(f, "duplicate: {msg}"),
            EngineError::Storage(err) => write!(f, "storage failure: {err:#}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Storage(err) => {
                let src: &(dyn std::error::Error + 'static) = err.as_ref();
                Some(src)
            }
            _ => None,
        }
    }
}
