//! Axum router and all HTTP handlers for rbk-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers are thin: authenticate, call one `rbk_db`
//! operation, serialize. Conflict detection, locking and authorization rules
//! all live below this layer.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use rbk_auth::AuthError;
use rbk_engine::{ensure_admin, ensure_can_view_holder, validate_new_user};
use rbk_schemas::{
    Caller, Equipment, EquipmentPatch, NewEquipment, NewReservation, NewRoom, NewUser,
    Reservation, ReservationPatch, Room, RoomEquipment, RoomPatch, RoomReservationView, User,
    UserReservationView,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    api_types::{
        AckResponse, AssignEquipmentRequest, CreateReservationRequest, HealthResponse,
        LoginRequest, LoginResponse, RefreshRequest, RefreshResponse, SetRoleRequest,
        StatusResponse,
    },
    error::ApiError,
    state::{uptime_secs, AppState},
};

type ApiResult<T> = Result<T, ApiError>;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        // auth
        .route("/v1/auth/register", post(register))
        .route("/v1/auth/login", post(login))
        .route("/v1/auth/refresh", post(refresh))
        .route("/v1/auth/me", get(me))
        // users
        .route("/v1/users", get(users_list))
        .route("/v1/users/:id/role", patch(users_set_role))
        .route("/v1/users/:id/reservations", get(users_reservations))
        // rooms
        .route("/v1/rooms", get(rooms_list).post(rooms_create))
        .route(
            "/v1/rooms/:id",
            get(rooms_get).patch(rooms_update).delete(rooms_delete),
        )
        .route(
            "/v1/rooms/:id/equipment",
            get(rooms_equipment_list).post(rooms_equipment_assign),
        )
        .route(
            "/v1/rooms/:id/equipment/:equipment_id",
            axum::routing::delete(rooms_equipment_remove),
        )
        .route("/v1/rooms/:id/reservations", get(rooms_reservations))
        // equipment
        .route("/v1/equipment", get(equipment_list).post(equipment_create))
        .route(
            "/v1/equipment/:id",
            get(equipment_get)
                .patch(equipment_update)
                .delete(equipment_delete),
        )
        // reservations
        .route(
            "/v1/reservations",
            get(reservations_list).post(reservations_create),
        )
        .route(
            "/v1/reservations/:id",
            get(reservations_get)
                .patch(reservations_update)
                .delete(reservations_delete),
        )
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Authentication helpers
// ---------------------------------------------------------------------------

/// Resolve the caller from `Authorization: Bearer <access token>`.
pub(crate) fn authenticate(st: &AppState, headers: &HeaderMap) -> ApiResult<Caller> {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let token = rbk_auth::bearer_token(header)?;
    Ok(rbk_auth::verify_access(token, &st.secrets, &st.config.auth)?)
}

fn caller_of(user: &User) -> Caller {
    Caller {
        user_id: user.id,
        role: user.role,
    }
}

/// argon2 is deliberately slow; keep it off the async workers.
async fn hash_off_thread(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || rbk_auth::hash_password(&password))
        .await
        .map_err(|e| AuthError::Crypto(format!("hash task failed: {e}")))?
        .map_err(ApiError::from)
}

/// `hash` is `None` for an unknown account; the check still runs.
async fn verify_off_thread(password: String, hash: Option<String>) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || {
        rbk_auth::verify_password_or_dummy(&password, hash.as_deref())
    })
        .await
        .map_err(|e| AuthError::Crypto(format!("verify task failed: {e}")))?
        .map_err(ApiError::from)
}

fn ack(msg: impl Into<String>) -> Json<AckResponse> {
    Json(AckResponse {
        ok: true,
        msg: msg.into(),
    })
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let (code, db_ok, schema_ready) = match rbk_db::status(&st.pool).await {
        Ok(s) => (StatusCode::OK, s.ok, s.has_reservations_table),
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "status: store unreachable");
            (StatusCode::SERVICE_UNAVAILABLE, false, false)
        }
    };

    (
        code,
        Json(StatusResponse {
            service: st.build.service,
            version: st.build.version,
            uptime_secs: uptime_secs(),
            config_hash: st.config_hash.clone(),
            db_ok,
            schema_ready,
        }),
    )
}

// ---------------------------------------------------------------------------
// /v1/auth/*
// ---------------------------------------------------------------------------

pub(crate) async fn register(
    State(st): State<Arc<AppState>>,
    Json(body): Json<NewUser>,
) -> ApiResult<impl IntoResponse> {
    // Reject malformed input before paying for a hash.
    validate_new_user(&body)?;
    let hash = hash_off_thread(body.password.clone()).await?;
    let user = rbk_db::register_user(&st.pool, &body, &hash).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub(crate) async fn login(
    State(st): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let found = rbk_db::find_user_by_email(&st.pool, &body.email).await?;
    let hash = found.as_ref().map(|c| c.hash.clone());
    let matched = verify_off_thread(body.password, hash).await?;
    let creds = match found {
        Some(creds) if matched => creds,
        _ => return Err(AuthError::InvalidCredentials.into()),
    };

    let pair = rbk_auth::issue_token_pair(&caller_of(&creds.user), &st.secrets, &st.config.auth)?;
    info!(user_id = %creds.user.id, "login");
    Ok(Json(LoginResponse {
        access: pair.access,
        refresh: pair.refresh,
        user: creds.user,
    }))
}

pub(crate) async fn refresh(
    State(st): State<Arc<AppState>>,
    Json(body): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let claims = rbk_auth::verify_refresh(&body.refresh, &st.secrets, &st.config.auth)?;
    // Re-read so a role change since login is reflected in the new token.
    let user = rbk_db::fetch_user(&st.pool, claims.sub).await?;
    let access = rbk_auth::issue_access_token(&caller_of(&user), &st.secrets, &st.config.auth)?;
    Ok(Json(RefreshResponse { access }))
}

pub(crate) async fn me(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<User>> {
    let caller = authenticate(&st, &headers)?;
    Ok(Json(rbk_db::fetch_user(&st.pool, caller.user_id).await?))
}

// ---------------------------------------------------------------------------
// /v1/users
// ---------------------------------------------------------------------------

pub(crate) async fn users_list(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<User>>> {
    let caller = authenticate(&st, &headers)?;
    ensure_admin(&caller, "user list")?;
    Ok(Json(rbk_db::list_users(&st.pool).await?))
}

pub(crate) async fn users_set_role(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<SetRoleRequest>,
) -> ApiResult<Json<User>> {
    let caller = authenticate(&st, &headers)?;
    Ok(Json(
        rbk_db::set_user_role(&st.pool, &caller, id, body.role).await?,
    ))
}

pub(crate) async fn users_reservations(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<UserReservationView>>> {
    let caller = authenticate(&st, &headers)?;
    ensure_can_view_holder(&caller, id)?;
    Ok(Json(rbk_db::list_reservations_by_user(&st.pool, id).await?))
}

// ---------------------------------------------------------------------------
// /v1/rooms
// ---------------------------------------------------------------------------

pub(crate) async fn rooms_list(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Room>>> {
    authenticate(&st, &headers)?;
    Ok(Json(rbk_db::list_rooms(&st.pool).await?))
}

pub(crate) async fn rooms_get(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Room>> {
    authenticate(&st, &headers)?;
    Ok(Json(rbk_db::fetch_room(&st.pool, id).await?))
}

pub(crate) async fn rooms_create(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewRoom>,
) -> ApiResult<impl IntoResponse> {
    let caller = authenticate(&st, &headers)?;
    let room = rbk_db::create_room(&st.pool, &caller, &body).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

pub(crate) async fn rooms_update(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<RoomPatch>,
) -> ApiResult<Json<Room>> {
    let caller = authenticate(&st, &headers)?;
    Ok(Json(rbk_db::update_room(&st.pool, &caller, id, &body).await?))
}

pub(crate) async fn rooms_delete(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AckResponse>> {
    let caller = authenticate(&st, &headers)?;
    rbk_db::delete_room(&st.pool, &caller, id).await?;
    Ok(ack(format!("room {id} deleted")))
}

pub(crate) async fn rooms_equipment_list(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<RoomEquipment>>> {
    authenticate(&st, &headers)?;
    Ok(Json(rbk_db::list_room_equipment(&st.pool, id).await?))
}

pub(crate) async fn rooms_equipment_assign(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<AssignEquipmentRequest>,
) -> ApiResult<Json<RoomEquipment>> {
    let caller = authenticate(&st, &headers)?;
    Ok(Json(
        rbk_db::assign_equipment(&st.pool, &caller, id, body.equipment_id, body.quantity).await?,
    ))
}

pub(crate) async fn rooms_equipment_remove(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((id, equipment_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<AckResponse>> {
    let caller = authenticate(&st, &headers)?;
    rbk_db::remove_equipment(&st.pool, &caller, id, equipment_id).await?;
    Ok(ack(format!("equipment {equipment_id} removed from room {id}")))
}

pub(crate) async fn rooms_reservations(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<RoomReservationView>>> {
    authenticate(&st, &headers)?;
    Ok(Json(rbk_db::list_reservations_by_room(&st.pool, id).await?))
}

// ---------------------------------------------------------------------------
// /v1/equipment
// ---------------------------------------------------------------------------

pub(crate) async fn equipment_list(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Equipment>>> {
    authenticate(&st, &headers)?;
    Ok(Json(rbk_db::list_equipment(&st.pool).await?))
}

pub(crate) async fn equipment_get(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Equipment>> {
    authenticate(&st, &headers)?;
    Ok(Json(rbk_db::fetch_equipment(&st.pool, id).await?))
}

pub(crate) async fn equipment_create(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewEquipment>,
) -> ApiResult<impl IntoResponse> {
    let caller = authenticate(&st, &headers)?;
    let eq = rbk_db::create_equipment(&st.pool, &caller, &body).await?;
    Ok((StatusCode::CREATED, Json(eq)))
}

pub(crate) async fn equipment_update(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<EquipmentPatch>,
) -> ApiResult<Json<Equipment>> {
    let caller = authenticate(&st, &headers)?;
    Ok(Json(
        rbk_db::update_equipment(&st.pool, &caller, id, &body).await?,
    ))
}

pub(crate) async fn equipment_delete(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AckResponse>> {
    let caller = authenticate(&st, &headers)?;
    rbk_db::delete_equipment(&st.pool, &caller, id).await?;
    Ok(ack(format!("equipment {id} deleted")))
}

// ---------------------------------------------------------------------------
// /v1/reservations
// ---------------------------------------------------------------------------

pub(crate) async fn reservations_list(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Reservation>>> {
    let caller = authenticate(&st, &headers)?;
    ensure_admin(&caller, "reservation list")?;
    Ok(Json(rbk_db::list_reservations(&st.pool).await?))
}

pub(crate) async fn reservations_create(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateReservationRequest>,
) -> ApiResult<impl IntoResponse> {
    let caller = authenticate(&st, &headers)?;
    let new = NewReservation {
        user_id: body.user_id.unwrap_or(caller.user_id),
        room_id: body.room_id,
        start_time: body.start_time,
        end_time: body.end_time,
    };
    let created = rbk_db::create_reservation(&st.pool, &caller, &new).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub(crate) async fn reservations_get(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Reservation>> {
    let caller = authenticate(&st, &headers)?;
    let r = rbk_db::fetch_reservation(&st.pool, id).await?;
    ensure_can_view_holder(&caller, r.user_id)?;
    Ok(Json(r))
}

pub(crate) async fn reservations_update(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<ReservationPatch>,
) -> ApiResult<Json<Reservation>> {
    let caller = authenticate(&st, &headers)?;
    Ok(Json(
        rbk_db::update_reservation(&st.pool, &caller, id, &body).await?,
    ))
}

pub(crate) async fn reservations_delete(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AckResponse>> {
    let caller = authenticate(&st, &headers)?;
    rbk_db::delete_reservation(&st.pool, &caller, id).await?;
    Ok(ack(format!("reservation {id} deleted")))
}
