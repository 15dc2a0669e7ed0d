//! rbk-db
//!
//! Postgres store for RoomBook. Every function takes the pool (or an open
//! transaction's connection) explicitly; there is no process-wide handle.
//!
//! Write paths return [`rbk_engine::EngineResult`] so callers can tell a
//! conflict from a missing row from a storage failure. Plumbing (connect,
//! migrate, status) returns `anyhow::Result`.

use std::str::FromStr;

use anyhow::{Context, Result};
use rbk_config::DbConfig;
use rbk_engine::EngineError;
use serde::Serialize;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

pub mod equipment;
pub mod reservations;
pub mod rooms;
pub mod users;
pub mod views;

pub use equipment::{
    assign_equipment, create_equipment, delete_equipment, fetch_equipment, list_equipment,
    list_room_equipment, remove_equipment, update_equipment,
};
pub use reservations::{
    create_reservation, delete_reservation, fetch_reservation, has_conflict, list_reservations,
    lock_room, update_reservation,
};
pub use rooms::{create_room, delete_room, fetch_room, list_rooms, update_room};
pub use users::{
    fetch_user, find_user_by_email, list_users, register_user, set_user_role, UserCredentials,
};
pub use views::{list_reservations_by_room, list_reservations_by_user};

pub const ENV_DB_URL: &str = "RBK_DATABASE_URL";

// ---------------------------------------------------------------------------
// Connection / migrations
// ---------------------------------------------------------------------------

/// Connect to Postgres using RBK_DATABASE_URL.
pub async fn connect_from_env(cfg: &DbConfig) -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url, cfg).await
}

/// Build a pool whose sessions carry `lock_timeout`, so a writer waiting on
/// a room lock fails with SQLSTATE 55P03 instead of blocking indefinitely.
pub async fn connect(url: &str, cfg: &DbConfig) -> Result<PgPool> {
    let opts = PgConnectOptions::from_str(url)
        .context("invalid database url")?
        .options([("lock_timeout", format!("{}ms", cfg.lock_timeout_ms))]);

    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .connect_with(opts)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct DbStatus {
    pub ok: bool,
    pub has_reservations_table: bool,
}

/// Connectivity + schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema = 'public' and table_name = 'reservations'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_reservations_table: exists,
    })
}

// ---------------------------------------------------------------------------
// SQLSTATE classification
// ---------------------------------------------------------------------------

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const EXCLUSION_VIOLATION: &str = "23P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";

fn sqlstate_is(err: &sqlx::Error, code: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(code),
        _ => false,
    }
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    sqlstate_is(err, UNIQUE_VIOLATION)
}

pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    sqlstate_is(err, FOREIGN_KEY_VIOLATION)
}

pub fn is_check_violation(err: &sqlx::Error) -> bool {
    sqlstate_is(err, CHECK_VIOLATION)
}

pub fn is_exclusion_violation(err: &sqlx::Error) -> bool {
    sqlstate_is(err, EXCLUSION_VIOLATION)
}

pub fn is_lock_timeout(err: &sqlx::Error) -> bool {
    sqlstate_is(err, LOCK_NOT_AVAILABLE)
}

/// Name of the violated constraint, if the server reported one.
pub(crate) fn violated_constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint(),
        _ => None,
    }
}

/// Wrap an unclassified sqlx failure as a retryable storage error.
pub(crate) fn storage(err: sqlx::Error, what: &'static str) -> EngineError {
    if is_lock_timeout(&err) {
        tracing::warn!(op = what, "lock wait exceeded lock_timeout");
    } else {
        tracing::warn!(op = what, error = %err, "storage failure");
    }
    EngineError::Storage(anyhow::Error::new(err).context(what))
}

/// `.context()` for store calls that surface [`EngineError`].
pub(crate) trait OrStorage<T> {
    fn or_storage(self, what: &'static str) -> Result<T, EngineError>;
}

impl<T> OrStorage<T> for std::result::Result<T, sqlx::Error> {
    fn or_storage(self, what: &'static str) -> Result<T, EngineError> {
        self.map_err(|e| storage(e, what))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_are_not_classified() {
        let err = sqlx::Error::PoolTimedOut;
        assert!(!is_unique_violation(&err));
        assert!(!is_exclusion_violation(&err));
        assert!(!is_lock_timeout(&err));
        assert!(violated_constraint(&err).is_none());
    }

    #[test]
    fn unclassified_failures_become_retryable_storage() {
        let err: std::result::Result<(), sqlx::Error> = Err(sqlx::Error::PoolTimedOut);
        let mapped = err.or_storage("create_reservation begin failed").unwrap_err();
        assert_eq!(mapped.kind(), "STORAGE");
        assert!(mapped.is_retryable());
        assert!(mapped.to_string().contains("create_reservation begin failed"));
    }
}
