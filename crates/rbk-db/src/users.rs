//! Holder accounts. Password hashing happens before these calls; the store
//! only ever sees the PHC string.

use rbk_engine::{ensure_admin, validate_new_user, EngineError, EngineResult, Entity};
use rbk_schemas::{Caller, NewUser, Role, User};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::{is_unique_violation, storage, OrStorage};

/// A user row together with its stored password hash. Never serialized.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub hash: String,
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    let role: String = row.try_get("role")?;
    let role = Role::parse(&role).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: "role".to_string(),
        source: format!("invalid role: {role}").into(),
    })?;
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role,
        created_at: row.try_get("created_at")?,
    })
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Create a USER account. `hash` is the argon2 PHC string for `new.password`.
pub async fn register_user(pool: &PgPool, new: &NewUser, hash: &str) -> EngineResult<User> {
    validate_new_user(new)?;
    let email = normalize_email(&new.email);

    let row = sqlx::query(
        r#"
        insert into users (id, name, email, hash, role)
        values ($1, $2, $3, $4, 'USER')
        returning id, name, email, role, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.name.trim())
    .bind(&email)
    .bind(hash)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            return EngineError::Duplicate(format!("email '{email}' is already registered"));
        }
        storage(e, "register_user insert failed")
    })?;

    let user = user_from_row(&row).or_storage("register_user decode failed")?;
    info!(user_id = %user.id, "user registered");
    Ok(user)
}

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> EngineResult<Option<UserCredentials>> {
    let row = sqlx::query(
        "select id, name, email, role, created_at, hash from users where email = $1",
    )
    .bind(normalize_email(email))
    .fetch_optional(pool)
    .await
    .or_storage("find_user_by_email failed")?;

    let Some(row) = row else {
        return Ok(None);
    };
    let user = user_from_row(&row).or_storage("find_user_by_email decode failed")?;
    let hash: String = row.try_get("hash").or_storage("find_user_by_email decode failed")?;
    Ok(Some(UserCredentials { user, hash }))
}

pub async fn fetch_user(pool: &PgPool, id: Uuid) -> EngineResult<User> {
    let row = sqlx::query("select id, name, email, role, created_at from users where id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .or_storage("fetch_user failed")?;

    match row {
        Some(row) => user_from_row(&row).or_storage("fetch_user decode failed"),
        None => Err(EngineError::not_found(Entity::User, id)),
    }
}

pub async fn list_users(pool: &PgPool) -> EngineResult<Vec<User>> {
    let rows = sqlx::query("select id, name, email, role, created_at from users order by created_at, id")
        .fetch_all(pool)
        .await
        .or_storage("list_users failed")?;

    rows.iter()
        .map(user_from_row)
        .collect::<Result<Vec<_>, _>>()
        .or_storage("list_users decode failed")
}

pub async fn set_user_role(pool: &PgPool, caller: &Caller, id: Uuid, role: Role) -> EngineResult<User> {
    ensure_admin(caller, "role change")?;

    let row = sqlx::query(
        r#"
        update users
        set role = $2
        where id = $1
        returning id, name, email, role, created_at
        "#,
    )
    .bind(id)
    .bind(role.as_str())
    .fetch_optional(pool)
    .await
    .or_storage("set_user_role failed")?;

    let Some(row) = row else {
        return Err(EngineError::not_found(Entity::User, id));
    };
    let user = user_from_row(&row).or_storage("set_user_role decode failed")?;
    info!(user_id = %id, role = role.as_str(), "user role changed");
    Ok(user)
}
