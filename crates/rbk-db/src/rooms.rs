//! Room catalog. Mutations are ADMIN-only; patches are applied to a row read
//! `FOR UPDATE` in the same transaction.

use rbk_engine::{
    ensure_admin, validate_new_room, validate_room, EngineError, EngineResult, Entity, MergePatch,
};
use rbk_schemas::{Caller, NewRoom, Room, RoomPatch};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::{is_check_violation, storage, OrStorage};

fn room_from_row(row: &PgRow) -> Result<Room, sqlx::Error> {
    Ok(Room {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        capacity: row.try_get("capacity")?,
        location: row.try_get("location")?,
        is_active: row.try_get("is_active")?,
    })
}

fn classify(err: sqlx::Error, what: &'static str) -> EngineError {
    if is_check_violation(&err) {
        return EngineError::validation("room violates a schema check (name, location, capacity)");
    }
    storage(err, what)
}

pub async fn list_rooms(pool: &PgPool) -> EngineResult<Vec<Room>> {
    let rows = sqlx::query(
        "select id, name, capacity, location, is_active from rooms order by name, id",
    )
    .fetch_all(pool)
    .await
    .or_storage("list_rooms failed")?;

    rows.iter()
        .map(room_from_row)
        .collect::<Result<Vec<_>, _>>()
        .or_storage("list_rooms decode failed")
}

pub async fn fetch_room(pool: &PgPool, id: Uuid) -> EngineResult<Room> {
    let row = sqlx::query("select id, name, capacity, location, is_active from rooms where id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .or_storage("fetch_room failed")?;

    match row {
        Some(row) => room_from_row(&row).or_storage("fetch_room decode failed"),
        None => Err(EngineError::not_found(Entity::Room, id)),
    }
}

pub async fn create_room(pool: &PgPool, caller: &Caller, new: &NewRoom) -> EngineResult<Room> {
    ensure_admin(caller, "room create")?;
    validate_new_room(new)?;

    let row = sqlx::query(
        r#"
        insert into rooms (id, name, capacity, location, is_active)
        values ($1, $2, $3, $4, $5)
        returning id, name, capacity, location, is_active
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.name.trim())
    .bind(new.capacity)
    .bind(new.location.trim())
    .bind(new.is_active)
    .fetch_one(pool)
    .await
    .map_err(|e| classify(e, "create_room insert failed"))?;

    let room = room_from_row(&row).or_storage("create_room decode failed")?;
    info!(room_id = %room.id, name = %room.name, "room created");
    Ok(room)
}

pub async fn update_room(
    pool: &PgPool,
    caller: &Caller,
    id: Uuid,
    patch: &RoomPatch,
) -> EngineResult<Room> {
    ensure_admin(caller, "room update")?;

    let mut tx = pool.begin().await.or_storage("update_room begin failed")?;

    let row = sqlx::query(
        "select id, name, capacity, location, is_active from rooms where id = $1 for update",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await
    .or_storage("update_room select failed")?;
    let Some(row) = row else {
        return Err(EngineError::not_found(Entity::Room, id));
    };
    let current = room_from_row(&row).or_storage("update_room decode failed")?;

    if patch.is_empty() {
        return Ok(current);
    }
    let next = patch.merge_into(&current);
    validate_room(&next)?;

    let row = sqlx::query(
        r#"
        update rooms
        set name = $2, capacity = $3, location = $4, is_active = $5
        where id = $1
        returning id, name, capacity, location, is_active
        "#,
    )
    .bind(id)
    .bind(&next.name)
    .bind(next.capacity)
    .bind(&next.location)
    .bind(next.is_active)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| classify(e, "update_room write failed"))?;
    let updated = room_from_row(&row).or_storage("update_room decode failed")?;

    tx.commit().await.or_storage("update_room commit failed")?;

    info!(room_id = %id, "room updated");
    Ok(updated)
}

/// Delete a room. Its reservations and equipment associations go with it.
pub async fn delete_room(pool: &PgPool, caller: &Caller, id: Uuid) -> EngineResult<()> {
    ensure_admin(caller, "room delete")?;

    let deleted: Option<(Uuid,)> =
        sqlx::query_as::<_, (Uuid,)>("delete from rooms where id = $1 returning id")
            .bind(id)
            .fetch_optional(pool)
            .await
            .or_storage("delete_room failed")?;

    match deleted {
        Some(_) => {
            info!(room_id = %id, "room deleted");
            Ok(())
        }
        None => Err(EngineError::not_found(Entity::Room, id)),
    }
}
