//! Equipment catalog and the room/equipment association manager.
//!
//! Associations are a single-statement upsert keyed on `(room_id,
//! equipment_id)`; there is no cross-row invariant, so no explicit locking.

use rbk_engine::{
    ensure_admin, validate_equipment, validate_new_equipment, validate_quantity, EngineError,
    EngineResult, Entity, MergePatch,
};
use rbk_schemas::{Caller, Equipment, EquipmentPatch, NewEquipment, RoomEquipment};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::{is_foreign_key_violation, is_unique_violation, storage, violated_constraint, OrStorage};

fn equipment_from_row(row: &PgRow) -> Result<Equipment, sqlx::Error> {
    Ok(Equipment {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        display_name: row.try_get("display_name")?,
        description: row.try_get("description")?,
    })
}

fn classify_catalog(err: sqlx::Error, code: &str, what: &'static str) -> EngineError {
    if is_unique_violation(&err) {
        return EngineError::Duplicate(format!("equipment code '{code}' already exists"));
    }
    storage(err, what)
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

pub async fn list_equipment(pool: &PgPool) -> EngineResult<Vec<Equipment>> {
    let rows = sqlx::query("select id, code, display_name, description from equipments order by code")
        .fetch_all(pool)
        .await
        .or_storage("list_equipment failed")?;

    rows.iter()
        .map(equipment_from_row)
        .collect::<Result<Vec<_>, _>>()
        .or_storage("list_equipment decode failed")
}

pub async fn fetch_equipment(pool: &PgPool, id: Uuid) -> EngineResult<Equipment> {
    let row = sqlx::query("select id, code, display_name, description from equipments where id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .or_storage("fetch_equipment failed")?;

    match row {
        Some(row) => equipment_from_row(&row).or_storage("fetch_equipment decode failed"),
        None => Err(EngineError::not_found(Entity::Equipment, id)),
    }
}

pub async fn create_equipment(
    pool: &PgPool,
    caller: &Caller,
    new: &NewEquipment,
) -> EngineResult<Equipment> {
    ensure_admin(caller, "equipment create")?;
    validate_new_equipment(new)?;

    let code = new.code.trim();
    let row = sqlx::query(
        r#"
        insert into equipments (id, code, display_name, description)
        values ($1, $2, $3, $4)
        returning id, code, display_name, description
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(code)
    .bind(new.display_name.trim())
    .bind(&new.description)
    .fetch_one(pool)
    .await
    .map_err(|e| classify_catalog(e, code, "create_equipment insert failed"))?;

    let eq = equipment_from_row(&row).or_storage("create_equipment decode failed")?;
    info!(equipment_id = %eq.id, code = %eq.code, "equipment created");
    Ok(eq)
}

pub async fn update_equipment(
    pool: &PgPool,
    caller: &Caller,
    id: Uuid,
    patch: &EquipmentPatch,
) -> EngineResult<Equipment> {
    ensure_admin(caller, "equipment update")?;

    let mut tx = pool.begin().await.or_storage("update_equipment begin failed")?;

    let row = sqlx::query(
        "select id, code, display_name, description from equipments where id = $1 for update",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await
    .or_storage("update_equipment select failed")?;
    let Some(row) = row else {
        return Err(EngineError::not_found(Entity::Equipment, id));
    };
    let current = equipment_from_row(&row).or_storage("update_equipment decode failed")?;

    if patch.is_empty() {
        return Ok(current);
    }
    let next = patch.merge_into(&current);
    validate_equipment(&next)?;

    let row = sqlx::query(
        r#"
        update equipments
        set code = $2, display_name = $3, description = $4
        where id = $1
        returning id, code, display_name, description
        "#,
    )
    .bind(id)
    .bind(&next.code)
    .bind(&next.display_name)
    .bind(&next.description)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| classify_catalog(e, &next.code, "update_equipment write failed"))?;
    let updated = equipment_from_row(&row).or_storage("update_equipment decode failed")?;

    tx.commit().await.or_storage("update_equipment commit failed")?;

    info!(equipment_id = %id, "equipment updated");
    Ok(updated)
}

/// Delete a catalog entry; its room associations cascade.
pub async fn delete_equipment(pool: &PgPool, caller: &Caller, id: Uuid) -> EngineResult<()> {
    ensure_admin(caller, "equipment delete")?;

    let deleted: Option<(Uuid,)> =
        sqlx::query_as::<_, (Uuid,)>("delete from equipments where id = $1 returning id")
            .bind(id)
            .fetch_optional(pool)
            .await
            .or_storage("delete_equipment failed")?;

    match deleted {
        Some(_) => {
            info!(equipment_id = %id, "equipment deleted");
            Ok(())
        }
        None => Err(EngineError::not_found(Entity::Equipment, id)),
    }
}

// ---------------------------------------------------------------------------
// Room associations
// ---------------------------------------------------------------------------

/// Insert-or-replace the quantity of `equipment_id` in `room_id`.
///
/// Repeating the call with the same arguments converges to one row with that
/// quantity.
pub async fn assign_equipment(
    pool: &PgPool,
    caller: &Caller,
    room_id: Uuid,
    equipment_id: Uuid,
    quantity: i32,
) -> EngineResult<RoomEquipment> {
    validate_quantity(quantity)?;
    ensure_admin(caller, "equipment assignment")?;

    let (room_id, equipment_id, quantity): (Uuid, Uuid, i32) =
        sqlx::query_as::<_, (Uuid, Uuid, i32)>(
            r#"
            insert into room_equipments (room_id, equipment_id, quantity)
            values ($1, $2, $3)
            on conflict (room_id, equipment_id)
            do update set quantity = excluded.quantity
            returning room_id, equipment_id, quantity
            "#,
        )
        .bind(room_id)
        .bind(equipment_id)
        .bind(quantity)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                return match violated_constraint(&e) {
                    Some("fk_room_equipments_equipment") => {
                        EngineError::not_found(Entity::Equipment, equipment_id)
                    }
                    _ => EngineError::not_found(Entity::Room, room_id),
                };
            }
            storage(e, "assign_equipment upsert failed")
        })?;

    info!(room_id = %room_id, equipment_id = %equipment_id, quantity, "equipment assigned");
    Ok(RoomEquipment {
        room_id,
        equipment_id,
        quantity,
    })
}

pub async fn remove_equipment(
    pool: &PgPool,
    caller: &Caller,
    room_id: Uuid,
    equipment_id: Uuid,
) -> EngineResult<()> {
    ensure_admin(caller, "equipment removal")?;

    let res = sqlx::query("delete from room_equipments where room_id = $1 and equipment_id = $2")
        .bind(room_id)
        .bind(equipment_id)
        .execute(pool)
        .await
        .or_storage("remove_equipment failed")?;

    if res.rows_affected() == 0 {
        return Err(EngineError::not_found(
            Entity::RoomEquipment,
            format!("{room_id}/{equipment_id}"),
        ));
    }
    info!(room_id = %room_id, equipment_id = %equipment_id, "equipment removed");
    Ok(())
}

/// Associations for one room, ordered by equipment id. Empty if none.
pub async fn list_room_equipment(pool: &PgPool, room_id: Uuid) -> EngineResult<Vec<RoomEquipment>> {
    let rows: Vec<(Uuid, Uuid, i32)> = sqlx::query_as::<_, (Uuid, Uuid, i32)>(
        r#"
        select room_id, equipment_id, quantity
        from room_equipments
        where room_id = $1
        order by equipment_id
        "#,
    )
    .bind(room_id)
    .fetch_all(pool)
    .await
    .or_storage("list_room_equipment failed")?;

    Ok(rows
        .into_iter()
        .map(|(room_id, equipment_id, quantity)| RoomEquipment {
            room_id,
            equipment_id,
            quantity,
        })
        .collect())
}
