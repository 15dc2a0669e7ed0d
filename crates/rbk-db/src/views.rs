//! Read-only projections served from the pool, outside any write
//! transaction. Empty results are empty lists, never errors.

use rbk_engine::EngineResult;
use rbk_schemas::{EquipmentItem, RoomReservationView, UserReservationView};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::OrStorage;

/// A holder's reservations with room details and the room's equipment,
/// newest first.
pub async fn list_reservations_by_user(
    pool: &PgPool,
    user_id: Uuid,
) -> EngineResult<Vec<UserReservationView>> {
    let rows = sqlx::query(
        r#"
        select
          b.id          as reservation_id,
          b.start_time,
          b.end_time,
          r.id          as room_id,
          r.name        as room_name,
          r.capacity,
          r.location,
          coalesce(
            json_agg(
              json_build_object(
                'id', e.id,
                'code', e.code,
                'name', e.display_name,
                'quantity', re.quantity
              )
              order by e.code
            ) filter (where e.id is not null),
            '[]'
          ) as equipment
        from reservations b
        join rooms r on r.id = b.room_id
        left join room_equipments re on re.room_id = r.id
        left join equipments e on e.id = re.equipment_id
        where b.user_id = $1
        group by b.id, r.id
        order by b.start_time desc, b.id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .or_storage("list_reservations_by_user failed")?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let Json(equipment): Json<Vec<EquipmentItem>> = row
            .try_get("equipment")
            .or_storage("list_reservations_by_user equipment decode failed")?;
        out.push(UserReservationView {
            reservation_id: row.try_get("reservation_id").or_storage("decode reservation_id")?,
            start_time: row.try_get("start_time").or_storage("decode start_time")?,
            end_time: row.try_get("end_time").or_storage("decode end_time")?,
            room_id: row.try_get("room_id").or_storage("decode room_id")?,
            room_name: row.try_get("room_name").or_storage("decode room_name")?,
            capacity: row.try_get("capacity").or_storage("decode capacity")?,
            location: row.try_get("location").or_storage("decode location")?,
            equipment,
        });
    }
    Ok(out)
}

/// A room's reservations with holder identity, earliest first.
pub async fn list_reservations_by_room(
    pool: &PgPool,
    room_id: Uuid,
) -> EngineResult<Vec<RoomReservationView>> {
    let rows = sqlx::query(
        r#"
        select
          b.id          as reservation_id,
          b.start_time,
          b.end_time,
          b.created_at,
          u.id          as user_id,
          u.name        as user_name,
          u.email       as user_email
        from reservations b
        join users u on u.id = b.user_id
        where b.room_id = $1
        order by b.start_time, b.id
        "#,
    )
    .bind(room_id)
    .fetch_all(pool)
    .await
    .or_storage("list_reservations_by_room failed")?;

    rows.iter()
        .map(|row| -> Result<RoomReservationView, sqlx::Error> {
            Ok(RoomReservationView {
                reservation_id: row.try_get("reservation_id")?,
                start_time: row.try_get("start_time")?,
                end_time: row.try_get("end_time")?,
                created_at: row.try_get("created_at")?,
                user_id: row.try_get("user_id")?,
                user_name: row.try_get("user_name")?,
                user_email: row.try_get("user_email")?,
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .or_storage("list_reservations_by_room decode failed")
}
