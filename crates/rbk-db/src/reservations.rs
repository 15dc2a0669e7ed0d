//! Reservation transaction coordinator.
//!
//! Every create/update runs `begin -> lock room -> check overlap -> write ->
//! commit` in one transaction. The room row lock (`SELECT .. FROM rooms ..
//! FOR UPDATE`) is the per-room serialization point: two writers on the same
//! room queue on it even when the room has no reservations yet, and writers
//! on different rooms never touch the same lock.
//!
//! Returning early with `?` drops the open `Transaction`, which rolls it back.

use rbk_engine::{
    ensure_can_book_for, ensure_can_mutate, resolve_reservation, EngineError, EngineResult, Entity,
    Interval,
};
use rbk_schemas::{Caller, NewReservation, Reservation, ReservationPatch};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    is_check_violation, is_exclusion_violation, is_foreign_key_violation, storage,
    violated_constraint, OrStorage,
};

/// Attempts at pinning a reservation whose room moved underneath us.
const UPDATE_LOCK_ATTEMPTS: usize = 3;

const RESERVATION_COLUMNS: &str = "id, room_id, user_id, start_time, end_time, created_at";

pub(crate) fn reservation_from_row(row: &PgRow) -> Result<Reservation, sqlx::Error> {
    Ok(Reservation {
        id: row.try_get("id")?,
        room_id: row.try_get("room_id")?,
        user_id: row.try_get("user_id")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        created_at: row.try_get("created_at")?,
    })
}

fn conflict(room_id: Uuid, interval: &Interval) -> EngineError {
    EngineError::Conflict {
        room_id,
        start: interval.start(),
        end: interval.end(),
    }
}

/// Map a failed reservation INSERT/UPDATE. The exclusion constraint is a
/// backstop for the locked check and still means "overlap".
fn classify_write(
    err: sqlx::Error,
    room_id: Uuid,
    holder_id: Uuid,
    interval: &Interval,
    what: &'static str,
) -> EngineError {
    if is_exclusion_violation(&err) {
        return conflict(room_id, interval);
    }
    if is_foreign_key_violation(&err) {
        return match violated_constraint(&err) {
            Some("fk_reservations_user") => EngineError::not_found(Entity::User, holder_id),
            _ => EngineError::not_found(Entity::Room, room_id),
        };
    }
    if is_check_violation(&err) {
        return EngineError::validation("start_time must be before end_time");
    }
    storage(err, what)
}

// ---------------------------------------------------------------------------
// Lock + detect
// ---------------------------------------------------------------------------

/// Lock the room row for the rest of the transaction and return whether the
/// room is active. `NotFound(room)` if it does not exist.
pub async fn lock_room(conn: &mut PgConnection, room_id: Uuid) -> EngineResult<bool> {
    let row: Option<(bool,)> =
        sqlx::query_as::<_, (bool,)>("select is_active from rooms where id = $1 for update")
            .bind(room_id)
            .fetch_optional(&mut *conn)
            .await
            .or_storage("lock_room failed")?;

    match row {
        Some((active,)) => Ok(active),
        None => Err(EngineError::not_found(Entity::Room, room_id)),
    }
}

/// Lock the stored and target rooms in ascending id order so that concurrent
/// cross-room updates cannot deadlock. Returns the target room's active flag.
async fn lock_rooms_ordered(
    conn: &mut PgConnection,
    stored: Uuid,
    target: Uuid,
) -> EngineResult<bool> {
    if stored == target {
        return lock_room(conn, target).await;
    }
    let (first, second) = if stored < target {
        (stored, target)
    } else {
        (target, stored)
    };
    let first_active = lock_room(conn, first).await?;
    let second_active = lock_room(conn, second).await?;
    Ok(if target == first {
        first_active
    } else {
        second_active
    })
}

/// True iff any reservation on `room_id` other than `exclude` overlaps
/// `interval`. Overlapping rows are locked `FOR UPDATE`.
///
/// Only meaningful while the caller holds the room lock from [`lock_room`].
pub async fn has_conflict(
    conn: &mut PgConnection,
    room_id: Uuid,
    interval: &Interval,
    exclude: Option<Uuid>,
) -> EngineResult<bool> {
    let rows = sqlx::query(
        r#"
        select id
        from reservations
        where room_id = $1
          and start_time < $3
          and $2 < end_time
          and ($4::uuid is null or id <> $4)
        for update
        "#,
    )
    .bind(room_id)
    .bind(interval.start())
    .bind(interval.end())
    .bind(exclude)
    .fetch_all(&mut *conn)
    .await
    .or_storage("has_conflict query failed")?;

    if !rows.is_empty() {
        debug!(room_id = %room_id, overlapping = rows.len(), "overlap detected");
    }
    Ok(!rows.is_empty())
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

pub async fn fetch_reservation(pool: &PgPool, id: Uuid) -> EngineResult<Reservation> {
    let row = sqlx::query(&format!(
        "select {RESERVATION_COLUMNS} from reservations where id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .or_storage("fetch_reservation failed")?;

    match row {
        Some(row) => reservation_from_row(&row).or_storage("fetch_reservation decode failed"),
        None => Err(EngineError::not_found(Entity::Reservation, id)),
    }
}

/// Every reservation, ordered by start time. Unfiltered; callers gate it.
pub async fn list_reservations(pool: &PgPool) -> EngineResult<Vec<Reservation>> {
    let rows = sqlx::query(&format!(
        "select {RESERVATION_COLUMNS} from reservations order by start_time, id"
    ))
    .fetch_all(pool)
    .await
    .or_storage("list_reservations failed")?;

    rows.iter()
        .map(reservation_from_row)
        .collect::<Result<Vec<_>, _>>()
        .or_storage("list_reservations decode failed")
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

pub async fn create_reservation(
    pool: &PgPool,
    caller: &Caller,
    new: &NewReservation,
) -> EngineResult<Reservation> {
    let interval = Interval::new(new.start_time, new.end_time)?;
    ensure_can_book_for(caller, new.user_id)?;

    let mut tx = pool.begin().await.or_storage("create_reservation begin failed")?;

    let active = lock_room(&mut tx, new.room_id).await?;
    if !active {
        return Err(EngineError::validation(format!(
            "room {} is not active",
            new.room_id
        )));
    }

    if has_conflict(&mut tx, new.room_id, &interval, None).await? {
        info!(room_id = %new.room_id, user_id = %new.user_id, "reservation rejected: overlap");
        return Err(conflict(new.room_id, &interval));
    }

    let row = sqlx::query(&format!(
        r#"
        insert into reservations (id, room_id, user_id, start_time, end_time)
        values ($1, $2, $3, $4, $5)
        returning {RESERVATION_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(new.room_id)
    .bind(new.user_id)
    .bind(interval.start())
    .bind(interval.end())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        classify_write(e, new.room_id, new.user_id, &interval, "create_reservation insert failed")
    })?;
    let created = reservation_from_row(&row).or_storage("create_reservation decode failed")?;

    tx.commit().await.or_storage("create_reservation commit failed")?;

    info!(
        reservation_id = %created.id,
        room_id = %created.room_id,
        user_id = %created.user_id,
        "reservation created"
    );
    Ok(created)
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// Apply `patch` to reservation `id` under lock.
///
/// Lock order is rooms (ascending id) then the reservation row, the same
/// order `create_reservation` uses, so create and update never deadlock. The
/// reservation's room is read before locking; if it moved in between, the
/// locks are released and taken again.
pub async fn update_reservation(
    pool: &PgPool,
    caller: &Caller,
    id: Uuid,
    patch: &ReservationPatch,
) -> EngineResult<Reservation> {
    if let (Some(start), Some(end)) = (patch.start_time, patch.end_time) {
        Interval::new(start, end)?;
    }

    for attempt in 1..=UPDATE_LOCK_ATTEMPTS {
        let mut tx = pool.begin().await.or_storage("update_reservation begin failed")?;

        let stored_room: Option<(Uuid,)> =
            sqlx::query_as::<_, (Uuid,)>("select room_id from reservations where id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .or_storage("update_reservation room lookup failed")?;
        let Some((stored_room,)) = stored_room else {
            return Err(EngineError::not_found(Entity::Reservation, id));
        };

        let target_room = patch.room_id.unwrap_or(stored_room);
        let target_active = lock_rooms_ordered(&mut tx, stored_room, target_room).await?;

        let row = sqlx::query(&format!(
            "select {RESERVATION_COLUMNS} from reservations where id = $1 for update"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .or_storage("update_reservation select failed")?;
        let Some(row) = row else {
            return Err(EngineError::not_found(Entity::Reservation, id));
        };
        let current = reservation_from_row(&row).or_storage("update_reservation decode failed")?;

        if current.room_id != stored_room {
            debug!(reservation_id = %id, attempt, "room changed before lock; retrying");
            drop(tx);
            continue;
        }

        ensure_can_mutate(caller, &current)?;

        let resolved = resolve_reservation(&current, patch)?;
        if resolved.is_noop() {
            // Nothing to write; the rollback on drop leaves the row untouched.
            return Ok(current);
        }
        if resolved.room_changed && !target_active {
            return Err(EngineError::validation(format!(
                "room {target_room} is not active"
            )));
        }

        if resolved.needs_conflict_check()
            && has_conflict(&mut tx, resolved.next.room_id, &resolved.interval, Some(id)).await?
        {
            info!(
                reservation_id = %id,
                room_id = %resolved.next.room_id,
                "reservation update rejected: overlap"
            );
            return Err(conflict(resolved.next.room_id, &resolved.interval));
        }

        let next = &resolved.next;
        let row = sqlx::query(&format!(
            r#"
            update reservations
            set room_id = $2,
                start_time = $3,
                end_time = $4
            where id = $1
            returning {RESERVATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(next.room_id)
        .bind(next.start_time)
        .bind(next.end_time)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            classify_write(
                e,
                next.room_id,
                next.user_id,
                &resolved.interval,
                "update_reservation write failed",
            )
        })?;
        let updated = reservation_from_row(&row).or_storage("update_reservation decode failed")?;

        tx.commit().await.or_storage("update_reservation commit failed")?;

        info!(
            reservation_id = %id,
            room_id = %updated.room_id,
            room_changed = resolved.room_changed,
            "reservation updated"
        );
        return Ok(updated);
    }

    Err(EngineError::storage(anyhow::anyhow!(
        "update_reservation: reservation {id} kept moving between rooms; gave up after {UPDATE_LOCK_ATTEMPTS} attempts"
    )))
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

/// Delete reservation `id`. The holder is read from the locked row so the
/// ownership check and the delete see the same state.
pub async fn delete_reservation(pool: &PgPool, caller: &Caller, id: Uuid) -> EngineResult<()> {
    let mut tx = pool.begin().await.or_storage("delete_reservation begin failed")?;

    let row = sqlx::query(&format!(
        "select {RESERVATION_COLUMNS} from reservations where id = $1 for update"
    ))
    .bind(id)
    .fetch_optional(&mut *tx)
    .await
    .or_storage("delete_reservation select failed")?;
    let Some(row) = row else {
        return Err(EngineError::not_found(Entity::Reservation, id));
    };
    let current = reservation_from_row(&row).or_storage("delete_reservation decode failed")?;

    ensure_can_mutate(caller, &current)?;

    let deleted: Option<(Uuid,)> =
        sqlx::query_as::<_, (Uuid,)>("delete from reservations where id = $1 returning id")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .or_storage("delete_reservation delete failed")?;
    if deleted.is_none() {
        return Err(EngineError::not_found(Entity::Reservation, id));
    }

    tx.commit().await.or_storage("delete_reservation commit failed")?;

    info!(reservation_id = %id, room_id = %current.room_id, "reservation deleted");
    Ok(())
}
