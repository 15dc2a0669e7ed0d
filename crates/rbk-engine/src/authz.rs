//! Ownership and role preconditions.
//!
//! The caller identity is trusted as verified; these checks decide what that
//! identity may do. A USER acts only on their own reservations, an ADMIN on
//! any, and catalog mutations (rooms, equipment, roles) are ADMIN-only.

use rbk_schemas::{Caller, Reservation};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// Creating a reservation on behalf of `holder_id`.
pub fn ensure_can_book_for(caller: &Caller, holder_id: Uuid) -> EngineResult<()> {
    if caller.is_admin() || caller.user_id == holder_id {
        return Ok(());
    }
    Err(EngineError::authorization(format!(
        "user {} may not reserve on behalf of {holder_id}",
        caller.user_id
    )))
}

/// Updating or deleting an existing reservation.
pub fn ensure_can_mutate(caller: &Caller, reservation: &Reservation) -> EngineResult<()> {
    if caller.is_admin() || caller.user_id == reservation.user_id {
        return Ok(());
    }
    Err(EngineError::authorization(format!(
        "reservation {} is held by another user",
        reservation.id
    )))
}

/// Reading a holder's reservation list: the holder themself or an ADMIN.
pub fn ensure_can_view_holder(caller: &Caller, holder_id: Uuid) -> EngineResult<()> {
    if caller.is_admin() || caller.user_id == holder_id {
        return Ok(());
    }
    Err(EngineError::authorization(format!(
        "reservations of {holder_id} are private"
    )))
}

pub fn ensure_admin(caller: &Caller, action: &str) -> EngineResult<()> {
    if caller.is_admin() {
        return Ok(());
    }
    Err(EngineError::authorization(format!("{action} requires ADMIN")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rbk_schemas::Role;

    fn caller(role: Role) -> Caller {
        Caller {
            user_id: Uuid::new_v4(),
            role,
        }
    }

    fn held_by(user_id: Uuid) -> Reservation {
        let now = Utc::now();
        Reservation {
            id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            user_id,
            start_time: now,
            end_time: now + chrono::Duration::hours(1),
            created_at: now,
        }
    }

    #[test]
    fn holder_can_mutate_own_reservation() {
        let c = caller(Role::User);
        assert!(ensure_can_mutate(&c, &held_by(c.user_id)).is_ok());
    }

    #[test]
    fn user_cannot_mutate_foreign_reservation() {
        let c = caller(Role::User);
        let err = ensure_can_mutate(&c, &held_by(Uuid::new_v4())).unwrap_err();
        assert!(matches!(err, EngineError::Authorization(_)));
    }

    #[test]
    fn admin_can_mutate_and_book_for_anyone() {
        let c = caller(Role::Admin);
        assert!(ensure_can_mutate(&c, &held_by(Uuid::new_v4())).is_ok());
        assert!(ensure_can_book_for(&c, Uuid::new_v4()).is_ok());
        assert!(ensure_admin(&c, "room create").is_ok());
    }

    #[test]
    fn user_cannot_book_for_someone_else() {
        let c = caller(Role::User);
        assert!(ensure_can_book_for(&c, c.user_id).is_ok());
        assert!(ensure_can_book_for(&c, Uuid::new_v4()).is_err());
        assert!(ensure_admin(&c, "room create").is_err());
    }

    #[test]
    fn holder_list_is_private_to_holder_and_admin() {
        let c = caller(Role::User);
        assert!(ensure_can_view_holder(&c, c.user_id).is_ok());
        assert!(ensure_can_view_holder(&c, Uuid::new_v4()).is_err());
        assert!(ensure_can_view_holder(&caller(Role::Admin), c.user_id).is_ok());
    }
}
