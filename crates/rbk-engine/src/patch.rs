//! Merge-patch resolution.
//!
//! Each patch type lists exactly the fields a caller may change; everything
//! else on the stored record is carried over untouched. Resolution is pure:
//! callers must feed it the row they read under `FOR UPDATE` and write the
//! result inside the same transaction.

use rbk_schemas::{
    Equipment, EquipmentPatch, Reservation, ReservationPatch, Room, RoomPatch,
};

use crate::error::EngineResult;
use crate::interval::Interval;

/// A sparse set of field changes applicable to a stored record `T`.
pub trait MergePatch<T> {
    /// Next state: patched fields take the proposed value, the rest keep the
    /// current value.
    fn merge_into(&self, current: &T) -> T;

    /// True when no field is present. Applying an empty patch must not
    /// issue any write.
    fn is_empty(&self) -> bool;
}

impl MergePatch<Reservation> for ReservationPatch {
    fn merge_into(&self, current: &Reservation) -> Reservation {
        Reservation {
            id: current.id,
            room_id: self.room_id.unwrap_or(current.room_id),
            user_id: current.user_id,
            start_time: self.start_time.unwrap_or(current.start_time),
            end_time: self.end_time.unwrap_or(current.end_time),
            created_at: current.created_at,
        }
    }

    fn is_empty(&self) -> bool {
        self.room_id.is_none() && self.start_time.is_none() && self.end_time.is_none()
    }
}

impl MergePatch<Room> for RoomPatch {
    fn merge_into(&self, current: &Room) -> Room {
        Room {
            id: current.id,
            name: self.name.clone().unwrap_or_else(|| current.name.clone()),
            capacity: self.capacity.unwrap_or(current.capacity),
            location: self
                .location
                .clone()
                .unwrap_or_else(|| current.location.clone()),
            is_active: self.is_active.unwrap_or(current.is_active),
        }
    }

    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.capacity.is_none()
            && self.location.is_none()
            && self.is_active.is_none()
    }
}

impl MergePatch<Equipment> for EquipmentPatch {
    fn merge_into(&self, current: &Equipment) -> Equipment {
        Equipment {
            id: current.id,
            code: self.code.clone().unwrap_or_else(|| current.code.clone()),
            display_name: self
                .display_name
                .clone()
                .unwrap_or_else(|| current.display_name.clone()),
            description: self
                .description
                .clone()
                .or_else(|| current.description.clone()),
        }
    }

    fn is_empty(&self) -> bool {
        self.code.is_none() && self.display_name.is_none() && self.description.is_none()
    }
}

// ---------------------------------------------------------------------------
// Reservation resolution
// ---------------------------------------------------------------------------

/// Outcome of applying a [`ReservationPatch`] to a locked reservation row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReservation {
    pub next: Reservation,
    pub interval: Interval,
    pub room_changed: bool,
    pub interval_changed: bool,
}

impl ResolvedReservation {
    /// Nothing differs from the stored row; the write can be skipped.
    pub fn is_noop(&self) -> bool {
        !self.room_changed && !self.interval_changed
    }

    /// A moved interval or a new room must be re-checked for overlap.
    pub fn needs_conflict_check(&self) -> bool {
        self.room_changed || self.interval_changed
    }
}

/// Merge `patch` onto `current` and re-validate `start < end`.
pub fn resolve_reservation(
    current: &Reservation,
    patch: &ReservationPatch,
) -> EngineResult<ResolvedReservation> {
    let next = patch.merge_into(current);
    let interval = Interval::new(next.start_time, next.end_time)?;

    Ok(ResolvedReservation {
        room_changed: next.room_id != current.room_id,
        interval_changed: next.start_time != current.start_time
            || next.end_time != current.end_time,
        next,
        interval,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn stored() -> Reservation {
        Reservation {
            id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            start_time: Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 1, 1, 11, 0, 0).unwrap(),
            created_at: Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn empty_patch_is_a_noop() {
        let cur = stored();
        let patch = ReservationPatch::default();
        assert!(MergePatch::<Reservation>::is_empty(&patch));

        let r = resolve_reservation(&cur, &patch).unwrap();
        assert_eq!(r.next, cur);
        assert!(r.is_noop());
        assert!(!r.needs_conflict_check());
    }

    #[test]
    fn patching_end_only_keeps_start_and_room() {
        let cur = stored();
        let new_end = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let r = resolve_reservation(
            &cur,
            &ReservationPatch {
                end_time: Some(new_end),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(r.next.start_time, cur.start_time);
        assert_eq!(r.next.end_time, new_end);
        assert_eq!(r.next.room_id, cur.room_id);
        assert!(r.interval_changed);
        assert!(!r.room_changed);
    }

    #[test]
    fn merged_interval_is_revalidated() {
        let cur = stored();
        // Moving start past the stored end inverts the interval.
        let bad_start = Utc.with_ymd_and_hms(2025, 1, 1, 11, 30, 0).unwrap();
        let err = resolve_reservation(
            &cur,
            &ReservationPatch {
                start_time: Some(bad_start),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn same_value_patch_is_not_a_change() {
        let cur = stored();
        let r = resolve_reservation(
            &cur,
            &ReservationPatch {
                room_id: Some(cur.room_id),
                start_time: Some(cur.start_time),
                end_time: None,
            },
        )
        .unwrap();
        assert!(r.is_noop());
    }

    #[test]
    fn room_patch_keeps_absent_fields() {
        let cur = Room {
            id: Uuid::new_v4(),
            name: "Board".into(),
            capacity: 8,
            location: "L2".into(),
            is_active: true,
        };
        let next = RoomPatch {
            is_active: Some(false),
            ..Default::default()
        }
        .merge_into(&cur);
        assert_eq!(next.name, "Board");
        assert_eq!(next.capacity, 8);
        assert!(!next.is_active);
    }

    #[test]
    fn equipment_patch_cannot_clear_description() {
        let cur = Equipment {
            id: Uuid::new_v4(),
            code: "PROJ".into(),
            display_name: "Projector".into(),
            description: Some("HDMI".into()),
        };
        let next = EquipmentPatch::default().merge_into(&cur);
        assert_eq!(next, cur);
    }
}
