//! rbk-engine
//!
//! Reservation conflict rules, evaluated without IO:
//! - half-open interval overlap (touching intervals never conflict)
//! - merge-patch resolution over fixed per-entity field sets
//! - holder / admin authorization preconditions
//! - input validation that runs before any transaction is opened
//!
//! The store layer (`rbk-db`) runs these inside its locked transactions and
//! reports failures through [`EngineError`].

mod authz;
mod error;
mod interval;
mod patch;
mod validate;

pub use authz::{ensure_admin, ensure_can_book_for, ensure_can_mutate, ensure_can_view_holder};
pub use error::{EngineError, EngineResult, Entity};
pub use interval::{find_conflict, Interval};
pub use patch::{resolve_reservation, MergePatch, ResolvedReservation};
pub use validate::{
    validate_equipment, validate_new_equipment, validate_new_room, validate_new_user,
    validate_quantity, validate_room,
};
