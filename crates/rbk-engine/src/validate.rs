use rbk_schemas::{Equipment, NewEquipment, NewRoom, NewUser, Room};

use crate::error::{EngineError, EngineResult};

const PASSWORD_MIN: usize = 6;
const PASSWORD_MAX: usize = 50;

fn require_non_blank(field: &str, v: &str) -> EngineResult<()> {
    if v.trim().is_empty() {
        return Err(EngineError::validation(format!("{field} is required")));
    }
    Ok(())
}

fn require_capacity(capacity: i16) -> EngineResult<()> {
    if capacity < 0 {
        return Err(EngineError::validation(format!(
            "capacity must be >= 0 (got {capacity})"
        )));
    }
    Ok(())
}

pub fn validate_new_room(r: &NewRoom) -> EngineResult<()> {
    require_non_blank("name", &r.name)?;
    require_non_blank("location", &r.location)?;
    require_capacity(r.capacity)
}

/// Checks a merged room before it is written back.
pub fn validate_room(r: &Room) -> EngineResult<()> {
    require_non_blank("name", &r.name)?;
    require_non_blank("location", &r.location)?;
    require_capacity(r.capacity)
}

pub fn validate_new_equipment(e: &NewEquipment) -> EngineResult<()> {
    require_non_blank("code", &e.code)?;
    require_non_blank("display_name", &e.display_name)
}

pub fn validate_equipment(e: &Equipment) -> EngineResult<()> {
    require_non_blank("code", &e.code)?;
    require_non_blank("display_name", &e.display_name)
}

/// Association quantity must be at least one.
pub fn validate_quantity(quantity: i32) -> EngineResult<()> {
    if quantity < 1 {
        return Err(EngineError::validation(format!(
            "quantity must be >= 1 (got {quantity})"
        )));
    }
    Ok(())
}

pub fn validate_new_user(u: &NewUser) -> EngineResult<()> {
    require_non_blank("name", &u.name)?;

    let email = u.email.trim();
    let valid_email = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.contains('@'),
        None => false,
    };
    if !valid_email {
        return Err(EngineError::validation("valid email is required"));
    }

    let n = u.password.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&n) {
        return Err(EngineError::validation(format!(
            "password must have {PASSWORD_MIN} to {PASSWORD_MAX} characters"
        )));
    }
    Ok(())
}
