use chrono::{DateTime, Timelike, Utc};
use rbk_schemas::Reservation;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// A validated half-open time interval `[start, end)` with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// The store keeps `timestamptz` at microsecond resolution.
fn ensure_microsecond_precision(field: &str, t: DateTime<Utc>) -> EngineResult<()> {
    if t.nanosecond() % 1_000 != 0 {
        return Err(EngineError::validation(format!(
            "{field} has sub-microsecond precision ({}); use at most 6 fractional digits",
            t.to_rfc3339()
        )));
    }
    Ok(())
}

impl Interval {
    /// Returns `Validation` unless `start < end` and both bounds are whole
    /// microseconds, so a stored interval always equals its input.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> EngineResult<Self> {
        ensure_microsecond_precision("start_time", start)?;
        ensure_microsecond_precision("end_time", end)?;
        if start >= end {
            return Err(EngineError::validation(format!(
                "start_time must be before end_time (start={}, end={})",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Half-open overlap: `a.start < b.end && b.start < a.end`.
    /// Intervals that only touch at a boundary do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.overlaps_range(other.start, other.end)
    }

    /// Same test against raw bounds, e.g. a stored reservation row.
    pub fn overlaps_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }
}

/// First reservation in `existing` that overlaps `candidate`, skipping
/// `exclude` (the reservation being updated).
///
/// The caller is responsible for scoping `existing` to one room.
pub fn find_conflict<'a, I>(
    existing: I,
    candidate: &Interval,
    exclude: Option<Uuid>,
) -> Option<&'a Reservation>
where
    I: IntoIterator<Item = &'a Reservation>,
{
    existing
        .into_iter()
        .filter(|r| Some(r.id) != exclude)
        .find(|r| candidate.overlaps_range(r.start_time, r.end_time))
}
