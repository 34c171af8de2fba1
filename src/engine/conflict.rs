use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

/// Shape checks every booked or scheduled span passes before any overlap check.
pub(crate) fn validate_span(start: Ms, end: Ms) -> Result<Span, EngineError> {
    if end <= start {
        return Err(EngineError::validation("end must be after start"));
    }
    if start < MIN_VALID_TIMESTAMP_MS || end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::validation("timestamp out of range"));
    }
    let span = Span::new(start, end);
    if span.duration_ms() > MAX_RESERVATION_MS {
        return Err(EngineError::validation("span longer than a day"));
    }
    Ok(span)
}

/// Fail with `Conflict` if `span` overlaps any reservation of the room.
/// `ignore` skips one reservation (the one being rescheduled).
pub(crate) fn check_no_conflict(
    ls: &LocationState,
    span: &Span,
    ignore: Option<Ulid>,
) -> Result<(), EngineError> {
    for existing in ls.overlapping(span) {
        if Some(existing.id) == ignore {
            continue;
        }
        return Err(EngineError::Conflict(existing.id));
    }
    Ok(())
}

/// Pairwise overlap check inside one batch. Returns the id of the first
/// slot that collides with an earlier one.
pub(crate) fn check_batch_disjoint(batch: &[(Ulid, Span)]) -> Result<(), EngineError> {
    let mut sorted: Vec<&(Ulid, Span)> = batch.iter().collect();
    sorted.sort_by_key(|(_, span)| span.start);
    for pair in sorted.windows(2) {
        if pair[0].1.overlaps(&pair[1].1) {
            return Err(EngineError::Conflict(pair[1].0));
        }
    }
    Ok(())
}
