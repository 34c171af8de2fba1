use crate::model::*;

use super::EngineError;

// ── Slot timetable ────────────────────────────────────────────────

/// Width of one timetable slot.
pub const SLOT_MS: Ms = HOUR_MS;

/// Daily window the timetable covers, in whole hours: `[open, close)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingHours {
    open: u32,
    close: u32,
}

impl OperatingHours {
    pub fn new(open: u32, close: u32) -> Result<Self, EngineError> {
        if close > 24 || open >= close {
            return Err(EngineError::validation(format!(
                "operating hours must satisfy open < close <= 24, got {open}..{close}"
            )));
        }
        Ok(Self { open, close })
    }

    pub fn open(&self) -> u32 {
        self.open
    }

    pub fn close(&self) -> u32 {
        self.close
    }

    pub fn slot_count(&self) -> usize {
        (self.close - self.open) as usize
    }

    /// The operating window of the day starting at `day_start`.
    pub fn window(&self, day_start: Ms) -> Span {
        Span::new(
            day_start + self.open as Ms * HOUR_MS,
            day_start + self.close as Ms * HOUR_MS,
        )
    }
}

impl Default for OperatingHours {
    /// The full 24-hour day.
    fn default() -> Self {
        Self { open: 0, close: 24 }
    }
}

/// One row of a room's timetable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub is_check_out: bool,
    pub span: Span,
}

/// Partition the operating window of one day into 1-hour slots and mark each
/// slot occupied iff some reservation intersects it (half-open intersection).
///
/// `reservations` must be sorted by start, as `LocationState` keeps them.
/// The result is in slot order and never empty.
pub fn timetable(day_start: Ms, hours: OperatingHours, reservations: &[Span]) -> Vec<Slot> {
    let window = hours.window(day_start);
    let mut slots = Vec::with_capacity(hours.slot_count());
    // Reservations ending at or before a slot start can't touch any later slot.
    let mut first = 0;

    let mut start = window.start;
    while start < window.end {
        let slot = Span::new(start, start + SLOT_MS);
        while first < reservations.len() && reservations[first].end <= slot.start {
            first += 1;
        }
        let is_check_out = reservations[first..]
            .iter()
            .take_while(|r| r.start < slot.end)
            .any(|r| r.overlaps(&slot));
        slots.push(Slot { is_check_out, span: slot });
        start += SLOT_MS;
    }

    slots
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end {
                last.end = last.end.max(span.end);
                continue;
            }
        merged.push(span);
    }
    merged
}

/// Subtract sorted, disjoint `to_remove` from sorted `base`.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Span::new(current_start, current_end));
        }
    }

    result
}

/// Free stretches of the operating window, coalesced across slot boundaries.
pub fn free_windows(day_start: Ms, hours: OperatingHours, reservations: &[Span]) -> Vec<Span> {
    let window = hours.window(day_start);
    let busy = merge_overlapping(reservations);
    subtract_intervals(&[window], &busy)
}
