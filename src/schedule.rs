//! Pure schedule-window evaluation.
//!
//! Both functions are total functions of their arguments; the caller
//! supplies the instant (see [`crate::clock::Clock`]). Windows are half-open
//! `[start, end)`; a block whose start is after its end wraps past midnight.

use crate::config::ScheduleBlock;
use chrono::{Datelike, NaiveDateTime};

/// Weekday number with Monday = 0, matching the config format.
fn weekday_index(now: NaiveDateTime) -> u8 {
    now.date().weekday().num_days_from_monday() as u8
}

/// Whether `now` falls inside one block.
///
/// The day restriction is checked against the calendar day `now` falls on,
/// so an overnight block restricted to Monday matches Monday 23:30 but not
/// Tuesday 02:00.
pub fn is_within_block(now: NaiveDateTime, block: &ScheduleBlock) -> bool {
    if !block.enabled {
        return false;
    }
    if let Some(days) = &block.days {
        if !days.contains(&weekday_index(now)) {
            return false;
        }
    }
    let t = now.time();
    if block.start == block.end {
        // Zero-length window, not "always".
        false
    } else if block.start < block.end {
        block.start <= t && t < block.end
    } else {
        t >= block.start || t < block.end
    }
}

/// Whether any block matches `now`.
pub fn is_within_schedule(now: NaiveDateTime, blocks: &[ScheduleBlock]) -> bool {
    blocks.iter().any(|block| is_within_block(now, block))
}
