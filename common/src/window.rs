use serde::{Deserialize, Serialize};

use crate::error::WindowError;

pub const HOURS_PER_DAY: u8 = 24;

/// Inclusive range of local hours during which a schedule entry may run.
///
/// `start == end` is treated as "always active". When `end < start` the window
/// wraps past midnight, so `22..=2` covers 22, 23, 0, 1 and 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    pub hour_start: u8,
    pub hour_end: u8,
}

impl HourWindow {
    pub fn new(hour_start: u8, hour_end: u8) -> Result<Self, WindowError> {
        check_hour(hour_start)?;
        check_hour(hour_end)?;
        Ok(Self {
            hour_start,
            hour_end,
        })
    }

    pub fn always() -> Self {
        Self {
            hour_start: 0,
            hour_end: 0,
        }
    }

    pub fn contains(&self, target_hour: u8) -> Result<bool, WindowError> {
        contains(self.hour_start, self.hour_end, target_hour)
    }

    pub fn wraps_midnight(&self) -> bool {
        self.hour_end < self.hour_start
    }
}

pub fn contains(hour_start: u8, hour_end: u8, target_hour: u8) -> Result<bool, WindowError> {
    check_hour(hour_start)?;
    check_hour(hour_end)?;
    check_hour(target_hour)?;

    let inside = if hour_start == hour_end {
        true
    } else if hour_end > hour_start {
        (hour_start..=hour_end).contains(&target_hour)
    } else {
        // Wrapped: only the gap between end and start is outside.
        !(target_hour > hour_end && target_hour < hour_start)
    };

    Ok(inside)
}

fn check_hour(hour: u8) -> Result<(), WindowError> {
    if hour < HOURS_PER_DAY {
        Ok(())
    } else {
        Err(WindowError::HourOutOfRange(hour))
    }
}
