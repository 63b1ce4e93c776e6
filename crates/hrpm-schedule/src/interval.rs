// interval.rs - Clock times, half-open intervals and slot generation.
//
// Everything here is pure. Times are minute-precision wall-clock values
// within one calendar day; `24:00` is allowed as an end boundary.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;

/// Fixed length of a bookable slot.
pub const SLOT_MINUTES: u32 = 30;

const MINUTES_PER_DAY: u16 = 24 * 60;

/// A wall-clock time of day, stored as minutes since midnight (0..=1440).
///
/// Serialized as `"HH:MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u16);

impl ClockTime {
    pub const MIDNIGHT: ClockTime = ClockTime(0);
    pub const END_OF_DAY: ClockTime = ClockTime(MINUTES_PER_DAY);

    pub fn new(hour: u16, minute: u16) -> Result<Self, ScheduleError> {
        let value = format!("{:02}:{:02}", hour, minute);
        if minute >= 60 {
            return Err(ScheduleError::InvalidClockTime {
                value,
                reason: "minute must be below 60",
            });
        }
        Self::from_minutes(u32::from(hour) * 60 + u32::from(minute)).map_err(|_| {
            ScheduleError::InvalidClockTime {
                value,
                reason: "must be between 00:00 and 24:00",
            }
        })
    }

    pub fn from_minutes(minutes: u32) -> Result<Self, ScheduleError> {
        if minutes > u32::from(MINUTES_PER_DAY) {
            return Err(ScheduleError::InvalidClockTime {
                value: minutes.to_string(),
                reason: "must be between 00:00 and 24:00",
            });
        }
        Ok(ClockTime(minutes as u16))
    }

    pub fn minutes(self) -> u32 {
        u32::from(self.0)
    }

    /// `self + minutes`, or `None` if that runs past 24:00.
    pub fn checked_add_minutes(self, minutes: u32) -> Option<ClockTime> {
        Self::from_minutes(self.minutes().checked_add(minutes)?).ok()
    }

    /// This time on `date`, as a UTC instant.
    pub fn on(self, date: NaiveDate) -> DateTime<Utc> {
        date.and_time(NaiveTime::MIN).and_utc() + Duration::minutes(i64::from(self.0))
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl FromStr for ClockTime {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = |reason: &'static str| ScheduleError::InvalidClockTime {
            value: s.to_string(),
            reason,
        };
        let (hour, minute) = s.trim().split_once(':').ok_or_else(|| bad("expected HH:MM"))?;
        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(bad("expected HH:MM"));
        }
        let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !digits(hour) {
            return Err(bad("hour is not a number"));
        }
        if !digits(minute) {
            return Err(bad("minute is not a number"));
        }
        let hour: u16 = hour.parse().map_err(|_| bad("hour is not a number"))?;
        let minute: u16 = minute.parse().map_err(|_| bad("minute is not a number"))?;
        if minute >= 60 {
            return Err(bad("minute must be below 60"));
        }
        if hour > 24 || (hour == 24 && minute > 0) {
            return Err(bad("must be between 00:00 and 24:00"));
        }
        Ok(ClockTime(hour * 60 + minute))
    }
}

impl TryFrom<String> for ClockTime {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(time: ClockTime) -> Self {
        time.to_string()
    }
}

/// Half-open interval `[start, end)` within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl TimeInterval {
    pub fn new(start: ClockTime, end: ClockTime) -> Result<Self, ScheduleError> {
        if end <= start {
            return Err(ScheduleError::InvalidInterval {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// `[start, start + minutes)`.
    pub fn starting_at(start: ClockTime, minutes: u32) -> Result<Self, ScheduleError> {
        if minutes == 0 {
            return Err(ScheduleError::invalid("duration", "must be at least one minute"));
        }
        let end = start.checked_add_minutes(minutes).ok_or_else(|| {
            ScheduleError::invalid("duration", format!("{} minutes from {} runs past 24:00", minutes, start))
        })?;
        Self::new(start, end)
    }

    pub fn duration_minutes(&self) -> u32 {
        self.end.minutes() - self.start.minutes()
    }

    /// Half-open overlap: touching intervals do not overlap.
    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn contains(&self, other: &TimeInterval) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{})", self.start, self.end)
    }
}

/// Split `window` into consecutive `slot_minutes`-long slots.
///
/// A trailing remainder shorter than one slot is dropped.
pub fn generate_slots(window: &TimeInterval, slot_minutes: u32) -> Vec<TimeInterval> {
    if slot_minutes == 0 {
        return Vec::new();
    }
    let mut slots = Vec::new();
    let mut cursor = window.start;
    while let Some(next) = cursor.checked_add_minutes(slot_minutes) {
        if next > window.end {
            break;
        }
        slots.push(TimeInterval {
            start: cursor,
            end: next,
        });
        cursor = next;
    }
    slots
}

/// Whether the union of `slots` covers `wanted` without gaps.
pub fn covers(slots: &[TimeInterval], wanted: &TimeInterval) -> bool {
    let mut sorted: Vec<&TimeInterval> = slots.iter().collect();
    sorted.sort();
    let mut reached = wanted.start;
    for slot in sorted {
        if reached >= wanted.end {
            break;
        }
        if slot.start > reached {
            // Sorted by start: nothing later can fill the gap.
            return false;
        }
        if slot.end > reached {
            reached = slot.end;
        }
    }
    reached >= wanted.end
}
