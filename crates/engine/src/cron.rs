//! Five-field cron expressions (`minute hour day-of-month month day-of-week`).
//!
//! Only parsing and matching live here; scheduling is somebody else's job.
//! Each field accepts `*`, `a`, `a-b`, `*/n`, `a/n`, `a-b/n` and comma lists.
//! Months accept `JAN`..`DEC`, weekdays `SUN`..`SAT`, and weekday `7` is
//! another spelling of Sunday.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime, Timelike};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),

    #[error("{field}: '{token}' is not a valid value")]
    BadValue { field: &'static str, token: String },

    #[error("{field}: {value} is outside {min}..={max}")]
    OutOfRange { field: &'static str, value: u32, min: u32, max: u32 },

    #[error("{field}: range {start}-{end} runs backwards")]
    ReversedRange { field: &'static str, start: u32, end: u32 },

    #[error("{field}: step must be at least 1")]
    ZeroStep { field: &'static str },
}

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const WEEKDAYS: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

struct FieldDef {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
}

const FIELDS: [FieldDef; 5] = [
    FieldDef { name: "minute", min: 0, max: 59, names: &[] },
    FieldDef { name: "hour", min: 0, max: 23, names: &[] },
    FieldDef { name: "day-of-month", min: 1, max: 31, names: &[] },
    FieldDef { name: "month", min: 1, max: 12, names: &MONTHS },
    FieldDef { name: "day-of-week", min: 0, max: 7, names: &WEEKDAYS },
];

/// The set of values one field matches, as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSet {
    bits: u64,
    wildcard: bool,
}

impl FieldSet {
    fn contains(&self, value: u32) -> bool {
        self.bits & (1 << value) != 0
    }
}

/// A parsed cron schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    source: String,
    minute: FieldSet,
    hour: FieldSet,
    day_of_month: FieldSet,
    month: FieldSet,
    day_of_week: FieldSet,
}

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let tokens: Vec<&str> = expr.split_whitespace().collect();
        if tokens.len() != FIELDS.len() {
            return Err(CronError::FieldCount(tokens.len()));
        }

        let mut sets = [FieldSet { bits: 0, wildcard: false }; 5];
        for ((slot, token), def) in sets.iter_mut().zip(&tokens).zip(&FIELDS) {
            *slot = parse_field(token, def)?;
        }

        // Sunday may be written as 0 or 7.
        let mut day_of_week = sets[4];
        if day_of_week.contains(7) {
            day_of_week.bits = (day_of_week.bits | 1) & !(1 << 7);
        }

        Ok(Self {
            source: tokens.join(" "),
            minute: sets[0],
            hour: sets[1],
            day_of_month: sets[2],
            month: sets[3],
            day_of_week,
        })
    }

    /// Whether the schedule fires during the minute containing `at`.
    ///
    /// When both day fields are restricted a day matches if either does.
    pub fn matches(&self, at: &NaiveDateTime) -> bool {
        if !self.minute.contains(at.minute())
            || !self.hour.contains(at.hour())
            || !self.month.contains(at.month())
        {
            return false;
        }

        let dom = self.day_of_month.contains(at.day());
        let dow = self.day_of_week.contains(at.weekday().num_days_from_sunday());
        match (self.day_of_month.wildcard, self.day_of_week.wildcard) {
            (true, true) => true,
            (true, false) => dow,
            (false, true) => dom,
            (false, false) => dom || dow,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for CronSchedule {
    type Err = CronError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_field(token: &str, def: &FieldDef) -> Result<FieldSet, CronError> {
    let mut set = FieldSet { bits: 0, wildcard: token == "*" };
    for part in token.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step = step.parse::<u32>().map_err(|_| bad(def, part))?;
                if step == 0 {
                    return Err(CronError::ZeroStep { field: def.name });
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (start, end) = if range == "*" {
            (def.min, def.max)
        } else if let Some((a, b)) = range.split_once('-') {
            let (a, b) = (value(a, def)?, value(b, def)?);
            if a > b {
                return Err(CronError::ReversedRange { field: def.name, start: a, end: b });
            }
            (a, b)
        } else {
            let a = value(range, def)?;
            // `a/n` runs from `a` to the end of the field.
            (a, if step.is_some() { def.max } else { a })
        };

        for v in (start..=end).step_by(step.unwrap_or(1) as usize) {
            set.bits |= 1 << v;
        }
    }
    Ok(set)
}

fn value(token: &str, def: &FieldDef) -> Result<u32, CronError> {
    let upper = token.to_ascii_uppercase();
    let parsed = match def.names.iter().position(|n| *n == upper) {
        // Month names start at 1, weekday names at 0.
        Some(index) => index as u32 + def.min,
        None => token.parse::<u32>().map_err(|_| bad(def, token))?,
    };
    if parsed < def.min || parsed > def.max {
        return Err(CronError::OutOfRange {
            field: def.name,
            value: parsed,
            min: def.min,
            max: def.max,
        });
    }
    Ok(parsed)
}

fn bad(def: &FieldDef, token: &str) -> CronError {
    CronError::BadValue { field: def.name, token: token.to_string() }
}
