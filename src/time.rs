use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

use crate::model::Error;

/// Model time axis: `start` to `end` inclusive at a fixed step.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTime {
    start: NaiveDateTime,
    end: NaiveDateTime,
    step: TimeDelta,
    n_timesteps: usize,
}

impl ModelTime {
    pub fn new(
        start: NaiveDateTime,
        end: NaiveDateTime,
        step: TimeDelta,
    ) -> Result<Self, Error> {
        if step <= TimeDelta::zero() {
            return Err(Error::MalformedTimeAxis(format!(
                "time step must be positive (got {})",
                step
            )));
        }
        if end < start {
            return Err(Error::MalformedTimeAxis(format!(
                "end time {} is before start time {}",
                end, start
            )));
        }
        let span = (end - start).num_seconds();
        let step_seconds = step.num_seconds();
        if step_seconds == 0 || span % step_seconds != 0 {
            return Err(Error::MalformedTimeAxis(format!(
                "span from {} to {} is not a multiple of the time step {}",
                start, end, step
            )));
        }
        Ok(ModelTime {
            start,
            end,
            step,
            n_timesteps: (span / step_seconds) as usize + 1,
        })
    }

    /// Daily axis between two timestamps.
    pub fn daily(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, Error> {
        Self::new(start, end, TimeDelta::days(1))
    }

    pub fn daily_from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self, Error> {
        Self::daily(start.and_time(NaiveTime::MIN), end.and_time(NaiveTime::MIN))
    }

    /// Parse `YYYY-MM-DD` or `YYYY-MM-DDTHH:MM:SS` bounds of a daily axis.
    pub fn parse_daily(start: &str, end: &str) -> Result<Self, Error> {
        Self::daily(parse_timestamp(start)?, parse_timestamp(end)?)
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn step(&self) -> TimeDelta {
        self.step
    }

    pub fn len(&self) -> usize {
        self.n_timesteps
    }

    pub fn is_empty(&self) -> bool {
        self.n_timesteps == 0
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        (0..self.n_timesteps)
            .map(|i| self.start + self.step * i as i32)
            .collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.timestamps().iter().map(|t| t.date()).collect()
    }

    pub fn day_of_year(&self) -> Vec<u32> {
        self.timestamps().iter().map(|t| t.ordinal()).collect()
    }
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, Error> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| {
            Error::MalformedTimeAxis(format!("cannot parse timestamp '{}'", s))
        })
}

/// Calendars whose dates chrono represents exactly.
const GREGORIAN_CALENDARS: [&str; 3] = ["standard", "gregorian", "proleptic_gregorian"];

/// Split CF time `units` such as `hours since 1900-01-01 00:00:00.0` into
/// the length of one unit in seconds and the reference timestamp.
pub fn parse_cf_time_units(units: &str) -> Result<(f64, NaiveDateTime), Error> {
    let malformed = || Error::MalformedTimeAxis(format!("unsupported time units '{}'", units));
    let (unit, reference) = units.split_once(" since ").ok_or_else(malformed)?;
    let seconds = match unit.trim().to_lowercase().as_str() {
        "days" | "day" | "d" => 86400.0,
        "hours" | "hour" | "hrs" | "hr" | "h" => 3600.0,
        "minutes" | "minute" | "mins" | "min" => 60.0,
        "seconds" | "second" | "secs" | "sec" | "s" => 1.0,
        _ => return Err(malformed()),
    };
    let reference = reference
        .trim()
        .trim_end_matches("UTC")
        .trim_end_matches('Z')
        .trim();
    if let Ok(date) = NaiveDate::parse_from_str(reference, "%Y-%m-%d") {
        return Ok((seconds, date.and_time(NaiveTime::MIN)));
    }
    let base = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(reference, fmt).ok())
    .ok_or_else(malformed)?;
    Ok((seconds, base))
}

/// Dates of a CF time coordinate given as numeric offsets.
pub fn cf_offsets_to_dates(
    offsets: &[f64],
    units: &str,
    calendar: Option<&str>,
) -> Result<Vec<NaiveDate>, Error> {
    if let Some(calendar) = calendar {
        if !GREGORIAN_CALENDARS.contains(&calendar.trim().to_lowercase().as_str()) {
            return Err(Error::MalformedTimeAxis(format!(
                "calendar '{}' is not supported, expected one of {}",
                calendar,
                GREGORIAN_CALENDARS.join(", ")
            )));
        }
    }
    let (unit_seconds, base) = parse_cf_time_units(units)?;
    offsets
        .iter()
        .map(|&offset| {
            let millis = offset * unit_seconds * 1000.0;
            if !millis.is_finite() {
                return Err(Error::MalformedTimeAxis(format!(
                    "invalid time offset {}",
                    offset
                )));
            }
            base.checked_add_signed(TimeDelta::milliseconds(millis.round() as i64))
                .map(|t| t.date())
                .ok_or_else(|| {
                    Error::MalformedTimeAxis(format!("time offset {} is out of range", offset))
                })
        })
        .collect()
}
