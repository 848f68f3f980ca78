//! Listening patterns over time.
//!
//! Play counts per hour of day (`0..=23`), per weekday (Monday first) and per
//! [`TimePeriod`]. Every bucket is always present, with zero plays if nothing
//! fell into it. Rows without a `played_at` timestamp are counted separately
//! as undated and never land in a bucket.

use crate::features::{Temporal, TimePeriod, TrackRow};
use chrono::{DateTime, Datelike, Utc, Weekday};
use log::debug;
use serde::Serialize;

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

const fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourCount {
    pub hour: u8,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeekdayCount {
    pub day: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodCount {
    pub period: TimePeriod,
    pub count: usize,
}

fn timestamps(rows: &[TrackRow]) -> impl Iterator<Item = &DateTime<Utc>> {
    rows.iter().filter_map(|row| row.played_at.as_ref())
}

/// Plays per hour of day, 24 entries in hour order.
#[must_use]
pub fn by_hour(rows: &[TrackRow]) -> Vec<HourCount> {
    let mut counts = [0usize; 24];
    for played_at in timestamps(rows) {
        counts[usize::from(Temporal::from_timestamp(played_at).hour)] += 1;
    }

    (0u8..24)
        .zip(counts)
        .map(|(hour, count)| HourCount { hour, count })
        .collect()
}

/// Plays per weekday, Monday through Sunday.
#[must_use]
pub fn by_weekday(rows: &[TrackRow]) -> Vec<WeekdayCount> {
    let mut counts = [0usize; 7];
    for played_at in timestamps(rows) {
        counts[played_at.weekday().num_days_from_monday() as usize] += 1;
    }

    WEEK.iter()
        .zip(counts)
        .map(|(&day, count)| WeekdayCount {
            day: day_name(day),
            count,
        })
        .collect()
}

/// Plays per time-of-day period, in [`TimePeriod::ALL`] order.
#[must_use]
pub fn by_period(rows: &[TrackRow]) -> Vec<PeriodCount> {
    TimePeriod::ALL
        .iter()
        .map(|&period| PeriodCount {
            period,
            count: rows
                .iter()
                .filter_map(TrackRow::temporal)
                .filter(|temporal| temporal.period() == period)
                .count(),
        })
        .collect()
}

/// All three aggregations of one listening history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListeningPatterns {
    pub by_hour: Vec<HourCount>,
    pub by_weekday: Vec<WeekdayCount>,
    pub by_period: Vec<PeriodCount>,
    /// Rows without a play timestamp.
    pub undated: usize,
}

impl ListeningPatterns {
    /// Busiest hour; the earliest one on a tie, `None` with no dated plays.
    #[must_use]
    pub fn peak_hour(&self) -> Option<u8> {
        self.by_hour
            .iter()
            .filter(|h| h.count > 0)
            .fold(None, |best: Option<&HourCount>, h| match best {
                Some(b) if b.count >= h.count => Some(b),
                _ => Some(h),
            })
            .map(|h| h.hour)
    }
}

#[must_use]
pub fn listening_patterns(rows: &[TrackRow]) -> ListeningPatterns {
    let undated = rows.iter().filter(|row| row.played_at.is_none()).count();
    debug!("Aggregating {} plays ({undated} undated)", rows.len());

    ListeningPatterns {
        by_hour: by_hour(rows),
        by_weekday: by_weekday(rows),
        by_period: by_period(rows),
        undated,
    }
}
