//! # Snapshots
//!
//! A [`Snapshot`] is an immutable, timestamped capture of one user's
//! enriched top tracks for one [`TimeRange`]. Every sync produces a new
//! snapshot; old ones are kept for history and never edited in place, so
//! the fields are private and only readable.

use crate::enrich::EnrichedTrack;
use anyhow::anyhow;
use chrono::{DateTime, SubsecRound, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Time-range bucket of a top list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    /// Roughly the last four weeks.
    Short,
    /// Roughly the last six months.
    Medium,
    /// All time.
    Long,
}

impl TimeRange {
    pub const ALL: [TimeRange; 3] = [TimeRange::Short, TimeRange::Medium, TimeRange::Long];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TimeRange::Short => "short",
            TimeRange::Medium => "medium",
            TimeRange::Long => "long",
        }
    }

    /// The streaming API's name for this range.
    #[must_use]
    pub const fn api_term(self) -> &'static str {
        match self {
            TimeRange::Short => "short_term",
            TimeRange::Medium => "medium_term",
            TimeRange::Long => "long_term",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeRange::ALL
            .into_iter()
            .find(|range| range.as_str() == s || range.api_term() == s)
            .ok_or_else(|| anyhow!("Unknown time range: {s}. Use short, medium or long"))
    }
}

/// What identifies a stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotKey {
    pub user_id: String,
    pub range: TimeRange,
    pub taken_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    user_id: String,
    range: TimeRange,
    taken_at: DateTime<Utc>,
    tracks: Vec<EnrichedTrack>,
}

impl Snapshot {
    /// Timestamps are kept at microsecond precision so they survive storage
    /// unchanged.
    #[must_use]
    pub fn new(user_id: impl Into<String>, range: TimeRange, taken_at: DateTime<Utc>, tracks: Vec<EnrichedTrack>) -> Self {
        Self {
            user_id: user_id.into(),
            range,
            taken_at: taken_at.trunc_subsecs(6),
            tracks,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub fn range(&self) -> TimeRange {
        self.range
    }

    #[must_use]
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    #[must_use]
    pub fn tracks(&self) -> &[EnrichedTrack] {
        &self.tracks
    }

    #[must_use]
    pub fn key(&self) -> SnapshotKey {
        SnapshotKey {
            user_id: self.user_id.clone(),
            range: self.range,
            taken_at: self.taken_at,
        }
    }

    /// Track ids in rank order.
    #[must_use]
    pub fn track_ids(&self) -> Vec<&str> {
        self.tracks.iter().map(EnrichedTrack::track_id).collect()
    }

    #[must_use]
    pub fn freshness(&self, now: DateTime<Utc>) -> Freshness {
        Freshness::since(self.taken_at, now)
    }
}

/// How long ago a snapshot was synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Freshness {
    /// Under 12 hours.
    Fresh { hours: i64 },
    /// 12 to 24 hours.
    Recent { hours: i64 },
    /// A day or more.
    Stale { days: i64 },
}

impl Freshness {
    #[must_use]
    pub fn since(taken_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let hours = (now - taken_at).num_hours().max(0);
        match hours {
            h if h < 12 => Freshness::Fresh { hours: h },
            h if h < 24 => Freshness::Recent { hours: h },
            h => Freshness::Stale { days: h / 24 },
        }
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Freshness::Fresh { hours: 0 } => write!(f, "Fresh (synced < 1 hour ago)"),
            Freshness::Fresh { hours } => write!(f, "Fresh (synced {hours} hours ago)"),
            Freshness::Recent { hours } => write!(f, "Recent (synced {hours} hours ago)"),
            Freshness::Stale { days: 1 } => write!(f, "Stale (synced 1 day ago)"),
            Freshness::Stale { days } => write!(f, "Stale (synced {days} days ago)"),
        }
    }
}
