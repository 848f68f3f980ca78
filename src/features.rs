//! # Track Feature Records
//!
//! Raw audio features as supplied by an audio-feature provider, plus the
//! temporal attributes derived from when a track was played.
//!
//! A [`TrackFeatures`] value is never mutated after it is fetched. Every
//! feature is optional: a provider may not know a track at all, or may only
//! supply part of the feature set. Downstream code decides per computation
//! what an absent value means (see [`crate::composite`] and
//! [`crate::classifier`]).
//!
//! ## Feature Ranges
//!
//! - `danceability`, `energy`, `valence`, `acousticness`, `instrumentalness`,
//!   `speechiness`, `liveness`: `[0, 1]`
//! - `tempo`: beats per minute
//! - `loudness`: dB (usually negative)
//! - `key`: pitch class `0..=11` (providers send `-1` when no key was detected)
//! - `mode`: `0` (minor) or `1` (major)
//! - `time_signature`: `3..=7`
//!
//! The integer columns are read leniently: `1.0` reads as `1`, and negative,
//! fractional or out-of-range values read as absent. One odd value never
//! rejects the whole table.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Named raw feature column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFeature {
    Danceability,
    Energy,
    Valence,
    Acousticness,
    Instrumentalness,
    Speechiness,
    Tempo,
    Loudness,
    Liveness,
    Key,
    Mode,
    TimeSignature,
}

impl AudioFeature {
    pub const ALL: [AudioFeature; 12] = [
        AudioFeature::Danceability,
        AudioFeature::Energy,
        AudioFeature::Valence,
        AudioFeature::Acousticness,
        AudioFeature::Instrumentalness,
        AudioFeature::Speechiness,
        AudioFeature::Tempo,
        AudioFeature::Loudness,
        AudioFeature::Liveness,
        AudioFeature::Key,
        AudioFeature::Mode,
        AudioFeature::TimeSignature,
    ];

    /// Features every enrichment pass looks for when judging coverage.
    pub const CORE: [AudioFeature; 7] = [
        AudioFeature::Danceability,
        AudioFeature::Energy,
        AudioFeature::Valence,
        AudioFeature::Acousticness,
        AudioFeature::Instrumentalness,
        AudioFeature::Speechiness,
        AudioFeature::Tempo,
    ];

    /// Column name as it appears in serialized rows.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            AudioFeature::Danceability => "danceability",
            AudioFeature::Energy => "energy",
            AudioFeature::Valence => "valence",
            AudioFeature::Acousticness => "acousticness",
            AudioFeature::Instrumentalness => "instrumentalness",
            AudioFeature::Speechiness => "speechiness",
            AudioFeature::Tempo => "tempo",
            AudioFeature::Loudness => "loudness",
            AudioFeature::Liveness => "liveness",
            AudioFeature::Key => "key",
            AudioFeature::Mode => "mode",
            AudioFeature::TimeSignature => "time_signature",
        }
    }

    /// Whether the feature already lives on a `0..=1` scale.
    #[must_use]
    pub const fn is_normalized(self) -> bool {
        !matches!(
            self,
            AudioFeature::Tempo
                | AudioFeature::Loudness
                | AudioFeature::Key
                | AudioFeature::Mode
                | AudioFeature::TimeSignature
        )
    }
}

impl fmt::Display for AudioFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Filters a feature list down to the ones on a `0..=1` scale.
///
/// Useful for radar-style comparisons where tempo or loudness would dwarf
/// everything else.
#[must_use]
pub fn normalized_features(features: &[AudioFeature]) -> Vec<AudioFeature> {
    features.iter().copied().filter(|f| f.is_normalized()).collect()
}

/// Whole numbers in `0..=255` become `Some`; anything else is absent.
fn lenient_u8<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.and_then(whole_u8))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_u8(value: f64) -> Option<u8> {
    let whole = value.fract() == 0.0 && (0.0..=f64::from(u8::MAX)).contains(&value);
    whole.then(|| value as u8)
}

/// Genres as a list, or as one comma-separated string the way flat exports
/// write them.
fn genre_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Genres {
        List(Vec<String>),
        Joined(String),
    }

    let genres = match Option::<Genres>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Genres::List(list)) => list,
        Some(Genres::Joined(joined)) => joined.split(',').map(str::to_string).collect(),
    };
    Ok(genres
        .into_iter()
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .collect())
}

/// Raw audio features of one track. Any field may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackFeatures {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub danceability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acousticness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrumentalness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speechiness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loudness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness: Option<f64>,
    #[serde(default, deserialize_with = "lenient_u8", skip_serializing_if = "Option::is_none")]
    pub key: Option<u8>,
    #[serde(default, deserialize_with = "lenient_u8", skip_serializing_if = "Option::is_none")]
    pub mode: Option<u8>,
    #[serde(default, deserialize_with = "lenient_u8", skip_serializing_if = "Option::is_none")]
    pub time_signature: Option<u8>,
}

impl TrackFeatures {
    /// Value of a single feature column, if present.
    #[must_use]
    pub fn get(&self, feature: AudioFeature) -> Option<f64> {
        match feature {
            AudioFeature::Danceability => self.danceability,
            AudioFeature::Energy => self.energy,
            AudioFeature::Valence => self.valence,
            AudioFeature::Acousticness => self.acousticness,
            AudioFeature::Instrumentalness => self.instrumentalness,
            AudioFeature::Speechiness => self.speechiness,
            AudioFeature::Tempo => self.tempo,
            AudioFeature::Loudness => self.loudness,
            AudioFeature::Liveness => self.liveness,
            AudioFeature::Key => self.key.map(f64::from),
            AudioFeature::Mode => self.mode.map(f64::from),
            AudioFeature::TimeSignature => self.time_signature.map(f64::from),
        }
    }

    /// Values for all `required` features, or `None` if any is absent.
    #[must_use]
    pub fn require<const N: usize>(&self, required: [AudioFeature; N]) -> Option<[f64; N]> {
        let mut values = [0.0; N];
        for (slot, feature) in values.iter_mut().zip(required) {
            *slot = self.get(feature)?;
        }
        Some(values)
    }

    /// True when no feature at all is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        AudioFeature::ALL.iter().all(|&f| self.get(f).is_none())
    }

    /// True when at least one of the [`AudioFeature::CORE`] features is present.
    #[must_use]
    pub fn has_core(&self) -> bool {
        AudioFeature::CORE.iter().any(|&f| self.get(f).is_some())
    }

    /// Returns a copy where every absent field is taken from `fallback`.
    ///
    /// Values already present on `self` always win.
    #[must_use]
    pub fn filled_from(&self, fallback: &TrackFeatures) -> TrackFeatures {
        TrackFeatures {
            danceability: self.danceability.or(fallback.danceability),
            energy: self.energy.or(fallback.energy),
            valence: self.valence.or(fallback.valence),
            acousticness: self.acousticness.or(fallback.acousticness),
            instrumentalness: self.instrumentalness.or(fallback.instrumentalness),
            speechiness: self.speechiness.or(fallback.speechiness),
            tempo: self.tempo.or(fallback.tempo),
            loudness: self.loudness.or(fallback.loudness),
            liveness: self.liveness.or(fallback.liveness),
            key: self.key.or(fallback.key),
            mode: self.mode.or(fallback.mode),
            time_signature: self.time_signature.or(fallback.time_signature),
        }
    }
}

/// Coarse time-of-day bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimePeriod {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimePeriod {
    /// Periods in the order they occur through the day.
    pub const ALL: [TimePeriod; 4] = [
        TimePeriod::Morning,
        TimePeriod::Afternoon,
        TimePeriod::Evening,
        TimePeriod::Night,
    ];

    #[must_use]
    pub const fn from_hour(hour: u8) -> Self {
        match hour {
            6..=11 => TimePeriod::Morning,
            12..=17 => TimePeriod::Afternoon,
            18..=22 => TimePeriod::Evening,
            _ => TimePeriod::Night,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TimePeriod::Morning => "morning",
            TimePeriod::Afternoon => "afternoon",
            TimePeriod::Evening => "evening",
            TimePeriod::Night => "night",
        }
    }
}

/// When a track was played, reduced to what the classifier cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Temporal {
    /// Hour of day, `0..=23` (UTC).
    pub hour: u8,
    /// Saturday or Sunday.
    pub is_weekend: bool,
}

impl Temporal {
    #[must_use]
    pub const fn new(hour: u8, is_weekend: bool) -> Self {
        Self { hour, is_weekend }
    }

    #[must_use]
    pub fn from_timestamp(played_at: &DateTime<Utc>) -> Self {
        // hour() is always < 24
        let hour = u8::try_from(played_at.hour()).unwrap_or(0);
        let is_weekend = matches!(played_at.weekday(), Weekday::Sat | Weekday::Sun);
        Self { hour, is_weekend }
    }

    #[must_use]
    pub const fn period(&self) -> TimePeriod {
        TimePeriod::from_hour(self.hour)
    }
}

/// One row of an input table: a track identifier plus whatever is known
/// about it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackRow {
    pub track_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub played_at: Option<DateTime<Utc>>,
    /// Provider popularity, `0..=100`.
    #[serde(default, deserialize_with = "lenient_u8", skip_serializing_if = "Option::is_none")]
    pub popularity: Option<u8>,
    #[serde(default, deserialize_with = "genre_list", skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    #[serde(flatten)]
    pub features: TrackFeatures,
}

impl TrackRow {
    #[must_use]
    pub fn new(track_id: impl Into<String>) -> Self {
        Self {
            track_id: track_id.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_features(self, features: TrackFeatures) -> Self {
        Self { features, ..self }
    }

    #[must_use]
    pub fn with_artist(self, artist: impl Into<String>) -> Self {
        Self {
            artist_name: Some(artist.into()),
            ..self
        }
    }

    #[must_use]
    pub fn played_at(self, played_at: DateTime<Utc>) -> Self {
        Self {
            played_at: Some(played_at),
            ..self
        }
    }

    /// Temporal context, available only when the play time is known.
    #[must_use]
    pub fn temporal(&self) -> Option<Temporal> {
        self.played_at.as_ref().map(Temporal::from_timestamp)
    }
}
