//! Flat per-snapshot metrics.
//!
//! Produces a key → value map suitable for a one-row metrics table:
//! unique counts, artist diversity, audio-feature and composite averages,
//! and the share of each listening context. A snapshot adds a `top_<range>_*`
//! block (popularity, artists, energy, valence, genres) for its range.

use crate::classifier::context_distribution;
use crate::composite::CompositeFeature;
use crate::diversity::{column_diversity, CategoryColumn};
use crate::enrich::EnrichedTrack;
use crate::features::AudioFeature;
use crate::snapshot::{Snapshot, TimeRange};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Count(usize),
    Number(f64),
    Text(String),
}

impl MetricValue {
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            MetricValue::Count(n) => Some(*n as f64),
            MetricValue::Number(x) => Some(*x),
            MetricValue::Text(_) => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Count(n) => write!(f, "{n}"),
            MetricValue::Number(x) => write!(f, "{x:.3}"),
            MetricValue::Text(s) => f.write_str(s),
        }
    }
}

pub type MetricMap = BTreeMap<String, MetricValue>;

/// Features averaged into `recent_avg_<feature>`.
const AVERAGED_FEATURES: [AudioFeature; 9] = [
    AudioFeature::Danceability,
    AudioFeature::Energy,
    AudioFeature::Valence,
    AudioFeature::Acousticness,
    AudioFeature::Instrumentalness,
    AudioFeature::Speechiness,
    AudioFeature::Liveness,
    AudioFeature::Tempo,
    AudioFeature::Loudness,
];

/// Mean over present values only; `None` if no row has one.
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    #[allow(clippy::cast_precision_loss)]
    let avg = (count > 0).then(|| sum / count as f64);
    avg
}

fn unique<'a>(values: impl Iterator<Item = Option<&'a str>>) -> usize {
    values.flatten().collect::<HashSet<_>>().len()
}

/// Metrics over a set of enriched tracks.
///
/// Keys keep the `recent_` prefix whatever the tracks are, so a top-list
/// snapshot and a play history produce the same columns.
/// `recent_unique_tracks` counts distinct track names: rows that only carry
/// an id count towards nothing there.
#[must_use]
pub fn track_metrics(tracks: &[EnrichedTrack]) -> MetricMap {
    let mut metrics = MetricMap::new();
    if tracks.is_empty() {
        return metrics;
    }

    metrics.insert(
        "recent_unique_artists".into(),
        MetricValue::Count(unique(tracks.iter().map(|t| t.row.artist_name.as_deref()))),
    );
    metrics.insert(
        "recent_unique_tracks".into(),
        MetricValue::Count(unique(tracks.iter().map(|t| t.row.track_name.as_deref()))),
    );
    metrics.insert(
        "recent_artist_diversity".into(),
        MetricValue::Number(column_diversity(tracks, CategoryColumn::Artist)),
    );

    for feature in AVERAGED_FEATURES {
        if let Some(avg) = mean(tracks.iter().filter_map(|t| t.features().get(feature))) {
            metrics.insert(format!("recent_avg_{feature}"), MetricValue::Number(avg));
        }
    }

    for (composite, key) in [
        (CompositeFeature::MoodScore, "recent_avg_mood"),
        (CompositeFeature::Grooviness, "recent_avg_grooviness"),
    ] {
        if let Some(avg) = mean(tracks.iter().filter_map(|t| t.composites.get(composite))) {
            metrics.insert(key.into(), MetricValue::Number(avg));
        }
    }

    let labels: Vec<_> = tracks.iter().map(|t| t.context).collect();
    for line in context_distribution(&labels) {
        metrics.insert(format!("recent_pct_{}", line.context), MetricValue::Number(line.share));
    }

    metrics
}

/// The `top_<range>_*` block of a top list.
///
/// Averages skip tracks without the value and are left out entirely when no
/// track has one. `unique_genres` counts distinct genre names across tracks.
#[must_use]
pub fn top_list_metrics(tracks: &[EnrichedTrack], range: TimeRange) -> MetricMap {
    let mut metrics = MetricMap::new();
    if tracks.is_empty() {
        return metrics;
    }
    let key = |name: &str| format!("top_{range}_{name}");

    if let Some(avg) = mean(tracks.iter().filter_map(|t| t.row.popularity.map(f64::from))) {
        metrics.insert(key("avg_popularity"), MetricValue::Number(avg));
    }
    metrics.insert(
        key("unique_artists"),
        MetricValue::Count(unique(tracks.iter().map(|t| t.row.artist_name.as_deref()))),
    );
    for feature in [AudioFeature::Energy, AudioFeature::Valence] {
        if let Some(avg) = mean(tracks.iter().filter_map(|t| t.features().get(feature))) {
            metrics.insert(key(&format!("avg_{feature}")), MetricValue::Number(avg));
        }
    }
    let genres = tracks
        .iter()
        .flat_map(|t| t.row.genres.iter().map(|g| Some(g.as_str())));
    metrics.insert(key("unique_genres"), MetricValue::Count(unique(genres)));

    metrics
}

/// [`track_metrics`] and [`top_list_metrics`] plus the snapshot's identity.
#[must_use]
pub fn snapshot_metrics(snapshot: &Snapshot) -> MetricMap {
    let mut metrics = track_metrics(snapshot.tracks());
    metrics.extend(top_list_metrics(snapshot.tracks(), snapshot.range()));
    metrics.insert(
        "snapshot_timestamp".into(),
        MetricValue::Text(snapshot.taken_at().to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    metrics.insert("user_id".into(), MetricValue::Text(snapshot.user_id().to_string()));
    metrics
}
