//! # Composite Feature Calculator
//!
//! Derives four higher-level descriptors from raw audio features:
//!
//! ```text
//! mood_score       = 0.5·valence + 0.3·energy + 0.2·(1 − acousticness)
//! grooviness       = 0.4·danceability + 0.3·energy + 0.3·tempo_norm
//! focus_score      = 0.4·(1 − speechiness) + 0.3·instrumentalness + 0.3·(1 − 2·|energy − 0.5|)
//! relaxation_score = 0.4·(1 − energy) + 0.3·acousticness + 0.3·(1 − tempo_norm)
//! ```
//!
//! `tempo_norm` is min-max normalized over the batch being processed, so the
//! same track can score differently depending on its batch mates. When every
//! tempo in the batch is identical the normalized tempo is `0` for all rows.
//!
//! A score is only computed for rows where all of its inputs are present.
//! Otherwise it stays `None`, so aggregates are never biased by silent zeros.
//! A composite whose input column is absent from the whole batch is skipped
//! and reported in [`CompositeReport`].

use crate::features::{AudioFeature, TrackFeatures};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four derived scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeFeature {
    MoodScore,
    Grooviness,
    FocusScore,
    RelaxationScore,
}

impl CompositeFeature {
    pub const ALL: [CompositeFeature; 4] = [
        CompositeFeature::MoodScore,
        CompositeFeature::Grooviness,
        CompositeFeature::FocusScore,
        CompositeFeature::RelaxationScore,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            CompositeFeature::MoodScore => "mood_score",
            CompositeFeature::Grooviness => "grooviness",
            CompositeFeature::FocusScore => "focus_score",
            CompositeFeature::RelaxationScore => "relaxation_score",
        }
    }

    /// Raw columns that must be present for this score.
    #[must_use]
    pub const fn required_inputs(self) -> [AudioFeature; 3] {
        match self {
            CompositeFeature::MoodScore => [AudioFeature::Valence, AudioFeature::Energy, AudioFeature::Acousticness],
            CompositeFeature::Grooviness => [AudioFeature::Danceability, AudioFeature::Energy, AudioFeature::Tempo],
            CompositeFeature::FocusScore => [AudioFeature::Speechiness, AudioFeature::Energy, AudioFeature::Instrumentalness],
            CompositeFeature::RelaxationScore => [AudioFeature::Energy, AudioFeature::Acousticness, AudioFeature::Tempo],
        }
    }
}

impl fmt::Display for CompositeFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Derived scores for one row. `None` means "not computable for this row".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeScores {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grooviness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relaxation_score: Option<f64>,
}

impl CompositeScores {
    #[must_use]
    pub fn get(&self, feature: CompositeFeature) -> Option<f64> {
        match feature {
            CompositeFeature::MoodScore => self.mood_score,
            CompositeFeature::Grooviness => self.grooviness,
            CompositeFeature::FocusScore => self.focus_score,
            CompositeFeature::RelaxationScore => self.relaxation_score,
        }
    }
}

/// A composite left out of a batch, and the columns that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedComposite {
    pub feature: CompositeFeature,
    pub missing: Vec<AudioFeature>,
}

/// Diagnostics from one calculator pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompositeReport {
    pub created: Vec<CompositeFeature>,
    pub skipped: Vec<SkippedComposite>,
    /// Every tempo in the batch was equal, so `tempo_norm` fell back to 0.
    pub flat_tempo: bool,
}

impl CompositeReport {
    #[must_use]
    pub fn was_created(&self, feature: CompositeFeature) -> bool {
        self.created.contains(&feature)
    }
}

/// Output of [`compute_composites`]: one score row per input row, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeBatch {
    pub scores: Vec<CompositeScores>,
    pub report: CompositeReport,
}

/// Observed tempo range of a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoRange {
    pub min: f64,
    pub max: f64,
}

impl TempoRange {
    /// Range over the tempos present in the batch; `None` if there are none.
    pub fn from_batch<'a>(batch: impl IntoIterator<Item = &'a TrackFeatures>) -> Option<Self> {
        batch
            .into_iter()
            .filter_map(|row| row.tempo)
            .fold(None, |range, tempo| match range {
                None => Some(TempoRange { min: tempo, max: tempo }),
                Some(TempoRange { min, max }) => Some(TempoRange {
                    min: min.min(tempo),
                    max: max.max(tempo),
                }),
            })
    }

    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.max == self.min
    }

    /// Min-max normalized tempo, `0` for a zero-width range.
    #[must_use]
    pub fn normalize(&self, tempo: f64) -> f64 {
        if self.is_flat() {
            0.0
        } else {
            (tempo - self.min) / (self.max - self.min)
        }
    }
}

#[must_use]
pub fn mood_score(valence: f64, energy: f64, acousticness: f64) -> f64 {
    0.5 * valence + 0.3 * energy + 0.2 * (1.0 - acousticness)
}

#[must_use]
pub fn grooviness(danceability: f64, energy: f64, tempo_normalized: f64) -> f64 {
    0.4 * danceability + 0.3 * energy + 0.3 * tempo_normalized
}

#[must_use]
pub fn focus_score(speechiness: f64, energy: f64, instrumentalness: f64) -> f64 {
    0.4 * (1.0 - speechiness) + 0.3 * instrumentalness + 0.3 * (1.0 - (energy - 0.5).abs() * 2.0)
}

#[must_use]
pub fn relaxation_score(energy: f64, acousticness: f64, tempo_normalized: f64) -> f64 {
    0.4 * (1.0 - energy) + 0.3 * acousticness + 0.3 * (1.0 - tempo_normalized)
}

/// Computes all four composites over a batch.
///
/// Never fails. Rows missing an input get `None` for the affected score;
/// composites whose input column is absent from every row are skipped with
/// a warning.
#[must_use]
pub fn compute_composites(batch: &[TrackFeatures]) -> CompositeBatch {
    if batch.is_empty() {
        debug!("Composite calculation skipped for empty batch");
        return CompositeBatch::default();
    }

    let column_present = |feature: AudioFeature| batch.iter().any(|row| row.get(feature).is_some());

    let mut report = CompositeReport::default();
    let mut enabled = [false; 4];
    for (slot, composite) in enabled.iter_mut().zip(CompositeFeature::ALL) {
        let missing: Vec<AudioFeature> = composite
            .required_inputs()
            .into_iter()
            .filter(|&f| !column_present(f))
            .collect();

        if missing.is_empty() {
            *slot = true;
            report.created.push(composite);
        } else {
            warn!(
                "Skipping {composite}: column(s) {} absent from batch",
                missing.iter().map(|f| f.name()).collect::<Vec<_>>().join(", ")
            );
            report.skipped.push(SkippedComposite { feature: composite, missing });
        }
    }
    let [mood_on, groove_on, focus_on, relax_on] = enabled;

    let tempo_range = TempoRange::from_batch(batch);
    if let Some(range) = tempo_range.filter(TempoRange::is_flat) {
        debug!("All tempos equal ({:.1} BPM); normalized tempo falls back to 0", range.min);
        report.flat_tempo = true;
    }
    let tempo_norm = |row: &TrackFeatures| -> Option<f64> {
        let range = tempo_range?;
        row.tempo.map(|tempo| range.normalize(tempo))
    };

    let scores = batch
        .iter()
        .map(|row| CompositeScores {
            mood_score: mood_on
                .then(|| row.require(CompositeFeature::MoodScore.required_inputs()))
                .flatten()
                .map(|[valence, energy, acousticness]| mood_score(valence, energy, acousticness)),
            grooviness: groove_on
                .then(|| Some((row.danceability?, row.energy?, tempo_norm(row)?)))
                .flatten()
                .map(|(danceability, energy, tempo)| grooviness(danceability, energy, tempo)),
            focus_score: focus_on
                .then(|| row.require(CompositeFeature::FocusScore.required_inputs()))
                .flatten()
                .map(|[speechiness, energy, instrumentalness]| focus_score(speechiness, energy, instrumentalness)),
            relaxation_score: relax_on
                .then(|| Some((row.energy?, row.acousticness?, tempo_norm(row)?)))
                .flatten()
                .map(|(energy, acousticness, tempo)| relaxation_score(energy, acousticness, tempo)),
        })
        .collect();

    if report.created.is_empty() {
        warn!("No composite features created (missing required audio features)");
    } else {
        info!(
            "Created {} composite feature(s): {}",
            report.created.len(),
            report.created.iter().map(|f| f.name()).collect::<Vec<_>>().join(", ")
        );
    }

    CompositeBatch { scores, report }
}
