//! # Enrichment Pipeline
//!
//! Turns raw input rows into [`EnrichedTrack`]s:
//!
//! 1. **Join**: fill absent features from a [`FeatureSource`] (left join by
//!    track id; unknown tracks keep all features absent)
//! 2. **Composite**: [`compute_composites`] over the joined batch
//! 3. **Classify**: one [`ListeningContext`] per row, in parallel
//!
//! The steps always run in this order because a classifier is allowed to
//! look at composite scores. Nothing here touches disk or network except the
//! explicit [`load_rows`] / [`write_enriched`] helpers.

use crate::classifier::{self, ClassifierInput, ContextClassifier, ContextShare, ListeningContext};
use crate::composite::{compute_composites, CompositeReport, CompositeScores};
use crate::features::{TrackFeatures, TrackRow};
use crate::source::{self, Coverage, FeatureSource};
use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Input row plus derived columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTrack {
    #[serde(flatten)]
    pub row: TrackRow,
    #[serde(flatten)]
    pub composites: CompositeScores,
    pub context: ListeningContext,
}

impl EnrichedTrack {
    #[must_use]
    pub fn track_id(&self) -> &str {
        &self.row.track_id
    }

    #[must_use]
    pub fn features(&self) -> &TrackFeatures {
        &self.row.features
    }
}

/// Result of one enrichment pass.
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    pub tracks: Vec<EnrichedTrack>,
    pub coverage: Coverage,
    pub report: CompositeReport,
    pub distribution: Vec<ContextShare>,
}

/// Left-joins rows with `source`. Features already on a row win.
#[must_use]
pub fn join_features(rows: Vec<TrackRow>, source: &dyn FeatureSource) -> Vec<TrackRow> {
    if !source.is_available() {
        return rows;
    }

    rows.into_iter()
        .map(|row| match source.lookup(&row.track_id) {
            Some(found) => {
                let features = row.features.filled_from(&found);
                TrackRow { features, ..row }
            }
            None => row,
        })
        .collect()
}

/// Runs join, composite calculation and classification over a batch.
#[must_use]
pub fn enrich_rows(rows: Vec<TrackRow>, source: &dyn FeatureSource, classifier: &dyn ContextClassifier) -> Enrichment {
    if rows.is_empty() {
        debug!("Nothing to enrich");
        return Enrichment::default();
    }

    let rows = join_features(rows, source);
    let coverage = source::coverage(&rows);
    info!(
        "Audio features: {} of {} tracks ({:.1}%), {} without",
        coverage.with_features,
        coverage.total,
        coverage.pct,
        coverage.without_features()
    );

    let features: Vec<TrackFeatures> = rows.iter().map(|row| row.features).collect();
    let composite = compute_composites(&features);

    let inputs: Vec<ClassifierInput<'_>> = rows
        .iter()
        .zip(&composite.scores)
        .map(|(row, composites)| ClassifierInput {
            features: &row.features,
            composites,
            temporal: row.temporal(),
        })
        .collect();
    debug!("Classifying {} tracks with {} rules", inputs.len(), classifier.name());
    let labels = classifier::classify_batch(classifier, &inputs);
    let distribution = classifier::context_distribution(&labels);

    let tracks = rows
        .into_iter()
        .zip(composite.scores)
        .zip(labels)
        .map(|((row, composites), context)| EnrichedTrack { row, composites, context })
        .collect();

    Enrichment {
        tracks,
        coverage,
        report: composite.report,
        distribution,
    }
}

/// Reads a JSON array of [`TrackRow`]s.
pub fn load_rows(path: &Path) -> Result<Vec<TrackRow>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read track rows: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid track rows in {}", path.display()))
}

/// Reads a JSON array of [`EnrichedTrack`]s, as written by [`write_enriched`].
pub fn load_enriched(path: &Path) -> Result<Vec<EnrichedTrack>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read enriched tracks: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid enriched tracks in {}", path.display()))
}

pub fn write_enriched(path: &Path, tracks: &[EnrichedTrack]) -> Result<()> {
    let json = serde_json::to_string_pretty(tracks).context("Failed to serialize enriched tracks")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}
