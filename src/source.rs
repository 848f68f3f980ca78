//! Audio-feature providers.
//!
//! A [`FeatureSource`] answers "what are the audio features of this track?"
//! or says it does not know. The source is an optional capability: when no
//! reference table is configured (or it cannot be loaded) the session gets a
//! [`NullFeatureSource`] once at startup, and enrichment simply proceeds with
//! whatever features the input rows already carry.

use crate::features::{TrackFeatures, TrackRow};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Supplies raw audio features by track identifier.
pub trait FeatureSource: Send + Sync {
    fn name(&self) -> &str;

    /// Features for `track_id`, or `None` when the track is unknown.
    fn lookup(&self, track_id: &str) -> Option<TrackFeatures>;

    /// Whether this source can ever return anything.
    fn is_available(&self) -> bool {
        true
    }
}

/// Source that knows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFeatureSource;

impl FeatureSource for NullFeatureSource {
    fn name(&self) -> &str {
        "none"
    }

    fn lookup(&self, _track_id: &str) -> Option<TrackFeatures> {
        None
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Static reference table keyed by track id, e.g. a public audio-features
/// dataset exported to JSON.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    name: String,
    rows: HashMap<String, TrackFeatures>,
}

impl ReferenceTable {
    /// Builds a table from rows. Later duplicates of an id are ignored, and
    /// so are rows that carry no feature at all.
    pub fn from_rows(name: impl Into<String>, rows: impl IntoIterator<Item = TrackRow>) -> Self {
        let mut table = HashMap::new();
        let mut duplicates = 0usize;
        let mut featureless = 0usize;
        for row in rows {
            if row.features.is_empty() {
                featureless += 1;
                continue;
            }
            if table.contains_key(&row.track_id) {
                duplicates += 1;
                continue;
            }
            table.insert(row.track_id, row.features);
        }
        if duplicates > 0 {
            debug!("Ignored {duplicates} duplicate track id(s) in reference table");
        }
        if featureless > 0 {
            debug!("Ignored {featureless} reference row(s) without features");
        }

        Self {
            name: name.into(),
            rows: table,
        }
    }

    /// Loads a JSON array of rows (`track_id` plus feature columns).
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read reference features: {}", path.display()))?;
        let rows: Vec<TrackRow> = serde_json::from_str(&content)
            .with_context(|| format!("Invalid reference feature table: {}", path.display()))?;

        let table = Self::from_rows(path.display().to_string(), rows);
        info!("Loaded reference dataset: {} tracks with audio features", table.len());
        Ok(table)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl FeatureSource for ReferenceTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, track_id: &str) -> Option<TrackFeatures> {
        self.rows.get(track_id).copied()
    }

    fn is_available(&self) -> bool {
        !self.rows.is_empty()
    }
}

/// Picks the feature source for a session.
///
/// A missing or unreadable table is not an error: it degrades to
/// [`NullFeatureSource`] with a warning.
#[must_use]
pub fn resolve_feature_source(reference: Option<&Path>) -> Box<dyn FeatureSource> {
    let Some(path) = reference else {
        debug!("No reference feature table configured");
        return Box::new(NullFeatureSource);
    };

    match ReferenceTable::load(path) {
        Ok(table) if !table.is_empty() => Box::new(table),
        Ok(_) => {
            warn!("Reference feature table {} is empty; proceeding without audio features", path.display());
            Box::new(NullFeatureSource)
        }
        Err(e) => {
            warn!("Reference feature table unavailable ({e:#}); proceeding without audio features");
            Box::new(NullFeatureSource)
        }
    }
}

/// How many rows carry audio features.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Coverage {
    pub total: usize,
    pub with_features: usize,
    /// Percentage, `0..=100`. `0` for an empty table.
    pub pct: f64,
}

impl Coverage {
    #[must_use]
    pub fn without_features(&self) -> usize {
        self.total - self.with_features
    }
}

/// Coverage over rows; a row counts when it has any core feature.
#[must_use]
pub fn coverage(rows: &[TrackRow]) -> Coverage {
    let total = rows.len();
    let with_features = rows.iter().filter(|row| row.features.has_core()).count();
    #[allow(clippy::cast_precision_loss)]
    let pct = if total == 0 {
        0.0
    } else {
        with_features as f64 / total as f64 * 100.0
    };

    Coverage { total, with_features, pct }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn row(id: &str, energy: f64) -> TrackRow {
        TrackRow::new(id).with_features(TrackFeatures {
            energy: Some(energy),
            ..Default::default()
        })
    }

    #[test]
    fn test_reference_lookup() {
        let table = ReferenceTable::from_rows("test", vec![row("a", 0.1), row("b", 0.2)]);

        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup("b").and_then(|f| f.energy), Some(0.2));
        assert!(table.lookup("missing").is_none());
        assert!(table.is_available());
    }

    #[test]
    fn test_reference_first_duplicate_wins() {
        let table = ReferenceTable::from_rows("dup", vec![row("a", 0.1), row("a", 0.9)]);

        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup("a").and_then(|f| f.energy), Some(0.1));
    }

    #[test]
    fn test_reference_skips_featureless_rows() {
        let table = ReferenceTable::from_rows("sparse", vec![TrackRow::new("a"), row("a", 0.7), TrackRow::new("b")]);

        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup("a").and_then(|f| f.energy), Some(0.7), "an empty row does not shadow a later one");
        assert!(table.lookup("b").is_none());
    }

    #[test]
    fn test_null_source() {
        let source = NullFeatureSource;
        assert!(!source.is_available());
        assert!(source.lookup("anything").is_none());
    }

    #[test]
    fn test_resolve_missing_file_falls_back() {
        let source = resolve_feature_source(Some(Path::new("/definitely/not/here.json")));
        assert!(!source.is_available());
        assert_eq!(source.name(), "none");

        let source = resolve_feature_source(None);
        assert!(!source.is_available());
    }

    #[test]
    fn test_resolve_loads_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"track_id": "x", "energy": 0.4, "tempo": 100}}]"#).unwrap();

        let source = resolve_feature_source(Some(file.path()));
        assert!(source.is_available());
        assert_eq!(source.lookup("x").and_then(|f| f.tempo), Some(100.0));
    }

    #[test]
    fn test_reference_load_tolerates_undetected_key() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(
            file,
            r#"[
                {{"track_id": "a", "energy": 0.9, "key": -1}},
                {{"track_id": "b", "energy": 0.3, "key": 5, "mode": 1.0}}
            ]"#
        )?;

        let table = ReferenceTable::load(file.path())?;
        assert_eq!(table.len(), 2, "no row is dropped");
        assert_eq!(table.lookup("a").and_then(|f| f.energy), Some(0.9));
        assert!(table.lookup("a").and_then(|f| f.key).is_none());
        assert_eq!(table.lookup("b").and_then(|f| f.mode), Some(1));

        let source = resolve_feature_source(Some(file.path()));
        assert!(source.is_available(), "the table is kept, not replaced by the null source");
        Ok(())
    }

    #[test]
    fn test_coverage() {
        let rows = vec![row("a", 0.5), TrackRow::new("b"), row("c", 0.1), TrackRow::new("d")];
        let cov = coverage(&rows);

        assert_eq!(cov.total, 4);
        assert_eq!(cov.with_features, 2);
        assert_eq!(cov.without_features(), 2);
        assert!((cov.pct - 50.0).abs() < 1e-12);

        assert_eq!(coverage(&[]).pct, 0.0);
    }
}
