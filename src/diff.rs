//! # Snapshot Differencer
//!
//! Compares point-in-time top lists of track (or artist) ids.
//!
//! - [`taste_consistency`]: overlap of two lists and a consistency label
//! - [`evolution`]: pairwise and triple overlaps across short/medium/long
//! - [`ranking_drift`]: per-id rank movement between two ranked lists
//!
//! Overlaps are set operations over distinct ids, so duplicates and order do
//! not matter there. Ranking drift does care about order: an id's rank is the
//! position of its first occurrence, starting at 1.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::features::TrackRow;

const CONSISTENCY_ABOVE_PCT: f64 = 60.0;
const BALANCED_FROM_PCT: f64 = 30.0;

/// How taste consistency is labeled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Tiering {
    /// Consistency (> 60%) or Explorer.
    #[default]
    Two,
    /// Adds a Balanced Explorer band for 30–60%.
    Three,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsistencyLabel {
    #[serde(rename = "Musical Consistency")]
    MusicalConsistency,
    #[serde(rename = "Balanced Explorer")]
    BalancedExplorer,
    #[serde(rename = "Musical Explorer")]
    MusicalExplorer,
}

impl ConsistencyLabel {
    #[must_use]
    pub fn from_pct(overlap_pct: f64, tiering: Tiering) -> Self {
        if overlap_pct > CONSISTENCY_ABOVE_PCT {
            ConsistencyLabel::MusicalConsistency
        } else if tiering == Tiering::Three && overlap_pct >= BALANCED_FROM_PCT {
            ConsistencyLabel::BalancedExplorer
        } else {
            ConsistencyLabel::MusicalExplorer
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ConsistencyLabel::MusicalConsistency => "Musical Consistency",
            ConsistencyLabel::BalancedExplorer => "Balanced Explorer",
            ConsistencyLabel::MusicalExplorer => "Musical Explorer",
        }
    }
}

impl fmt::Display for ConsistencyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TasteConsistency {
    /// `|A ∩ B|`
    pub overlap: usize,
    /// `overlap / |A| × 100`, `0` when `A` is empty.
    pub overlap_pct: f64,
    pub label: ConsistencyLabel,
}

fn distinct<S: AsRef<str>>(ids: &[S]) -> HashSet<&str> {
    ids.iter().map(AsRef::as_ref).collect()
}

/// Size of the intersection of two id lists.
#[must_use]
pub fn overlap<S: AsRef<str>>(a: &[S], b: &[S]) -> usize {
    let b = distinct(b);
    distinct(a).intersection(&b).count()
}

/// Overlap of `current` (A) against `reference` (B), as a percentage of A.
#[must_use]
pub fn taste_consistency<S: AsRef<str>>(current: &[S], reference: &[S], tiering: Tiering) -> TasteConsistency {
    let a = distinct(current);
    let b = distinct(reference);
    let overlap = a.intersection(&b).count();

    #[allow(clippy::cast_precision_loss)]
    let overlap_pct = if a.is_empty() {
        0.0
    } else {
        overlap as f64 / a.len() as f64 * 100.0
    };

    TasteConsistency {
        overlap,
        overlap_pct,
        label: ConsistencyLabel::from_pct(overlap_pct, tiering),
    }
}

/// Overlaps across the three time ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Evolution {
    pub short_medium: usize,
    pub short_long: usize,
    pub medium_long: usize,
    pub all_three: usize,
    /// Ids present in all three lists, sorted.
    pub core: Vec<String>,
}

#[must_use]
pub fn evolution<S: AsRef<str>>(short: &[S], medium: &[S], long: &[S]) -> Evolution {
    let short = distinct(short);
    let medium = distinct(medium);
    let long = distinct(long);

    let mut core: Vec<String> = short
        .iter()
        .filter(|id| medium.contains(*id) && long.contains(*id))
        .map(|id| (*id).to_string())
        .collect();
    core.sort_unstable();

    Evolution {
        short_medium: short.intersection(&medium).count(),
        short_long: short.intersection(&long).count(),
        medium_long: medium.intersection(&long).count(),
        all_three: core.len(),
        core,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankChange {
    pub id: String,
    pub previous_rank: usize,
    pub current_rank: usize,
    /// `previous_rank - current_rank`; positive means the id climbed.
    pub delta: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RankingDrift {
    /// Ids in both lists, in current-rank order.
    pub moved: Vec<RankChange>,
    /// New in the current list, in current-rank order.
    pub entered: Vec<String>,
    /// Gone from the current list, in previous-rank order.
    pub dropped: Vec<String>,
}

impl RankingDrift {
    /// Mean absolute rank change over shared ids, `0` when none are shared.
    #[must_use]
    pub fn mean_abs_delta(&self) -> f64 {
        if self.moved.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let total = self.moved.iter().map(|c| c.delta.unsigned_abs()).sum::<u64>() as f64;
        #[allow(clippy::cast_precision_loss)]
        let count = self.moved.len() as f64;
        total / count
    }
}

fn ranks<S: AsRef<str>>(ids: &[S]) -> Vec<(&str, usize)> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(AsRef::as_ref)
        .filter(|id| seen.insert(*id))
        .enumerate()
        .map(|(i, id)| (id, i + 1))
        .collect()
}

#[must_use]
pub fn ranking_drift<S: AsRef<str>>(previous: &[S], current: &[S]) -> RankingDrift {
    let previous = ranks(previous);
    let current = ranks(current);
    let previous_by_id: HashMap<&str, usize> = previous.iter().copied().collect();
    let current_ids: HashSet<&str> = current.iter().map(|(id, _)| *id).collect();

    let mut drift = RankingDrift::default();
    for &(id, current_rank) in &current {
        match previous_by_id.get(id) {
            Some(&previous_rank) => drift.moved.push(RankChange {
                id: id.to_string(),
                previous_rank,
                current_rank,
                delta: i64::try_from(previous_rank).unwrap_or(i64::MAX) - i64::try_from(current_rank).unwrap_or(i64::MAX),
            }),
            None => drift.entered.push(id.to_string()),
        }
    }
    drift.dropped = previous
        .iter()
        .filter(|(id, _)| !current_ids.contains(id))
        .map(|(id, _)| (*id).to_string())
        .collect();

    drift
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdList {
    Ids(Vec<String>),
    Rows(Vec<TrackRow>),
}

/// Reads ids from a JSON array of strings or of track rows.
pub fn load_ids(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read id list: {}", path.display()))?;
    let list: IdList = serde_json::from_str(&content)
        .with_context(|| format!("Expected a JSON array of ids or track rows in {}", path.display()))?;

    Ok(match list {
        IdList::Ids(ids) => ids,
        IdList::Rows(rows) => rows.into_iter().map(|row| row.track_id).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}{i}")).collect()
    }

    #[test]
    fn test_disjoint_sets_are_explorer() {
        let result = taste_consistency(&ids("a", 50), &ids("b", 50), Tiering::Two);

        assert_eq!(result.overlap, 0);
        assert_eq!(result.overlap_pct, 0.0);
        assert_eq!(result.label, ConsistencyLabel::MusicalExplorer);
    }

    #[test]
    fn test_identical_sets_are_consistent() {
        let result = taste_consistency(&ids("a", 50), &ids("a", 50), Tiering::Two);

        assert_eq!(result.overlap, 50);
        assert_eq!(result.overlap_pct, 100.0);
        assert_eq!(result.label, ConsistencyLabel::MusicalConsistency);
    }

    #[test]
    fn test_empty_current_guards_division() {
        let empty: Vec<String> = Vec::new();
        let result = taste_consistency(&empty, &ids("a", 5), Tiering::Three);

        assert_eq!(result.overlap, 0);
        assert_eq!(result.overlap_pct, 0.0);
        assert_eq!(result.label, ConsistencyLabel::MusicalExplorer);
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(ConsistencyLabel::from_pct(60.0, Tiering::Two), ConsistencyLabel::MusicalExplorer);
        assert_eq!(ConsistencyLabel::from_pct(60.1, Tiering::Two), ConsistencyLabel::MusicalConsistency);
        assert_eq!(ConsistencyLabel::from_pct(45.0, Tiering::Two), ConsistencyLabel::MusicalExplorer);

        assert_eq!(ConsistencyLabel::from_pct(60.0, Tiering::Three), ConsistencyLabel::BalancedExplorer);
        assert_eq!(ConsistencyLabel::from_pct(30.0, Tiering::Three), ConsistencyLabel::BalancedExplorer);
        assert_eq!(ConsistencyLabel::from_pct(29.9, Tiering::Three), ConsistencyLabel::MusicalExplorer);
        assert_eq!(ConsistencyLabel::from_pct(61.0, Tiering::Three), ConsistencyLabel::MusicalConsistency);
    }

    #[test]
    fn test_overlap_pct_relative_to_first_list() {
        let short = ids("t", 10);
        let long = ids("t", 4);

        let short_vs_long = taste_consistency(&short, &long, Tiering::Two);
        let long_vs_short = taste_consistency(&long, &short, Tiering::Two);

        assert_eq!(short_vs_long.overlap, 4);
        assert_eq!(long_vs_short.overlap, 4);
        assert_eq!(short_vs_long.overlap_pct, 40.0);
        assert_eq!(long_vs_short.overlap_pct, 100.0);
    }

    #[test]
    fn test_duplicates_ignored_in_overlap() {
        let a = vec!["x", "x", "y"];
        let b = vec!["x", "z"];

        assert_eq!(overlap(&a, &b), 1);
        assert_eq!(taste_consistency(&a, &b, Tiering::Two).overlap_pct, 50.0);
    }

    #[test]
    fn test_evolution_overlaps() {
        let short = vec!["a", "b", "c", "d"];
        let medium = vec!["b", "c", "e"];
        let long = vec!["c", "d", "e", "f"];

        let evo = evolution(&short, &medium, &long);

        assert_eq!(evo.short_medium, 2);
        assert_eq!(evo.short_long, 2);
        assert_eq!(evo.medium_long, 2);
        assert_eq!(evo.all_three, 1);
        assert_eq!(evo.core, vec!["c".to_string()]);
    }

    #[test]
    fn test_ranking_drift() {
        let previous = vec!["a", "b", "c", "d"];
        let current = vec!["c", "a", "e"];

        let drift = ranking_drift(&previous, &current);

        assert_eq!(drift.moved.len(), 2);
        assert_eq!(drift.moved[0].id, "c");
        assert_eq!(drift.moved[0].previous_rank, 3);
        assert_eq!(drift.moved[0].current_rank, 1);
        assert_eq!(drift.moved[0].delta, 2);
        assert_eq!(drift.moved[1].id, "a");
        assert_eq!(drift.moved[1].delta, -1);
        assert_eq!(drift.entered, vec!["e".to_string()]);
        assert_eq!(drift.dropped, vec!["b".to_string(), "d".to_string()]);
        assert!((drift.mean_abs_delta() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_ranking_drift_uses_first_occurrence() {
        let drift = ranking_drift(&["a", "a", "b"], &["b", "a"]);

        assert_eq!(drift.moved[0].id, "b");
        assert_eq!(drift.moved[0].previous_rank, 2);
        assert_eq!(drift.moved[1].previous_rank, 1);
        assert_eq!(ranking_drift::<&str>(&[], &[]).mean_abs_delta(), 0.0);
    }

    #[test]
    fn test_load_ids_accepts_rows_or_strings() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("ids.json");
        let rows = dir.path().join("rows.json");
        fs::write(&plain, r#"["a", "b"]"#).unwrap();
        fs::write(&rows, r#"[{"track_id": "c", "energy": 0.3}]"#).unwrap();

        assert_eq!(load_ids(&plain).unwrap(), vec!["a", "b"]);
        assert_eq!(load_ids(&rows).unwrap(), vec!["c"]);
    }
}
