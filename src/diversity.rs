//! Diversity scoring via normalized Shannon entropy.
//!
//! ```text
//! H        = −Σ pᵢ·log₂(pᵢ)        pᵢ = countᵢ / N
//! H_max    = log₂(k)                k = number of distinct categories
//! score    = H / H_max × 100
//! ```
//!
//! Returns `0` for no values and for a single category. Rows where the
//! column has no value are left out of `N`.

use crate::enrich::EnrichedTrack;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

/// Diversity over any categorical values.
#[must_use]
pub fn diversity_score<I, S>(values: I) -> f64
where
    I: IntoIterator<Item = S>,
    S: Eq + Hash,
{
    let mut counts: HashMap<S, usize> = HashMap::new();
    let mut total = 0usize;
    for value in values {
        *counts.entry(value).or_default() += 1;
        total += 1;
    }

    if total == 0 || counts.len() < 2 {
        return 0.0;
    }

    // sorted so the summation order never depends on hashing
    let mut counts: Vec<usize> = counts.into_values().collect();
    counts.sort_unstable();

    #[allow(clippy::cast_precision_loss)]
    let n = total as f64;
    let entropy: f64 = counts
        .iter()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / n;
            -p * p.log2()
        })
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let max_entropy = (counts.len() as f64).log2();

    // rounding can push a perfectly even split a hair past 100
    (entropy / max_entropy * 100.0).clamp(0.0, 100.0)
}

/// Categorical columns of an enriched table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CategoryColumn {
    #[default]
    Artist,
    Track,
    Context,
}

impl CategoryColumn {
    #[must_use]
    pub fn value<'a>(&self, track: &'a EnrichedTrack) -> Option<&'a str> {
        match self {
            CategoryColumn::Artist => track.row.artist_name.as_deref(),
            CategoryColumn::Track => track.row.track_name.as_deref(),
            CategoryColumn::Context => Some(track.context.label()),
        }
    }
}

/// Diversity of one column; `0` if the table is empty or the column has no
/// values at all.
#[must_use]
pub fn column_diversity(tracks: &[EnrichedTrack], column: CategoryColumn) -> f64 {
    diversity_score(tracks.iter().filter_map(|track| column.value(track)))
}
