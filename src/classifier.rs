//! Listening-context classification.
//!
//! Each track gets exactly one [`ListeningContext`]. Rules are checked in a
//! fixed priority order and the first match wins:
//!
//! 1. Workout: energy > 0.7 and danceability > 0.6
//! 2. Focus: speechiness < 0.2 and instrumentalness > 0.5
//! 3. Relaxation: energy < 0.4 and acousticness > 0.5
//! 4. Party: valence > 0.6, energy > 0.6 and danceability > 0.6
//! 5. General
//!
//! Absent features compare as `0`, so a missing value can never pass a `>`
//! threshold but can pass a `<` one.
//!
//! [`TemporalRules`] is the time-aware variant: late-night relaxation becomes
//! [`ListeningContext::Sleep`] and Party also needs an evening or weekend
//! play. Rows without a play time fall back to the standard rules.

use crate::composite::CompositeScores;
use crate::features::{AudioFeature, Temporal, TrackFeatures};
use clap::ValueEnum;
use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Inferred listening situation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ListeningContext {
    #[serde(alias = "workout")]
    Workout,
    #[serde(alias = "focus")]
    Focus,
    #[serde(alias = "relaxation")]
    Relaxation,
    #[serde(alias = "sleep")]
    Sleep,
    #[serde(alias = "party")]
    Party,
    #[serde(alias = "general")]
    General,
}

impl ListeningContext {
    pub const ALL: [ListeningContext; 6] = [
        ListeningContext::Workout,
        ListeningContext::Focus,
        ListeningContext::Relaxation,
        ListeningContext::Sleep,
        ListeningContext::Party,
        ListeningContext::General,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ListeningContext::Workout => "Workout",
            ListeningContext::Focus => "Focus",
            ListeningContext::Relaxation => "Relaxation",
            ListeningContext::Sleep => "Sleep",
            ListeningContext::Party => "Party",
            ListeningContext::General => "General",
        }
    }
}

impl fmt::Display for ListeningContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ListeningContext {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ListeningContext::ALL
            .into_iter()
            .find(|ctx| ctx.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("Unknown listening context: {s}"))
    }
}

/// Everything a classifier may look at for one row.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierInput<'a> {
    pub features: &'a TrackFeatures,
    /// The row's composite scores. The built-in rule sets threshold raw
    /// features only; this is here for strategies that score on composites.
    pub composites: &'a CompositeScores,
    pub temporal: Option<Temporal>,
}

impl ClassifierInput<'_> {
    /// Feature value with absent treated as `0`.
    #[inline]
    fn value(&self, feature: AudioFeature) -> f64 {
        self.features.get(feature).unwrap_or(0.0)
    }
}

/// A context classification strategy.
pub trait ContextClassifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Classify a single row. Must be pure.
    fn classify(&self, input: &ClassifierInput<'_>) -> ListeningContext;
}

const WORKOUT_ENERGY: f64 = 0.7;
const WORKOUT_DANCEABILITY: f64 = 0.6;
const FOCUS_SPEECHINESS: f64 = 0.2;
const FOCUS_INSTRUMENTALNESS: f64 = 0.5;
const RELAX_ENERGY: f64 = 0.4;
const RELAX_ACOUSTICNESS: f64 = 0.5;
const PARTY_THRESHOLD: f64 = 0.6;
const SLEEP_FROM_HOUR: u8 = 22;
const PARTY_FROM_HOUR: u8 = 20;

fn is_workout(input: &ClassifierInput<'_>) -> bool {
    input.value(AudioFeature::Energy) > WORKOUT_ENERGY
        && input.value(AudioFeature::Danceability) > WORKOUT_DANCEABILITY
}

fn is_focus(input: &ClassifierInput<'_>) -> bool {
    input.value(AudioFeature::Speechiness) < FOCUS_SPEECHINESS
        && input.value(AudioFeature::Instrumentalness) > FOCUS_INSTRUMENTALNESS
}

fn is_relaxation(input: &ClassifierInput<'_>) -> bool {
    input.value(AudioFeature::Energy) < RELAX_ENERGY
        && input.value(AudioFeature::Acousticness) > RELAX_ACOUSTICNESS
}

fn is_party(input: &ClassifierInput<'_>) -> bool {
    input.value(AudioFeature::Valence) > PARTY_THRESHOLD
        && input.value(AudioFeature::Energy) > PARTY_THRESHOLD
        && input.value(AudioFeature::Danceability) > PARTY_THRESHOLD
}

/// Hour-agnostic rules: Workout, Focus, Relaxation, Party, General.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

impl ContextClassifier for StandardRules {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn classify(&self, input: &ClassifierInput<'_>) -> ListeningContext {
        if is_workout(input) {
            ListeningContext::Workout
        } else if is_focus(input) {
            ListeningContext::Focus
        } else if is_relaxation(input) {
            ListeningContext::Relaxation
        } else if is_party(input) {
            ListeningContext::Party
        } else {
            ListeningContext::General
        }
    }
}

/// Time-aware rules adding Sleep and gating Party on evening/weekend plays.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalRules;

impl ContextClassifier for TemporalRules {
    fn name(&self) -> &'static str {
        "temporal"
    }

    fn classify(&self, input: &ClassifierInput<'_>) -> ListeningContext {
        let Some(temporal) = input.temporal else {
            return StandardRules.classify(input);
        };

        if is_workout(input) {
            ListeningContext::Workout
        } else if is_focus(input) {
            ListeningContext::Focus
        } else if is_relaxation(input) {
            if temporal.hour >= SLEEP_FROM_HOUR {
                ListeningContext::Sleep
            } else {
                ListeningContext::Relaxation
            }
        } else if is_party(input) && (temporal.hour >= PARTY_FROM_HOUR || temporal.is_weekend) {
            ListeningContext::Party
        } else {
            ListeningContext::General
        }
    }
}

/// Which classifier to use, chosen once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RuleSet {
    #[default]
    Standard,
    Temporal,
}

impl RuleSet {
    #[must_use]
    pub fn classifier(self) -> Box<dyn ContextClassifier> {
        match self {
            RuleSet::Standard => Box::new(StandardRules),
            RuleSet::Temporal => Box::new(TemporalRules),
        }
    }
}

/// Classifies every row in parallel. Output order matches input order.
#[must_use]
pub fn classify_batch(classifier: &dyn ContextClassifier, inputs: &[ClassifierInput<'_>]) -> Vec<ListeningContext> {
    inputs.par_iter().map(|input| classifier.classify(input)).collect()
}

/// One line of a context breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextShare {
    pub context: ListeningContext,
    pub count: usize,
    /// Fraction of all rows, `0..=1`.
    pub share: f64,
}

/// Counts per context, most common first (ties by label order).
#[must_use]
pub fn context_distribution(labels: &[ListeningContext]) -> Vec<ContextShare> {
    if labels.is_empty() {
        return Vec::new();
    }

    let mut counts: HashMap<ListeningContext, usize> = HashMap::new();
    for &label in labels {
        *counts.entry(label).or_default() += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    let total = labels.len() as f64;
    let mut shares: Vec<ContextShare> = counts
        .into_iter()
        .map(|(context, count)| {
            #[allow(clippy::cast_precision_loss)]
            let share = count as f64 / total;
            ContextShare { context, count, share }
        })
        .collect();
    shares.sort_by(|a, b| b.count.cmp(&a.count).then(a.context.cmp(&b.context)));

    for line in &shares {
        info!("  {}: {} tracks ({:.1}%)", line.context, line.count, line.share * 100.0);
    }
    shares
}
