//! # Session
//!
//! Everything a call needs, resolved once and passed explicitly:
//!
//! - the audio-feature source (possibly the null source)
//! - the context classifier strategy
//! - a memoization cache
//! - the snapshot store, when one is configured
//!
//! A `Session` holds no global state; two sessions never share a cache.

use crate::cache::{self, Cache, CacheKey, MemoryCache};
use crate::classifier::ContextClassifier;
use crate::config::Settings;
use crate::diff::{self, Evolution, RankingDrift, TasteConsistency, Tiering};
use crate::enrich::{self, Enrichment};
use crate::features::TrackRow;
use crate::metrics::{self, MetricMap};
use crate::snapshot::{Snapshot, TimeRange};
use crate::source::{self, FeatureSource};
use crate::store::SnapshotStore;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;
use std::time::Duration;

const LATEST_SNAPSHOT: &str = "latest_snapshot";
const LATEST_METRICS: &str = "latest_metrics";

/// Cross-range view of a user's taste.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TasteReport {
    /// Short-term top tracks against long-term ones.
    pub consistency: TasteConsistency,
    pub evolution: Evolution,
    /// Movement between the two most recent short-term snapshots.
    pub short_term_drift: Option<RankingDrift>,
}

pub struct Session {
    source: Box<dyn FeatureSource>,
    classifier: Box<dyn ContextClassifier>,
    cache: Box<dyn Cache>,
    store: Option<SnapshotStore>,
    tiering: Tiering,
    cache_ttl: Duration,
}

impl Session {
    #[must_use]
    pub fn new(source: Box<dyn FeatureSource>, classifier: Box<dyn ContextClassifier>, cache: Box<dyn Cache>) -> Self {
        Self {
            source,
            classifier,
            cache,
            store: None,
            tiering: Tiering::default(),
            cache_ttl: Duration::from_secs(3600),
        }
    }

    #[must_use]
    pub fn with_store(self, store: SnapshotStore) -> Self {
        Self {
            store: Some(store),
            ..self
        }
    }

    #[must_use]
    pub fn with_tiering(self, tiering: Tiering) -> Self {
        Self { tiering, ..self }
    }

    #[must_use]
    pub fn with_cache_ttl(self, cache_ttl: Duration) -> Self {
        Self { cache_ttl, ..self }
    }

    /// Resolves every capability from settings, including opening the store.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let source = source::resolve_feature_source(settings.reference_features.as_deref());
        let classifier = settings.rule_set.classifier();
        info!(
            "Session: feature source '{}', {} rules, {:?}-tier consistency",
            source.name(),
            classifier.name(),
            settings.consistency_tiers
        );

        let store = SnapshotStore::open(&settings.resolved_store_path()?)?;
        Ok(Self::new(source, classifier, Box::new(MemoryCache::default()))
            .with_store(store)
            .with_tiering(settings.consistency_tiers)
            .with_cache_ttl(settings.cache_ttl()))
    }

    #[must_use]
    pub fn source(&self) -> &dyn FeatureSource {
        self.source.as_ref()
    }

    #[must_use]
    pub fn classifier(&self) -> &dyn ContextClassifier {
        self.classifier.as_ref()
    }

    #[must_use]
    pub fn tiering(&self) -> Tiering {
        self.tiering
    }

    pub fn store(&self) -> Result<&SnapshotStore> {
        self.store
            .as_ref()
            .ok_or_else(|| anyhow!("No snapshot store configured for this session"))
    }

    #[must_use]
    pub fn enrich(&self, rows: Vec<TrackRow>) -> Enrichment {
        enrich::enrich_rows(rows, self.source(), self.classifier())
    }

    #[must_use]
    pub fn taste_consistency<S: AsRef<str>>(&self, current: &[S], reference: &[S]) -> TasteConsistency {
        diff::taste_consistency(current, reference, self.tiering)
    }

    /// Enriches `rows` and stores them as a new snapshot taken now.
    pub fn capture(&self, user_id: &str, range: TimeRange, rows: Vec<TrackRow>) -> Result<Snapshot> {
        self.capture_at(user_id, range, rows, Utc::now())
    }

    pub fn capture_at(&self, user_id: &str, range: TimeRange, rows: Vec<TrackRow>, taken_at: DateTime<Utc>) -> Result<Snapshot> {
        let store = self.store()?;
        let enrichment = self.enrich(rows);
        let snapshot = Snapshot::new(user_id, range, taken_at, enrichment.tracks);

        store.save(&snapshot)?;
        let key = CacheKey::new(LATEST_SNAPSHOT, cache_args(user_id, range));
        self.cache.invalidate(&key);
        self.cache.invalidate(&CacheKey::new(LATEST_METRICS, cache_args(user_id, range)));
        debug!("Invalidated cached {range} snapshot for {user_id}");

        Ok(snapshot)
    }

    pub fn latest_snapshot(&self, user_id: &str, range: TimeRange) -> Result<Option<Snapshot>> {
        let store = self.store()?;
        cache::cached(
            self.cache.as_ref(),
            CacheKey::new(LATEST_SNAPSHOT, cache_args(user_id, range)),
            self.cache_ttl,
            || store.latest(user_id, range),
        )
    }

    pub fn latest_metrics(&self, user_id: &str, range: TimeRange) -> Result<Option<MetricMap>> {
        cache::cached(
            self.cache.as_ref(),
            CacheKey::new(LATEST_METRICS, cache_args(user_id, range)),
            self.cache_ttl,
            || Ok(self.latest_snapshot(user_id, range)?.as_ref().map(metrics::snapshot_metrics)),
        )
    }

    /// Taste report from the latest snapshot of each range.
    ///
    /// `None` until short, medium and long snapshots all exist.
    pub fn taste_report(&self, user_id: &str) -> Result<Option<TasteReport>> {
        let (Some(short), Some(medium), Some(long)) = (
            self.latest_snapshot(user_id, TimeRange::Short)?,
            self.latest_snapshot(user_id, TimeRange::Medium)?,
            self.latest_snapshot(user_id, TimeRange::Long)?,
        ) else {
            debug!("Taste report for {user_id} needs snapshots in all three ranges");
            return Ok(None);
        };

        let short_ids = short.track_ids();
        let medium_ids = medium.track_ids();
        let long_ids = long.track_ids();

        let history = self.store()?.recent(user_id, TimeRange::Short, 2)?;
        let short_term_drift = match history.as_slice() {
            [latest, previous] => Some(diff::ranking_drift(&previous.track_ids(), &latest.track_ids())),
            _ => None,
        };

        Ok(Some(TasteReport {
            consistency: self.taste_consistency(&short_ids, &long_ids),
            evolution: diff::evolution(&short_ids, &medium_ids, &long_ids),
            short_term_drift,
        }))
    }
}

fn cache_args(user_id: &str, range: TimeRange) -> String {
    format!("{user_id}/{range}")
}
