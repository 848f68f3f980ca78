//! Listening-history analytics: derived audio features, listening contexts,
//! taste drift between snapshots and diversity scoring.
//!
//! Core modules:
//! - [`composite`] - Composite scores derived from raw audio features
//! - [`classifier`] - Rule-based listening-context classification
//! - [`diff`] - Overlap and ranking drift between two track lists
//! - [`diversity`] - Shannon-entropy diversity of a categorical column
//!
//! ### Supporting Modules
//!
//! - [`features`] - Track rows, audio feature columns and temporal attributes
//! - [`source`] - Feature sources (reference table or none) and coverage
//! - [`enrich`] - Join, composite and classify in one pass
//! - [`snapshot`] / [`store`] - Timestamped top-track snapshots in SQLite
//! - [`metrics`] - Flat per-snapshot metric maps
//! - [`patterns`] - Play counts by hour, weekday and time of day
//! - [`cache`] - Injectable TTL memoization
//! - [`session`] - Explicit context object tying the above together
//! - [`config`] - Data directory and settings file
//! - [`cli`] / [`completion`] - Command-line interface definitions
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use tuneprint::classifier::StandardRules;
//! use tuneprint::features::{TrackFeatures, TrackRow};
//! use tuneprint::source::NullFeatureSource;
//! use tuneprint::{diversity, enrich};
//!
//! let rows = vec![
//!     TrackRow::new("a").with_artist("X").with_features(TrackFeatures {
//!         energy: Some(0.9),
//!         danceability: Some(0.8),
//!         ..Default::default()
//!     }),
//!     TrackRow::new("b").with_artist("Y"),
//! ];
//!
//! let result = enrich::enrich_rows(rows, &NullFeatureSource, &StandardRules);
//! for track in &result.tracks {
//!     println!("{} -> {}", track.track_id(), track.context);
//! }
//!
//! let score = diversity::diversity_score(["X", "Y", "X"]);
//! println!("Artist diversity: {score:.1}");
//! ```
//!
//! ## Error Handling
//!
//! The four analytic functions are total: missing inputs surface as `None`
//! values or skipped columns, never errors. Everything that touches the
//! filesystem or the snapshot store returns `anyhow::Result`.
pub mod cache;
pub mod classifier;
pub mod cli;
pub mod completion;
pub mod composite;
pub mod config;
pub mod diff;
pub mod diversity;
pub mod enrich;
pub mod features;
pub mod metrics;
pub mod patterns;
pub mod session;
pub mod snapshot;
pub mod source;
pub mod store;
