//! # Tuneprint - Listening-History Analytics
//!
//! Derives composite audio scores and listening contexts from a listening
//! history, measures how diverse it is, and tracks how top-track lists drift
//! between snapshots.
//!
//! ## Usage
//!
//! ```bash
//! # Enrich a listening history with composites and contexts
//! tuneprint enrich recent.json --reference features.json -o enriched.json
//!
//! # How varied is it?
//! tuneprint diversity enriched.json --column artist
//!
//! # When do I listen?
//! tuneprint patterns recent.json
//!
//! # Short-term vs long-term taste
//! tuneprint consistency short.json long.json
//!
//! # Keep history
//! tuneprint snapshot save top_short.json --user alice --range short
//! tuneprint snapshot evolution --user alice
//! ```

use anyhow::Result;
use chrono::Utc;
use clap::{CommandFactory, Parser};
use log::{debug, info};
use serde::Serialize;
use tuneprint::cache::NoCache;
use tuneprint::cli::{self, Command, SnapshotAction};
use tuneprint::completion;
use tuneprint::config::Settings;
use tuneprint::diff::{self, Tiering};
use tuneprint::diversity;
use tuneprint::enrich::{self, Enrichment};
use tuneprint::patterns;
use tuneprint::session::Session;
use tuneprint::snapshot::Freshness;
use tuneprint::source;
use tuneprint::store::SnapshotStore;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Session for pure analysis commands that never touch the store.
fn analysis_session(settings: &Settings) -> Session {
    Session::new(
        source::resolve_feature_source(settings.reference_features.as_deref()),
        settings.rule_set.classifier(),
        Box::new(NoCache),
    )
    .with_tiering(settings.consistency_tiers)
}

fn print_enrichment_summary(result: &Enrichment) {
    let coverage = &result.coverage;
    println!(
        "Tracks: {} ({} with audio features, {:.1}%)",
        coverage.total, coverage.with_features, coverage.pct
    );

    if !result.report.created.is_empty() {
        let created: Vec<_> = result.report.created.iter().map(|c| c.name()).collect();
        println!("Composites: {}", created.join(", "));
    }
    for skipped in &result.report.skipped {
        let missing: Vec<_> = skipped.missing.iter().map(|f| f.name()).collect();
        println!("Skipped {}: missing {}", skipped.feature.name(), missing.join(", "));
    }
    if result.report.flat_tempo {
        println!("Tempo has no spread in this batch; normalized tempo is 0");
    }

    println!("Listening contexts:");
    for line in &result.distribution {
        println!("  {:<11} {:>5} ({:.1}%)", line.context.label(), line.count, line.share * 100.0);
    }
}

/// Main entry point for Tuneprint.
///
/// Logging is controlled via `RUST_LOG`:
/// - `RUST_LOG=debug tuneprint enrich rows.json` - Enable debug logging
/// - `RUST_LOG=tuneprint::composite=trace tuneprint enrich rows.json` - Module-specific logging
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    let mut settings = match &args.settings {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if let Some(store) = args.store {
        settings.store_path = Some(store);
    }
    debug!("Effective settings: {settings:?}");

    match args.command {
        Command::Enrich { rows, reference, rules, output } => {
            if reference.is_some() {
                settings.reference_features = reference;
            }
            if let Some(rules) = rules {
                settings.rule_set = rules;
            }

            info!("Enriching rows from: {}", rows.display());
            let session = analysis_session(&settings);
            let result = session.enrich(enrich::load_rows(&rows)?);

            match output {
                Some(path) => {
                    enrich::write_enriched(&path, &result.tracks)?;
                    info!("Wrote {} enriched tracks to {}", result.tracks.len(), path.display());
                    print_enrichment_summary(&result);
                }
                None => print_json(&result.tracks)?,
            }
        }
        Command::Diversity { rows, column } => {
            let tracks = enrich::load_enriched(&rows)?;
            let score = diversity::column_diversity(&tracks, column);
            println!("{score:.1}");
        }
        Command::Consistency { current, reference, three_tier } => {
            if three_tier {
                settings.consistency_tiers = Tiering::Three;
            }
            let session = analysis_session(&settings);
            let current = diff::load_ids(&current)?;
            let reference = diff::load_ids(&reference)?;
            print_json(&session.taste_consistency(&current, &reference))?;
        }
        Command::Patterns { rows } => {
            let patterns = patterns::listening_patterns(&enrich::load_rows(&rows)?);
            if let Some(hour) = patterns.peak_hour() {
                info!("Peak listening hour: {hour:02}:00");
            }
            print_json(&patterns)?;
        }
        Command::Snapshot { action } => match action {
            SnapshotAction::Save { rows, user, range, reference } => {
                if reference.is_some() {
                    settings.reference_features = reference;
                }
                let session = Session::from_settings(&settings)?;
                let snapshot = session.capture(&user, range, enrich::load_rows(&rows)?)?;
                println!(
                    "Saved {} snapshot for {} with {} tracks",
                    snapshot.range(),
                    snapshot.user_id(),
                    snapshot.tracks().len()
                );
            }
            SnapshotAction::List { user } => {
                let store = SnapshotStore::open(&settings.resolved_store_path()?)?;
                let keys = store.list(&user)?;
                if keys.is_empty() {
                    println!("No snapshots for {user}");
                }
                let now = Utc::now();
                for key in keys {
                    println!(
                        "{:<6} {}  {}",
                        key.range,
                        key.taken_at.format("%Y-%m-%d %H:%M:%S"),
                        Freshness::since(key.taken_at, now)
                    );
                }
            }
            SnapshotAction::Metrics { user, range } => {
                let session = Session::from_settings(&settings)?;
                match session.latest_metrics(&user, range)? {
                    Some(metrics) => print_json(&metrics)?,
                    None => println!("No {range} snapshot for {user}"),
                }
            }
            SnapshotAction::Evolution { user } => {
                let session = Session::from_settings(&settings)?;
                match session.taste_report(&user)? {
                    Some(report) => print_json(&report)?,
                    None => println!("Need short, medium and long snapshots for {user}"),
                }
            }
        },
        Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        }
        Command::CompleteUsers => {
            let store = SnapshotStore::open(&settings.resolved_store_path()?)?;
            completion::print_user_completions(&store)?;
        }
    }

    Ok(())
}
