//! # Command-Line Interface Module
//!
//! This module defines the command-line interface for Tuneprint using Clap
//! derive macros.
//!
//! ## Commands
//!
//! - `enrich`: Add composite scores and listening contexts to a rows file
//! - `diversity`: Shannon-entropy diversity of one column
//! - `consistency`: Overlap between two top-track lists
//! - `patterns`: Play counts by hour, weekday and time of day
//! - `snapshot`: Save, list and compare stored snapshots
//! - `completion`: Shell completion scripts
//!
//! ## Examples
//!
//! ```bash
//! tuneprint enrich recent.json --reference features.json --output enriched.json
//! tuneprint diversity enriched.json --column context
//! tuneprint consistency short.json long.json --three-tier
//! tuneprint snapshot save top_short.json --user alice --range short
//! ```

use crate::classifier::RuleSet;
use crate::diversity::CategoryColumn;
use crate::snapshot::TimeRange;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Main application arguments structure.
///
/// Global flags override the matching values from `settings.json` for one run.
#[derive(Parser)]
#[command(name = "tuneprint")]
#[command(about = "Tuneprint: listening-history analytics from audio features")]
#[command(version)]
pub struct Args {
    /// Snapshot database path
    #[arg(long, global = true, env = "TUNEPRINT_STORE")]
    pub store: Option<PathBuf>,

    /// Alternate settings file
    #[arg(long, global = true, env = "TUNEPRINT_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Enrich listening rows with composite scores and contexts
    ///
    /// Reads a JSON array of rows (track_id plus any audio features and an
    /// optional played_at timestamp), fills missing features from the
    /// reference table, derives composites and assigns one listening context
    /// per row.
    Enrich {
        /// JSON file of listening rows
        rows: PathBuf,

        /// JSON reference table of audio features keyed by track_id
        #[arg(long, short)]
        reference: Option<PathBuf>,

        /// Classification rule set
        #[arg(long, value_enum)]
        rules: Option<RuleSet>,

        /// Write enriched rows here instead of printing a summary
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Shannon-entropy diversity (0-100) of one column
    Diversity {
        /// Enriched rows (output of `enrich`)
        rows: PathBuf,

        #[arg(long, short, value_enum, default_value_t = CategoryColumn::Artist)]
        column: CategoryColumn,
    },

    /// Taste consistency between two top-track lists
    ///
    /// Each file is either a JSON array of ids or an array of rows with a
    /// track_id field. List order is rank order.
    Consistency {
        /// Current (usually short-term) list
        current: PathBuf,

        /// Reference (usually long-term) list
        reference: PathBuf,

        /// Use the three-tier labelling (adds Balanced Explorer)
        #[arg(long)]
        three_tier: bool,
    },

    /// When the listening happened: plays per hour, weekday and time of day
    Patterns {
        /// JSON file of listening rows with played_at timestamps
        rows: PathBuf,
    },

    /// Manage stored snapshots
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },

    /// Generate shell completions
    ///
    /// Usage: tuneprint completion bash > ~/.local/share/bash-completion/completions/tuneprint
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },

    /// List stored user ids for completion (hidden command)
    #[command(hide = true)]
    CompleteUsers,
}

#[derive(Subcommand)]
pub enum SnapshotAction {
    /// Enrich a top-tracks file and store it as a new snapshot
    Save {
        /// JSON file of rows in rank order
        rows: PathBuf,

        #[arg(long, short, value_hint = clap::ValueHint::Other)]
        user: String,

        #[arg(long, short, value_enum)]
        range: TimeRange,

        /// JSON reference table of audio features keyed by track_id
        #[arg(long)]
        reference: Option<PathBuf>,
    },

    /// List a user's snapshots with their freshness
    List {
        #[arg(long, short, value_hint = clap::ValueHint::Other)]
        user: String,
    },

    /// Metrics of the latest snapshot
    Metrics {
        #[arg(long, short, value_hint = clap::ValueHint::Other)]
        user: String,

        #[arg(long, short, value_enum, default_value_t = TimeRange::Short)]
        range: TimeRange,
    },

    /// Taste evolution across the latest short, medium and long snapshots
    Evolution {
        #[arg(long, short, value_hint = clap::ValueHint::Other)]
        user: String,
    },
}
