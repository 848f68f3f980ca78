//! # Configuration Module
//!
//! This module handles configuration management and data directory setup for
//! Tuneprint. It provides platform-appropriate data storage locations and the
//! user's [`Settings`] file.
//!
//! ## Data Storage
//!
//! Tuneprint stores its snapshot database and settings in the
//! platform-standard data directory:
//! - Linux: `~/.local/share/tuneprint/`
//! - macOS: `~/Library/Application Support/tuneprint/`
//! - Windows: `%APPDATA%\tuneprint\`
//!
//! ## Settings
//!
//! `settings.json` in the data directory. Every field is optional; a missing
//! file means all defaults. Command-line flags override individual values
//! for a single run.

use crate::classifier::RuleSet;
use crate::diff::Tiering;
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns the platform-appropriate data directory for Tuneprint.
///
/// The `tuneprint` subdirectory is created if it doesn't exist.
///
/// # Errors
///
/// This function will return an error if:
/// - The system data directory cannot be determined
/// - The tuneprint subdirectory cannot be created due to permissions
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        ))?;

    let app_dir = data_dir.join("tuneprint");
    fs::create_dir_all(&app_dir)
        .with_context(|| format!(
            "Failed to create Tuneprint data directory at {}. Please check file permissions.",
            app_dir.display()
        ))?;

    Ok(app_dir)
}

/// Returns the default snapshot store path, `<data_dir>/snapshots.db`.
///
/// # Examples
///
/// ```no_run
/// use tuneprint::config::get_store_path;
///
/// let store_path = get_store_path()?;
/// println!("Snapshot store location: {}", store_path.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_store_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("snapshots.db"))
}

pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("settings.json"))
}

/// User settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Snapshot database; `None` means [`get_store_path`].
    pub store_path: Option<PathBuf>,
    /// JSON reference table of audio features by track id.
    pub reference_features: Option<PathBuf>,
    pub rule_set: RuleSet,
    pub consistency_tiers: Tiering,
    pub cache_ttl_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_path: None,
            reference_features: None,
            rule_set: RuleSet::Standard,
            consistency_tiers: Tiering::Two,
            cache_ttl_secs: 3600,
        }
    }
}

impl Settings {
    /// Loads settings from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&get_settings_path()?)
    }

    /// Loads settings from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings file at {}; using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid settings file: {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, json).with_context(|| format!("Failed to write settings: {}", path.display()))
    }

    /// Configured store path, or the platform default.
    pub fn resolved_store_path(&self) -> Result<PathBuf> {
        match &self.store_path {
            Some(path) => Ok(path.clone()),
            None => get_store_path(),
        }
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
