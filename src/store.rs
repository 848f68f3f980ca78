//! # Snapshot Store
//!
//! Local SQLite persistence for [`Snapshot`]s, keyed by
//! `(user_id, time_range, taken_at)`.
//!
//! The store is insert-only: saving a snapshot whose key already exists is
//! an error rather than an overwrite, so history can only grow.
//!
//! ## Schema
//!
//! ```sql
//! CREATE TABLE snapshots (
//!     id         INTEGER PRIMARY KEY,
//!     user_id    TEXT NOT NULL,
//!     time_range TEXT NOT NULL,
//!     taken_at   TEXT NOT NULL,   -- RFC 3339, microseconds, UTC
//!     track_count INTEGER NOT NULL,
//!     tracks     TEXT NOT NULL,   -- JSON array of enriched tracks
//!     UNIQUE(user_id, time_range, taken_at)
//! )
//! ```
//!
//! Timestamps are written with a fixed width so lexical order is
//! chronological order.

use crate::enrich::EnrichedTrack;
use crate::snapshot::{Snapshot, SnapshotKey, TimeRange};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

pub struct SnapshotStore {
    conn: Connection,
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Corrupt snapshot timestamp: {raw}"))?
        .with_timezone(&Utc))
}

/// Raw row as read from SQLite, decoded outside the rusqlite closure.
struct SnapshotRow {
    user_id: String,
    time_range: String,
    taken_at: String,
    tracks: String,
}

impl SnapshotRow {
    fn into_snapshot(self) -> Result<Snapshot> {
        let range: TimeRange = self.time_range.parse()?;
        let taken_at = parse_ts(&self.taken_at)?;
        let tracks: Vec<EnrichedTrack> = serde_json::from_str(&self.tracks)
            .with_context(|| format!("Corrupt tracks in snapshot {} {} {}", self.user_id, range, self.taken_at))?;
        Ok(Snapshot::new(self.user_id, range, taken_at, tracks))
    }
}

impl SnapshotStore {
    /// Opens (or creates) the store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open snapshot store at {}", path.display()))?;
        debug!("Opened snapshot store: {}", path.display());
        Self::init(conn)
    }

    /// Store that lives only as long as the value. Handy for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory snapshot store")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS snapshots (
                id          INTEGER PRIMARY KEY,
                user_id     TEXT    NOT NULL,
                time_range  TEXT    NOT NULL,
                taken_at    TEXT    NOT NULL,
                track_count INTEGER NOT NULL,
                tracks      TEXT    NOT NULL,
                UNIQUE(user_id, time_range, taken_at)
            );
            CREATE INDEX IF NOT EXISTS idx_snapshots_user ON snapshots(user_id, time_range, taken_at);",
        )
        .context("Failed to create snapshot schema")?;
        Ok(Self { conn })
    }

    fn exists(&self, key: &SnapshotKey) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM snapshots WHERE user_id = ?1 AND time_range = ?2 AND taken_at = ?3",
                params![key.user_id, key.range.as_str(), format_ts(&key.taken_at)],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to look up snapshot")?;
        Ok(found.is_some())
    }

    /// Persists a new snapshot. Fails if one with the same key exists.
    pub fn save(&self, snapshot: &Snapshot) -> Result<SnapshotKey> {
        let key = snapshot.key();
        if self.exists(&key)? {
            bail!(
                "Snapshot for {} ({}) at {} already exists; snapshots are never overwritten",
                key.user_id,
                key.range,
                format_ts(&key.taken_at)
            );
        }

        let tracks = serde_json::to_string(snapshot.tracks()).context("Failed to serialize snapshot tracks")?;
        self.conn
            .execute(
                "INSERT INTO snapshots (user_id, time_range, taken_at, track_count, tracks)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    key.user_id,
                    key.range.as_str(),
                    format_ts(&key.taken_at),
                    snapshot.tracks().len(),
                    tracks
                ],
            )
            .with_context(|| format!("Failed to INSERT snapshot for {}", key.user_id))?;

        info!(
            "Saved {} snapshot for {} with {} tracks",
            key.range,
            key.user_id,
            snapshot.tracks().len()
        );
        Ok(key)
    }

    fn query_one(&self, sql: &str, params: impl rusqlite::Params) -> Result<Option<Snapshot>> {
        let row = self
            .conn
            .query_row(sql, params, |row| {
                Ok(SnapshotRow {
                    user_id: row.get(0)?,
                    time_range: row.get(1)?,
                    taken_at: row.get(2)?,
                    tracks: row.get(3)?,
                })
            })
            .optional()
            .context("Failed to query snapshot")?;

        row.map(SnapshotRow::into_snapshot).transpose()
    }

    pub fn load(&self, key: &SnapshotKey) -> Result<Option<Snapshot>> {
        self.query_one(
            "SELECT user_id, time_range, taken_at, tracks FROM snapshots
             WHERE user_id = ?1 AND time_range = ?2 AND taken_at = ?3",
            params![key.user_id, key.range.as_str(), format_ts(&key.taken_at)],
        )
    }

    /// Most recent snapshot for a user and range.
    pub fn latest(&self, user_id: &str, range: TimeRange) -> Result<Option<Snapshot>> {
        self.query_one(
            "SELECT user_id, time_range, taken_at, tracks FROM snapshots
             WHERE user_id = ?1 AND time_range = ?2
             ORDER BY taken_at DESC LIMIT 1",
            params![user_id, range.as_str()],
        )
    }

    /// Up to `limit` most recent snapshots for a user and range, newest first.
    pub fn recent(&self, user_id: &str, range: TimeRange, limit: usize) -> Result<Vec<Snapshot>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT user_id, time_range, taken_at, tracks FROM snapshots
                 WHERE user_id = ?1 AND time_range = ?2
                 ORDER BY taken_at DESC LIMIT ?3",
            )
            .context("Failed to prepare recent snapshot query")?;

        let rows = stmt
            .query_map(params![user_id, range.as_str(), limit], |row| {
                Ok(SnapshotRow {
                    user_id: row.get(0)?,
                    time_range: row.get(1)?,
                    taken_at: row.get(2)?,
                    tracks: row.get(3)?,
                })
            })
            .context("Cannot query snapshots")?;

        let mut snapshots = Vec::new();
        for row in rows {
            snapshots.push(row.context("Queried snapshot row unwrap failed")?.into_snapshot()?);
        }
        Ok(snapshots)
    }

    /// Keys of every snapshot for `user_id`, oldest first.
    pub fn list(&self, user_id: &str) -> Result<Vec<SnapshotKey>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT time_range, taken_at FROM snapshots
                 WHERE user_id = ?1 ORDER BY taken_at ASC, time_range ASC",
            )
            .context("Failed to prepare snapshot listing")?;

        let rows = stmt
            .query_map([user_id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .context("Cannot query snapshots")?;

        let mut keys = Vec::new();
        for row in rows {
            let (range, taken_at) = row.context("Queried snapshot row unwrap failed")?;
            keys.push(SnapshotKey {
                user_id: user_id.to_string(),
                range: range.parse()?,
                taken_at: parse_ts(&taken_at)?,
            });
        }
        Ok(keys)
    }

    pub fn count(&self, user_id: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM snapshots WHERE user_id = ?1", [user_id], |row| row.get(0))
            .context("Failed to count snapshots")?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Distinct user ids with at least one snapshot, sorted.
    pub fn users(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT user_id FROM snapshots ORDER BY user_id")
            .context("Failed to prepare user listing")?;
        let users = stmt
            .query_map([], |row| row.get(0))
            .context("Cannot query users")?
            .collect::<rusqlite::Result<Vec<String>>>()
            .context("Failed to read user ids")?;
        Ok(users)
    }
}
