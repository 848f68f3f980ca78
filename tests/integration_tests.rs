//! # Integration Tests for Tuneprint
//!
//! End-to-end tests through the public library API and the `tuneprint`
//! binary: enrichment from JSON files, snapshot history in an on-disk store,
//! and the CLI commands that sit on top of them.

use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tuneprint::cache::MemoryCache;
use tuneprint::classifier::{ListeningContext, StandardRules};
use tuneprint::diff::{self, ConsistencyLabel, Tiering};
use tuneprint::enrich;
use tuneprint::features::{TrackFeatures, TrackRow};
use tuneprint::session::Session;
use tuneprint::snapshot::TimeRange;
use tuneprint::source::{NullFeatureSource, ReferenceTable};
use tuneprint::store::SnapshotStore;

const SCENARIO_ROWS: &str = r#"[
  {"track_id": "A", "artist_name": "Pulse", "energy": 0.8, "danceability": 0.7, "valence": 0.7,
   "acousticness": 0.1, "speechiness": 0.05, "instrumentalness": 0.6, "tempo": 120.0},
  {"track_id": "B", "artist_name": "Drift", "energy": 0.2, "danceability": 0.3, "valence": 0.3,
   "acousticness": 0.8, "speechiness": 0.1, "instrumentalness": 0.1, "tempo": 80.0},
  {"track_id": "C", "artist_name": "Pulse", "energy": 0.5, "danceability": 0.5, "valence": 0.5,
   "acousticness": 0.5, "speechiness": 0.5, "instrumentalness": 0.5, "tempo": 100.0}
]"#;

fn write_file(dir: &TempDir, name: &str, content: &str) -> Result<PathBuf> {
    let path = dir.path().join(name);
    fs::write(&path, content)?;
    Ok(path)
}

fn approx(actual: Option<f64>, expected: f64) -> bool {
    actual.is_some_and(|v| (v - expected).abs() < 1e-9)
}

fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| (*s).to_string()).collect()
}

#[cfg(test)]
mod enrichment_tests {
    use super::*;

    #[test]
    fn test_three_row_scenario() -> Result<()> {
        let dir = TempDir::new()?;
        let path = write_file(&dir, "rows.json", SCENARIO_ROWS)?;

        let result = enrich::enrich_rows(enrich::load_rows(&path)?, &NullFeatureSource, &StandardRules);
        let contexts: Vec<_> = result.tracks.iter().map(|t| t.context).collect();

        assert_eq!(
            contexts,
            vec![ListeningContext::Workout, ListeningContext::Relaxation, ListeningContext::General]
        );

        let a = &result.tracks[0].composites;
        let b = &result.tracks[1].composites;
        let c = &result.tracks[2].composites;
        assert!(approx(a.mood_score, 0.77));
        assert!(approx(a.grooviness, 0.82), "A has the batch max tempo");
        assert!(approx(b.grooviness, 0.18), "B has the batch min tempo");
        assert!(approx(c.grooviness, 0.5));
        assert!(approx(b.relaxation_score, 0.86));

        assert_eq!(result.coverage.with_features, 3);
        assert!(result.report.skipped.is_empty());
        Ok(())
    }

    #[test]
    fn test_reference_table_fills_missing_features() -> Result<()> {
        let dir = TempDir::new()?;
        let reference = write_file(&dir, "reference.json", SCENARIO_ROWS)?;
        let history = write_file(
            &dir,
            "history.json",
            r#"[
              {"track_id": "A", "played_at": "2024-03-01T07:30:00Z"},
              {"track_id": "B", "played_at": "2024-03-01T23:15:00Z", "energy": 0.25},
              {"track_id": "missing"}
            ]"#,
        )?;

        let table = ReferenceTable::load(&reference)?;
        let result = enrich::enrich_rows(enrich::load_rows(&history)?, &table, &StandardRules);

        assert_eq!(result.coverage.total, 3);
        assert_eq!(result.coverage.with_features, 2);
        assert_eq!(result.tracks[0].context, ListeningContext::Workout);
        assert_eq!(result.tracks[1].features().energy, Some(0.25), "row values win over the table");
        assert_eq!(result.tracks[2].context, ListeningContext::General);
        assert!(result.tracks[2].composites.mood_score.is_none());
        Ok(())
    }

    #[test]
    fn test_reference_export_with_undetected_key() -> Result<()> {
        let dir = TempDir::new()?;
        let reference = write_file(
            &dir,
            "reference.json",
            r#"[
              {"track_id": "A", "energy": 0.8, "danceability": 0.7, "key": -1, "mode": 1.0},
              {"track_id": "B", "energy": 0.2, "acousticness": 0.8, "key": 4.0, "mode": 0}
            ]"#,
        )?;

        let table = ReferenceTable::load(&reference)?;
        let rows = vec![TrackRow::new("A"), TrackRow::new("B")];
        let result = enrich::enrich_rows(rows, &table, &StandardRules);

        assert_eq!(result.coverage.with_features, 2, "the table was used despite key = -1");
        assert_eq!(result.tracks[0].context, ListeningContext::Workout);
        assert_eq!(result.tracks[1].context, ListeningContext::Relaxation);
        assert_eq!(result.tracks[1].features().key, Some(4));
        Ok(())
    }

    #[test]
    fn test_enriched_file_feeds_diversity() -> Result<()> {
        let dir = TempDir::new()?;
        let rows = write_file(&dir, "rows.json", SCENARIO_ROWS)?;
        let out = dir.path().join("enriched.json");

        let result = enrich::enrich_rows(enrich::load_rows(&rows)?, &NullFeatureSource, &StandardRules);
        enrich::write_enriched(&out, &result.tracks)?;
        let tracks = enrich::load_enriched(&out)?;

        assert_eq!(tracks.len(), 3);
        let contexts = tuneprint::diversity::column_diversity(&tracks, tuneprint::diversity::CategoryColumn::Context);
        assert!((contexts - 100.0).abs() < 1e-9, "three distinct contexts");

        let artists = tuneprint::diversity::column_diversity(&tracks, tuneprint::diversity::CategoryColumn::Artist);
        assert!(artists > 0.0 && artists < 100.0);
        Ok(())
    }
}

#[cfg(test)]
mod history_tests {
    use super::*;

    fn disk_session(path: &Path) -> Result<Session> {
        Ok(
            Session::new(Box::new(NullFeatureSource), Box::new(StandardRules), Box::new(MemoryCache::default()))
                .with_store(SnapshotStore::open(path)?)
                .with_tiering(Tiering::Two),
        )
    }

    fn rows(ids: &[&str]) -> Vec<TrackRow> {
        ids.iter()
            .map(|id| {
                TrackRow::new(*id).with_features(TrackFeatures {
                    energy: Some(0.4),
                    ..Default::default()
                })
            })
            .collect()
    }

    #[test]
    fn test_snapshots_survive_reopen() -> Result<()> {
        let dir = TempDir::new()?;
        let db = dir.path().join("snapshots.db");
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        {
            let session = disk_session(&db)?;
            session.capture_at("alice", TimeRange::Short, rows(&["a", "b", "c"]), t0)?;
            session.capture_at("alice", TimeRange::Medium, rows(&["a", "b", "d"]), t0)?;
            session.capture_at("alice", TimeRange::Long, rows(&["a", "e", "f"]), t0)?;
        }

        let session = disk_session(&db)?;
        assert_eq!(session.store()?.count("alice")?, 3);

        let report = session.taste_report("alice")?.expect("all three ranges stored");
        assert_eq!(report.consistency.overlap, 1);
        assert_eq!(report.consistency.label, ConsistencyLabel::MusicalExplorer);
        assert_eq!(report.evolution.short_medium, 2);
        assert_eq!(report.evolution.core, ids(&["a"]));
        assert!(report.short_term_drift.is_none(), "only one short snapshot so far");
        Ok(())
    }

    #[test]
    fn test_snapshot_history_is_insert_only() -> Result<()> {
        let dir = TempDir::new()?;
        let session = disk_session(&dir.path().join("snapshots.db"))?;
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        session.capture_at("bob", TimeRange::Short, rows(&["a"]), t0)?;
        assert!(session.capture_at("bob", TimeRange::Short, rows(&["b"]), t0).is_err());

        session.capture_at("bob", TimeRange::Short, rows(&["b", "a"]), t0 + Duration::days(7))?;
        let latest = session.latest_snapshot("bob", TimeRange::Short)?.unwrap();
        assert_eq!(latest.track_ids(), vec!["b", "a"]);
        assert_eq!(session.store()?.list("bob")?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_overlap_of_fifty_ids() {
        let a: Vec<String> = (0..50).map(|i| format!("a{i}")).collect();
        let b: Vec<String> = (0..50).map(|i| format!("b{i}")).collect();

        let disjoint = diff::taste_consistency(&a, &b, Tiering::Two);
        assert_eq!(disjoint.overlap, 0);
        assert_eq!(disjoint.overlap_pct, 0.0);
        assert_eq!(disjoint.label, ConsistencyLabel::MusicalExplorer);

        let same = diff::taste_consistency(&a, &a, Tiering::Two);
        assert_eq!(same.overlap, 50);
        assert_eq!(same.overlap_pct, 100.0);
        assert_eq!(same.label, ConsistencyLabel::MusicalConsistency);
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    fn tuneprint(dir: &TempDir) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_tuneprint"));
        cmd.env("TUNEPRINT_SETTINGS", dir.path().join("settings.json"))
            .env("TUNEPRINT_STORE", dir.path().join("snapshots.db"));
        cmd
    }

    #[test]
    fn test_cli_help_displays_correctly() {
        let dir = TempDir::new().unwrap();
        let output = tuneprint(&dir).arg("--help").output().expect("Failed to run help command");

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(output.status.success());
        assert!(stdout.contains("tuneprint"));
        assert!(stdout.contains("enrich"));
        assert!(stdout.contains("snapshot"));
    }

    #[test]
    fn test_cli_enrich_and_diversity() -> Result<()> {
        let dir = TempDir::new()?;
        let rows = write_file(&dir, "rows.json", SCENARIO_ROWS)?;
        let out = dir.path().join("enriched.json");

        let status = tuneprint(&dir).arg("enrich").arg(&rows).arg("--output").arg(&out).status()?;
        assert!(status.success());
        assert!(out.exists());

        let output = tuneprint(&dir).arg("diversity").arg(&out).args(["--column", "context"]).output()?;
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "100.0");
        Ok(())
    }

    #[test]
    fn test_cli_consistency() -> Result<()> {
        let dir = TempDir::new()?;
        let short = write_file(&dir, "short.json", r#"["a", "b", "c", "d"]"#)?;
        let long = write_file(&dir, "long.json", r#"[{"track_id": "a"}, {"track_id": "b"}, {"track_id": "x"}]"#)?;

        let output = tuneprint(&dir).arg("consistency").arg(&short).arg(&long).arg("--three-tier").output()?;
        assert!(output.status.success());

        let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        assert_eq!(json["overlap"], 2);
        assert_eq!(json["label"], "Balanced Explorer");
        Ok(())
    }

    #[test]
    fn test_cli_snapshot_save_and_list() -> Result<()> {
        let dir = TempDir::new()?;
        let rows = write_file(&dir, "top.json", SCENARIO_ROWS)?;

        let status = tuneprint(&dir)
            .args(["snapshot", "save"])
            .arg(&rows)
            .args(["--user", "carol", "--range", "short"])
            .status()?;
        assert!(status.success());

        let output = tuneprint(&dir).args(["snapshot", "list", "--user", "carol"]).output()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(output.status.success());
        assert!(stdout.contains("short"));
        assert!(stdout.contains("Fresh"));

        let output = tuneprint(&dir).args(["snapshot", "metrics", "--user", "carol"]).output()?;
        let metrics: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        assert_eq!(metrics["user_id"], "carol");
        assert_eq!(metrics["recent_unique_artists"], 2);
        assert_eq!(metrics["top_short_unique_artists"], 2);
        Ok(())
    }

    #[test]
    fn test_cli_patterns() -> Result<()> {
        let dir = TempDir::new()?;
        let rows = write_file(
            &dir,
            "recent.json",
            r#"[
              {"track_id": "a", "played_at": "2024-06-10T07:05:00Z"},
              {"track_id": "b", "played_at": "2024-06-10T07:40:00Z"},
              {"track_id": "c", "played_at": "2024-06-15T21:00:00Z"},
              {"track_id": "d"}
            ]"#,
        )?;

        let output = tuneprint(&dir).arg("patterns").arg(&rows).output()?;
        assert!(output.status.success());

        let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        assert_eq!(json["by_hour"][7]["count"], 2);
        assert_eq!(json["by_weekday"][0]["day"], "Monday");
        assert_eq!(json["by_weekday"][0]["count"], 2);
        assert_eq!(json["by_weekday"][5]["count"], 1);
        assert_eq!(json["by_period"][2]["period"], "evening");
        assert_eq!(json["undated"], 1);
        Ok(())
    }

    #[test]
    fn test_cli_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let output = tuneprint(&dir)
            .args(["enrich", "/nonexistent/rows.json"])
            .output()
            .expect("Failed to run enrich");

        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read track rows"));
    }
}
