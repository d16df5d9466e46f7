use crate::errors::{poisoned, AppError, AppResult};
use crate::models::{
    GrowthReport, MetricCounts, MetricsSnapshot, Note, PulseSettings, TrackedTrack, TrendStatus,
};
use crate::reconciler::NoteAuthority;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::BoxFuture;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("schema.sql");

const TRACK_COLUMNS: &str = "id, name, source_url, video_id, current_views, current_likes, current_comments,
     growth_json, status, recommendation, needs_review, review_reason, created_at, last_refreshed_at";

const NOTE_COLUMNS: &str = "id, content, category, pinned, sort_order, created_at, updated_at";

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.ensure_default_settings()?;
        Ok(db)
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| poisoned("database"))
    }

    // ─── Tracks ─────────────────────────────────────────────────────────────

    pub fn insert_track(&self, name: &str, source_url: &str, video_id: &str) -> AppResult<TrackedTrack> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let conn = self.lock()?;

        let existing: Option<String> = conn
            .query_row("SELECT id FROM tracks WHERE video_id = ?1", [video_id], |row| row.get(0))
            .optional()?;
        if let Some(existing) = existing {
            return Err(AppError::Conflict(format!(
                "Video {} is already tracked as {}",
                video_id, existing
            )));
        }

        // Chart columns are keyed by track name.
        let same_name: Option<String> = conn
            .query_row("SELECT id FROM tracks WHERE name = ?1", [name], |row| row.get(0))
            .optional()?;
        if let Some(same_name) = same_name {
            return Err(AppError::Conflict(format!(
                "A track named '{}' already exists ({})",
                name, same_name
            )));
        }

        let growth = crate::models::Growth7d::New;
        let status = TrendStatus::Steady;
        let recommendation = crate::growth::recommendation_for(status).to_string();
        conn.execute(
            "INSERT INTO tracks (id, name, source_url, video_id, growth_json, growth_7d, status, recommendation, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?8)",
            params![
                id,
                name,
                source_url,
                video_id,
                serde_json::to_string(&growth)?,
                status.as_str(),
                recommendation,
                format_time(now),
            ],
        )?;

        Ok(TrackedTrack {
            id,
            name: name.to_string(),
            source_url: source_url.to_string(),
            video_id: video_id.to_string(),
            current: MetricCounts::default(),
            growth_7d: growth,
            status,
            recommendation,
            needs_review: false,
            review_reason: None,
            created_at: now,
            last_refreshed_at: None,
        })
    }

    pub fn get_track(&self, track_id: &str) -> AppResult<Option<TrackedTrack>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM tracks WHERE id = ?1", TRACK_COLUMNS),
            [track_id],
            parse_track_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn list_tracks(&self) -> AppResult<Vec<TrackedTrack>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tracks ORDER BY created_at ASC, rowid ASC",
            TRACK_COLUMNS
        ))?;
        let rows = stmt.query_map([], parse_track_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn delete_track(&self, track_id: &str) -> AppResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM tracks WHERE id = ?1", [track_id])?;
        Ok(changed > 0)
    }

    pub fn flag_track_for_review(&self, track_id: &str, reason: &str) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE tracks SET needs_review = 1, review_reason = ?1 WHERE id = ?2",
            params![reason, track_id],
        )?;
        Ok(())
    }

    // ─── Snapshot log ───────────────────────────────────────────────────────

    // Snapshot append and cache update share one transaction; either both land or neither does.
    pub fn commit_refresh(&self, snapshot: &MetricsSnapshot, report: &GrowthReport) -> AppResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        append_snapshot(&tx, snapshot)?;
        update_track_cache(&tx, &snapshot.track_id, snapshot, report)?;
        tx.commit()?;
        Ok(())
    }

    pub fn list_snapshots(&self, track_id: &str, limit: Option<u32>) -> AppResult<Vec<MetricsSnapshot>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT track_id, captured_at, views, likes, comments
             FROM metric_snapshots WHERE track_id = ?1
             ORDER BY captured_at DESC LIMIT ?2",
        )?;
        let limit = limit.map(i64::from).unwrap_or(-1);
        let rows = stmt.query_map(params![track_id, limit], parse_snapshot_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        result.reverse();
        Ok(result)
    }

    // Snapshots from the newest one at or before `boundary` onward; everything when none is that old.
    pub fn list_snapshots_from_baseline(
        &self,
        track_id: &str,
        boundary: DateTime<Utc>,
    ) -> AppResult<Vec<MetricsSnapshot>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT track_id, captured_at, views, likes, comments
             FROM metric_snapshots
             WHERE track_id = ?1
               AND captured_at >= COALESCE(
                 (SELECT MAX(captured_at) FROM metric_snapshots WHERE track_id = ?1 AND captured_at <= ?2),
                 '')
             ORDER BY captured_at ASC",
        )?;
        let rows = stmt.query_map(params![track_id, format_time(boundary)], parse_snapshot_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn list_all_snapshots(&self) -> AppResult<Vec<MetricsSnapshot>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT track_id, captured_at, views, likes, comments
             FROM metric_snapshots ORDER BY captured_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map([], parse_snapshot_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // ─── Notes ──────────────────────────────────────────────────────────────

    pub fn insert_note(&self, content: &str, category: &str) -> AppResult<Note> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let conn = self.lock()?;
        let next_order: i64 = conn.query_row(
            "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM notes",
            [],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT INTO notes (id, content, category, pinned, sort_order, created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?5, ?5)",
            params![id, content, category, next_order, format_time(now)],
        )?;
        Ok(Note {
            id,
            content: content.to_string(),
            category: category.to_string(),
            pinned: false,
            sort_order: next_order,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn list_notes(&self) -> AppResult<Vec<Note>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM notes ORDER BY pinned DESC, sort_order ASC, id ASC",
            NOTE_COLUMNS
        ))?;
        let rows = stmt.query_map([], parse_note_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn update_note_order(&self, ids: &[String]) -> AppResult<()> {
        let now = format_time(Utc::now());
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let current: HashSet<String> = {
            let mut stmt = tx.prepare("SELECT id FROM notes")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut ids = HashSet::new();
            for row in rows {
                ids.insert(row?);
            }
            ids
        };
        let requested: HashSet<String> = ids.iter().cloned().collect();
        if requested.len() != ids.len() || requested != current {
            return Err(AppError::Conflict(
                "Note order does not match the current note set".to_string(),
            ));
        }

        for (index, id) in ids.iter().enumerate() {
            tx.execute(
                "UPDATE notes SET sort_order = ?1, updated_at = ?2 WHERE id = ?3",
                params![index as i64, now, id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn toggle_note_pinned(&self, note_id: &str) -> AppResult<bool> {
        let now = format_time(Utc::now());
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE notes SET pinned = 1 - pinned, updated_at = ?1 WHERE id = ?2",
            params![now, note_id],
        )?;
        if changed == 0 {
            return Err(AppError::Conflict(format!("Note {} no longer exists", note_id)));
        }
        let pinned: i64 = conn.query_row("SELECT pinned FROM notes WHERE id = ?1", [note_id], |row| row.get(0))?;
        Ok(pinned != 0)
    }

    // ─── Settings ───────────────────────────────────────────────────────────

    pub fn get_settings(&self) -> AppResult<PulseSettings> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = 'app'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(serde_json::from_str::<PulseSettings>(&raw).unwrap_or_default()),
            None => Ok(PulseSettings::default()),
        }
    }

    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<PulseSettings> {
        let current = self.get_settings()?;
        let mut merged = serde_json::to_value(current)?;
        merge_json(&mut merged, update);
        let settings: PulseSettings = serde_json::from_value(merged)
            .map_err(|error| AppError::InvalidInput(format!("Invalid settings: {}", error)))?;
        if settings.refresh_concurrency == 0 {
            return Err(AppError::InvalidInput(
                "refreshConcurrency must be at least 1".to_string(),
            ));
        }

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO settings (key, value_json, updated_at)
             VALUES ('app', ?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![serde_json::to_string(&settings)?, format_time(Utc::now())],
        )?;

        Ok(settings)
    }

    fn ensure_default_settings(&self) -> AppResult<()> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(1) FROM settings WHERE key = 'app'", [], |row| row.get(0))?;
        if count == 0 {
            conn.execute(
                "INSERT INTO settings (key, value_json, updated_at) VALUES ('app', ?1, ?2)",
                params![
                    serde_json::to_string(&PulseSettings::default())?,
                    format_time(Utc::now())
                ],
            )?;
        }
        Ok(())
    }
}

impl NoteAuthority for Database {
    fn fetch_notes(&self) -> BoxFuture<'_, AppResult<Vec<Note>>> {
        Box::pin(async move { self.list_notes() })
    }

    fn update_note_order<'a>(&'a self, ids: &'a [String]) -> BoxFuture<'a, AppResult<()>> {
        Box::pin(async move { Database::update_note_order(self, ids) })
    }

    fn toggle_note_pinned<'a>(&'a self, note_id: &'a str) -> BoxFuture<'a, AppResult<bool>> {
        Box::pin(async move { Database::toggle_note_pinned(self, note_id) })
    }
}

fn append_snapshot(tx: &Transaction<'_>, snapshot: &MetricsSnapshot) -> AppResult<()> {
    let counts = snapshot.counts;
    if counts.views < 0 || counts.likes < 0 || counts.comments < 0 {
        return Err(AppError::DataQuality(format!(
            "Negative counters for track {}: {:?}",
            snapshot.track_id, counts
        )));
    }

    let latest: Option<String> = tx.query_row(
        "SELECT MAX(captured_at) FROM metric_snapshots WHERE track_id = ?1",
        [&snapshot.track_id],
        |row| row.get(0),
    )?;
    let captured_at = format_time(snapshot.captured_at);
    if let Some(latest) = latest {
        if captured_at <= latest {
            return Err(AppError::DataQuality(format!(
                "Snapshot for track {} at {} is not after the latest snapshot at {}",
                snapshot.track_id, captured_at, latest
            )));
        }
    }

    tx.execute(
        "INSERT INTO metric_snapshots (track_id, captured_at, views, likes, comments)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            snapshot.track_id,
            captured_at,
            counts.views,
            counts.likes,
            counts.comments
        ],
    )?;
    Ok(())
}

fn update_track_cache(
    tx: &Transaction<'_>,
    track_id: &str,
    snapshot: &MetricsSnapshot,
    report: &GrowthReport,
) -> AppResult<()> {
    let changed = tx.execute(
        "UPDATE tracks SET current_views = ?1, current_likes = ?2, current_comments = ?3,
           growth_json = ?4, growth_7d = ?5, status = ?6, recommendation = ?7,
           needs_review = 0, review_reason = NULL, last_refreshed_at = ?8
         WHERE id = ?9",
        params![
            snapshot.counts.views,
            snapshot.counts.likes,
            snapshot.counts.comments,
            serde_json::to_string(&report.growth_7d)?,
            report.growth_7d.percent_or_zero(),
            report.status.as_str(),
            report.recommendation,
            format_time(snapshot.captured_at),
            track_id,
        ],
    )?;
    if changed == 0 {
        return Err(AppError::NotFound(format!("Track not found: {}", track_id)));
    }
    Ok(())
}

fn parse_track_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrackedTrack> {
    Ok(TrackedTrack {
        id: row.get(0)?,
        name: row.get(1)?,
        source_url: row.get(2)?,
        video_id: row.get(3)?,
        current: MetricCounts::new(row.get(4)?, row.get(5)?, row.get(6)?),
        growth_7d: serde_json::from_str(&row.get::<_, String>(7)?).unwrap_or_default(),
        status: TrendStatus::parse(&row.get::<_, String>(8)?).unwrap_or(TrendStatus::Steady),
        recommendation: row.get(9)?,
        needs_review: row.get::<_, i64>(10)? != 0,
        review_reason: row.get(11)?,
        created_at: parse_time(&row.get::<_, String>(12)?)?,
        last_refreshed_at: row
            .get::<_, Option<String>>(13)?
            .map(|raw| parse_time(&raw))
            .transpose()?,
    })
}

fn parse_snapshot_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MetricsSnapshot> {
    Ok(MetricsSnapshot {
        track_id: row.get(0)?,
        captured_at: parse_time(&row.get::<_, String>(1)?)?,
        counts: MetricCounts::new(row.get(2)?, row.get(3)?, row.get(4)?),
    })
}

fn parse_note_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        content: row.get(1)?,
        category: row.get(2)?,
        pinned: row.get::<_, i64>(3)? != 0,
        sort_order: row.get(4)?,
        created_at: parse_time(&row.get::<_, String>(5)?)?,
        updated_at: parse_time(&row.get::<_, String>(6)?)?,
    })
}

// Fixed-width so that text order in SQLite matches chronological order.
fn format_time(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
            )
        })
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(target_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Database;
    use crate::errors::AppError;
    use crate::growth::compute_growth;
    use crate::models::{MetricCounts, MetricsSnapshot};
    use chrono::{Duration, Utc};

    fn open() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        (dir, db)
    }

    fn snapshot(track_id: &str, at: chrono::DateTime<Utc>, views: i64) -> MetricsSnapshot {
        MetricsSnapshot {
            track_id: track_id.to_string(),
            captured_at: at,
            counts: MetricCounts::new(views, views / 10, views / 100),
        }
    }

    #[test]
    fn commit_refresh_appends_snapshot_and_updates_cache_together() {
        let (_dir, db) = open();
        let track = db.insert_track("Song", "https://youtu.be/abcdefghijk", "abcdefghijk").expect("track");

        let first = snapshot(&track.id, Utc::now() - Duration::days(8), 1_000);
        let report = compute_growth(std::slice::from_ref(&first), first.captured_at);
        db.commit_refresh(&first, &report).expect("commit first");

        let loaded = db.get_track(&track.id).expect("get").expect("exists");
        assert_eq!(loaded.current, first.counts);
        assert_eq!(loaded.last_refreshed_at, Some(first.captured_at));

        let history = db.list_snapshots(&track.id, None).expect("history");
        assert_eq!(history, vec![first]);
    }

    #[test]
    fn out_of_order_snapshot_is_rejected_and_prior_state_kept() {
        let (_dir, db) = open();
        let track = db.insert_track("Song", "https://youtu.be/abcdefghijk", "abcdefghijk").expect("track");
        let now = Utc::now();

        let latest = snapshot(&track.id, now, 2_000);
        let report = compute_growth(std::slice::from_ref(&latest), now);
        db.commit_refresh(&latest, &report).expect("commit");

        let stale = snapshot(&track.id, now - Duration::hours(1), 1_500);
        let err = db.commit_refresh(&stale, &report).expect_err("stale snapshot rejected");
        assert!(matches!(err, AppError::DataQuality(_)));

        let loaded = db.get_track(&track.id).expect("get").expect("exists");
        assert_eq!(loaded.current.views, 2_000);
        assert_eq!(db.list_snapshots(&track.id, None).expect("history").len(), 1);
    }

    #[test]
    fn negative_counts_never_reach_the_log() {
        let (_dir, db) = open();
        let track = db.insert_track("Song", "https://youtu.be/abcdefghijk", "abcdefghijk").expect("track");
        let bad = MetricsSnapshot {
            track_id: track.id.clone(),
            captured_at: Utc::now(),
            counts: MetricCounts::new(-1, 0, 0),
        };
        let report = compute_growth(&[], Utc::now());
        let err = db.commit_refresh(&bad, &report).expect_err("negative rejected");
        assert!(matches!(err, AppError::DataQuality(_)));
        assert!(db.list_snapshots(&track.id, None).expect("history").is_empty());
    }

    #[test]
    fn cache_update_for_missing_track_rolls_back_snapshot() {
        let (_dir, db) = open();
        let orphan = snapshot("missing", Utc::now(), 10);
        let report = compute_growth(std::slice::from_ref(&orphan), orphan.captured_at);
        assert!(db.commit_refresh(&orphan, &report).is_err());
        assert!(db.list_all_snapshots().expect("all").is_empty());
    }

    #[test]
    fn deleting_track_cascades_snapshots() {
        let (_dir, db) = open();
        let track = db.insert_track("Song", "https://youtu.be/abcdefghijk", "abcdefghijk").expect("track");
        let snap = snapshot(&track.id, Utc::now(), 10);
        let report = compute_growth(std::slice::from_ref(&snap), snap.captured_at);
        db.commit_refresh(&snap, &report).expect("commit");

        assert!(db.delete_track(&track.id).expect("delete"));
        assert!(db.list_all_snapshots().expect("all").is_empty());
        assert!(db.get_track(&track.id).expect("get").is_none());
    }

    #[test]
    fn duplicate_video_is_a_conflict() {
        let (_dir, db) = open();
        db.insert_track("A", "https://youtu.be/abcdefghijk", "abcdefghijk").expect("first");
        let err = db
            .insert_track("B", "https://www.youtube.com/watch?v=abcdefghijk", "abcdefghijk")
            .expect_err("duplicate");
        assert!(err.is_conflict());
    }

    #[test]
    fn duplicate_name_is_a_conflict() {
        let (_dir, db) = open();
        db.insert_track("Intro", "https://youtu.be/abcdefghijk", "abcdefghijk").expect("first");
        let err = db
            .insert_track("Intro", "https://youtu.be/bbbbbbbbbbb", "bbbbbbbbbbb")
            .expect_err("same name");
        assert!(err.is_conflict());
        assert_eq!(db.list_tracks().expect("tracks").len(), 1);
        db.insert_track("Intro (Live)", "https://youtu.be/bbbbbbbbbbb", "bbbbbbbbbbb")
            .expect("distinct name");
    }

    #[test]
    fn baseline_query_starts_at_newest_snapshot_before_boundary() {
        let (_dir, db) = open();
        let track = db.insert_track("Song", "https://youtu.be/abcdefghijk", "abcdefghijk").expect("track");
        let now = Utc::now();
        for (days_ago, views) in [(20, 100), (10, 200), (8, 300), (3, 400), (0, 500)] {
            let snap = snapshot(&track.id, now - Duration::days(days_ago), views);
            let report = compute_growth(std::slice::from_ref(&snap), snap.captured_at);
            db.commit_refresh(&snap, &report).expect("commit");
        }

        let bounded = db
            .list_snapshots_from_baseline(&track.id, now - Duration::days(7))
            .expect("bounded");
        let views: Vec<i64> = bounded.iter().map(|s| s.counts.views).collect();
        assert_eq!(views, vec![300, 400, 500]);

        let full = db.list_snapshots(&track.id, None).expect("full");
        assert_eq!(
            compute_growth(&bounded, now),
            compute_growth(&full, now)
        );

        let young = db
            .list_snapshots_from_baseline(&track.id, now - Duration::days(30))
            .expect("no baseline");
        assert_eq!(young.len(), 5);
    }

    #[test]
    fn list_snapshots_limit_keeps_most_recent_in_ascending_order() {
        let (_dir, db) = open();
        let track = db.insert_track("Song", "https://youtu.be/abcdefghijk", "abcdefghijk").expect("track");
        let base = Utc::now() - Duration::days(3);
        for day in 0..3 {
            let snap = snapshot(&track.id, base + Duration::days(day), 100 * (day + 1));
            let report = compute_growth(std::slice::from_ref(&snap), snap.captured_at);
            db.commit_refresh(&snap, &report).expect("commit");
        }
        let recent = db.list_snapshots(&track.id, Some(2)).expect("recent");
        let views: Vec<i64> = recent.iter().map(|s| s.counts.views).collect();
        assert_eq!(views, vec![200, 300]);
    }

    #[test]
    fn note_order_update_is_dense_and_checks_note_set() {
        let (_dir, db) = open();
        let a = db.insert_note("a", "general").expect("a");
        let b = db.insert_note("b", "general").expect("b");
        let c = db.insert_note("c", "ideas").expect("c");

        db.update_note_order(&[c.id.clone(), a.id.clone(), b.id.clone()])
            .expect("reorder");
        let notes = db.list_notes().expect("notes");
        let ids: Vec<&str> = notes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec![c.id.as_str(), a.id.as_str(), b.id.as_str()]);
        let orders: Vec<i64> = notes.iter().map(|n| n.sort_order).collect();
        assert_eq!(orders, vec![0, 1, 2]);

        let err = db
            .update_note_order(&[a.id.clone(), b.id.clone()])
            .expect_err("missing id");
        assert!(err.is_conflict());
    }

    #[test]
    fn toggling_pin_moves_note_into_pinned_partition() {
        let (_dir, db) = open();
        let a = db.insert_note("a", "general").expect("a");
        let b = db.insert_note("b", "general").expect("b");

        assert!(db.toggle_note_pinned(&b.id).expect("pin"));
        let notes = db.list_notes().expect("notes");
        assert_eq!(notes[0].id, b.id);
        assert_eq!(notes[1].id, a.id);

        assert!(!db.toggle_note_pinned(&b.id).expect("unpin"));
        assert!(db.toggle_note_pinned("gone").expect_err("missing").is_conflict());
    }

    #[test]
    fn settings_merge_partial_updates() {
        let (_dir, db) = open();
        let updated = db
            .update_settings(serde_json::json!({ "refreshConcurrency": 2 }))
            .expect("update");
        assert_eq!(updated.refresh_concurrency, 2);
        assert_eq!(updated.provider_timeout_ms, 10_000);
        assert_eq!(db.get_settings().expect("settings"), updated);

        assert!(db
            .update_settings(serde_json::json!({ "refreshConcurrency": 0 }))
            .is_err());
    }
}
