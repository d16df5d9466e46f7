use crate::chart::{build_series, legend_for, sort_for_aggregation};
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::growth;
use crate::models::{
    BooleanResponse, CategoryFilter, ChartMetric, ChartSeries, CreateNotePayload, GrowthReport, MetricsSnapshot,
    Note, NoteAction, PulseSettings, RefreshResult, RegisterTrackPayload, TrackedTrack,
};
use crate::provider::video_id::resolve_video_id;
use crate::provider::MetricsProvider;
use crate::reconciler::{apply_optimistic, NoteBoard, OptimisticUpdate, Reconciliation};
use crate::refresh::RefreshCoordinator;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_NOTE_CATEGORY: &str = "general";
// Chart points flatten per-track values next to these keys.
const RESERVED_TRACK_NAMES: [&str; 2] = ["bucket", "label"];

pub struct PulseEngine {
    db: Arc<Database>,
    refresh: RefreshCoordinator,
    data_dir: PathBuf,
}

impl PulseEngine {
    pub fn new(data_dir: PathBuf, provider: Arc<dyn MetricsProvider>) -> AppResult<Arc<Self>> {
        std::fs::create_dir_all(&data_dir)?;
        let db_path = data_dir.join("pulse.sqlite");
        let db = Arc::new(Database::new(&db_path)?);
        let refresh = RefreshCoordinator::new(db.clone(), provider.clone());

        let flagged = db.list_tracks()?.iter().filter(|track| track.needs_review).count();
        if flagged > 0 {
            tracing::warn!(count = flagged, "tracks awaiting review on startup");
        }
        tracing::info!(data_dir = %data_dir.display(), provider = provider.name(), "pulse engine ready");

        Ok(Arc::new(Self { db, refresh, data_dir }))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    // ─── Tracks ─────────────────────────────────────────────────────────────

    pub fn register_track(&self, payload: RegisterTrackPayload) -> AppResult<TrackedTrack> {
        let name = payload.name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Track name is required".to_string()));
        }
        if RESERVED_TRACK_NAMES.contains(&name) {
            return Err(AppError::InvalidInput(format!(
                "'{}' is reserved for chart point fields",
                name
            )));
        }
        let source_url = payload.source_url.trim();
        let video_id = resolve_video_id(source_url)?;
        let track = self.db.insert_track(name, source_url, &video_id)?;
        tracing::info!(track_id = %track.id, video_id = %track.video_id, "track registered");
        Ok(track)
    }

    pub fn remove_track(&self, track_id: &str) -> AppResult<BooleanResponse> {
        let _permit = self.refresh.reserve_track(track_id)?;
        let success = self.db.delete_track(track_id)?;
        if success {
            tracing::info!(track_id = %track_id, "track removed");
        }
        Ok(BooleanResponse { success })
    }

    pub fn list_tracks(&self) -> AppResult<Vec<TrackedTrack>> {
        self.db.list_tracks()
    }

    pub fn get_track(&self, track_id: &str) -> AppResult<TrackedTrack> {
        self.db
            .get_track(track_id)?
            .ok_or_else(|| AppError::NotFound(format!("Track not found: {}", track_id)))
    }

    pub fn list_snapshots(&self, track_id: &str, limit: Option<u32>) -> AppResult<Vec<MetricsSnapshot>> {
        self.get_track(track_id)?;
        self.db.list_snapshots(track_id, limit)
    }

    // ─── Refresh & growth ───────────────────────────────────────────────────

    pub async fn refresh_all(&self) -> AppResult<RefreshResult> {
        self.refresh.refresh_all().await
    }

    pub async fn refresh_track(&self, track_id: &str) -> AppResult<RefreshResult> {
        self.refresh.refresh_track(track_id).await
    }

    pub fn compute_growth(&self, track_id: &str) -> AppResult<GrowthReport> {
        self.get_track(track_id)?;
        let history = self.db.list_snapshots(track_id, None)?;
        Ok(growth::compute_growth(&history, Utc::now()))
    }

    pub fn get_chart_series(&self, metric: ChartMetric) -> AppResult<ChartSeries> {
        let tracks = self.db.list_tracks()?;
        let mut snapshots = self.db.list_all_snapshots()?;
        sort_for_aggregation(&mut snapshots);
        Ok(ChartSeries {
            metric,
            points: build_series(&snapshots, &tracks, metric),
            legend: legend_for(&tracks),
        })
    }

    // ─── Notes ──────────────────────────────────────────────────────────────

    pub fn create_note(&self, payload: CreateNotePayload) -> AppResult<Note> {
        let content = payload.content.trim();
        if content.is_empty() {
            return Err(AppError::InvalidInput("Note content is required".to_string()));
        }
        let category = payload
            .category
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_NOTE_CATEGORY);
        self.db.insert_note(content, category)
    }

    pub fn list_notes(&self, filter: &CategoryFilter) -> AppResult<Vec<Note>> {
        Ok(self
            .db
            .list_notes()?
            .into_iter()
            .filter(|note| filter.matches(note))
            .collect())
    }

    pub fn note_board(&self, filter: CategoryFilter) -> AppResult<NoteBoard> {
        Ok(NoteBoard::new(self.db.list_notes()?, filter))
    }

    pub fn apply_note_action(&self, board: &NoteBoard, action: NoteAction) -> AppResult<Option<OptimisticUpdate>> {
        apply_optimistic(board, action)
    }

    pub async fn commit_note_action(&self, update: OptimisticUpdate) -> Reconciliation {
        let outcome = update.commit(self.db.as_ref()).await;
        tracing::info!(state = ?outcome.state, refetched = outcome.refetched, "note action settled");
        outcome
    }

    // ─── Settings ───────────────────────────────────────────────────────────

    pub fn get_settings(&self) -> AppResult<PulseSettings> {
        self.db.get_settings()
    }

    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<PulseSettings> {
        self.db.update_settings(update)
    }
}

#[cfg(test)]
mod tests {
    use super::PulseEngine;
    use crate::errors::AppError;
    use crate::models::{
        ActionState, CategoryFilter, ChartMetric, CreateNotePayload, NoteAction, RegisterTrackPayload,
    };
    use crate::provider::{MetricsProvider, ProviderFailure};
    use futures::future::BoxFuture;
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct StaticProvider;

    impl MetricsProvider for StaticProvider {
        fn name(&self) -> &'static str {
            "static"
        }

        fn fetch_metrics<'a>(&'a self, _video_id: &'a str) -> BoxFuture<'a, Result<Value, ProviderFailure>> {
            Box::pin(async { Ok(json!({ "views": 1000, "likes": "40", "comments": 3 })) })
        }
    }

    fn engine() -> (tempfile::TempDir, Arc<PulseEngine>) {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = PulseEngine::new(dir.path().join("data"), Arc::new(StaticProvider)).expect("engine");
        (dir, engine)
    }

    fn payload(name: &str, url: &str) -> RegisterTrackPayload {
        RegisterTrackPayload {
            name: name.to_string(),
            source_url: url.to_string(),
        }
    }

    #[test]
    fn register_resolves_video_id_and_rejects_bad_input() {
        let (_dir, engine) = engine();
        let track = engine
            .register_track(payload("  Night Drive ", "https://www.youtube.com/watch?v=dQw4w9WgXcQ"))
            .expect("register");
        assert_eq!(track.name, "Night Drive");
        assert_eq!(track.video_id, "dQw4w9WgXcQ");

        let err = engine
            .register_track(payload("", "https://youtu.be/dQw4w9WgXcQ"))
            .expect_err("empty name");
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = engine
            .register_track(payload("Other", "https://example.com/song.mp3"))
            .expect_err("bad url");
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn chart_keeps_one_column_per_track() {
        let (_dir, engine) = engine();
        engine
            .register_track(payload("Intro", "https://youtu.be/AAAAAAAAAAA"))
            .expect("first");
        let err = engine
            .register_track(payload("Intro", "https://youtu.be/BBBBBBBBBBB"))
            .expect_err("same name");
        assert!(err.is_conflict());
        engine
            .register_track(payload("Intro (Reprise)", "https://youtu.be/BBBBBBBBBBB"))
            .expect("second");

        let result = engine.refresh_all().await.expect("refresh");
        assert_eq!(result.succeeded.len(), 2);

        let chart = engine.get_chart_series(ChartMetric::Views).expect("chart");
        let columns: std::collections::BTreeSet<&str> = chart
            .points
            .iter()
            .flat_map(|point| point.values.keys().map(String::as_str))
            .collect();
        assert_eq!(columns.into_iter().collect::<Vec<_>>(), vec!["Intro", "Intro (Reprise)"]);
        assert_eq!(chart.legend.len(), 2);
    }

    #[test]
    fn reserved_chart_field_names_are_rejected() {
        let (_dir, engine) = engine();
        for name in ["label", " bucket "] {
            let err = engine
                .register_track(payload(name, "https://youtu.be/AAAAAAAAAAA"))
                .expect_err("reserved");
            assert!(matches!(err, AppError::InvalidInput(_)), "{}", name);
        }
        engine
            .register_track(payload("Label Love", "https://youtu.be/AAAAAAAAAAA"))
            .expect("ordinary name");
    }

    #[test]
    fn remove_waits_out_an_in_flight_refresh() {
        let (_dir, engine) = engine();
        let track = engine
            .register_track(payload("Night Drive", "https://youtu.be/dQw4w9WgXcQ"))
            .expect("register");

        let permit = engine.refresh.reserve_track(&track.id).expect("reserve");
        let err = engine.remove_track(&track.id).expect_err("in flight");
        assert!(matches!(err, AppError::RefreshInProgress(_)));
        assert!(engine.get_track(&track.id).is_ok());

        drop(permit);
        assert!(engine.remove_track(&track.id).expect("remove").success);
        let permit = engine.refresh.reserve_track(&track.id).expect("released after delete");
        drop(permit);
    }

    #[test]
    fn unknown_track_lookups_are_not_found() {
        let (_dir, engine) = engine();
        assert!(matches!(engine.get_track("missing"), Err(AppError::NotFound(_))));
        assert!(matches!(engine.compute_growth("missing"), Err(AppError::NotFound(_))));
        assert!(matches!(engine.list_snapshots("missing", None), Err(AppError::NotFound(_))));
        assert!(!engine.remove_track("missing").expect("remove").success);
    }

    #[tokio::test]
    async fn refresh_feeds_growth_and_chart() {
        let (_dir, engine) = engine();
        let track = engine
            .register_track(payload("Night Drive", "https://youtu.be/dQw4w9WgXcQ"))
            .expect("register");

        let result = engine.refresh_all().await.expect("refresh");
        assert_eq!(result.succeeded, vec![track.id.clone()]);

        let stored = engine.get_track(&track.id).expect("track");
        assert_eq!(stored.current.views, 1000);
        assert_eq!(stored.current.likes, 40);
        assert!(stored.last_refreshed_at.is_some());

        let report = engine.compute_growth(&track.id).expect("growth");
        assert!(report.growth_7d.percent().is_none());

        let chart = engine.get_chart_series(ChartMetric::Likes).expect("chart");
        assert_eq!(chart.points.len(), 1);
        assert_eq!(chart.points[0].values.get("Night Drive"), Some(&40));
        assert_eq!(chart.legend.len(), 1);
    }

    #[tokio::test]
    async fn note_actions_commit_against_the_database() {
        let (_dir, engine) = engine();
        let mut ids = Vec::new();
        for (content, category) in [("a", None), ("b", Some("ideas")), ("c", Some(" ")), ("d", None)] {
            let note = engine
                .create_note(CreateNotePayload {
                    content: content.to_string(),
                    category: category.map(str::to_string),
                })
                .expect("note");
            ids.push(note.id);
        }
        assert!(engine
            .create_note(CreateNotePayload {
                content: "   ".to_string(),
                category: None,
            })
            .is_err());

        let ideas = engine
            .list_notes(&CategoryFilter::Only("ideas".to_string()))
            .expect("filtered");
        assert_eq!(ideas.len(), 1);

        let board = engine.note_board(CategoryFilter::All).expect("board");
        let update = engine
            .apply_note_action(
                &board,
                NoteAction::Reorder {
                    dragged_id: ids[3].clone(),
                    target_id: ids[0].clone(),
                },
            )
            .expect("apply")
            .expect("update");
        let outcome = engine.commit_note_action(update).await;
        assert_eq!(outcome.state, ActionState::Committed);

        let listed: Vec<String> = engine
            .list_notes(&CategoryFilter::All)
            .expect("notes")
            .into_iter()
            .map(|note| note.id)
            .collect();
        assert_eq!(listed, vec![ids[3].clone(), ids[0].clone(), ids[1].clone(), ids[2].clone()]);
    }

    #[test]
    fn settings_round_through_the_engine() {
        let (_dir, engine) = engine();
        assert_eq!(engine.get_settings().expect("settings").refresh_concurrency, 4);
        let updated = engine
            .update_settings(json!({ "refreshConcurrency": 2 }))
            .expect("update");
        assert_eq!(updated.refresh_concurrency, 2);
        assert_eq!(updated.transient_retries, 1);
    }
}
