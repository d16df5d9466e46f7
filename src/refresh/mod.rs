pub mod inflight;

use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::growth::{compute_growth, GROWTH_WINDOW_DAYS};
use crate::models::{
    FailureClass, FailureReason, MetricsSnapshot, PulseSettings, RefreshFailure, RefreshResult, TrackedTrack,
};
use crate::provider::ingest::parse_metric_payload;
use crate::provider::MetricsProvider;
use chrono::{Duration as ChronoDuration, Utc};
use futures::stream::{self, StreamExt};
use inflight::{InFlightRegistry, RefreshPermit};
use std::sync::Arc;
use tokio::time::Duration;

pub struct RefreshCoordinator {
    db: Arc<Database>,
    provider: Arc<dyn MetricsProvider>,
    in_flight: InFlightRegistry,
}

impl RefreshCoordinator {
    pub fn new(db: Arc<Database>, provider: Arc<dyn MetricsProvider>) -> Self {
        Self {
            db,
            provider,
            in_flight: InFlightRegistry::new(),
        }
    }

    // Keeps refreshes off a track while the caller mutates it.
    pub fn reserve_track(&self, track_id: &str) -> AppResult<RefreshPermit> {
        self.in_flight.begin_track(track_id)
    }

    pub async fn refresh_all(&self) -> AppResult<RefreshResult> {
        let tracks = self.db.list_tracks()?;
        let track_ids = tracks.iter().map(|track| track.id.clone()).collect::<Vec<_>>();
        let _permit = self.in_flight.begin_cycle(&track_ids)?;
        let settings = self.db.get_settings()?;

        tracing::info!(
            tracks = tracks.len(),
            provider = self.provider.name(),
            concurrency = settings.refresh_concurrency,
            "refresh cycle started"
        );
        let result = self.refresh_tracks(tracks, &settings).await;
        tracing::info!(
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            "refresh cycle finished"
        );
        Ok(result)
    }

    pub async fn refresh_track(&self, track_id: &str) -> AppResult<RefreshResult> {
        let track = self
            .db
            .get_track(track_id)?
            .ok_or_else(|| AppError::NotFound(format!("Track not found: {}", track_id)))?;
        let _permit = self.in_flight.begin_track(&track.id)?;
        let settings = self.db.get_settings()?;
        Ok(self.refresh_tracks(vec![track], &settings).await)
    }

    // Waits for every per-track future to settle; results come back in track order.
    async fn refresh_tracks(&self, tracks: Vec<TrackedTrack>, settings: &PulseSettings) -> RefreshResult {
        let limit = settings.refresh_concurrency.max(1);
        let mut outcomes = stream::iter(tracks.into_iter().enumerate())
            .map(|(index, track)| async move {
                let outcome = self.refresh_one(&track, settings).await;
                (index, track.id, outcome)
            })
            .buffer_unordered(limit)
            .collect::<Vec<_>>()
            .await;
        outcomes.sort_by_key(|(index, _, _)| *index);

        let mut result = RefreshResult::default();
        for (_, track_id, outcome) in outcomes {
            match outcome {
                Ok(()) => result.succeeded.push(track_id),
                Err(reason) => result.failed.push(RefreshFailure { track_id, reason }),
            }
        }
        result
    }

    async fn refresh_one(&self, track: &TrackedTrack, settings: &PulseSettings) -> Result<(), FailureReason> {
        let payload = match self.fetch_with_retry(&track.video_id, settings).await {
            Ok(payload) => payload,
            Err(reason) => {
                self.record_failure(track, &reason);
                return Err(reason);
            }
        };

        let counts = match parse_metric_payload(&payload) {
            Ok(counts) => counts,
            Err(detail) => {
                let reason = FailureReason::InvalidPayload(detail);
                self.record_failure(track, &reason);
                return Err(reason);
            }
        };

        let snapshot = MetricsSnapshot {
            track_id: track.id.clone(),
            captured_at: Utc::now(),
            counts,
        };

        let boundary = snapshot.captured_at - ChronoDuration::days(GROWTH_WINDOW_DAYS);
        let mut history = self
            .db
            .list_snapshots_from_baseline(&track.id, boundary)
            .map_err(|error| FailureReason::Storage(error.to_string()))?;
        history.push(snapshot.clone());
        let report = compute_growth(&history, snapshot.captured_at);

        if let Err(error) = self.db.commit_refresh(&snapshot, &report) {
            let reason = match error {
                AppError::DataQuality(detail) => FailureReason::InvalidPayload(detail),
                other => FailureReason::Storage(other.to_string()),
            };
            self.record_failure(track, &reason);
            return Err(reason);
        }

        tracing::debug!(
            track_id = %track.id,
            views = snapshot.counts.views,
            status = report.status.as_str(),
            "track refreshed"
        );
        Ok(())
    }

    async fn fetch_with_retry(
        &self,
        video_id: &str,
        settings: &PulseSettings,
    ) -> Result<serde_json::Value, FailureReason> {
        let timeout = Duration::from_millis(settings.provider_timeout_ms);
        let mut attempt = 0u32;
        loop {
            let outcome = match tokio::time::timeout(timeout, self.provider.fetch_metrics(video_id)).await {
                Ok(result) => result.map_err(FailureReason::from),
                Err(_) => Err(FailureReason::Timeout),
            };

            match outcome {
                Err(reason) if reason.is_transient() && attempt < settings.transient_retries => {
                    attempt += 1;
                    tracing::debug!(video_id = %video_id, attempt, reason = %reason, "retrying provider call");
                    let backoff = settings.retry_backoff_ms.saturating_mul(u64::from(attempt));
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                other => return other,
            }
        }
    }

    fn record_failure(&self, track: &TrackedTrack, reason: &FailureReason) {
        match reason.class() {
            FailureClass::Transient => {
                tracing::warn!(track_id = %track.id, reason = %reason, "transient provider failure");
            }
            FailureClass::Permanent => {
                tracing::warn!(track_id = %track.id, reason = %reason, "flagging track for review");
                if let Err(error) = self.db.flag_track_for_review(&track.id, &reason.to_string()) {
                    tracing::error!(track_id = %track.id, error = %error, "failed to flag track for review");
                }
            }
            FailureClass::DataQuality => {
                tracing::error!(track_id = %track.id, reason = %reason, "rejected metrics at ingestion");
            }
            FailureClass::Internal => {
                tracing::error!(track_id = %track.id, reason = %reason, "track refresh failed");
            }
        }
    }
}
