use crate::errors::{poisoned, AppError, AppResult};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct InFlightState {
    cycle_active: bool,
    tracks: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct InFlightRegistry {
    state: Arc<Mutex<InFlightState>>,
}

// Held for the duration of a refresh; dropping it releases the reservation.
pub struct RefreshPermit {
    state: Arc<Mutex<InFlightState>>,
    track_ids: Vec<String>,
    cycle: bool,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_cycle(&self, track_ids: &[String]) -> AppResult<RefreshPermit> {
        self.reserve(track_ids, true)
    }

    pub fn begin_track(&self, track_id: &str) -> AppResult<RefreshPermit> {
        self.reserve(&[track_id.to_string()], false)
    }

    pub fn is_refreshing(&self, track_id: &str) -> bool {
        self.state
            .lock()
            .map(|state| state.tracks.contains(track_id))
            .unwrap_or(false)
    }

    fn reserve(&self, track_ids: &[String], cycle: bool) -> AppResult<RefreshPermit> {
        let mut state = self.state.lock().map_err(|_| poisoned("refresh registry"))?;
        if cycle && state.cycle_active {
            return Err(AppError::RefreshInProgress(
                "A refresh cycle is already running".to_string(),
            ));
        }
        if let Some(busy) = track_ids.iter().find(|id| state.tracks.contains(*id)) {
            return Err(AppError::RefreshInProgress(format!(
                "Track {} is already being refreshed",
                busy
            )));
        }

        if cycle {
            state.cycle_active = true;
        }
        state.tracks.extend(track_ids.iter().cloned());

        Ok(RefreshPermit {
            state: self.state.clone(),
            track_ids: track_ids.to_vec(),
            cycle,
        })
    }
}

impl Drop for RefreshPermit {
    fn drop(&mut self) {
        let Ok(mut state) = self.state.lock() else {
            tracing::error!("refresh registry mutex poisoned while releasing permit");
            return;
        };
        if self.cycle {
            state.cycle_active = false;
        }
        for id in &self.track_ids {
            state.tracks.remove(id);
        }
    }
}
