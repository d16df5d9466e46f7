use crate::errors::{AppError, AppResult};
use crate::models::{ActionState, CategoryFilter, Note, NoteAction};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

// Server-side authority for note order and pin state.
pub trait NoteAuthority: Send + Sync {
    fn fetch_notes(&self) -> BoxFuture<'_, AppResult<Vec<Note>>>;
    fn update_note_order<'a>(&'a self, ids: &'a [String]) -> BoxFuture<'a, AppResult<()>>;
    fn toggle_note_pinned<'a>(&'a self, note_id: &'a str) -> BoxFuture<'a, AppResult<bool>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteBoard {
    pub notes: Vec<Note>,
    pub filter: CategoryFilter,
}

impl NoteBoard {
    pub fn new(mut notes: Vec<Note>, filter: CategoryFilter) -> Self {
        sort_for_display(&mut notes);
        Self { notes, filter }
    }

    pub fn visible(&self) -> Vec<&Note> {
        self.notes.iter().filter(|note| self.filter.matches(note)).collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.notes.iter().map(|note| note.id.clone()).collect()
    }

    fn find(&self, note_id: &str) -> AppResult<&Note> {
        self.notes
            .iter()
            .find(|note| note.id == note_id)
            .ok_or_else(|| AppError::NotFound(format!("Note not found: {}", note_id)))
    }
}

pub fn sort_for_display(notes: &mut [Note]) {
    notes.sort_by(|a, b| {
        b.pinned
            .cmp(&a.pinned)
            .then(a.sort_order.cmp(&b.sort_order))
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimisticUpdate {
    pub action: NoteAction,
    pub state: ActionState,
    before: NoteBoard,
    preview: NoteBoard,
    predicted_pinned: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub state: ActionState,
    pub board: NoteBoard,
    pub refetched: bool,
    pub error: Option<String>,
}

// Returns `None` when the action has no effect (self-drop, filtered view, cross-partition drop).
pub fn apply_optimistic(board: &NoteBoard, action: NoteAction) -> AppResult<Option<OptimisticUpdate>> {
    let (preview, predicted_pinned) = match &action {
        NoteAction::TogglePin { note_id } => {
            let current = board.find(note_id)?.pinned;
            let mut notes = board.notes.clone();
            for note in notes.iter_mut().filter(|note| note.id == *note_id) {
                note.pinned = !current;
            }
            (NoteBoard::new(notes, board.filter.clone()), Some(!current))
        }
        NoteAction::Reorder { dragged_id, target_id } => {
            match reorder_preview(board, dragged_id, target_id)? {
                Some(preview) => (preview, None),
                None => return Ok(None),
            }
        }
    };

    Ok(Some(OptimisticUpdate {
        action,
        state: ActionState::Pending,
        before: board.clone(),
        preview,
        predicted_pinned,
    }))
}

fn reorder_preview(board: &NoteBoard, dragged_id: &str, target_id: &str) -> AppResult<Option<NoteBoard>> {
    if dragged_id == target_id || board.filter != CategoryFilter::All {
        return Ok(None);
    }
    let dragged = board.find(dragged_id)?;
    let target = board.find(target_id)?;
    if dragged.pinned != target.pinned {
        return Ok(None);
    }

    let mut notes = board.notes.clone();
    let Some(from) = notes.iter().position(|note| note.id == dragged_id) else {
        return Ok(None);
    };
    let moved = notes.remove(from);
    let Some(to) = notes.iter().position(|note| note.id == target_id) else {
        return Ok(None);
    };
    notes.insert(to, moved);

    for (index, note) in notes.iter_mut().enumerate() {
        note.sort_order = index as i64;
    }
    Ok(Some(NoteBoard {
        notes,
        filter: board.filter.clone(),
    }))
}

impl OptimisticUpdate {
    pub fn preview(&self) -> &NoteBoard {
        &self.preview
    }

    pub fn before(&self) -> &NoteBoard {
        &self.before
    }

    pub async fn commit(self, authority: &dyn NoteAuthority) -> Reconciliation {
        let outcome = match &self.action {
            NoteAction::Reorder { .. } => {
                let ids = self.preview.ids();
                authority.update_note_order(&ids).await
            }
            NoteAction::TogglePin { note_id } => match authority.toggle_note_pinned(note_id).await {
                Ok(pinned) if Some(pinned) == self.predicted_pinned => Ok(()),
                Ok(pinned) => Err(AppError::Conflict(format!(
                    "Server reports note {} pinned={}",
                    note_id, pinned
                ))),
                Err(error) => Err(error),
            },
        };

        match outcome {
            Ok(()) => Reconciliation {
                state: ActionState::Committed,
                board: self.preview,
                refetched: false,
                error: None,
            },
            Err(error) => self.rollback(authority, error).await,
        }
    }

    pub fn revert(self) -> Reconciliation {
        Reconciliation {
            state: ActionState::Reverted,
            board: self.before,
            refetched: false,
            error: None,
        }
    }

    // Reorders are never patched: a rejected order is discarded and the server state re-read.
    async fn rollback(self, authority: &dyn NoteAuthority, error: AppError) -> Reconciliation {
        let refetch = matches!(self.action, NoteAction::Reorder { .. }) || error.is_conflict();
        tracing::debug!(action = ?self.action, error = %error, refetch, "reverting optimistic note update");

        if refetch {
            match authority.fetch_notes().await {
                Ok(notes) => {
                    return Reconciliation {
                        state: ActionState::Reverted,
                        board: NoteBoard::new(notes, self.before.filter.clone()),
                        refetched: true,
                        error: Some(error.to_string()),
                    };
                }
                Err(fetch_error) => {
                    tracing::warn!(error = %fetch_error, "re-fetch after rejected note update failed");
                }
            }
        }

        Reconciliation {
            state: ActionState::Reverted,
            board: self.before,
            refetched: false,
            error: Some(error.to_string()),
        }
    }
}
