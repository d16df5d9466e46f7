use crate::engine::PulseEngine;
use crate::errors::{AppError, AppResult};
use crate::models::{CategoryFilter, ChartMetric, CreateNotePayload, NoteAction, RegisterTrackPayload};
use crate::provider::youtube::YouTubeProvider;
use crate::provider::{DisabledProvider, MetricsProvider};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "music-pulse")]
#[command(about = "Track engagement momentum for music videos")]
#[command(version)]
pub struct Cli {
    /// Directory holding the database and logs
    #[arg(long, env = "PULSE_DATA_DIR", default_value = ".music-pulse")]
    pub data_dir: PathBuf,

    #[arg(long, env = "PULSE_YOUTUBE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(subcommand)]
    Track(TrackCommand),
    /// Refresh every track, or a single one
    Refresh {
        #[arg(long)]
        track: Option<String>,
    },
    Growth {
        track_id: String,
    },
    History {
        track_id: String,
        #[arg(long)]
        limit: Option<u32>,
    },
    Chart {
        #[arg(long, value_enum, default_value_t = MetricArg::Views)]
        metric: MetricArg,
    },
    #[command(subcommand)]
    Note(NoteCommand),
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Refresh on the configured interval until interrupted
    Watch,
}

#[derive(Subcommand, Debug)]
pub enum TrackCommand {
    Add { name: String, url: String },
    Remove { track_id: String },
    List,
}

#[derive(Subcommand, Debug)]
pub enum NoteCommand {
    Add {
        content: String,
        #[arg(long)]
        category: Option<String>,
    },
    List {
        #[arg(long)]
        category: Option<String>,
    },
    /// Toggle the pinned flag
    Pin { note_id: String },
    /// Drop a note onto another; it lands just before the target
    Move { dragged_id: String, target_id: String },
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    Show,
    /// Merge a JSON object into the stored settings
    Set { json: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum MetricArg {
    Views,
    Likes,
    Comments,
}

impl From<MetricArg> for ChartMetric {
    fn from(value: MetricArg) -> Self {
        match value {
            MetricArg::Views => Self::Views,
            MetricArg::Likes => Self::Likes,
            MetricArg::Comments => Self::Comments,
        }
    }
}

impl Command {
    fn needs_provider(&self) -> bool {
        matches!(self, Self::Refresh { .. } | Self::Watch)
    }
}

fn build_provider(api_key: Option<&str>, required: bool) -> AppResult<Arc<dyn MetricsProvider>> {
    match api_key.map(str::trim).filter(|key| !key.is_empty()) {
        Some(key) => Ok(Arc::new(YouTubeProvider::new(key)?)),
        None if required => Err(AppError::InvalidInput(
            "A YouTube API key is required (--api-key or PULSE_YOUTUBE_API_KEY)".to_string(),
        )),
        None => Ok(Arc::new(DisabledProvider)),
    }
}

fn to_output(value: &impl Serialize) -> AppResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub async fn execute(cli: Cli) -> AppResult<String> {
    let provider = build_provider(cli.api_key.as_deref(), cli.command.needs_provider())?;
    let engine = PulseEngine::new(cli.data_dir, provider)?;
    dispatch(&engine, cli.command).await
}

pub async fn dispatch(engine: &Arc<PulseEngine>, command: Command) -> AppResult<String> {
    match command {
        Command::Track(TrackCommand::Add { name, url }) => to_output(&engine.register_track(RegisterTrackPayload {
            name,
            source_url: url,
        })?),
        Command::Track(TrackCommand::Remove { track_id }) => to_output(&engine.remove_track(&track_id)?),
        Command::Track(TrackCommand::List) => to_output(&engine.list_tracks()?),
        Command::Refresh { track: Some(track_id) } => to_output(&engine.refresh_track(&track_id).await?),
        Command::Refresh { track: None } => to_output(&engine.refresh_all().await?),
        Command::Growth { track_id } => to_output(&engine.compute_growth(&track_id)?),
        Command::History { track_id, limit } => to_output(&engine.list_snapshots(&track_id, limit)?),
        Command::Chart { metric } => to_output(&engine.get_chart_series(metric.into())?),
        Command::Note(command) => dispatch_note(engine, command).await,
        Command::Settings(SettingsCommand::Show) => to_output(&engine.get_settings()?),
        Command::Settings(SettingsCommand::Set { json }) => {
            let update: serde_json::Value = serde_json::from_str(&json)
                .map_err(|error| AppError::InvalidInput(format!("Settings must be JSON: {}", error)))?;
            if !update.is_object() {
                return Err(AppError::InvalidInput("Settings must be a JSON object".to_string()));
            }
            to_output(&engine.update_settings(update)?)
        }
        Command::Watch => watch(engine.clone()).await,
    }
}

async fn dispatch_note(engine: &Arc<PulseEngine>, command: NoteCommand) -> AppResult<String> {
    let action = match command {
        NoteCommand::Add { content, category } => {
            return to_output(&engine.create_note(CreateNotePayload { content, category })?);
        }
        NoteCommand::List { category } => {
            return to_output(&engine.list_notes(&CategoryFilter::from_option(category.as_deref()))?);
        }
        NoteCommand::Pin { note_id } => NoteAction::TogglePin { note_id },
        NoteCommand::Move { dragged_id, target_id } => NoteAction::Reorder { dragged_id, target_id },
    };

    let board = engine.note_board(CategoryFilter::All)?;
    match engine.apply_note_action(&board, action)? {
        Some(update) => to_output(&engine.commit_note_action(update).await),
        None => to_output(&board),
    }
}

async fn watch(engine: Arc<PulseEngine>) -> AppResult<String> {
    let interval_secs = engine.get_settings()?.auto_refresh_interval_secs.max(1);
    tracing::info!(interval_secs, "watching tracks");
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    let mut cycles = 0_u64;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                cycles += 1;
                match engine.refresh_all().await {
                    Ok(result) => tracing::info!(cycle = cycles, summary = %result.summary(), "scheduled refresh finished"),
                    Err(error) => tracing::warn!(error = %error, "scheduled refresh failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(cycles, "watch interrupted");
                return to_output(&serde_json::json!({ "cycles": cycles }));
            }
        }
    }
}
