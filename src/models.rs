use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanResponse {
    pub success: bool,
}

// ─── Tracks & Snapshots ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricCounts {
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
}

impl MetricCounts {
    pub fn new(views: i64, likes: i64, comments: i64) -> Self {
        Self {
            views,
            likes,
            comments,
        }
    }

    pub fn get(&self, metric: ChartMetric) -> i64 {
        match metric {
            ChartMetric::Views => self.views,
            ChartMetric::Likes => self.likes,
            ChartMetric::Comments => self.comments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub track_id: String,
    pub captured_at: DateTime<Utc>,
    pub counts: MetricCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrendStatus {
    Rising,
    Steady,
    Declining,
}

impl TrendStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rising => "rising",
            Self::Steady => "steady",
            Self::Declining => "declining",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "rising" => Some(Self::Rising),
            "steady" => Some(Self::Steady),
            "declining" => Some(Self::Declining),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Growth7d {
    Measured {
        percent: f64,
    },
    #[serde(rename_all = "camelCase")]
    InsufficientHistory {
        percent: f64,
        baseline_at: DateTime<Utc>,
    },
    // Every snapshot predates the window; nothing was observed in the last seven days.
    #[serde(rename_all = "camelCase")]
    Stale {
        last_captured_at: DateTime<Utc>,
    },
    New,
}

impl Growth7d {
    pub fn percent(&self) -> Option<f64> {
        match self {
            Self::Measured { percent } | Self::InsufficientHistory { percent, .. } => Some(*percent),
            Self::Stale { .. } | Self::New => None,
        }
    }

    pub fn percent_or_zero(&self) -> f64 {
        self.percent().unwrap_or(0.0)
    }

    pub fn is_flagged(&self) -> bool {
        !matches!(self, Self::Measured { .. })
    }
}

impl Default for Growth7d {
    fn default() -> Self {
        Self::New
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthReport {
    pub growth_7d: Growth7d,
    pub status: TrendStatus,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedTrack {
    pub id: String,
    pub name: String,
    pub source_url: String,
    pub video_id: String,
    pub current: MetricCounts,
    pub growth_7d: Growth7d,
    pub status: TrendStatus,
    pub recommendation: String,
    pub needs_review: bool,
    pub review_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTrackPayload {
    pub name: String,
    pub source_url: String,
}

// ─── Refresh ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureClass {
    Transient,
    Permanent,
    DataQuality,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "kebab-case")]
pub enum FailureReason {
    NotFound,
    QuotaExceeded,
    Timeout,
    Unknown(String),
    InvalidPayload(String),
    Storage(String),
}

impl FailureReason {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Timeout | Self::QuotaExceeded => FailureClass::Transient,
            Self::NotFound => FailureClass::Permanent,
            Self::InvalidPayload(_) => FailureClass::DataQuality,
            Self::Unknown(_) | Self::Storage(_) => FailureClass::Internal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == FailureClass::Transient
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "video not found or deleted"),
            Self::QuotaExceeded => write!(f, "provider quota exceeded"),
            Self::Timeout => write!(f, "provider request timed out"),
            Self::Unknown(detail) => write!(f, "provider error: {}", detail),
            Self::InvalidPayload(detail) => write!(f, "invalid metrics payload: {}", detail),
            Self::Storage(detail) => write!(f, "storage error: {}", detail),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshFailure {
    pub track_id: String,
    pub reason: FailureReason,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResult {
    pub succeeded: Vec<String>,
    pub failed: Vec<RefreshFailure>,
}

impl RefreshResult {
    pub fn summary(&self) -> String {
        format!("{} succeeded, {} failed", self.succeeded.len(), self.failed.len())
    }
}

// ─── Charts ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartMetric {
    #[default]
    Views,
    Likes,
    Comments,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeriesPoint {
    pub bucket: DateTime<Utc>,
    pub label: String,
    #[serde(flatten)]
    pub values: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesLegend {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub metric: ChartMetric,
    pub points: Vec<ChartSeriesPoint>,
    pub legend: Vec<SeriesLegend>,
}

// ─── Notes ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub content: String,
    pub category: String,
    pub pinned: bool,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotePayload {
    pub content: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "category", rename_all = "kebab-case")]
pub enum CategoryFilter {
    All,
    Only(String),
}

impl CategoryFilter {
    pub fn from_option(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") | Some("all") => Self::All,
            Some(category) => Self::Only(category.to_string()),
        }
    }

    pub fn matches(&self, note: &Note) -> bool {
        match self {
            Self::All => true,
            Self::Only(category) => note.category == *category,
        }
    }
}

impl Default for CategoryFilter {
    fn default() -> Self {
        Self::All
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NoteAction {
    #[serde(rename_all = "camelCase")]
    TogglePin { note_id: String },
    #[serde(rename_all = "camelCase")]
    Reorder { dragged_id: String, target_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionState {
    Pending,
    Committed,
    Reverted,
}

// ─── Settings ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PulseSettings {
    pub refresh_concurrency: usize,
    pub provider_timeout_ms: u64,
    pub transient_retries: u32,
    pub retry_backoff_ms: u64,
    pub auto_refresh_interval_secs: u64,
}

impl Default for PulseSettings {
    fn default() -> Self {
        Self {
            refresh_concurrency: 4,
            provider_timeout_ms: 10_000,
            transient_retries: 1,
            retry_backoff_ms: 200,
            auto_refresh_interval_secs: 6 * 60 * 60,
        }
    }
}
