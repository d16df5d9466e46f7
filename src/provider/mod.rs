pub mod ingest;
pub mod video_id;
pub mod youtube;

use crate::models::FailureReason;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "kebab-case")]
pub enum ProviderFailure {
    NotFound,
    QuotaExceeded,
    Timeout,
    Unknown(String),
}

impl From<ProviderFailure> for FailureReason {
    fn from(value: ProviderFailure) -> Self {
        match value {
            ProviderFailure::NotFound => Self::NotFound,
            ProviderFailure::QuotaExceeded => Self::QuotaExceeded,
            ProviderFailure::Timeout => Self::Timeout,
            ProviderFailure::Unknown(detail) => Self::Unknown(detail),
        }
    }
}

// Raw payloads are untrusted; they go through `ingest::parse_metric_payload` before use.
pub trait MetricsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn fetch_metrics<'a>(
        &'a self,
        video_id: &'a str,
    ) -> BoxFuture<'a, Result<serde_json::Value, ProviderFailure>>;
}

// Stands in when no API key is configured; read-only commands never reach it.
pub struct DisabledProvider;

impl MetricsProvider for DisabledProvider {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn fetch_metrics<'a>(
        &'a self,
        video_id: &'a str,
    ) -> BoxFuture<'a, Result<serde_json::Value, ProviderFailure>> {
        Box::pin(async move {
            Err(ProviderFailure::Unknown(format!(
                "no metrics provider configured for {}",
                video_id
            )))
        })
    }
}
