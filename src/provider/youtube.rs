use super::{MetricsProvider, ProviderFailure};
use crate::errors::{AppError, AppResult};
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::time::Duration;

const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const USER_AGENT: &str = "music-pulse/0.1.0";
const QUOTA_REASONS: [&str; 3] = ["quotaExceeded", "rateLimitExceeded", "dailyLimitExceeded"];

pub struct YouTubeProvider {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl YouTubeProvider {
    pub fn new(api_key: impl Into<String>) -> AppResult<Self> {
        Self::with_base_url(api_key, YOUTUBE_API_BASE)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> AppResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AppError::InvalidInput("YouTube API key is required".to_string()));
        }
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|error| AppError::Internal(error.to_string()))?;
        Ok(Self {
            http_client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_statistics(&self, video_id: &str) -> Result<Value, ProviderFailure> {
        let url = format!("{}/videos", self.base_url);
        tracing::debug!(video_id = %video_id, "requesting video statistics");

        let response = self
            .http_client
            .get(&url)
            .query(&[("part", "statistics"), ("id", video_id), ("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        let body: Value = response.json().await.map_err(classify_transport_error)?;
        extract_statistics(&body)
    }
}

impl MetricsProvider for YouTubeProvider {
    fn name(&self) -> &'static str {
        "youtube"
    }

    fn fetch_metrics<'a>(
        &'a self,
        video_id: &'a str,
    ) -> BoxFuture<'a, Result<Value, ProviderFailure>> {
        Box::pin(self.fetch_statistics(video_id))
    }
}

fn classify_transport_error(error: reqwest::Error) -> ProviderFailure {
    if error.is_timeout() {
        ProviderFailure::Timeout
    } else {
        ProviderFailure::Unknown(error.to_string())
    }
}

fn classify_status(status: u16, body: &str) -> ProviderFailure {
    match status {
        404 => ProviderFailure::NotFound,
        429 => ProviderFailure::QuotaExceeded,
        403 if QUOTA_REASONS.iter().any(|reason| body.contains(reason)) => ProviderFailure::QuotaExceeded,
        408 | 504 => ProviderFailure::Timeout,
        _ => {
            let snippet: String = body.chars().take(200).collect();
            ProviderFailure::Unknown(format!("HTTP {}: {}", status, snippet))
        }
    }
}

// Counter values are passed through untouched; validation happens at ingestion.
fn extract_statistics(body: &Value) -> Result<Value, ProviderFailure> {
    let Some(item) = body
        .get("items")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
    else {
        return Err(ProviderFailure::NotFound);
    };

    let Some(statistics) = item.get("statistics").and_then(Value::as_object) else {
        return Err(ProviderFailure::Unknown("response item has no statistics".to_string()));
    };

    let mut normalized = Map::new();
    for (source, target) in [("viewCount", "views"), ("likeCount", "likes"), ("commentCount", "comments")] {
        if let Some(value) = statistics.get(source) {
            normalized.insert(target.to_string(), value.clone());
        }
    }
    Ok(Value::Object(normalized))
}
