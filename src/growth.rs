use crate::models::{Growth7d, GrowthReport, MetricsSnapshot, TrendStatus};
use chrono::{DateTime, Duration, Utc};

pub const GROWTH_WINDOW_DAYS: i64 = 7;
pub const RISING_THRESHOLD: f64 = 15.0;
pub const DECLINING_THRESHOLD: f64 = -5.0;

// Order-independent: latest, baseline and oldest are picked by timestamp, not by position.
pub fn compute_growth(history: &[MetricsSnapshot], now: DateTime<Utc>) -> GrowthReport {
    let growth_7d = growth_7d(history, now);
    let status = classify(growth_7d.percent_or_zero());
    GrowthReport {
        growth_7d,
        status,
        recommendation: recommendation_for(status).to_string(),
    }
}

fn growth_7d(history: &[MetricsSnapshot], now: DateTime<Utc>) -> Growth7d {
    let Some(latest) = history.iter().max_by_key(|snapshot| snapshot.captured_at) else {
        return Growth7d::New;
    };

    let boundary = now - Duration::days(GROWTH_WINDOW_DAYS);
    if latest.captured_at <= boundary {
        let established = history
            .iter()
            .any(|snapshot| snapshot.captured_at < latest.captured_at);
        return if established {
            Growth7d::Stale {
                last_captured_at: latest.captured_at,
            }
        } else {
            Growth7d::New
        };
    }

    let windowed = history
        .iter()
        .filter(|snapshot| snapshot.captured_at <= boundary)
        .max_by_key(|snapshot| snapshot.captured_at);

    let (baseline, insufficient) = match windowed {
        Some(baseline) => (baseline, false),
        None => match history.iter().min_by_key(|snapshot| snapshot.captured_at) {
            Some(oldest) => (oldest, true),
            None => return Growth7d::New,
        },
    };

    if baseline.captured_at >= latest.captured_at || baseline.counts.views == 0 {
        return Growth7d::New;
    }

    let percent = percent_change(baseline.counts.views, latest.counts.views);
    if insufficient {
        Growth7d::InsufficientHistory {
            percent,
            baseline_at: baseline.captured_at,
        }
    } else {
        Growth7d::Measured { percent }
    }
}

fn percent_change(baseline: i64, latest: i64) -> f64 {
    (latest - baseline) as f64 / baseline as f64 * 100.0
}

pub fn classify(growth_percent: f64) -> TrendStatus {
    if growth_percent > RISING_THRESHOLD {
        TrendStatus::Rising
    } else if growth_percent < DECLINING_THRESHOLD {
        TrendStatus::Declining
    } else {
        TrendStatus::Steady
    }
}

pub fn recommendation_for(status: TrendStatus) -> &'static str {
    match status {
        TrendStatus::Rising => {
            "Momentum is building. Push this track now: pitch it to playlists and put promotion budget behind it."
        }
        TrendStatus::Steady => {
            "Holding steady. Keep posting short-form clips and engage with comments to find the next spike."
        }
        TrendStatus::Declining => {
            "Interest is fading. Refresh the visuals, try a new hook in short-form content, or shift focus to a newer release."
        }
    }
}
