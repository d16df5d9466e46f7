use crate::models::{ChartMetric, ChartSeriesPoint, MetricsSnapshot, SeriesLegend, TrackedTrack};
use chrono::{DateTime, Timelike, Utc};
use std::collections::{BTreeMap, HashMap};

pub const SERIES_PALETTE: [&str; 8] = [
    "#8b5cf6", "#ec4899", "#06b6d4", "#f59e0b", "#10b981", "#ef4444", "#3b82f6", "#a3e635",
];

pub fn bucket_key(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_minute(0)
        .and_then(|value| value.with_second(0))
        .and_then(|value| value.with_nanosecond(0))
        .unwrap_or(at)
}

pub fn bucket_label(bucket: DateTime<Utc>) -> String {
    bucket.format("%Y-%m-%d %H:00").to_string()
}

// Stable, so snapshots sharing a timestamp keep their arrival order.
pub fn sort_for_aggregation(snapshots: &mut [MetricsSnapshot]) {
    snapshots.sort_by_key(|snapshot| snapshot.captured_at);
}

// Later arrivals overwrite earlier ones inside a bucket; tracks without data stay absent.
pub fn build_series(
    snapshots: &[MetricsSnapshot],
    tracks: &[TrackedTrack],
    metric: ChartMetric,
) -> Vec<ChartSeriesPoint> {
    let names: HashMap<&str, &str> = tracks
        .iter()
        .map(|track| (track.id.as_str(), track.name.as_str()))
        .collect();

    let mut buckets: BTreeMap<DateTime<Utc>, BTreeMap<String, i64>> = BTreeMap::new();
    for snapshot in snapshots {
        let Some(name) = names.get(snapshot.track_id.as_str()) else {
            tracing::debug!(track_id = %snapshot.track_id, "skipping snapshot for unknown track");
            continue;
        };
        buckets
            .entry(bucket_key(snapshot.captured_at))
            .or_default()
            .insert((*name).to_string(), snapshot.counts.get(metric));
    }

    buckets
        .into_iter()
        .map(|(bucket, values)| ChartSeriesPoint {
            bucket,
            label: bucket_label(bucket),
            values,
        })
        .collect()
}

pub fn legend_for(tracks: &[TrackedTrack]) -> Vec<SeriesLegend> {
    tracks
        .iter()
        .enumerate()
        .map(|(index, track)| SeriesLegend {
            name: track.name.clone(),
            color: SERIES_PALETTE[index % SERIES_PALETTE.len()].to_string(),
        })
        .collect()
}
