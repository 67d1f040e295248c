//! Time-windowed session aggregation.
//!
//! Pure functions over per-session samples; the store fetches the samples for
//! sessions whose start time falls in `[start, end)` and hands them here.

use chatvault_types::error::StoreError;
use chatvault_types::metrics::Metrics;
use chrono::{DateTime, Utc};

/// The per-session fields the aggregator needs.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSample {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_tokens: u64,
    pub admin_assisted: bool,
    pub response_ms: Vec<u64>,
}

/// Concurrency statistics over a window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Concurrency {
    /// Time-weighted mean number of open sessions.
    pub average: f64,
    pub maximum: u64,
}

/// Reject empty or inverted windows.
pub fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), StoreError> {
    if end <= start {
        return Err(StoreError::InvalidTimeRange);
    }
    Ok(())
}

/// Sweep the `[start_time, end_time-or-now)` intervals across the window.
///
/// Intervals are clipped to `[window_start, min(window_end, now))`. At equal
/// instants closings are applied before openings, so back-to-back sessions do
/// not count as overlapping.
pub fn concurrency(
    samples: &[SessionSample],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Concurrency {
    let effective_end = window_end.min(now).max(window_start);
    let span_ms = (effective_end - window_start).num_milliseconds();

    let mut events: Vec<(DateTime<Utc>, i64)> = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        let open = sample.start_time.max(window_start);
        let close = sample.end_time.unwrap_or(now).min(effective_end);
        if close <= open {
            continue;
        }
        events.push((open, 1));
        events.push((close, -1));
    }
    // -1 sorts before +1 at the same instant
    events.sort();

    let mut current: i64 = 0;
    let mut maximum: i64 = 0;
    let mut area_ms: f64 = 0.0;
    let mut previous = window_start;

    for (at, delta) in events {
        area_ms += current as f64 * (at - previous).num_milliseconds() as f64;
        current += delta;
        maximum = maximum.max(current);
        previous = at;
    }

    let average = if span_ms > 0 {
        area_ms / span_ms as f64
    } else {
        0.0
    };

    Concurrency {
        average,
        maximum: maximum.max(0) as u64,
    }
}

/// Fold samples into a [`Metrics`] snapshot.
pub fn aggregate(
    samples: &[SessionSample],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Metrics {
    let mut metrics = Metrics::default();
    let mut response_total: u128 = 0;
    let mut response_count: u64 = 0;

    for sample in samples {
        metrics.total_sessions += 1;
        if sample.end_time.is_none() {
            metrics.active_sessions += 1;
        }
        if sample.admin_assisted {
            metrics.admin_assisted_count += 1;
        }
        metrics.total_tokens += sample.total_tokens;

        for &ms in &sample.response_ms {
            response_total += u128::from(ms);
            response_count += 1;
            metrics.max_response_ms = metrics.max_response_ms.max(ms);
        }
    }

    if metrics.total_sessions > 0 {
        metrics.avg_tokens_per_session =
            metrics.total_tokens as f64 / metrics.total_sessions as f64;
    }
    if response_count > 0 {
        metrics.avg_response_ms = (response_total / u128::from(response_count)) as u64;
    }

    let concurrency = concurrency(samples, window_start, window_end, now);
    metrics.avg_concurrent = concurrency.average;
    metrics.max_concurrent = concurrency.maximum;

    metrics
}
