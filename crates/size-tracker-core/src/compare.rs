//! Comparison of the current build against recorded history.

use chrono::{DateTime, Utc};

use crate::record::SizeRecord;
use crate::units::{format_bytes_with_raw, format_delta};

/// Default window of the simple moving average drawn on the chart.
pub const DEFAULT_SMA_WINDOW: usize = 16;

/// One point of the size trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub size: u64,
}

/// Result of comparing the current record against history.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// The record for the build being evaluated.
    pub current: SizeRecord,
    /// Most recent record in history, if any.
    pub previous: Option<SizeRecord>,
    /// History plus the current record in ascending time order. Empty when
    /// there is no baseline.
    pub series: Vec<TrendPoint>,
    /// Simple moving average of `series`, one value per point.
    pub sma: Vec<f64>,
}

impl Report {
    pub fn has_baseline(&self) -> bool {
        self.previous.is_some()
    }

    /// Current size minus previous size in bytes.
    pub fn delta_bytes(&self) -> Option<i64> {
        self.previous
            .as_ref()
            .map(|prev| self.current.size_bytes() as i64 - prev.size_bytes() as i64)
    }

    /// Summary lines for the run log.
    pub fn headline(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "Binary size: {}",
            format_bytes_with_raw(self.current.size_bytes())
        )];
        match (&self.previous, self.delta_bytes()) {
            (Some(prev), Some(delta)) => {
                lines.push(format!(
                    "Previous binary size: {}",
                    format_bytes_with_raw(prev.size_bytes())
                ));
                lines.push(format!(
                    "Change since {}: {} ({delta:+} bytes)",
                    short_commit(&prev.commit),
                    format_delta(delta)
                ));
            }
            _ => lines.push("No previous binary size to compare against".to_string()),
        }
        lines
    }
}

/// Compare `current` against `history`.
///
/// History order is not trusted; records are sorted by timestamp (stable, so
/// equal timestamps keep store order). The previous record is the latest one
/// in history.
pub fn compare(current: &SizeRecord, history: &[SizeRecord], sma_window: usize) -> Report {
    if history.is_empty() {
        return Report {
            current: current.clone(),
            previous: None,
            series: Vec::new(),
            sma: Vec::new(),
        };
    }

    let mut sorted: Vec<&SizeRecord> = history.iter().collect();
    sorted.sort_by_key(|r| r.timestamp);
    let previous = sorted.last().map(|r| (*r).clone());

    let mut series: Vec<TrendPoint> = sorted
        .iter()
        .chain(std::iter::once(&current))
        .map(|r| TrendPoint {
            timestamp: r.timestamp,
            size: r.size_bytes(),
        })
        .collect();
    series.sort_by_key(|p| p.timestamp);

    let values: Vec<f64> = series.iter().map(|p| p.size as f64).collect();
    let sma = simple_moving_average(&values, sma_window);

    Report {
        current: current.clone(),
        previous,
        series,
        sma,
    }
}

/// Trailing simple moving average.
///
/// Element `i` is the mean of the up to `window` values ending at `i`, so the
/// output has the same length as the input. A window of 0 is treated as 1.
pub fn simple_moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, value) in values.iter().enumerate() {
        sum += value;
        if i >= window {
            sum -= values[i - window];
        }
        let count = (i + 1).min(window);
        out.push(sum / count as f64);
    }
    out
}

fn short_commit(commit: &str) -> &str {
    commit.get(..7).unwrap_or(commit)
}
