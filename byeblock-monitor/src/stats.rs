//! Window summaries and status lines.

use byeblock_core::LatencySample;
use serde::Serialize;

/// Summary of a window snapshot. Latency figures ignore sentinel samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowStats {
    /// Samples in the window, sentinels included.
    pub total: usize,
    /// Successful samples.
    pub ok_count: usize,
    /// Sentinel samples.
    pub failure_count: usize,
    /// Share of failed samples, `0.0` for an empty window.
    pub loss_ratio: f64,
    /// Fastest successful round trip.
    pub min_ms: Option<f64>,
    /// Slowest successful round trip.
    pub max_ms: Option<f64>,
    /// Mean over successful samples.
    pub mean_ms: Option<f64>,
    /// Newest sample, success or not.
    pub last: Option<LatencySample>,
}

impl WindowStats {
    /// Summarises a snapshot given oldest first.
    pub fn from_samples(samples: &[LatencySample]) -> Self {
        let latencies: Vec<f64> = samples.iter().filter_map(LatencySample::latency_ms).collect();
        let total = samples.len();
        let ok_count = latencies.len();
        let failure_count = total - ok_count;
        let loss_ratio = if total == 0 { 0.0 } else { failure_count as f64 / total as f64 };
        let mean_ms = (ok_count > 0).then(|| latencies.iter().sum::<f64>() / ok_count as f64);
        Self {
            total,
            ok_count,
            failure_count,
            loss_ratio,
            min_ms: latencies.iter().copied().reduce(f64::min),
            max_ms: latencies.iter().copied().reduce(f64::max),
            mean_ms,
            last: samples.last().copied(),
        }
    }
}

/// Status line for one sample, e.g. `ping: 123ms` or `ping: unreachable`.
pub fn format_sample(sample: &LatencySample) -> String {
    match sample.latency_ms() {
        Some(ms) => format!("ping: {ms:.0}ms"),
        None => "ping: unreachable".to_string(),
    }
}
