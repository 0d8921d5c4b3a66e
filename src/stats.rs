use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, info};

/// Frames between two frame-rate reports
pub const FRAME_RATE_WINDOW: u32 = 150;

/// Latency samples kept by `LatencyStats::new`
pub const DEFAULT_LATENCY_SAMPLES: usize = 1024;

/// Percentile summary of a set of latency samples, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatencySummary {
    pub samples: usize,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// Statistics over the most recent detection latencies
///
/// Keeps at most `capacity` samples; the oldest is dropped when full.
#[derive(Debug)]
pub struct LatencyStats {
    samples_ms: VecDeque<f64>,
    capacity: usize,
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LATENCY_SAMPLES)
    }
}

impl LatencyStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples_ms: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn add(&mut self, elapsed: Duration) {
        if self.samples_ms.len() == self.capacity {
            self.samples_ms.pop_front();
        }
        self.samples_ms.push_back(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn len(&self) -> usize {
        self.samples_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples_ms.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples_ms.clear();
    }

    /// Calculate percentile from sorted data
    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }

        let idx = (p / 100.0 * (sorted.len() - 1) as f64).round() as usize;
        sorted[idx]
    }

    pub fn summary(&self) -> LatencySummary {
        if self.samples_ms.is_empty() {
            return LatencySummary::default();
        }

        let mut values: Vec<f64> = self.samples_ms.iter().copied().collect();
        values.sort_by(|a, b| a.total_cmp(b));

        LatencySummary {
            samples: values.len(),
            mean_ms: values.iter().sum::<f64>() / values.len() as f64,
            p50_ms: Self::percentile(&values, 50.0),
            p95_ms: Self::percentile(&values, 95.0),
            p99_ms: Self::percentile(&values, 99.0),
        }
    }

    /// Log the summary at info level
    pub fn log_report(&self, label: &str) {
        if self.samples_ms.is_empty() {
            info!("{label}: no timing data collected");
            return;
        }

        let summary = self.summary();
        info!(
            "{label}: {} samples, mean {:.1} ms, p50 {:.1} ms, p95 {:.1} ms, p99 {:.1} ms",
            summary.samples, summary.mean_ms, summary.p50_ms, summary.p95_ms, summary.p99_ms
        );
    }
}

/// Counts frames and reports the rate once per window
#[derive(Debug)]
pub struct FrameRateCounter {
    window: u32,
    frames: u32,
    window_start: Option<Instant>,
    last_rate: Option<f64>,
}

impl FrameRateCounter {
    pub fn new(window: u32) -> Self {
        Self {
            window: window.max(1),
            frames: 0,
            window_start: None,
            last_rate: None,
        }
    }

    /// Count one frame; returns the measured rate when a window closes
    pub fn tick(&mut self) -> Option<f64> {
        let now = Instant::now();
        let start = *self.window_start.get_or_insert(now);

        self.frames += 1;
        if self.frames < self.window {
            return None;
        }

        let secs = now.duration_since(start).as_secs_f64();
        let rate = if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        };
        debug!("Frame rate: {:.1} fps", rate);

        self.frames = 0;
        self.window_start = Some(now);
        self.last_rate = Some(rate);
        Some(rate)
    }

    /// Rate measured over the last complete window
    pub fn last_rate(&self) -> Option<f64> {
        self.last_rate
    }

    pub fn reset(&mut self) {
        self.frames = 0;
        self.window_start = None;
    }
}

impl Default for FrameRateCounter {
    fn default() -> Self {
        Self::new(FRAME_RATE_WINDOW)
    }
}
