use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use crate::utils::accounting::{StreamAccounting, WindowReport};

/// Window reports retained for the median, one hour at the default interval.
pub const MEDIAN_WINDOWS: usize = 7200;

/// Statistics of one receiver session, aggregated from its window reports.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    /// Packets received during the session.
    pub total_received: u64,
    /// Packets lost during the session, after late arrivals were credited back.
    pub total_lost: u64,
    /// Time from the first packet to the end of the session.
    pub duration: Duration,
    /// Number of window reports the figures below are drawn from.
    pub windows: usize,

    /// Mean windowed throughput (bits/sec).
    pub mean_rate_bps: f64,
    /// Median windowed throughput over the most recent windows (bits/sec).
    pub median_rate_bps: f64,

    /// Mean windowed one-way delay (ms).
    pub mean_delay_ms: f64,
    /// Median windowed one-way delay over the most recent windows (ms).
    pub median_delay_ms: f64,
}

impl SessionSummary {
    /// Aggregate window reports into a summary.
    ///
    /// Totals are summed from the windows, so packets of a window that was
    /// never reported are not included. Use [`SessionSummary::from_session`]
    /// for exact totals.
    pub fn from_windows(windows: &[WindowReport]) -> Self {
        let mut history = WindowHistory::with_capacity(windows.len());
        for w in windows {
            history.push(*w);
        }
        history.summary()
    }

    /// Summary of a session ending at `now`, with totals taken from the
    /// accounting state including the last, still open window.
    pub fn from_session(
        accounting: &StreamAccounting,
        history: &WindowHistory,
        now: Instant,
    ) -> Self {
        Self {
            total_received: accounting.total_received(),
            total_lost: accounting.running_lost(),
            duration: now.saturating_duration_since(accounting.session_start()),
            ..history.summary()
        }
    }
}

/// Window reports of one session.
///
/// Sums for the means cover every pushed window. Only the last `capacity`
/// reports are kept for the medians, so a session left running for days
/// holds a fixed amount of memory.
#[derive(Debug, Clone)]
pub struct WindowHistory {
    capacity: usize,
    recent: VecDeque<WindowReport>,
    windows: usize,
    received: u64,
    lost: i64,
    rate_sum: f64,
    delay_sum: f64,
    delay_windows: usize,
    last_elapsed: Duration,
}

impl Default for WindowHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowHistory {
    pub fn new() -> Self {
        Self::with_capacity(MEDIAN_WINDOWS)
    }

    /// History keeping at most `capacity` reports (at least one) for the medians.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            recent: VecDeque::with_capacity(capacity.min(128)),
            windows: 0,
            received: 0,
            lost: 0,
            rate_sum: 0.0,
            delay_sum: 0.0,
            delay_windows: 0,
            last_elapsed: Duration::ZERO,
        }
    }

    pub fn push(&mut self, report: WindowReport) {
        self.windows += 1;
        self.received = self.received.saturating_add(report.received);
        self.lost = self.lost.saturating_add(report.lost);
        self.rate_sum += report.rate_bps;
        // a window without packets has no delay to speak of
        if report.received > 0 {
            self.delay_sum += report.mean_delay_ms;
            self.delay_windows += 1;
        }
        self.last_elapsed = report.elapsed;

        if self.recent.len() == self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(report);
    }

    /// Windows pushed so far.
    pub fn len(&self) -> usize {
        self.windows
    }

    pub fn is_empty(&self) -> bool {
        self.windows == 0
    }

    /// Windows currently held for the medians.
    pub fn retained(&self) -> usize {
        self.recent.len()
    }

    pub fn summary(&self) -> SessionSummary {
        let mut rates: Vec<f64> = self.recent.iter().map(|w| w.rate_bps).collect();
        let mut delays: Vec<f64> = self
            .recent
            .iter()
            .filter(|w| w.received > 0)
            .map(|w| w.mean_delay_ms)
            .collect();

        SessionSummary {
            total_received: self.received,
            total_lost: self.lost.max(0) as u64,
            duration: self.last_elapsed,
            windows: self.windows,
            mean_rate_bps: average(self.rate_sum, self.windows),
            median_rate_bps: median_f64(&mut rates),
            mean_delay_ms: average(self.delay_sum, self.delay_windows),
            median_delay_ms: median_f64(&mut delays),
        }
    }
}

fn average(sum: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// The median is the number separating the higher half of a data sample from the lower half.
/// See [median](http://en.wikipedia.org/wiki/Median).
pub fn median_f64(v: &mut [f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }

    v.sort_by(|a, b| a.total_cmp(b));
    let mid = v.len() / 2;

    if v.len() % 2 == 1 {
        v[mid]
    } else {
        (v[mid - 1] + v[mid]) / 2.0
    }
}
