//! Receiver side stream accounting.
//!
//! [`StreamAccounting`] classifies each arrival against the highest sequence
//! id seen so far and keeps windowed and cumulative counters. A gap is counted
//! as provisional loss right away; when one of the missing packets shows up
//! later, the loss count is corrected by one.

use std::time::{Duration, Instant};

/// Classification of one arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// The next expected sequence id.
    InOrder,
    /// A forward jump; ids `first..=last` are missing.
    Lost { first: u64, last: u64 },
    /// At or below the highest id seen: reordered or duplicated.
    Delayed,
}

/// Snapshot of one notify window, taken by [`StreamAccounting::take_report`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowReport {
    /// Length of the window.
    pub interval: Duration,
    /// Time since the session started.
    pub elapsed: Duration,
    /// Packets received in the window.
    pub received: u64,
    /// Net loss in the window. Negative when late packets compensate losses
    /// counted in an earlier window.
    pub lost: i64,
    /// Windowed throughput, bits per second.
    pub rate_bps: f64,
    /// `100 * lost / received` for the window.
    pub loss_pct: f64,
    /// Mean one-way delay of the window's packets, milliseconds.
    pub mean_delay_ms: f64,
    /// Throughput since the session started, bits per second.
    pub avg_rate_bps: f64,
    /// `100 * cumulative lost / cumulative received`.
    pub avg_loss_pct: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct ReceiveWindow {
    received: u64,
    lost: i64,
    delay_sum: f64,
}

#[derive(Debug, Clone)]
pub struct StreamAccounting {
    packet_len: usize,
    highest_seq: u64,
    session_start: Instant,
    last_notify: Instant,
    cumulative_received: u64,
    cumulative_lost: u64,
    window: ReceiveWindow,
}

impl StreamAccounting {
    /// Opens a session whose first observed packet carries `first_seq`.
    ///
    /// Ids below `first_seq` are not counted as lost; a session joined mid
    /// stream starts clean.
    pub fn new(first_seq: u64, now: Instant, packet_len: usize) -> Self {
        Self {
            packet_len,
            highest_seq: first_seq.saturating_sub(1),
            session_start: now,
            last_notify: now,
            cumulative_received: 0,
            cumulative_lost: 0,
            window: ReceiveWindow::default(),
        }
    }

    /// Accounts one packet with its measured one-way delay in seconds.
    pub fn record(&mut self, seq: u64, delay_secs: f64) -> Arrival {
        self.window.received += 1;
        self.window.delay_sum += delay_secs;

        if seq <= self.highest_seq {
            // only compensate a loss that was actually counted
            if self.running_lost() > 0 {
                self.window.lost = self.window.lost.saturating_sub(1);
            }
            return Arrival::Delayed;
        }

        let gap = seq - self.highest_seq - 1;
        let arrival = if gap > 0 {
            // a gap past i64::MAX saturates the window count
            let missing = i64::try_from(gap).unwrap_or(i64::MAX);
            self.window.lost = self.window.lost.saturating_add(missing);
            Arrival::Lost {
                first: self.highest_seq + 1,
                last: seq - 1,
            }
        } else {
            Arrival::InOrder
        };
        self.highest_seq = seq;
        arrival
    }

    /// Folds the window into the cumulative counters once `interval` has passed.
    pub fn take_report(&mut self, now: Instant, interval: Duration) -> Option<WindowReport> {
        let window_len = now.saturating_duration_since(self.last_notify);
        if window_len < interval {
            return None;
        }

        let window = std::mem::take(&mut self.window);
        self.cumulative_received = self.cumulative_received.saturating_add(window.received);
        self.cumulative_lost = self.cumulative_lost.saturating_add_signed(window.lost);
        self.last_notify = now;

        let elapsed = now.saturating_duration_since(self.session_start);
        let bits_per_packet = 8.0 * self.packet_len as f64;
        Some(WindowReport {
            interval: window_len,
            elapsed,
            received: window.received,
            lost: window.lost,
            rate_bps: per_second(bits_per_packet * window.received as f64, window_len),
            loss_pct: percent(window.lost as f64, window.received),
            mean_delay_ms: if window.received > 0 {
                1000.0 * window.delay_sum / window.received as f64
            } else {
                0.0
            },
            avg_rate_bps: per_second(bits_per_packet * self.cumulative_received as f64, elapsed),
            avg_loss_pct: percent(self.cumulative_lost as f64, self.cumulative_received),
        })
    }

    pub fn highest_seq(&self) -> u64 {
        self.highest_seq
    }

    pub fn session_start(&self) -> Instant {
        self.session_start
    }

    /// Received packets, including the open window.
    pub fn total_received(&self) -> u64 {
        self.cumulative_received + self.window.received
    }

    /// Loss so far, including the open window's provisional count.
    pub fn running_lost(&self) -> u64 {
        self.cumulative_lost.saturating_add_signed(self.window.lost)
    }

    /// Loss folded in by the last report.
    pub fn cumulative_lost(&self) -> u64 {
        self.cumulative_lost
    }

    pub fn window_lost(&self) -> i64 {
        self.window.lost
    }
}

fn per_second(value: f64, over: Duration) -> f64 {
    let secs = over.as_secs_f64();
    if secs > 0.0 { value / secs } else { 0.0 }
}

fn percent(part: f64, whole: u64) -> f64 {
    if whole > 0 {
        100.0 * part / whole as f64
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEN: usize = 150;

    fn replay(ids: &[u64]) -> (StreamAccounting, Vec<Arrival>) {
        let mut acc = StreamAccounting::new(ids[0], Instant::now(), LEN);
        let arrivals = ids.iter().map(|id| acc.record(*id, 0.001)).collect();
        (acc, arrivals)
    }

    #[test]
    fn test_late_packet_compensates_loss() {
        let (acc, arrivals) = replay(&[1, 2, 4, 5, 3]);
        assert_eq!(
            arrivals,
            vec![
                Arrival::InOrder,
                Arrival::InOrder,
                Arrival::Lost { first: 3, last: 3 },
                Arrival::InOrder,
                Arrival::Delayed,
            ]
        );
        assert_eq!(acc.running_lost(), 0);
        assert_eq!(acc.highest_seq(), 5);
        assert_eq!(acc.total_received(), 5);
    }

    #[test]
    fn test_gap_counts_exactly_missing_ids() {
        let mut acc = StreamAccounting::new(1, Instant::now(), LEN);
        acc.record(1, 0.0);
        assert_eq!(acc.record(2, 0.0), Arrival::InOrder);
        assert_eq!(acc.record(9, 0.0), Arrival::Lost { first: 3, last: 8 });
        assert_eq!(acc.window_lost(), 6);
        assert_eq!(acc.record(10, 0.0), Arrival::InOrder);
        assert_eq!(acc.window_lost(), 6);
    }

    #[test]
    fn test_late_packet_decrements_by_one() {
        let mut acc = StreamAccounting::new(1, Instant::now(), LEN);
        acc.record(1, 0.0);
        acc.record(5, 0.0);
        assert_eq!(acc.window_lost(), 3);
        assert_eq!(acc.record(3, 0.0), Arrival::Delayed);
        assert_eq!(acc.window_lost(), 2);
        assert_eq!(acc.highest_seq(), 5);
    }

    #[test]
    fn test_duplicates_never_drive_loss_negative() {
        let (acc, arrivals) = replay(&[1, 1, 2, 2, 2, 3]);
        assert_eq!(arrivals.iter().filter(|a| **a == Arrival::Delayed).count(), 3);
        assert_eq!(acc.running_lost(), 0);
        assert_eq!(acc.window_lost(), 0);
    }

    #[test]
    fn test_highest_seq_is_non_decreasing() {
        let ids = [1, 4, 2, 3, 3, 8, 7, 9, 5, 12, 11, 10];
        let mut acc = StreamAccounting::new(1, Instant::now(), LEN);
        let mut previous = acc.highest_seq();
        for id in ids {
            acc.record(id, 0.0);
            assert!(acc.highest_seq() >= previous);
            previous = acc.highest_seq();
        }
        assert_eq!(acc.highest_seq(), 12);
        // every id that went missing turns up late except 6
        assert_eq!(acc.running_lost(), 1);
    }

    #[test]
    fn test_compensation_across_windows() {
        let start = Instant::now();
        let interval = Duration::from_millis(500);
        let mut acc = StreamAccounting::new(1, start, LEN);

        acc.record(1, 0.0);
        acc.record(3, 0.0);
        let first = acc.take_report(start + interval, interval).unwrap();
        assert_eq!(first.lost, 1);
        assert_eq!(acc.cumulative_lost(), 1);

        // the missing packet arrives in the next window
        acc.record(2, 0.0);
        acc.record(4, 0.0);
        let second = acc.take_report(start + 2 * interval, interval).unwrap();
        assert_eq!(second.lost, -1);
        assert_eq!(second.received, 2);
        assert_eq!(acc.cumulative_lost(), 0);
        assert_eq!(second.avg_loss_pct, 0.0);
    }

    #[test]
    fn test_report_statistics() {
        let start = Instant::now();
        let interval = Duration::from_millis(500);
        let mut acc = StreamAccounting::new(1, start, LEN);

        // 10 received, 2 lost, 4ms delay each
        for id in [1, 2, 3, 4, 5, 8, 9, 10, 11, 12] {
            acc.record(id, 0.004);
        }
        assert!(acc.take_report(start + Duration::from_millis(499), interval).is_none());

        let report = acc.take_report(start + interval, interval).unwrap();
        assert_eq!(report.received, 10);
        assert_eq!(report.lost, 2);
        assert_eq!(report.interval, interval);
        // 10 * 150 * 8 bits over 0.5s
        assert!((report.rate_bps - 24_000.0).abs() < 1e-6);
        assert!((report.loss_pct - 20.0).abs() < 1e-9);
        assert!((report.mean_delay_ms - 4.0).abs() < 1e-9);
        assert!((report.avg_rate_bps - 24_000.0).abs() < 1e-6);
        assert!((report.avg_loss_pct - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_window_reports_zero() {
        let start = Instant::now();
        let interval = Duration::from_millis(500);
        let mut acc = StreamAccounting::new(1, start, LEN);

        let report = acc.take_report(start + interval, interval).unwrap();
        assert_eq!(report.received, 0);
        assert_eq!(report.rate_bps, 0.0);
        assert_eq!(report.loss_pct, 0.0);
        assert_eq!(report.mean_delay_ms, 0.0);
        assert_eq!(report.avg_loss_pct, 0.0);
    }

    #[test]
    fn test_huge_gap_saturates_instead_of_wrapping() {
        let mut acc = StreamAccounting::new(1, Instant::now(), LEN);
        acc.record(1, 0.0);
        assert_eq!(
            acc.record(u64::MAX, 0.0),
            Arrival::Lost {
                first: 2,
                last: u64::MAX - 1
            }
        );
        assert_eq!(acc.window_lost(), i64::MAX);
        assert_eq!(acc.running_lost(), i64::MAX as u64);
        assert_eq!(acc.highest_seq(), u64::MAX);
    }

    #[test]
    fn test_repeated_huge_gaps_do_not_overflow() {
        let start = Instant::now();
        let interval = Duration::from_millis(500);
        let mut acc = StreamAccounting::new(1, start, LEN);
        acc.record(1, 0.0);
        acc.record(1 << 62, 0.0);
        acc.record(1 << 63, 0.0);
        acc.record(u64::MAX, 0.0);
        assert_eq!(acc.window_lost(), i64::MAX);

        let report = acc.take_report(start + interval, interval).unwrap();
        assert_eq!(report.lost, i64::MAX);
        assert_eq!(acc.cumulative_lost(), i64::MAX as u64);
        assert!(report.loss_pct > 0.0);
    }

    #[test]
    fn test_session_joined_mid_stream() {
        let mut acc = StreamAccounting::new(100, Instant::now(), LEN);
        assert_eq!(acc.record(100, 0.0), Arrival::InOrder);
        assert_eq!(acc.record(101, 0.0), Arrival::InOrder);
        assert_eq!(acc.running_lost(), 0);
    }

    #[test]
    fn test_lossless_stream_reports_no_loss() {
        let start = Instant::now();
        let interval = Duration::from_millis(500);
        let mut acc = StreamAccounting::new(1, start, LEN);

        // 2 seconds at 1.5ms spacing, a report every 500ms
        let mut now = start;
        let mut reports = Vec::new();
        for id in 1..=1333u64 {
            now += Duration::from_micros(1500);
            assert_eq!(acc.record(id, 0.0005), Arrival::InOrder);
            if let Some(report) = acc.take_report(now, interval) {
                reports.push(report);
            }
        }

        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.lost == 0 && r.loss_pct == 0.0));
        assert_eq!(acc.running_lost(), 0);
        assert_eq!(acc.total_received(), 1333);
    }
}
