//! Sender session state and the open-loop pacing schedule.

use std::time::{Duration, Instant};

/// Longest session a sender runs, one year.
pub const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Offset from the session start at which the packet with zero-based index
/// `index` must leave.
///
/// Computed from the absolute start, never from the previous departure, so
/// rounding in one sleep does not carry over into the next. An offset too
/// large for a [`Duration`] saturates to [`Duration::MAX`].
pub fn departure_offset(index: u64, packet_len: usize, rate_bytes_per_sec: f64) -> Duration {
    Duration::try_from_secs_f64(index as f64 * packet_len as f64 / rate_bytes_per_sec)
        .unwrap_or(Duration::MAX)
}

/// Throughput over one notify window, as seen by the sender.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SendReport {
    /// Time since the session started.
    pub elapsed: Duration,
    /// Wall clock throughput over the window, bits per second.
    pub send_rate_bps: f64,
    /// Throughput counting only time spent inside the send call, bits per second.
    pub emit_rate_bps: f64,
    /// Packets sent in the window.
    pub packets: u64,
}

#[derive(Debug, Clone, Copy)]
struct SendWindow {
    started: Instant,
    packets: u64,
    bytes: u64,
    emit_time: Duration,
}

impl SendWindow {
    fn new(started: Instant) -> Self {
        Self {
            started,
            packets: 0,
            bytes: 0,
            emit_time: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PacerSession {
    packet_len: usize,
    rate_bytes_per_sec: f64,
    start: Instant,
    end: Instant,
    next_seq: u64,
    packets_sent: u64,
    window: SendWindow,
}

impl PacerSession {
    /// Opens a session at `start`. A duration past what the clock can
    /// represent is cut to [`MAX_DURATION`].
    pub fn new(
        start: Instant,
        duration: Duration,
        rate_bytes_per_sec: f64,
        packet_len: usize,
    ) -> Self {
        Self {
            packet_len,
            rate_bytes_per_sec,
            start,
            end: start
                .checked_add(duration.min(MAX_DURATION))
                .unwrap_or(start),
            next_seq: 1,
            packets_sent: 0,
            window: SendWindow::new(start),
        }
    }

    pub fn is_running(&self, now: Instant) -> bool {
        now < self.end
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn end(&self) -> Instant {
        self.end
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    /// Hands out the next sequence id, starting at 1.
    pub fn next_sequence(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Accounts one transmitted packet and the time spent in the send call.
    pub fn record_send(&mut self, bytes: usize, emit_time: Duration) {
        self.packets_sent += 1;
        self.window.packets += 1;
        self.window.bytes += bytes as u64;
        self.window.emit_time += emit_time;
    }

    /// Closes the window if `interval` has passed since it opened.
    pub fn take_report(&mut self, now: Instant, interval: Duration) -> Option<SendReport> {
        let window_len = now.saturating_duration_since(self.window.started);
        if window_len < interval {
            return None;
        }

        let bits = 8.0 * self.packet_len as f64 * self.window.packets as f64;
        let report = SendReport {
            elapsed: now.saturating_duration_since(self.start),
            send_rate_bps: rate(bits, window_len),
            emit_rate_bps: rate(bits, self.window.emit_time),
            packets: self.window.packets,
        };
        self.window = SendWindow::new(now);
        Some(report)
    }

    /// When the next packet is due, never later than the session end.
    pub fn next_departure(&self) -> Instant {
        let offset = departure_offset(self.packets_sent, self.packet_len, self.rate_bytes_per_sec);
        match self.start.checked_add(offset) {
            Some(due) => due.min(self.end),
            None => self.end,
        }
    }
}

fn rate(bits: f64, over: Duration) -> f64 {
    let secs = over.as_secs_f64();
    if secs > 0.0 { bits / secs } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_departure_offset_is_absolute() {
        // 150 bytes at 100 kB/s is one packet every 1.5ms
        assert_eq!(departure_offset(0, 150, 100_000.0), Duration::ZERO);
        assert_eq!(
            departure_offset(1, 150, 100_000.0),
            Duration::from_secs_f64(0.0015)
        );

        let offset = departure_offset(1000, 150, 100_000.0);
        let expected = Duration::from_millis(1500);
        let diff = offset.abs_diff(expected);
        assert!(diff < Duration::from_nanos(10), "{offset:?}");
    }

    #[test]
    fn test_sequence_starts_at_one() {
        let mut session = PacerSession::new(Instant::now(), Duration::from_secs(1), 1000.0, 150);
        assert_eq!(session.next_sequence(), 1);
        assert_eq!(session.next_sequence(), 2);
        assert_eq!(session.next_sequence(), 3);
    }

    #[test]
    fn test_next_departure_follows_packets_sent() {
        let start = Instant::now();
        let mut session = PacerSession::new(start, Duration::from_secs(10), 100_000.0, 150);
        assert_eq!(session.next_departure(), start);

        for _ in 0..4 {
            session.record_send(150, Duration::from_micros(5));
        }
        let offset = session.next_departure() - start;
        assert!(offset.abs_diff(Duration::from_millis(6)) < Duration::from_nanos(10));
    }

    #[test]
    fn test_next_departure_clamped_to_end() {
        let start = Instant::now();
        // one packet every 15 seconds
        let mut session = PacerSession::new(start, Duration::from_secs(2), 10.0, 150);
        session.record_send(150, Duration::ZERO);
        assert_eq!(session.next_departure(), start + Duration::from_secs(2));
    }

    #[test]
    fn test_is_running_until_end() {
        let start = Instant::now();
        let session = PacerSession::new(start, Duration::from_secs(2), 10.0, 150);
        assert!(session.is_running(start));
        assert!(session.is_running(start + Duration::from_millis(1999)));
        assert!(!session.is_running(start + Duration::from_secs(2)));
    }

    #[test]
    fn test_huge_duration_is_capped() {
        let start = Instant::now();
        let session = PacerSession::new(start, Duration::from_secs_f64(1e19), 100.0, 150);
        assert_eq!(session.end(), start + MAX_DURATION);
        assert!(session.is_running(start + Duration::from_secs(3600)));
    }

    #[test]
    fn test_tiny_rate_departs_at_end() {
        assert_eq!(departure_offset(1, 150, 1e-20), Duration::MAX);
        assert_eq!(departure_offset(0, 150, 1e-20), Duration::ZERO);

        let start = Instant::now();
        let mut session = PacerSession::new(start, Duration::from_secs(2), 1e-20, 150);
        assert_eq!(session.next_departure(), start);
        session.record_send(150, Duration::ZERO);
        assert_eq!(session.next_departure(), session.end());
    }

    #[test]
    fn test_report_rates() {
        let start = Instant::now();
        let mut session = PacerSession::new(start, Duration::from_secs(10), 100_000.0, 150);

        for _ in 0..100 {
            session.record_send(150, Duration::from_micros(10));
        }

        assert!(
            session
                .take_report(start + Duration::from_millis(100), Duration::from_millis(500))
                .is_none()
        );

        let report = session
            .take_report(start + Duration::from_millis(500), Duration::from_millis(500))
            .unwrap();

        assert_eq!(report.packets, 100);
        assert_eq!(report.elapsed, Duration::from_millis(500));
        // 100 * 150 * 8 = 120_000 bits over 0.5s
        assert!((report.send_rate_bps - 240_000.0).abs() < 1e-6);
        // same bits over 1ms of emit time
        assert!((report.emit_rate_bps - 120_000_000.0).abs() < 1e-3);
    }

    #[test]
    fn test_report_resets_window() {
        let start = Instant::now();
        let interval = Duration::from_millis(500);
        let mut session = PacerSession::new(start, Duration::from_secs(10), 100_000.0, 150);

        session.record_send(150, Duration::from_micros(10));
        session.take_report(start + interval, interval).unwrap();

        // nothing sent since, the next window reports zero everywhere
        let report = session.take_report(start + 2 * interval, interval).unwrap();
        assert_eq!(report.packets, 0);
        assert_eq!(report.send_rate_bps, 0.0);
        assert_eq!(report.emit_rate_bps, 0.0);
        assert_eq!(session.packets_sent(), 1);
    }
}
