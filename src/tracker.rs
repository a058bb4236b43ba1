//! Probe receiver measuring loss and one-way delay.
//!
//! This module provides [`Tracker`], a blocking receiver that classifies every
//! probe against the stream seen so far, writes one trace line per packet and
//! prints windowed and cumulative statistics every notify interval.
//!
//! A new session starts whenever a probe with sequence id 1 arrives. That is
//! the only sign of a restarted sender, so a duplicated first packet also
//! restarts the session and truncates the trace file.

use std::{net::UdpSocket, time::Instant};

use crate::{
    config::TrackerConfig,
    errors::UdpPerfError,
    result::{SessionSummary, WindowHistory},
    utils::{
        accounting::{Arrival, StreamAccounting},
        clock::{Shutdown, wall_micros},
        log_sink::{LogRecord, LogSink},
        net_utils::{RECV_POLL_INTERVAL, is_transient},
        probe::{PACKET_LEN, ProbePacket},
        telemetry::{LinkQuality, LinkQualityProvider},
        ui::{print_receiver_header, print_summary, print_window_report},
    },
};

/// Receive buffer size, larger than a probe so oversized datagrams are detected.
pub(crate) const RECV_BUF_LEN: usize = 2048;

/// What a receive loop hands back when it stops.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerReport {
    /// Sessions opened during the run.
    pub sessions: u64,
    /// Summary of the session open when the loop stopped.
    pub last_session: Option<SessionSummary>,
}

struct ActiveSession {
    accounting: StreamAccounting,
    sink: LogSink,
    windows: WindowHistory,
}

impl ActiveSession {
    fn open(config: &TrackerConfig, first_seq: u64, now: Instant) -> Result<Self, UdpPerfError> {
        let sink = LogSink::create(&config.log_path)?;
        log::info!(
            "new session starting at sequence {first_seq}, tracing to {}",
            sink.path().display()
        );
        print_receiver_header();
        Ok(Self {
            accounting: StreamAccounting::new(first_seq, now, PACKET_LEN),
            sink,
            windows: WindowHistory::new(),
        })
    }

    fn finish(self, now: Instant) -> Result<SessionSummary, UdpPerfError> {
        let summary = SessionSummary::from_session(&self.accounting, &self.windows, now);
        self.sink.close()?;
        print_summary(&summary);
        Ok(summary)
    }
}

/// Per-packet state machine shared by the blocking and the async loop.
pub struct SessionTracker {
    config: TrackerConfig,
    telemetry: Box<dyn LinkQualityProvider + Send>,
    session: Option<ActiveSession>,
    sessions: u64,
    telemetry_missing: bool,
}

impl SessionTracker {
    pub fn new(
        config: TrackerConfig,
        telemetry: Box<dyn LinkQualityProvider + Send>,
    ) -> Result<Self, UdpPerfError> {
        config.validate()?;
        Ok(Self {
            config,
            telemetry,
            session: None,
            sessions: 0,
            telemetry_missing: false,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Processes one datagram received at `now`, with the receiver wall clock
    /// at `wall_now_micros`.
    ///
    /// # Errors
    ///
    /// - [`UdpPerfError::BadLength`] / [`UdpPerfError::MalformedProbe`] for a
    ///   datagram that is not a probe. No state is touched in that case.
    /// - [`UdpPerfError::LogOpenFailed`] / [`UdpPerfError::LogWriteFailed`] if
    ///   the trace file cannot be written.
    pub fn handle_datagram(
        &mut self,
        datagram: &[u8],
        now: Instant,
        wall_now_micros: i64,
    ) -> Result<Arrival, UdpPerfError> {
        let probe = ProbePacket::read_packet(datagram)?;

        let session = match self.session.take() {
            Some(active) if probe.seq != 1 => active,
            previous => {
                // the old trace is closed before the new one is created
                if let Some(old) = previous {
                    old.finish(now)?;
                }
                self.sessions += 1;
                ActiveSession::open(&self.config, probe.seq, now)?
            }
        };
        let session = self.session.insert(session);

        // sender and receiver clocks are not synchronized, only trends within a session are meaningful
        let delay_micros = i128::from(wall_now_micros) - i128::from(probe.sent_micros);
        let delay_secs = delay_micros as f64 / 1_000_000.0;
        let arrival = session.accounting.record(probe.seq, delay_secs);
        match arrival {
            Arrival::Lost { first, last } => log::warn!("lost {first} - {last}"),
            Arrival::Delayed => log::info!("delayed {}", probe.seq),
            Arrival::InOrder => {}
        }

        let link = match self.telemetry.sample(&self.config.interface) {
            Some(link) => {
                self.telemetry_missing = false;
                link
            }
            None => {
                if !self.telemetry_missing {
                    log::warn!(
                        "no link quality for {}, logging {} dB",
                        self.config.interface,
                        LinkQuality::UNAVAILABLE.level
                    );
                    self.telemetry_missing = true;
                }
                LinkQuality::UNAVAILABLE
            }
        };

        if let Some(report) = session
            .accounting
            .take_report(now, self.config.notify_interval)
        {
            print_window_report(&report, link);
            session.windows.push(report);
        }

        session.sink.record(&LogRecord {
            seq: probe.seq,
            delay_secs,
            cumulative_lost: session.accounting.running_lost(),
            link,
        })?;

        Ok(arrival)
    }

    /// State of the open session, if any.
    pub fn accounting(&self) -> Option<&StreamAccounting> {
        self.session.as_ref().map(|s| &s.accounting)
    }

    pub fn sessions(&self) -> u64 {
        self.sessions
    }

    /// Closes the open session, flushing its trace file.
    pub fn finish(&mut self, now: Instant) -> Result<TrackerReport, UdpPerfError> {
        let last_session = match self.session.take() {
            Some(active) => Some(active.finish(now)?),
            None => None,
        };
        Ok(TrackerReport {
            sessions: self.sessions,
            last_session,
        })
    }
}

/// Blocking receive loop around a [`SessionTracker`].
pub struct Tracker {
    inner: SessionTracker,
    shutdown: Shutdown,
}

impl Tracker {
    /// Creates a new tracker.
    ///
    /// - `config`: notify interval, trace file and telemetry interface.
    /// - `telemetry`: link quality source, see [`crate::utils::telemetry::default_provider`].
    /// - `shutdown`: token that stops [`Tracker::run`].
    ///
    /// # Errors
    ///
    /// Returns [`UdpPerfError::InvalidConfig`] for a zero notify interval.
    pub fn new(
        config: TrackerConfig,
        telemetry: Box<dyn LinkQualityProvider + Send>,
        shutdown: Shutdown,
    ) -> Result<Self, UdpPerfError> {
        Ok(Self {
            inner: SessionTracker::new(config, telemetry)?,
            shutdown,
        })
    }

    /// Runs the receive loop until the shutdown token fires.
    ///
    /// The socket is polled with a short read timeout so shutdown is noticed
    /// while waiting. Transient receive errors are retried and never touch the
    /// sequence state.
    ///
    /// # Errors
    ///
    /// Returns [`UdpPerfError::RecvFailed`] for a non-transient receive error,
    /// and any error of [`SessionTracker::handle_datagram`]. The open trace file
    /// is flushed on every exit path.
    pub fn run(&mut self, sock: &UdpSocket) -> Result<TrackerReport, UdpPerfError> {
        sock.set_read_timeout(Some(RECV_POLL_INTERVAL))
            .map_err(|source| UdpPerfError::SocketOption {
                option: "SO_RCVTIMEO",
                source,
            })?;
        if let Ok(addr) = sock.local_addr() {
            log::info!("listening on {addr}");
        }

        let outcome = self.receive_loop(sock);
        let finished = self.inner.finish(Instant::now());
        // a loop error wins over a flush error
        let report = match outcome {
            Ok(()) => finished?,
            Err(e) => {
                if let Err(flush) = finished {
                    log::error!("{flush}");
                }
                return Err(e);
            }
        };
        log::info!("receiver stopped after {} session(s)", report.sessions);
        Ok(report)
    }

    fn receive_loop(&mut self, sock: &UdpSocket) -> Result<(), UdpPerfError> {
        let mut buf = [0u8; RECV_BUF_LEN];
        while !self.shutdown.is_triggered() {
            let len = match sock.recv_from(&mut buf) {
                Ok((len, _)) => len,
                Err(e) if is_transient(&e) => continue,
                Err(e) => return Err(UdpPerfError::RecvFailed(e)),
            };
            self.inner
                .handle_datagram(&buf[..len], Instant::now(), wall_micros())?;
        }
        Ok(())
    }

    pub fn session_tracker(&self) -> &SessionTracker {
        &self.inner
    }
}
