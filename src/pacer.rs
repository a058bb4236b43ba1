//! Rate-controlled probe sender.
//!
//! This module provides [`Pacer`], a sender that emits sequence-numbered
//! probe packets at a fixed byte rate for a fixed duration, and prints the
//! achieved throughput every notify interval.

use std::{
    net::{SocketAddr, UdpSocket},
    time::{Duration, Instant},
};

use crate::{
    config::PacerConfig,
    errors::UdpPerfError,
    utils::{
        clock::{Shutdown, TimeSource, Wake, wall_micros},
        pacing::PacerSession,
        probe::{PACKET_LEN, ProbePacket},
        ui::{print_send_report, print_sender_header},
    },
};

/// Outcome of a finished [`Pacer::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacerReport {
    /// Packets handed to the socket.
    pub packets_sent: u64,
    /// Time from the first packet to the end of the loop.
    pub elapsed: Duration,
    /// Whether the run was cut short by the shutdown token.
    pub interrupted: bool,
}

#[derive(Debug)]
pub struct Pacer {
    config: PacerConfig,
    clock: TimeSource,
}

impl Pacer {
    /// Creates a new pacer.
    ///
    /// # Parameters
    /// - `config`: target rate, duration and notify interval.
    /// - `shutdown`: token that ends the run early when triggered.
    ///
    /// # Errors
    ///
    /// Returns [`UdpPerfError::InvalidConfig`] if the rate or duration is not positive.
    pub fn new(config: PacerConfig, shutdown: Shutdown) -> Result<Self, UdpPerfError> {
        config.validate()?;
        Ok(Self {
            config,
            clock: TimeSource::new(shutdown),
        })
    }

    /// Sends probes to `dest` until the duration elapses or shutdown is triggered.
    ///
    /// The `n`-th packet (counting from 0) is due at `start + n * PACKET_LEN / rate`.
    /// The loop sleeps until that instant after every send, so a late wakeup is
    /// made up by the following ones instead of accumulating.
    ///
    /// # Parameters
    /// - `sock`: an unconnected [`UdpSocket`], see [`crate::utils::net_utils::sender_socket`].
    /// - `dest`: address of the tracker.
    ///
    /// Returns:
    /// - [`UdpPerfError::SendFailed`] if sending fails.
    /// - [`UdpPerfError::ShortSend`] if the socket accepted only part of a probe.
    pub fn run(&mut self, sock: &UdpSocket, dest: SocketAddr) -> Result<PacerReport, UdpPerfError> {
        log::info!(
            "sending to {dest} at {:.0} B/s for {:.1}s",
            self.config.rate_bytes_per_sec,
            self.config.duration.as_secs_f64()
        );

        let mut buf = [0u8; PACKET_LEN];
        let mut session = PacerSession::new(
            self.clock.now(),
            self.config.duration,
            self.config.rate_bytes_per_sec,
            PACKET_LEN,
        );
        let mut interrupted = false;

        print_sender_header();
        while session.is_running(self.clock.now()) {
            let seq = session.next_sequence();
            ProbePacket::new(seq, wall_micros()).write_packet(&mut buf)?;

            let before = Instant::now();
            let sent = sock.send_to(&buf, dest).map_err(UdpPerfError::SendFailed)?;
            let emit_time = before.elapsed();
            if sent != PACKET_LEN {
                return Err(UdpPerfError::ShortSend {
                    sent,
                    expected: PACKET_LEN,
                });
            }
            session.record_send(sent, emit_time);

            if let Some(report) = session.take_report(self.clock.now(), self.config.notify_interval)
            {
                print_send_report(&report);
            }

            if self.clock.sleep_until(session.next_departure()) == Wake::Interrupted {
                interrupted = true;
                break;
            }
        }

        let report = PacerReport {
            packets_sent: session.packets_sent(),
            elapsed: self.clock.now().saturating_duration_since(session.start()),
            interrupted,
        };
        if interrupted {
            log::info!("interrupted after {} packets", report.packets_sent);
        }
        println!("Sender done. Sent {} packets", report.packets_sent);
        Ok(report)
    }
}
