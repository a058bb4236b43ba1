//! Asynchronous rate-controlled probe sender.
//!
//! [`AsyncPacer`] runs the same schedule as [`crate::Pacer`] on a tokio
//! socket, inside a single task, and stops when its [`CancellationToken`] is
//! cancelled.

use std::{net::SocketAddr, time::Instant};

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::{
    config::PacerConfig,
    errors::UdpPerfError,
    pacer::PacerReport,
    utils::{
        clock::wall_micros,
        pacing::PacerSession,
        probe::{PACKET_LEN, ProbePacket},
        ui::{print_send_report, print_sender_header},
    },
};

/// Asynchronous probe sender.
#[derive(Debug)]
pub struct AsyncPacer {
    config: PacerConfig,
    cancel: CancellationToken,
}

impl AsyncPacer {
    /// Creates a new async pacer.
    ///
    /// # Errors
    ///
    /// Returns [`UdpPerfError::InvalidConfig`] if the rate or duration is not positive.
    pub fn new(config: PacerConfig, cancel: CancellationToken) -> Result<Self, UdpPerfError> {
        config.validate()?;
        Ok(Self { config, cancel })
    }

    /// Sends probes to `dest` until the duration elapses or the token is cancelled.
    ///
    /// Returns:
    /// - [`UdpPerfError::SendFailed`] if sending fails.
    /// - [`UdpPerfError::ShortSend`] if the socket accepted only part of a probe.
    pub async fn run(
        &mut self,
        sock: &UdpSocket,
        dest: SocketAddr,
    ) -> Result<PacerReport, UdpPerfError> {
        let mut buf = [0u8; PACKET_LEN];
        let mut session = PacerSession::new(
            Instant::now(),
            self.config.duration,
            self.config.rate_bytes_per_sec,
            PACKET_LEN,
        );
        let mut interrupted = false;

        print_sender_header();
        while session.is_running(Instant::now()) {
            let seq = session.next_sequence();
            ProbePacket::new(seq, wall_micros()).write_packet(&mut buf)?;

            let before = Instant::now();
            let sent = sock
                .send_to(&buf, dest)
                .await
                .map_err(UdpPerfError::SendFailed)?;
            let emit_time = before.elapsed();
            if sent != PACKET_LEN {
                return Err(UdpPerfError::ShortSend {
                    sent,
                    expected: PACKET_LEN,
                });
            }
            session.record_send(sent, emit_time);

            if let Some(report) = session.take_report(Instant::now(), self.config.notify_interval)
            {
                print_send_report(&report);
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    interrupted = true;
                    break;
                }
                _ = sleep_until_async(session.next_departure()) => {}
            }
        }

        let report = PacerReport {
            packets_sent: session.packets_sent(),
            elapsed: Instant::now().saturating_duration_since(session.start()),
            interrupted,
        };
        println!("Sender done. Sent {} packets", report.packets_sent);
        Ok(report)
    }
}

/// Asynchronous version of the hybrid sleep in [`crate::utils::clock::TimeSource`].
///
/// The tokio timer has millisecond granularity, so the last stretch is
/// covered by yielding to the scheduler.
async fn sleep_until_async(deadline: Instant) {
    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }

        let remaining = deadline - now;
        if remaining > std::time::Duration::from_millis(2) {
            tokio::time::sleep(remaining - std::time::Duration::from_millis(1)).await;
        } else {
            tokio::task::yield_now().await;
        }
    }
}
