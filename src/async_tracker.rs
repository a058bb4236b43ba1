//! Asynchronous probe receiver.
//!
//! [`AsyncTracker`] drives a [`SessionTracker`] from a tokio socket until its
//! [`CancellationToken`] is cancelled.

use std::time::Instant;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::{
    config::TrackerConfig,
    errors::UdpPerfError,
    tracker::{RECV_BUF_LEN, SessionTracker, TrackerReport},
    utils::{clock::wall_micros, net_utils::is_transient, telemetry::LinkQualityProvider},
};

/// Asynchronous probe receiver.
pub struct AsyncTracker {
    inner: SessionTracker,
    cancel: CancellationToken,
}

impl AsyncTracker {
    /// Creates a new async tracker.
    ///
    /// # Errors
    ///
    /// Returns [`UdpPerfError::InvalidConfig`] for a zero notify interval.
    pub fn new(
        config: TrackerConfig,
        telemetry: Box<dyn LinkQualityProvider + Send>,
        cancel: CancellationToken,
    ) -> Result<Self, UdpPerfError> {
        Ok(Self {
            inner: SessionTracker::new(config, telemetry)?,
            cancel,
        })
    }

    /// Runs the receive loop until the token is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`UdpPerfError::RecvFailed`] for a non-transient receive error,
    /// and any error of [`SessionTracker::handle_datagram`].
    pub async fn run(&mut self, sock: &UdpSocket) -> Result<TrackerReport, UdpPerfError> {
        let mut buf = vec![0u8; RECV_BUF_LEN];

        let outcome = loop {
            let received = tokio::select! {
                _ = self.cancel.cancelled() => break Ok(()),
                received = sock.recv_from(&mut buf) => received,
            };

            let len = match received {
                Ok((len, _)) => len,
                Err(e) if is_transient(&e) => continue,
                Err(e) => break Err(UdpPerfError::RecvFailed(e)),
            };
            if let Err(e) = self
                .inner
                .handle_datagram(&buf[..len], Instant::now(), wall_micros())
            {
                break Err(e);
            }
        };

        let finished = self.inner.finish(Instant::now());
        outcome?;
        finished
    }

    pub fn session_tracker(&self) -> &SessionTracker {
        &self.inner
    }
}
