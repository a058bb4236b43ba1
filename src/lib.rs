//! A tool for creating loss and delay traces of a UDP path.
//!
//! Two roles, run on the two ends of the path:
//!
//! - [`Pacer`] sends fixed-size probes carrying a sequence number and a send
//!   timestamp, at a constant byte rate, for a fixed duration.
//! - [`Tracker`] receives the probes, detects lost and reordered packets,
//!   estimates one-way delay and writes one trace line per packet.
//!
//! Both are single-threaded blocking loops stopped through a [`Shutdown`]
//! token. [`AsyncPacer`] and [`AsyncTracker`] run the same algorithms on tokio.
//!
//! # Details
//!
//! - Use `udperf::Pacer` to send probes
//! ```no_run
//! use std::time::Duration;
//! use udperf::{Pacer, PacerConfig, Shutdown};
//! use udperf::net_utils::{resolve_ipv4, sender_socket};
//!
//! fn main() -> Result<(), udperf::UdpPerfError> {
//!     let dest = resolve_ipv4("192.168.1.7", udperf::DEFAULT_PORT)?;
//!     let sock = sender_socket()?;
//!
//!     // 100 kB/s for 2 seconds
//!     let config = PacerConfig::from_kbytes(100.0, Duration::from_secs(2));
//!     let mut pacer = Pacer::new(config, Shutdown::new())?;
//!
//!     let report = pacer.run(&sock, dest)?;
//!     println!("sent {} packets", report.packets_sent);
//!     Ok(())
//! }
//! ```
//!
//! - The stream accounting can be fed by hand. Here packet 3 arrives late:
//!
//! ```rust
//! use std::time::Instant;
//! use udperf::accounting::{Arrival, StreamAccounting};
//!
//! let mut acc = StreamAccounting::new(1, Instant::now(), udperf::PACKET_LEN);
//! let arrivals: Vec<Arrival> = [1, 2, 4, 5, 3]
//!     .into_iter()
//!     .map(|seq| acc.record(seq, 0.002))
//!     .collect();
//!
//! assert_eq!(arrivals[2], Arrival::Lost { first: 3, last: 3 });
//! assert_eq!(arrivals[4], Arrival::Delayed);
//! assert_eq!(acc.running_lost(), 0);
//! assert_eq!(acc.highest_seq(), 5);
//! ```
//!
//! One-way delay is computed from the sender's and the receiver's wall clocks,
//! which are not synchronized. It is only comparable within one session.

mod config;
pub use config::{
    DEFAULT_INTERFACE, DEFAULT_LOG_PATH, DEFAULT_PORT, NOTIFY_INTERVAL, PacerConfig, TrackerConfig,
};
mod errors;
pub use errors::UdpPerfError;
mod pacer;
pub use pacer::{Pacer, PacerReport};
mod result;
pub use result::{MEDIAN_WINDOWS, SessionSummary, WindowHistory};
mod tracker;
pub use tracker::{SessionTracker, Tracker, TrackerReport};
mod utils;
pub use utils::clock::{Shutdown, TimeSource, Wake};
pub use utils::probe::{PACKET_LEN, ProbePacket};
pub use utils::{accounting, net_utils, pacing, telemetry};

// async part
mod async_pacer;
pub use async_pacer::AsyncPacer;
mod async_tracker;
pub use async_tracker::AsyncTracker;
