//! Per-packet trace file written by the tracker.
//!
//! One line per received packet:
//! `R <seq> <delay_seconds> <cumulative_lost> <signal_level> <signal_quality>`.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::{errors::UdpPerfError, utils::telemetry::LinkQuality};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogRecord {
    pub seq: u64,
    pub delay_secs: f64,
    pub cumulative_lost: u64,
    pub link: LinkQuality,
}

#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl LogSink {
    /// Creates (truncating) the trace file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, UdpPerfError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| UdpPerfError::LogOpenFailed {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&mut self, record: &LogRecord) -> Result<(), UdpPerfError> {
        writeln!(
            self.writer,
            "R {} {:.6} {} {} {}",
            record.seq,
            record.delay_secs,
            record.cumulative_lost,
            record.link.level,
            record.link.quality
        )
        .map_err(UdpPerfError::LogWriteFailed)
    }

    /// Flushes and closes the file.
    pub fn close(mut self) -> Result<(), UdpPerfError> {
        self.writer.flush().map_err(UdpPerfError::LogWriteFailed)
    }
}
