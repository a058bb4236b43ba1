//! Link quality telemetry sampled once per received packet.
//!
//! On Linux the wireless extension statistics are exposed in
//! `/proc/net/wireless`:
//!
//! ```text
//! Inter-| sta-|   Quality        |   Discarded packets               | Missed | WE
//!  face | tus | link level noise |  nwid  crypt   frag  retry   misc | beacon | 22
//!  wlan0: 0000   54.  -56.  -256        0      0      0      0     33        0
//! ```

use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

pub const PROC_NET_WIRELESS: &str = "/proc/net/wireless";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkQuality {
    /// Signal level in dBm.
    pub level: i16,
    /// Link quality, 0..=70 for most drivers.
    pub quality: u8,
}

impl LinkQuality {
    /// Substituted when no sample can be taken. A zeroed driver record
    /// renders as this, and no real radio reports -256 dBm.
    pub const UNAVAILABLE: Self = Self {
        level: -256,
        quality: 0,
    };
}

pub trait LinkQualityProvider {
    /// Samples the link quality of `interface`, `None` if unavailable.
    fn sample(&mut self, interface: &str) -> Option<LinkQuality>;
}

/// Provider for hosts without wireless telemetry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTelemetry;

impl LinkQualityProvider for NoTelemetry {
    fn sample(&mut self, _interface: &str) -> Option<LinkQuality> {
        None
    }
}

/// Reads `/proc/net/wireless` through a handle kept open for the whole run.
#[derive(Debug)]
pub struct ProcWireless {
    path: PathBuf,
    file: File,
    contents: String,
}

impl ProcWireless {
    pub fn open() -> io::Result<Self> {
        Self::open_path(PROC_NET_WIRELESS)
    }

    pub fn open_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self {
            path,
            file,
            contents: String::with_capacity(512),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LinkQualityProvider for ProcWireless {
    fn sample(&mut self, interface: &str) -> Option<LinkQuality> {
        self.contents.clear();
        self.file.seek(SeekFrom::Start(0)).ok()?;
        self.file.read_to_string(&mut self.contents).ok()?;
        parse_wireless(&self.contents, interface)
    }
}

/// Opens the platform provider, falling back to [`NoTelemetry`].
pub fn default_provider() -> Box<dyn LinkQualityProvider + Send> {
    match ProcWireless::open() {
        Ok(provider) => {
            log::debug!("reading link quality from {}", provider.path().display());
            Box::new(provider)
        }
        Err(e) => {
            log::warn!("link quality telemetry unavailable ({PROC_NET_WIRELESS}: {e})");
            Box::new(NoTelemetry)
        }
    }
}

/// Extracts link quality and signal level of `interface` from the contents
/// of `/proc/net/wireless`.
pub fn parse_wireless(contents: &str, interface: &str) -> Option<LinkQuality> {
    contents.lines().find_map(|line| {
        let (name, rest) = line.trim_start().split_once(':')?;
        if name != interface {
            return None;
        }
        // status, link, level, noise, ...
        let mut fields = rest.split_whitespace().skip(1);
        let quality = parse_number(fields.next()?)?;
        let level = parse_number(fields.next()?)?;
        Some(LinkQuality {
            level: level.clamp(i16::MIN as f64, i16::MAX as f64) as i16,
            quality: quality.clamp(0.0, u8::MAX as f64) as u8,
        })
    })
}

fn parse_number(field: &str) -> Option<f64> {
    field.trim_end_matches('.').parse().ok()
}
