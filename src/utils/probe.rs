//! Wire format of the probe datagram.
//!
//! A probe is two newline-terminated decimal integers, the sequence id and the
//! send timestamp in microseconds since the UNIX epoch, zero padded to exactly
//! [`PACKET_LEN`] bytes. Bytes after the second newline are never interpreted.

use std::io::Write;

use crate::errors::UdpPerfError;

/// Exact length of every probe datagram on the wire.
pub const PACKET_LEN: usize = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbePacket {
    /// Sequence number, starting at 1 for every sender run.
    pub seq: u64,
    /// Sender wall clock at emission, microseconds since UNIX_EPOCH.
    pub sent_micros: i64,
}

impl ProbePacket {
    pub fn new(seq: u64, sent_micros: i64) -> Self {
        Self { seq, sent_micros }
    }

    /// Serializes the probe into `buffer`, overwriting all of it.
    pub fn write_packet(&self, buffer: &mut [u8; PACKET_LEN]) -> Result<(), UdpPerfError> {
        buffer.fill(0);
        let mut cursor = &mut buffer[..];
        write!(cursor, "{}\n{}\n", self.seq, self.sent_micros)
            .map_err(|_| UdpPerfError::MalformedProbe("record does not fit the datagram".into()))
    }

    /// Parses a received datagram.
    ///
    /// # Errors
    ///
    /// - [`UdpPerfError::BadLength`] if the datagram is not exactly [`PACKET_LEN`] bytes.
    /// - [`UdpPerfError::MalformedProbe`] if either field is missing or not a number,
    ///   or the sequence id is 0.
    pub fn read_packet(datagram: &[u8]) -> Result<Self, UdpPerfError> {
        if datagram.len() != PACKET_LEN {
            return Err(UdpPerfError::BadLength {
                len: datagram.len(),
                expected: PACKET_LEN,
            });
        }

        let mut fields = datagram.splitn(3, |b| *b == b'\n');
        let seq: u64 = parse_field(fields.next(), "sequence id")?;
        let sent_micros: i64 = parse_field(fields.next(), "send timestamp")?;
        // a second terminator must exist, otherwise the timestamp ran into the padding
        if fields.next().is_none() {
            return Err(UdpPerfError::MalformedProbe(
                "send timestamp is not newline terminated".into(),
            ));
        }
        if seq == 0 {
            return Err(UdpPerfError::MalformedProbe("sequence id 0".into()));
        }

        Ok(Self { seq, sent_micros })
    }
}

fn parse_field<T: std::str::FromStr>(
    field: Option<&[u8]>,
    name: &str,
) -> Result<T, UdpPerfError> {
    let raw = field.ok_or_else(|| UdpPerfError::MalformedProbe(format!("missing {name}")))?;
    std::str::from_utf8(raw)
        .ok()
        .map(str::trim)
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| UdpPerfError::MalformedProbe(format!("invalid {name}")))
}
