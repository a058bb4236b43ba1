use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UdpPerfError {
    #[error("Failed to bind socket address: {0}")]
    BindFailed(io::Error),
    #[error("Failed to set socket option {option}: {source}")]
    SocketOption {
        option: &'static str,
        source: io::Error,
    },
    #[error("Could not resolve host {host}: {source}")]
    ResolveFailed { host: String, source: io::Error },
    #[error("Host {0} has no IPv4 address")]
    NoIpv4Address(String),

    #[error("Udp socket failed to send data: {0}")]
    SendFailed(io::Error),
    #[error("Could not emit packet: sent {sent} of {expected} bytes")]
    ShortSend { sent: usize, expected: usize },
    #[error("Udp socket failed to receive data: {0}")]
    RecvFailed(io::Error),

    #[error("The packet could only be partially obtained: got {len} bytes, expected {expected}")]
    BadLength { len: usize, expected: usize },
    #[error("Malformed probe payload: {0}")]
    MalformedProbe(String),

    #[error("Failed to open log file {path}: {source}")]
    LogOpenFailed { path: PathBuf, source: io::Error },
    #[error("Failed to write log record: {0}")]
    LogWriteFailed(io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_operation() {
        let err = UdpPerfError::ShortSend {
            sent: 100,
            expected: 150,
        };
        assert_eq!(
            err.to_string(),
            "Could not emit packet: sent 100 of 150 bytes"
        );

        let err = UdpPerfError::SocketOption {
            option: "SO_SNDBUF",
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().contains("SO_SNDBUF"));
    }
}
