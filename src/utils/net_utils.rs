use std::{
    io,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4, ToSocketAddrs, UdpSocket},
    time::Duration,
};

use socket2::{Domain, Protocol, Socket, Type};

use crate::errors::UdpPerfError;

/// How long a blocking receive waits before the tracker re-checks shutdown.
pub const RECV_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Resolves `host` and returns its first IPv4 address with `port`.
pub fn resolve_ipv4(host: &str, port: u16) -> Result<SocketAddr, UdpPerfError> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| UdpPerfError::ResolveFailed {
            host: host.to_string(),
            source,
        })?;

    addrs
        .into_iter()
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| UdpPerfError::NoIpv4Address(host.to_string()))
}

/// Unconnected IPv4 socket with the send buffer set as small as the OS allows,
/// so the send call blocks on the wire instead of filling a kernel queue.
pub fn sender_socket() -> Result<UdpSocket, UdpPerfError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(UdpPerfError::BindFailed)?;

    // the kernel rounds 0 up to its minimum
    socket
        .set_send_buffer_size(0)
        .map_err(|source| UdpPerfError::SocketOption {
            option: "SO_SNDBUF",
            source,
        })?;
    log::debug!(
        "sender socket send buffer is {} bytes",
        socket.send_buffer_size().unwrap_or_default()
    );

    let any = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
    socket.bind(&any.into()).map_err(UdpPerfError::BindFailed)?;
    Ok(socket.into())
}

/// Socket bound to `port` on all IPv4 interfaces.
pub fn receiver_socket(port: u16) -> Result<UdpSocket, UdpPerfError> {
    let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
    UdpSocket::bind(addr).map_err(UdpPerfError::BindFailed)
}

/// Receive errors after which the loop may simply try again.
///
/// Timeouts come from the poll interval. ICMP port unreachable replies to
/// earlier traffic surface as connection refused/reset on some platforms.
pub fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
    )
}
