use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::mem::MaybeUninit;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::error::{Result, TraceError};

/// Socket capability level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketCapability {
    /// Full raw socket access
    Raw,
    /// Unprivileged ICMP socket (ping_group_range)
    Dgram,
}

/// Socket with metadata about type (for DGRAM-aware parsing)
#[derive(Debug)]
pub struct SocketInfo {
    pub socket: Socket,
    /// True if SOCK_DGRAM (no IP header in received packets)
    pub is_dgram: bool,
}

/// Check socket permissions and return capability level
/// On macOS a RAW socket is required to receive Time Exceeded from routers
#[cfg(target_os = "macos")]
pub fn check_permissions() -> Result<SocketCapability> {
    if create_raw_icmp_socket().is_err() {
        return Err(TraceError::Permission(
            "Insufficient permissions for ICMP sockets.\n\n\
             On macOS, raw sockets are required to receive ICMP Time Exceeded\n\
             messages from intermediate routers.\n\n\
             Fix: Run with sudo: sudo pathmon <target>"
                .to_string(),
        ));
    }

    if create_dgram_icmp_socket().is_err() {
        return Err(TraceError::Permission(
            "Failed to create ICMP socket for sending.\n\n\
             Fix: Run with sudo: sudo pathmon <target>"
                .to_string(),
        ));
    }

    Ok(SocketCapability::Raw)
}

/// Check socket permissions and return capability level
/// On Linux, prefers RAW for full functionality
#[cfg(not(target_os = "macos"))]
pub fn check_permissions() -> Result<SocketCapability> {
    if create_raw_icmp_socket().is_ok() {
        return Ok(SocketCapability::Raw);
    }

    if create_dgram_icmp_socket().is_ok() {
        tracing::warn!("Using unprivileged ICMP sockets; router replies may be limited");
        return Ok(SocketCapability::Dgram);
    }

    let binary_path = std::env::current_exe()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "pathmon".to_string());

    Err(TraceError::Permission(format!(
        "Insufficient permissions for raw sockets.\n\n\
         Fix options:\n\
         \u{2022} Run with sudo: sudo pathmon <target>\n\
         \u{2022} Add capability: sudo setcap cap_net_raw+ep {}\n\
         \u{2022} Enable unprivileged ICMP: sudo sysctl -w net.ipv4.ping_group_range='0 65534'",
        binary_path
    )))
}

/// Create a raw ICMPv4 socket
pub fn create_raw_icmp_socket() -> Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))?;
    socket.set_nonblocking(false)?;
    Ok(socket)
}

/// Create an unprivileged ICMPv4 socket (SOCK_DGRAM)
pub fn create_dgram_icmp_socket() -> Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::ICMPV4))?;
    socket.set_nonblocking(false)?;
    Ok(socket)
}

/// Create the (send, receive) socket pair used by the ICMP transport
///
/// macOS: DGRAM for sending (honors IP_TTL), RAW for receiving router errors.
/// Elsewhere: one socket, RAW if permitted, DGRAM otherwise. Linux only
/// delivers DGRAM ping replies to the socket that sent the request, so both
/// halves share the same underlying socket there.
pub fn create_socket_pair() -> Result<(Socket, SocketInfo)> {
    #[cfg(target_os = "macos")]
    {
        let send = create_dgram_icmp_socket()?;
        let recv = create_raw_icmp_socket()?;
        let _ = recv.set_recv_buffer_size(1024 * 1024);
        Ok((
            send,
            SocketInfo {
                socket: recv,
                is_dgram: false,
            },
        ))
    }

    #[cfg(not(target_os = "macos"))]
    {
        let (socket, is_dgram) = match create_raw_icmp_socket() {
            Ok(socket) => (socket, false),
            Err(_) => (create_dgram_icmp_socket()?, true),
        };
        let _ = socket.set_recv_buffer_size(1024 * 1024);
        let recv = socket.try_clone()?;
        Ok((
            socket,
            SocketInfo {
                socket: recv,
                is_dgram,
            },
        ))
    }
}

/// Set TTL on a socket
pub fn set_ttl(socket: &Socket, ttl: u8) -> Result<()> {
    socket.set_ttl(ttl as u32)?;
    Ok(())
}

/// Send ICMP packet to target
pub fn send_icmp(socket: &Socket, packet: &[u8], target: IpAddr) -> Result<usize> {
    let addr = SocketAddr::new(target, 0);
    let sent = socket.send_to(packet, &SockAddr::from(addr))?;
    Ok(sent)
}

/// A received datagram
#[derive(Debug)]
pub struct RecvResult {
    pub len: usize,
    pub source: IpAddr,
}

/// Wait up to `wait` for one ICMP packet
///
/// Returns Ok(None) when the wait elapses without a packet.
pub fn recv_icmp(socket: &Socket, buffer: &mut [u8], wait: Duration) -> Result<Option<RecvResult>> {
    // A zero read timeout means "block forever" to the OS
    let wait = wait.max(Duration::from_millis(1));
    socket.set_read_timeout(Some(wait))?;

    let mut raw = vec![MaybeUninit::<u8>::uninit(); buffer.len()];
    match socket.recv_from(&mut raw) {
        Ok((len, addr)) => {
            for (dst, src) in buffer.iter_mut().zip(&raw[..len]) {
                // SAFETY: recv_from initialized the first `len` bytes
                *dst = unsafe { src.assume_init() };
            }
            let source = addr.as_socket().map(|sa| sa.ip()).ok_or_else(|| {
                TraceError::Socket(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "reply from non-IP address family",
                ))
            })?;
            Ok(Some(RecvResult { len, source }))
        }
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
            Ok(None)
        }
        Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
        Err(e) => Err(e.into()),
    }
}
