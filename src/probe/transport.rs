use serde::{Deserialize, Serialize};
use socket2::Socket;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use crate::config::MAX_TIMEOUT;
use crate::error::Result;
use crate::probe::correlate::{ReplyKind, parse_reply};
use crate::probe::icmp::{DEFAULT_PAYLOAD_SIZE, build_echo_request, get_identifier};
use crate::probe::socket::{SocketInfo, create_socket_pair, recv_icmp, send_icmp, set_ttl};

/// Classified result of a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeOutcome {
    /// Nothing came back before the timeout
    NoReply,
    /// An intermediate router answered with Time Exceeded (code 0)
    HopResponded(IpAddr),
    /// The target answered the echo request
    DestinationReached(IpAddr),
    /// Any other ICMP error quoting our request
    OtherIcmpError(IpAddr),
}

impl ProbeOutcome {
    /// True for any reply at all
    pub fn is_reply(&self) -> bool {
        !matches!(self, Self::NoReply)
    }
}

impl From<(ReplyKind, IpAddr)> for ProbeOutcome {
    fn from((kind, responder): (ReplyKind, IpAddr)) -> Self {
        match kind {
            ReplyKind::EchoReply => Self::DestinationReached(responder),
            ReplyKind::TimeExceeded(0) => Self::HopResponded(responder),
            _ => Self::OtherIcmpError(responder),
        }
    }
}

/// Sends one echo request with a given hop limit and waits for its reply
///
/// Blocking: each call sends exactly one request and returns after one
/// matching reply or after `timeout`.
pub trait ProbeTransport {
    fn probe(&mut self, destination: IpAddr, ttl: u8, timeout: Duration) -> ProbeOutcome;
}

impl<T: ProbeTransport + ?Sized> ProbeTransport for &mut T {
    fn probe(&mut self, destination: IpAddr, ttl: u8, timeout: Duration) -> ProbeOutcome {
        (**self).probe(destination, ttl, timeout)
    }
}

/// ICMPv4 echo transport over a raw (or unprivileged ping) socket
pub struct IcmpTransport {
    send: Socket,
    recv: SocketInfo,
    identifier: u16,
    sequence: u16,
    buffer: Vec<u8>,
}

impl IcmpTransport {
    pub fn new() -> Result<Self> {
        let (send, recv) = create_socket_pair()?;
        Ok(Self {
            send,
            recv,
            identifier: get_identifier(),
            sequence: 0,
            buffer: vec![0u8; 1500],
        })
    }

    fn send_request(&mut self, destination: IpAddr, ttl: u8) -> Result<u16> {
        self.sequence = self.sequence.wrapping_add(1);
        let packet = build_echo_request(self.identifier, self.sequence, DEFAULT_PAYLOAD_SIZE);
        set_ttl(&self.send, ttl)?;
        send_icmp(&self.send, &packet, destination)?;
        Ok(self.sequence)
    }

    /// Read packets until one answers `sequence` or the deadline passes
    fn await_reply(&mut self, sequence: u16, deadline: Instant) -> Result<ProbeOutcome> {
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(ProbeOutcome::NoReply);
            }

            let Some(recv) = recv_icmp(&self.recv.socket, &mut self.buffer, deadline - now)? else {
                continue;
            };

            match parse_reply(
                &self.buffer[..recv.len],
                recv.source,
                self.identifier,
                self.recv.is_dgram,
            ) {
                Some(reply) if reply.sequence == sequence => {
                    return Ok(ProbeOutcome::from((reply.kind, reply.responder)));
                }
                Some(reply) => {
                    tracing::trace!(
                        "Late reply for seq {} from {} (waiting for {})",
                        reply.sequence,
                        reply.responder,
                        sequence
                    );
                }
                None => {
                    tracing::trace!("Ignored {} byte ICMP packet from {}", recv.len, recv.source);
                }
            }
        }
    }
}

impl ProbeTransport for IcmpTransport {
    fn probe(&mut self, destination: IpAddr, ttl: u8, timeout: Duration) -> ProbeOutcome {
        let deadline = Instant::now() + timeout.min(MAX_TIMEOUT);

        let sequence = match self.send_request(destination, ttl) {
            Ok(seq) => seq,
            Err(e) => {
                tracing::warn!("Failed to send probe TTL {}: {}", ttl, e);
                return ProbeOutcome::NoReply;
            }
        };

        match self.await_reply(sequence, deadline) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Receive error for probe TTL {}: {}", ttl, e);
                ProbeOutcome::NoReply
            }
        }
    }
}
