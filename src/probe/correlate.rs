use pnet::packet::icmp::{IcmpPacket, IcmpTypes};
use pnet::packet::ipv4::Ipv4Packet;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

// IP protocol number
const IPPROTO_ICMP: u8 = 1;

// ICMPv4 type codes
const ICMP_SOURCE_QUENCH: u8 = 4;
const ICMP_REDIRECT: u8 = 5;
const ICMP_ECHO_REQUEST: u8 = 8;
const ICMP_PARAMETER_PROBLEM: u8 = 12;

/// ICMP header size, also the offset of the quoted datagram in error messages
const ICMP_HEADER_LEN: usize = 8;
/// Smallest IPv4 header
const MIN_IPV4_HEADER_LEN: usize = 20;

/// ICMP reply kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyKind {
    EchoReply,
    TimeExceeded(u8),
    DestUnreachable(u8),
    /// Any other error type that quotes our echo request: (type, code)
    OtherError(u8, u8),
}

/// An ICMP packet matched to one of our echo requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    pub responder: IpAddr,
    /// Sequence number of the echo request this answers
    pub sequence: u16,
    pub kind: ReplyKind,
}

/// Parse an ICMPv4 packet and correlate it to our identifier
///
/// RAW sockets hand us the IPv4 header first; DGRAM sockets start at the
/// ICMP header. Returns None for anything malformed or not ours.
pub fn parse_reply(
    data: &[u8],
    responder: IpAddr,
    our_identifier: u16,
    is_dgram: bool,
) -> Option<ParsedReply> {
    if data.is_empty() {
        return None;
    }

    if is_dgram {
        return parse_icmp_message(data, responder, our_identifier);
    }

    let ip_packet = Ipv4Packet::new(data)?;
    if ip_packet.get_version() != 4 {
        return None;
    }
    let ip_header_len = (ip_packet.get_header_length() as usize) * 4;
    if ip_header_len < MIN_IPV4_HEADER_LEN || data.len() < ip_header_len + ICMP_HEADER_LEN {
        return None;
    }

    parse_icmp_message(&data[ip_header_len..], responder, our_identifier)
}

/// Parse a bare ICMP message (no IP header)
fn parse_icmp_message(
    icmp_data: &[u8],
    responder: IpAddr,
    our_identifier: u16,
) -> Option<ParsedReply> {
    let icmp_packet = IcmpPacket::new(icmp_data)?;
    if icmp_data.len() < ICMP_HEADER_LEN {
        return None;
    }
    let code = icmp_packet.get_icmp_code().0;

    let kind = match icmp_packet.get_icmp_type() {
        IcmpTypes::EchoReply => {
            if !validate_icmp_checksum(icmp_data) {
                return None;
            }
            let sequence = match_echo(icmp_data, our_identifier)?;
            return Some(ParsedReply {
                responder,
                sequence,
                kind: ReplyKind::EchoReply,
            });
        }
        IcmpTypes::TimeExceeded => ReplyKind::TimeExceeded(code),
        IcmpTypes::DestinationUnreachable => ReplyKind::DestUnreachable(code),
        other => {
            let icmp_type = other.0;
            if !matches!(
                icmp_type,
                ICMP_SOURCE_QUENCH | ICMP_REDIRECT | ICMP_PARAMETER_PROBLEM
            ) {
                return None;
            }
            ReplyKind::OtherError(icmp_type, code)
        }
    };

    let sequence = parse_quoted_echo(&icmp_data[ICMP_HEADER_LEN..], our_identifier)?;
    Some(ParsedReply {
        responder,
        sequence,
        kind,
    })
}

/// Pull our sequence number out of the datagram quoted by an ICMP error
///
/// The quote is the original IPv4 header plus at least 8 bytes of the
/// original ICMP echo request.
fn parse_quoted_echo(quoted: &[u8], our_identifier: u16) -> Option<u16> {
    let original_ip = Ipv4Packet::new(quoted)?;
    let orig_ihl = (original_ip.get_header_length() as usize) * 4;
    if orig_ihl < MIN_IPV4_HEADER_LEN || quoted.len() < orig_ihl + ICMP_HEADER_LEN {
        return None;
    }
    if original_ip.get_next_level_protocol().0 != IPPROTO_ICMP {
        return None;
    }

    let original_icmp = &quoted[orig_ihl..];
    if original_icmp[0] != ICMP_ECHO_REQUEST {
        return None;
    }
    match_echo(original_icmp, our_identifier)
}

/// Match an echo header (request or reply) against our identifier
///
/// DGRAM sockets may rewrite the identifier, so the copy stored in the first
/// payload bytes is checked as a fallback.
fn match_echo(echo: &[u8], our_identifier: u16) -> Option<u16> {
    let identifier = u16::from_be_bytes([echo[4], echo[5]]);
    let sequence = u16::from_be_bytes([echo[6], echo[7]]);
    if identifier == our_identifier {
        return Some(sequence);
    }

    extract_id_from_payload(&echo[ICMP_HEADER_LEN..], our_identifier).map(|(_, seq)| seq)
}

/// Payload layout: [0-1] identifier, [2-3] sequence, [4-7] timestamp
fn extract_id_from_payload(payload: &[u8], our_identifier: u16) -> Option<(u16, u16)> {
    if payload.len() < 4 {
        return None;
    }
    let payload_id = u16::from_be_bytes([payload[0], payload[1]]);
    let payload_seq = u16::from_be_bytes([payload[2], payload[3]]);
    if payload_id == our_identifier {
        Some((payload_id, payload_seq))
    } else {
        None
    }
}

/// Returns true if the RFC 1071 checksum over `data` is valid
fn validate_icmp_checksum(data: &[u8]) -> bool {
    if data.len() < 4 {
        return false;
    }

    let mut sum: u32 = 0;
    let mut i = 0;
    while i + 1 < data.len() {
        sum += u16::from_be_bytes([data[i], data[i + 1]]) as u32;
        i += 2;
    }
    if i < data.len() {
        sum += (data[i] as u32) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    sum == 0xFFFF || sum == 0x0000
}
