use pnet::packet::Packet;
use pnet::packet::MutablePacket;
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{IcmpCode, IcmpPacket, IcmpTypes, checksum};

/// ICMP header size (fixed)
pub const ICMP_HEADER_SIZE: usize = 8;
/// Default payload size (standard ping)
pub const DEFAULT_PAYLOAD_SIZE: usize = 56;
/// Minimum payload size (identifier + sequence copy + 4-byte timestamp)
pub const MIN_PAYLOAD_SIZE: usize = 8;

/// Get process identifier for ICMP identification field
pub fn get_identifier() -> u16 {
    std::process::id() as u16
}

/// Build an ICMPv4 Echo Request packet
///
/// Payload layout:
/// - Bytes 0-1: identifier (survives kernels that rewrite the header field)
/// - Bytes 2-3: sequence
/// - Bytes 4-7: timestamp (lower 32 bits, microseconds)
/// - Bytes 8+: pattern fill
pub fn build_echo_request(identifier: u16, sequence: u16, payload_size: usize) -> Vec<u8> {
    let payload_size = payload_size.max(MIN_PAYLOAD_SIZE);
    let mut buffer = vec![0u8; ICMP_HEADER_SIZE + payload_size];

    if let Some(mut packet) = MutableEchoRequestPacket::new(&mut buffer) {
        packet.set_icmp_type(IcmpTypes::EchoRequest);
        packet.set_icmp_code(IcmpCode::new(0));
        packet.set_identifier(identifier);
        packet.set_sequence_number(sequence);

        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_micros() as u32)
            .unwrap_or(0);

        let payload = packet.payload_mut();
        payload[0..2].copy_from_slice(&identifier.to_be_bytes());
        payload[2..4].copy_from_slice(&sequence.to_be_bytes());
        payload[4..8].copy_from_slice(&timestamp.to_be_bytes());
        for (i, byte) in payload[8..].iter_mut().enumerate() {
            *byte = (i & 0xFF) as u8;
        }

        let cksum = IcmpPacket::new(packet.packet())
            .map(|icmp| checksum(&icmp))
            .unwrap_or(0);
        packet.set_checksum(cksum);
    }

    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_echo_request() {
        let packet = build_echo_request(1234, 5678, DEFAULT_PAYLOAD_SIZE);
        assert_eq!(packet.len(), ICMP_HEADER_SIZE + DEFAULT_PAYLOAD_SIZE);
        assert_eq!(packet[0], 8); // Echo Request type
        assert_eq!(packet[1], 0); // Code
        assert_eq!(u16::from_be_bytes([packet[4], packet[5]]), 1234);
        assert_eq!(u16::from_be_bytes([packet[6], packet[7]]), 5678);
        // Payload copy of identifier/sequence
        assert_eq!(u16::from_be_bytes([packet[8], packet[9]]), 1234);
        assert_eq!(u16::from_be_bytes([packet[10], packet[11]]), 5678);
    }

    #[test]
    fn test_build_echo_request_minimum_payload() {
        let packet = build_echo_request(1, 2, 0);
        assert_eq!(packet.len(), ICMP_HEADER_SIZE + MIN_PAYLOAD_SIZE);
    }

    #[test]
    fn test_checksum_verifies() {
        let packet = build_echo_request(0xBEEF, 42, DEFAULT_PAYLOAD_SIZE);

        let mut sum: u32 = 0;
        for chunk in packet.chunks(2) {
            let word = if chunk.len() == 2 {
                u16::from_be_bytes([chunk[0], chunk[1]])
            } else {
                u16::from_be_bytes([chunk[0], 0])
            };
            sum += word as u32;
        }
        while sum >> 16 != 0 {
            sum = (sum & 0xFFFF) + (sum >> 16);
        }
        assert_eq!(sum, 0xFFFF);
    }
}
