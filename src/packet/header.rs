//! IPv4/UDP header field extraction.
//!
//! Reads the handful of fields the verdict policy needs straight out of the
//! raw buffer handed over by the kernel, without copying and without
//! trusting any length the packet claims about itself.

use thiserror::Error;

/// UDP header size in bytes.
pub const UDP_HEADER_SIZE: usize = 8;
/// IP protocol number for UDP.
pub const IPPROTO_UDP: u8 = 17;
/// Destination port of DNS queries.
pub const DNS_PORT: u16 = 53;

/// Offset of the protocol byte in an IPv4 header.
const PROTOCOL_OFFSET: usize = 9;

/// Errors produced while reading packet headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// The buffer ends before the fields we need to read.
    #[error("packet too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },

    /// Strict parsing only: the version nibble is not 4.
    #[error("not an IPv4 packet (version {version})")]
    NotIpv4 { version: u8 },
}

/// Header fields extracted from one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedHeader {
    /// IP header length in bytes (0–60, multiple of 4).
    pub ip_header_len: u8,
    pub protocol: u8,
    pub is_udp: bool,
    pub src_port: u16,
    pub dst_port: u16,
}

impl ParsedHeader {
    /// Whether this packet is a UDP datagram addressed to port 53.
    #[inline]
    pub const fn is_dns_query(&self) -> bool {
        self.is_udp && self.dst_port == DNS_PORT
    }

    /// Offset of the first byte after the UDP header.
    #[inline]
    pub const fn payload_offset(&self) -> usize {
        self.ip_header_len as usize + UDP_HEADER_SIZE
    }

    /// The UDP payload of `buffer`, which must be the buffer this header
    /// was parsed from. Returns an empty slice rather than panicking if a
    /// different, shorter buffer is passed.
    #[inline]
    pub fn udp_payload<'a>(&self, buffer: &'a [u8]) -> &'a [u8] {
        buffer.get(self.payload_offset()..).unwrap_or_default()
    }
}

/// Parse the IP header length, protocol and UDP ports from `buffer`.
///
/// The IP version nibble is not checked; see [`parse_strict`].
pub fn parse(buffer: &[u8]) -> Result<ParsedHeader, HeaderError> {
    let Some(&first) = buffer.first() else {
        return Err(HeaderError::TooShort {
            needed: 1,
            actual: 0,
        });
    };

    let ihl = usize::from(first & 0x0F) * 4;
    let needed = (ihl + UDP_HEADER_SIZE).max(PROTOCOL_OFFSET + 1);
    if buffer.len() < needed {
        return Err(HeaderError::TooShort {
            needed,
            actual: buffer.len(),
        });
    }

    let protocol = buffer[PROTOCOL_OFFSET];
    let src_port = u16::from_be_bytes([buffer[ihl], buffer[ihl + 1]]);
    let dst_port = u16::from_be_bytes([buffer[ihl + 2], buffer[ihl + 3]]);

    // ihl <= 60 always fits
    #[allow(clippy::cast_possible_truncation)]
    let ip_header_len = ihl as u8;

    Ok(ParsedHeader {
        ip_header_len,
        protocol,
        is_udp: protocol == IPPROTO_UDP,
        src_port,
        dst_port,
    })
}

/// Like [`parse`], but rejects packets whose version nibble is not 4.
pub fn parse_strict(buffer: &[u8]) -> Result<ParsedHeader, HeaderError> {
    if let Some(&first) = buffer.first() {
        let version = first >> 4;
        if version != 4 {
            return Err(HeaderError::NotIpv4 { version });
        }
    }
    parse(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 20-byte IPv4 header followed by a UDP header and `payload`.
    fn udp_packet(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
        let mut packet = vec![0u8; 20];
        packet[0] = 0x45;
        packet[9] = IPPROTO_UDP;
        packet.extend_from_slice(&src_port.to_be_bytes());
        packet.extend_from_slice(&dst_port.to_be_bytes());
        packet.extend_from_slice(&[0, 0, 0, 0]);
        packet.extend_from_slice(payload);
        packet
    }

    #[test]
    fn should_extract_ports_and_protocol() {
        let packet = udp_packet(40000, 53, b"dns");
        let header = parse(&packet).unwrap();

        assert_eq!(header.ip_header_len, 20);
        assert_eq!(header.protocol, IPPROTO_UDP);
        assert!(header.is_udp);
        assert_eq!(header.src_port, 40000);
        assert_eq!(header.dst_port, 53);
        assert!(header.is_dns_query());
        assert_eq!(header.udp_payload(&packet), b"dns");
    }

    #[test]
    fn should_flag_non_udp_protocols() {
        let mut packet = udp_packet(1234, 53, &[]);
        packet[9] = 6;

        let header = parse(&packet).unwrap();
        assert!(!header.is_udp);
        assert!(!header.is_dns_query());
    }

    #[test]
    fn should_honor_ip_options_in_header_length() {
        // IHL = 6 words, 4 bytes of options before the UDP header
        let mut packet = vec![0u8; 24];
        packet[0] = 0x46;
        packet[9] = IPPROTO_UDP;
        packet.extend_from_slice(&[0x12, 0x34, 0x00, 0x35, 0, 0, 0, 0]);

        let header = parse(&packet).unwrap();
        assert_eq!(header.ip_header_len, 24);
        assert_eq!(header.src_port, 0x1234);
        assert_eq!(header.dst_port, 53);
        assert!(header.udp_payload(&packet).is_empty());
    }

    #[test]
    fn should_reject_empty_buffer() {
        assert_eq!(
            parse(&[]),
            Err(HeaderError::TooShort {
                needed: 1,
                actual: 0
            })
        );
    }

    #[test]
    fn should_reject_short_buffers_for_every_header_length() {
        for words in 0u8..=15 {
            let ihl = usize::from(words) * 4;
            let needed = (ihl + 8).max(10);

            for len in 1..needed {
                let mut buffer = vec![0u8; len];
                buffer[0] = 0x40 | words;
                assert!(
                    matches!(parse(&buffer), Err(HeaderError::TooShort { .. })),
                    "ihl {ihl}, len {len}"
                );
            }

            let mut buffer = vec![0u8; needed];
            buffer[0] = 0x40 | words;
            assert!(parse(&buffer).is_ok(), "ihl {ihl}, len {needed}");
        }
    }

    #[test]
    fn should_not_validate_version_by_default() {
        let mut packet = udp_packet(1, 53, &[]);
        packet[0] = 0x65;

        assert!(parse(&packet).is_ok());
        assert_eq!(
            parse_strict(&packet),
            Err(HeaderError::NotIpv4 { version: 6 })
        );
    }

    #[test]
    fn should_accept_ipv4_in_strict_mode() {
        let packet = udp_packet(1, 53, &[]);
        assert!(parse_strict(&packet).is_ok());
    }

    #[test]
    fn should_return_empty_payload_for_foreign_buffer() {
        let packet = udp_packet(1, 53, b"payload");
        let header = parse(&packet).unwrap();

        assert!(header.udp_payload(&packet[..10]).is_empty());
    }
}
