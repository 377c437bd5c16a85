//! Construction of IPv4/UDP packets carrying DNS queries.
//!
//! Produces the same layout the kernel hands to an NFQUEUE listener: an IPv4
//! header (no link layer) followed by UDP and the DNS message, with valid
//! checksums. Used to feed realistic packets through the filter.

// Test packets are far below 64 KiB, so usize to u16 casts never truncate.
#![allow(clippy::cast_possible_truncation)]

use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;

use hickory_proto::op::{Message, Query};
use hickory_proto::rr::{Name, RecordType};
use hickory_proto::serialize::binary::BinEncodable;
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::MutableIpv4Packet;
use pnet::packet::udp::{MutableUdpPacket, UdpPacket};

use super::header::UDP_HEADER_SIZE;
use crate::error::{Error, Result};

/// IPv4 header size in bytes (without options).
const IPV4_HEADER_SIZE: usize = 20;

/// Builder for IPv4/UDP packets between two fixed endpoints.
#[derive(Debug, Clone, Copy)]
pub struct PacketBuilder {
    source: SocketAddrV4,
    destination: SocketAddrV4,
}

impl PacketBuilder {
    pub const fn new(source: SocketAddrV4, destination: SocketAddrV4) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// A client at 192.168.1.100:40000 talking to a resolver on port 53.
    pub const fn dns_client() -> Self {
        Self::new(
            SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 100), 40000),
            SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 1), 53),
        )
    }

    /// Build a packet carrying a single-question A query for `domain`.
    pub fn dns_query(&self, domain: &str, id: u16) -> Result<Vec<u8>> {
        let message = query_message(domain, id)?;
        let dns_bytes = message.to_bytes()?;
        self.udp(&dns_bytes)
    }

    /// Build a packet carrying an arbitrary UDP payload.
    pub fn udp(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let udp_len = UDP_HEADER_SIZE + payload.len();
        let total_len = IPV4_HEADER_SIZE + udp_len;
        if total_len > usize::from(u16::MAX) {
            return Err(Error::Packet(format!(
                "payload of {} bytes does not fit in one datagram",
                payload.len()
            )));
        }

        let mut packet = vec![0u8; total_len];
        let src_ip = *self.source.ip();
        let dst_ip = *self.destination.ip();

        {
            let mut udp = MutableUdpPacket::new(&mut packet[IPV4_HEADER_SIZE..])
                .ok_or_else(|| Error::Packet("UDP packet creation failed".into()))?;
            udp.set_source(self.source.port());
            udp.set_destination(self.destination.port());
            udp.set_length(udp_len as u16);
            udp.set_payload(payload);
        }

        {
            let mut ipv4 = MutableIpv4Packet::new(&mut packet)
                .ok_or_else(|| Error::Packet("IPv4 packet creation failed".into()))?;
            ipv4.set_version(4);
            ipv4.set_header_length(5);
            ipv4.set_total_length(total_len as u16);
            ipv4.set_ttl(64);
            ipv4.set_next_level_protocol(IpNextHeaderProtocols::Udp);
            ipv4.set_source(src_ip);
            ipv4.set_destination(dst_ip);
            ipv4.set_checksum(pnet::packet::ipv4::checksum(&ipv4.to_immutable()));
        }

        // UDP checksum covers the pseudo-header, so it goes last
        let checksum = {
            let udp = UdpPacket::new(&packet[IPV4_HEADER_SIZE..])
                .ok_or_else(|| Error::Packet("UDP checksum failed".into()))?;
            pnet::packet::udp::ipv4_checksum(&udp, &src_ip, &dst_ip)
        };
        let mut udp = MutableUdpPacket::new(&mut packet[IPV4_HEADER_SIZE..])
            .ok_or_else(|| Error::Packet("UDP checksum failed".into()))?;
        udp.set_checksum(checksum);

        Ok(packet)
    }
}

fn query_message(domain: &str, id: u16) -> Result<Message> {
    let name = Name::from_str(domain)?;
    let mut query = Query::new();
    query.set_name(name);
    query.set_query_type(RecordType::A);

    let mut message = Message::new();
    message.set_id(id).set_recursion_desired(true);
    message.add_query(query);
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::header;
    use pnet::packet::Packet;
    use pnet::packet::ipv4::Ipv4Packet;

    #[test]
    fn should_build_valid_ipv4_udp_packet() {
        let builder = PacketBuilder::dns_client();
        let packet = builder.udp(b"hello").unwrap();

        let ipv4 = Ipv4Packet::new(&packet).unwrap();
        assert_eq!(ipv4.get_version(), 4);
        assert_eq!(ipv4.get_total_length() as usize, packet.len());
        assert_eq!(ipv4.get_next_level_protocol(), IpNextHeaderProtocols::Udp);
        assert_eq!(ipv4.get_source(), Ipv4Addr::new(192, 168, 1, 100));
        assert_eq!(ipv4.get_destination(), Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(pnet::packet::ipv4::checksum(&ipv4), ipv4.get_checksum());

        let udp = UdpPacket::new(ipv4.payload()).unwrap();
        assert_eq!(udp.get_source(), 40000);
        assert_eq!(udp.get_destination(), 53);
        assert_eq!(udp.payload(), b"hello");
    }

    #[test]
    fn should_parse_built_query_with_header_parser() {
        let builder = PacketBuilder::dns_client();
        let packet = builder.dns_query("www.example.com", 7).unwrap();

        let parsed = header::parse(&packet).unwrap();
        assert!(parsed.is_dns_query());
        assert_eq!(parsed.src_port, 40000);

        let dns = parsed.udp_payload(&packet);
        assert_eq!(u16::from_be_bytes([dns[0], dns[1]]), 7);
    }

    #[test]
    fn should_use_custom_endpoints() {
        let builder = PacketBuilder::new(
            SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 2), 5353),
            SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 8053),
        );
        let packet = builder.udp(&[]).unwrap();

        let parsed = header::parse(&packet).unwrap();
        assert_eq!(parsed.src_port, 5353);
        assert_eq!(parsed.dst_port, 8053);
        assert!(!parsed.is_dns_query());
    }

    #[test]
    fn should_reject_oversized_payload() {
        let builder = PacketBuilder::dns_client();
        let payload = vec![0u8; usize::from(u16::MAX)];

        assert!(matches!(builder.udp(&payload), Err(Error::Packet(_))));
    }
}
