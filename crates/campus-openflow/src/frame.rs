//! Frame encoding for the header stack that [`crate::packet`] decodes.
//!
//! Used by the test suites to synthesise packet-in payloads.

use crate::packet::VlanTag;
use crate::types::{EtherType, IpProto};
use byteorder::{BigEndian, ByteOrder};
use campus_types::{Ipv4Address, MacAddress};

const DEFAULT_TTL: u8 = 64;

/// Transport segment to place in an IPv4 frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Icmp { icmp_type: u8, code: u8 },
    Tcp { src_port: u16, dst_port: u16 },
    Udp { src_port: u16, dst_port: u16 },
    /// An empty payload under the given protocol number.
    Other(u8),
}

impl Segment {
    fn protocol(&self) -> IpProto {
        match self {
            Segment::Icmp { .. } => IpProto::Icmp,
            Segment::Tcp { .. } => IpProto::Tcp,
            Segment::Udp { .. } => IpProto::Udp,
            Segment::Other(raw) => IpProto::from(*raw),
        }
    }

    fn encode(&self) -> Vec<u8> {
        match *self {
            Segment::Icmp { icmp_type, code } => {
                // Echo header with zero id/sequence.
                let mut buf = vec![icmp_type, code, 0, 0, 0, 0, 0, 0];
                let sum = checksum(&buf);
                BigEndian::write_u16(&mut buf[2..4], sum);
                buf
            }
            Segment::Tcp { src_port, dst_port } => {
                let mut buf = vec![0u8; 20];
                BigEndian::write_u16(&mut buf[0..2], src_port);
                BigEndian::write_u16(&mut buf[2..4], dst_port);
                buf[12] = 5 << 4;
                buf[13] = 0x02;
                BigEndian::write_u16(&mut buf[14..16], 0xffff);
                buf
            }
            Segment::Udp { src_port, dst_port } => {
                let mut buf = vec![0u8; 8];
                BigEndian::write_u16(&mut buf[0..2], src_port);
                BigEndian::write_u16(&mut buf[2..4], dst_port);
                BigEndian::write_u16(&mut buf[4..6], 8);
                buf
            }
            Segment::Other(_) => Vec::new(),
        }
    }
}

/// Builds Ethernet frames between two stations.
#[derive(Debug, Clone, Copy)]
pub struct FrameBuilder {
    src: MacAddress,
    dst: MacAddress,
    vlan: Option<VlanTag>,
}

impl FrameBuilder {
    pub fn new(src: MacAddress, dst: MacAddress) -> Self {
        Self {
            src,
            dst,
            vlan: None,
        }
    }

    pub fn with_vlan(mut self, vid: u16, pcp: u8) -> Self {
        self.vlan = Some(VlanTag {
            vid: vid & 0x0fff,
            pcp: pcp & 0x07,
        });
        self
    }

    /// Ethernet header followed by `payload` verbatim.
    pub fn ethertype(&self, ether_type: EtherType, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(18 + payload.len());
        frame.extend_from_slice(self.dst.as_bytes());
        frame.extend_from_slice(self.src.as_bytes());
        if let Some(tag) = self.vlan {
            let mut tci = [0u8; 4];
            BigEndian::write_u16(&mut tci[0..2], EtherType::VLAN.as_u16());
            BigEndian::write_u16(&mut tci[2..4], (u16::from(tag.pcp) << 13) | tag.vid);
            frame.extend_from_slice(&tci);
        }
        let mut type_field = [0u8; 2];
        BigEndian::write_u16(&mut type_field, ether_type.as_u16());
        frame.extend_from_slice(&type_field);
        frame.extend_from_slice(payload);
        frame
    }

    /// Ethernet/IPv4 ARP sent from this builder's source station.
    pub fn arp(
        &self,
        opcode: u16,
        sender_ip: Ipv4Address,
        target_mac: MacAddress,
        target_ip: Ipv4Address,
    ) -> Vec<u8> {
        let mut arp = vec![0u8; 28];
        BigEndian::write_u16(&mut arp[0..2], 1);
        BigEndian::write_u16(&mut arp[2..4], EtherType::IPV4.as_u16());
        arp[4] = 6;
        arp[5] = 4;
        BigEndian::write_u16(&mut arp[6..8], opcode);
        arp[8..14].copy_from_slice(self.src.as_bytes());
        arp[14..18].copy_from_slice(&sender_ip.octets());
        arp[18..24].copy_from_slice(target_mac.as_bytes());
        arp[24..28].copy_from_slice(&target_ip.octets());
        self.ethertype(EtherType::ARP, &arp)
    }

    /// An unfragmented IPv4 datagram with a 20-byte header.
    pub fn ipv4(&self, src: Ipv4Address, dst: Ipv4Address, segment: Segment) -> Vec<u8> {
        let body = segment.encode();
        let total_length = (20 + body.len()) as u16;

        let mut datagram = vec![0u8; 20];
        datagram[0] = 0x45;
        BigEndian::write_u16(&mut datagram[2..4], total_length);
        BigEndian::write_u16(&mut datagram[6..8], 0x4000);
        datagram[8] = DEFAULT_TTL;
        datagram[9] = segment.protocol().as_u8();
        datagram[12..16].copy_from_slice(&src.octets());
        datagram[16..20].copy_from_slice(&dst.octets());
        let sum = checksum(&datagram);
        BigEndian::write_u16(&mut datagram[10..12], sum);
        datagram.extend_from_slice(&body);

        self.ethertype(EtherType::IPV4, &datagram)
    }
}

/// RFC 1071 internet checksum.
fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = data
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u32::from(u16::from_be_bytes([*hi, *lo])),
            [hi] => u32::from(u16::from_be_bytes([*hi, 0])),
            _ => 0,
        })
        .sum();
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}
