//! Header decoding for packet-in payloads.
//!
//! [`Packet::parse`] walks Ethernet (with an optional 802.1Q tag), then ARP
//! or IPv4, then ICMP/TCP/UDP. Unknown ethertypes and IP protocols are kept
//! as opaque layers rather than rejected.

use crate::error::{PacketError, PacketResult};
use crate::types::{EtherType, IpProto};
use byteorder::{BigEndian, ByteOrder};
use campus_types::{Ipv4Address, MacAddress};

const ETHERNET_HEADER_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;
const ARP_LEN: usize = 28;
const IPV4_MIN_HEADER_LEN: usize = 20;
const ICMP_HEADER_LEN: usize = 4;
const TCP_MIN_HEADER_LEN: usize = 20;
const UDP_HEADER_LEN: usize = 8;

const ARP_HTYPE_ETHERNET: u16 = 1;

/// A decoded packet-in payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub ethernet: EthernetHeader,
    pub network: NetworkLayer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub dst: MacAddress,
    pub src: MacAddress,
    pub vlan: Option<VlanTag>,
    /// Ethertype of the payload (the inner type when tagged).
    pub ether_type: EtherType,
}

/// 802.1Q tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlanTag {
    pub vid: u16,
    pub pcp: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkLayer {
    Arp(ArpHeader),
    Ipv4(Ipv4Header, Transport),
    /// Any other ethertype; the payload is not inspected.
    Other,
}

/// Ethernet/IPv4 ARP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpHeader {
    pub opcode: u16,
    pub sender_mac: MacAddress,
    pub sender_ip: Ipv4Address,
    pub target_mac: MacAddress,
    pub target_ip: Ipv4Address,
}

impl ArpHeader {
    pub const REQUEST: u16 = 1;
    pub const REPLY: u16 = 2;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    /// Header length in 32-bit words.
    pub ihl: u8,
    pub tos: u8,
    pub total_length: u16,
    pub identification: u16,
    pub dont_fragment: bool,
    pub more_fragments: bool,
    /// Fragment offset in 8-byte units.
    pub fragment_offset: u16,
    pub ttl: u8,
    pub protocol: IpProto,
    pub src: Ipv4Address,
    pub dst: Ipv4Address,
}

impl Ipv4Header {
    pub fn header_len(&self) -> usize {
        usize::from(self.ihl) * 4
    }

    /// Returns true for every fragment but the first; those carry no
    /// transport header.
    pub fn is_trailing_fragment(&self) -> bool {
        self.fragment_offset != 0
    }
}

/// Transport header carried by an IPv4 packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Icmp(IcmpHeader),
    Tcp(TcpHeader),
    Udp(UdpHeader),
    /// Trailing fragment or a protocol that is not decoded.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpHeader {
    pub icmp_type: u8,
    pub code: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ack: u32,
    /// Header length in 32-bit words.
    pub data_offset: u8,
    pub flags: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub length: u16,
}

impl Packet {
    /// Decodes an Ethernet frame.
    ///
    /// # Errors
    ///
    /// Returns a [`PacketError`] if any recognised header is truncated or
    /// malformed. Unrecognised payloads are not errors.
    pub fn parse(data: &[u8]) -> PacketResult<Packet> {
        let (ethernet, payload) = parse_ethernet(data)?;

        let network = match ethernet.ether_type {
            EtherType::ARP => NetworkLayer::Arp(parse_arp(payload)?),
            EtherType::IPV4 => {
                let (header, segment) = parse_ipv4(payload)?;
                let transport = if header.is_trailing_fragment() {
                    Transport::None
                } else {
                    parse_transport(header.protocol, segment)?
                };
                NetworkLayer::Ipv4(header, transport)
            }
            _ => NetworkLayer::Other,
        };

        Ok(Packet { ethernet, network })
    }

    pub fn arp(&self) -> Option<&ArpHeader> {
        match &self.network {
            NetworkLayer::Arp(arp) => Some(arp),
            _ => None,
        }
    }

    pub fn ipv4(&self) -> Option<&Ipv4Header> {
        match &self.network {
            NetworkLayer::Ipv4(header, _) => Some(header),
            _ => None,
        }
    }

    pub fn transport(&self) -> Option<&Transport> {
        match &self.network {
            NetworkLayer::Ipv4(_, transport) => Some(transport),
            _ => None,
        }
    }

    pub fn icmp(&self) -> Option<&IcmpHeader> {
        match self.transport()? {
            Transport::Icmp(icmp) => Some(icmp),
            _ => None,
        }
    }

    pub fn tcp(&self) -> Option<&TcpHeader> {
        match self.transport()? {
            Transport::Tcp(tcp) => Some(tcp),
            _ => None,
        }
    }

    pub fn udp(&self) -> Option<&UdpHeader> {
        match self.transport()? {
            Transport::Udp(udp) => Some(udp),
            _ => None,
        }
    }
}

fn require(layer: &'static str, data: &[u8], needed: usize) -> PacketResult<()> {
    if data.len() < needed {
        return Err(PacketError::truncated(layer, needed, data.len()));
    }
    Ok(())
}

// Callers check the length first.
fn mac_at(data: &[u8], offset: usize) -> MacAddress {
    let mut bytes = [0u8; 6];
    bytes.copy_from_slice(&data[offset..offset + 6]);
    MacAddress::new(bytes)
}

fn ipv4_at(data: &[u8], offset: usize) -> Ipv4Address {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    Ipv4Address::from_octets(bytes)
}

fn parse_ethernet(data: &[u8]) -> PacketResult<(EthernetHeader, &[u8])> {
    require("ethernet", data, ETHERNET_HEADER_LEN)?;

    let dst = mac_at(data, 0);
    let src = mac_at(data, 6);
    let mut ether_type = EtherType::new(BigEndian::read_u16(&data[12..14]));
    let mut offset = ETHERNET_HEADER_LEN;
    let mut vlan = None;

    if ether_type == EtherType::VLAN {
        require("vlan", data, ETHERNET_HEADER_LEN + VLAN_TAG_LEN)?;
        let tci = BigEndian::read_u16(&data[14..16]);
        vlan = Some(VlanTag {
            vid: tci & 0x0fff,
            pcp: (tci >> 13) as u8,
        });
        ether_type = EtherType::new(BigEndian::read_u16(&data[16..18]));
        offset += VLAN_TAG_LEN;
    }

    let header = EthernetHeader {
        dst,
        src,
        vlan,
        ether_type,
    };
    Ok((header, &data[offset..]))
}

fn parse_arp(data: &[u8]) -> PacketResult<ArpHeader> {
    require("arp", data, ARP_LEN)?;

    let hardware = BigEndian::read_u16(&data[0..2]);
    let protocol = BigEndian::read_u16(&data[2..4]);
    if hardware != ARP_HTYPE_ETHERNET
        || protocol != EtherType::IPV4.as_u16()
        || data[4] != 6
        || data[5] != 4
    {
        return Err(PacketError::UnsupportedArp { hardware, protocol });
    }

    Ok(ArpHeader {
        opcode: BigEndian::read_u16(&data[6..8]),
        sender_mac: mac_at(data, 8),
        sender_ip: ipv4_at(data, 14),
        target_mac: mac_at(data, 18),
        target_ip: ipv4_at(data, 24),
    })
}

/// Returns the header and the bytes after it, up to the end of the IP
/// datagram or of the captured data, whichever comes first. Switches only
/// send the first bytes of a buffered packet, so a short capture is not an
/// error once the header itself is complete.
fn parse_ipv4(data: &[u8]) -> PacketResult<(Ipv4Header, &[u8])> {
    require("ipv4", data, IPV4_MIN_HEADER_LEN)?;

    let version = data[0] >> 4;
    if version != 4 {
        return Err(PacketError::InvalidIpVersion(version));
    }
    let ihl = data[0] & 0x0f;
    if usize::from(ihl) * 4 < IPV4_MIN_HEADER_LEN {
        return Err(PacketError::InvalidIpHeaderLength(ihl));
    }
    let header_len = usize::from(ihl) * 4;
    require("ipv4", data, header_len)?;

    let total_length = BigEndian::read_u16(&data[2..4]);
    if usize::from(total_length) < header_len {
        return Err(PacketError::InvalidIpTotalLength {
            total: total_length,
            header: header_len,
        });
    }

    let flags_fragment = BigEndian::read_u16(&data[6..8]);
    let header = Ipv4Header {
        ihl,
        tos: data[1],
        total_length,
        identification: BigEndian::read_u16(&data[4..6]),
        dont_fragment: flags_fragment & 0x4000 != 0,
        more_fragments: flags_fragment & 0x2000 != 0,
        fragment_offset: flags_fragment & 0x1fff,
        ttl: data[8],
        protocol: IpProto::from(data[9]),
        src: ipv4_at(data, 12),
        dst: ipv4_at(data, 16),
    };

    let end = data.len().min(usize::from(total_length));
    Ok((header, &data[header_len..end]))
}

fn parse_transport(protocol: IpProto, data: &[u8]) -> PacketResult<Transport> {
    let transport = match protocol {
        IpProto::Icmp => {
            require("icmp", data, ICMP_HEADER_LEN)?;
            Transport::Icmp(IcmpHeader {
                icmp_type: data[0],
                code: data[1],
            })
        }
        IpProto::Tcp => {
            require("tcp", data, TCP_MIN_HEADER_LEN)?;
            let data_offset = data[12] >> 4;
            if usize::from(data_offset) * 4 < TCP_MIN_HEADER_LEN {
                return Err(PacketError::InvalidTcpDataOffset(data_offset));
            }
            Transport::Tcp(TcpHeader {
                src_port: BigEndian::read_u16(&data[0..2]),
                dst_port: BigEndian::read_u16(&data[2..4]),
                seq: BigEndian::read_u32(&data[4..8]),
                ack: BigEndian::read_u32(&data[8..12]),
                data_offset,
                flags: data[13],
            })
        }
        IpProto::Udp => {
            require("udp", data, UDP_HEADER_LEN)?;
            Transport::Udp(UdpHeader {
                src_port: BigEndian::read_u16(&data[0..2]),
                dst_port: BigEndian::read_u16(&data[2..4]),
                length: BigEndian::read_u16(&data[4..6]),
            })
        }
        IpProto::Other(_) => Transport::None,
    };
    Ok(transport)
}
