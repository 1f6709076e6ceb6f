//! Packet classification.
//!
//! Splits decoded packets into the three paths the controller treats
//! differently: ARP, other non-IP traffic, and IPv4.

use campus_openflow::{ArpHeader, IpProto, Packet};
use campus_types::Ipv4Address;
use serde::Serialize;
use std::fmt;

/// The addressing triple every policy and routing decision is made on.
///
/// The protocol comes from the IPv4 header rather than from the presence of
/// a decoded transport header, so trailing fragments classify the same way
/// as the first fragment and agree with the `nw_proto` of installed rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Ipv4Flow {
    pub src: Ipv4Address,
    pub dst: Ipv4Address,
    pub protocol: IpProto,
}

impl Ipv4Flow {
    pub fn new(src: Ipv4Address, dst: Ipv4Address, protocol: IpProto) -> Self {
        Self { src, dst, protocol }
    }
}

impl fmt::Display for Ipv4Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.protocol, self.src, self.dst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketClass<'a> {
    Arp(&'a ArpHeader),
    /// Neither ARP nor IPv4.
    NonIp,
    Ipv4(Ipv4Flow),
}

/// ARP is checked first, so an ARP frame is never treated as IP traffic.
pub fn classify(packet: &Packet) -> PacketClass<'_> {
    if let Some(arp) = packet.arp() {
        return PacketClass::Arp(arp);
    }
    match packet.ipv4() {
        Some(ip) => PacketClass::Ipv4(Ipv4Flow::new(ip.src, ip.dst, ip.protocol)),
        None => PacketClass::NonIp,
    }
}
