//! OpenFlow 1.0 identifiers and protocol numbers.
//!
//! Datapath ids, port numbers and buffer ids are all plain integers on the
//! wire. The newtypes here keep them from being mixed up in controller code.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A switch datapath identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatapathId(u64);

impl DatapathId {
    pub const fn new(raw: u64) -> Self {
        DatapathId(raw)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DatapathId {
    /// Formats as dash-separated hex bytes (`00-00-00-00-00-01`), the low
    /// 48 bits only when the high 16 bits are zero.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        let start = if self.0 >> 48 == 0 { 2 } else { 0 };
        for (i, byte) in bytes[start..].iter().enumerate() {
            if i > 0 {
                f.write_str("-")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<u64> for DatapathId {
    fn from(raw: u64) -> Self {
        DatapathId(raw)
    }
}

/// A switch port number, including the OpenFlow 1.0 reserved ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortNo(u16);

impl PortNo {
    /// Highest port number a physical port may use.
    pub const MAX_PHYSICAL: PortNo = PortNo(0xfeff);
    pub const IN_PORT: PortNo = PortNo(0xfff8);
    pub const TABLE: PortNo = PortNo(0xfff9);
    pub const NORMAL: PortNo = PortNo(0xfffa);
    pub const FLOOD: PortNo = PortNo(0xfffb);
    pub const ALL: PortNo = PortNo(0xfffc);
    pub const CONTROLLER: PortNo = PortNo(0xfffd);
    pub const LOCAL: PortNo = PortNo(0xfffe);
    pub const NONE: PortNo = PortNo(0xffff);

    pub const fn new(raw: u16) -> Self {
        PortNo(raw)
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns true for a port number a switch may assign to a physical port.
    pub const fn is_physical(&self) -> bool {
        self.0 >= 1 && self.0 <= Self::MAX_PHYSICAL.0
    }
}

impl fmt::Display for PortNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PortNo::IN_PORT => f.write_str("IN_PORT"),
            PortNo::TABLE => f.write_str("TABLE"),
            PortNo::NORMAL => f.write_str("NORMAL"),
            PortNo::FLOOD => f.write_str("FLOOD"),
            PortNo::ALL => f.write_str("ALL"),
            PortNo::CONTROLLER => f.write_str("CONTROLLER"),
            PortNo::LOCAL => f.write_str("LOCAL"),
            PortNo::NONE => f.write_str("NONE"),
            PortNo(raw) => write!(f, "{raw}"),
        }
    }
}

impl From<u16> for PortNo {
    fn from(raw: u16) -> Self {
        PortNo(raw)
    }
}

/// Identifier of a packet held in a switch buffer.
///
/// Packet-ins that were not buffered carry no id; on the wire that is
/// `0xffffffff`, here it is `Option::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BufferId(u32);

impl BufferId {
    pub const NO_BUFFER: u32 = 0xffff_ffff;

    /// Decodes a wire buffer id, mapping `0xffffffff` to `None`.
    pub const fn from_wire(raw: u32) -> Option<Self> {
        if raw == Self::NO_BUFFER {
            None
        } else {
            Some(BufferId(raw))
        }
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ethernet frame type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EtherType(u16);

impl EtherType {
    pub const IPV4: EtherType = EtherType(0x0800);
    pub const ARP: EtherType = EtherType(0x0806);
    pub const VLAN: EtherType = EtherType(0x8100);
    pub const IPV6: EtherType = EtherType(0x86dd);
    pub const LLDP: EtherType = EtherType(0x88cc);

    pub const fn new(raw: u16) -> Self {
        EtherType(raw)
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            EtherType::IPV4 => f.write_str("IPv4"),
            EtherType::ARP => f.write_str("ARP"),
            EtherType::VLAN => f.write_str("802.1Q"),
            EtherType::IPV6 => f.write_str("IPv6"),
            EtherType::LLDP => f.write_str("LLDP"),
            EtherType(raw) => write!(f, "{raw:#06x}"),
        }
    }
}

/// IPv4 protocol number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum IpProto {
    Icmp,
    Tcp,
    Udp,
    Other(u8),
}

impl IpProto {
    pub const fn as_u8(&self) -> u8 {
        match self {
            IpProto::Icmp => 1,
            IpProto::Tcp => 6,
            IpProto::Udp => 17,
            IpProto::Other(raw) => *raw,
        }
    }
}

impl From<u8> for IpProto {
    fn from(raw: u8) -> Self {
        match raw {
            1 => IpProto::Icmp,
            6 => IpProto::Tcp,
            17 => IpProto::Udp,
            other => IpProto::Other(other),
        }
    }
}

impl From<IpProto> for u8 {
    fn from(proto: IpProto) -> Self {
        proto.as_u8()
    }
}

impl fmt::Display for IpProto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpProto::Icmp => f.write_str("ICMP"),
            IpProto::Tcp => f.write_str("TCP"),
            IpProto::Udp => f.write_str("UDP"),
            IpProto::Other(raw) => write!(f, "proto-{raw}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dpid_display() {
        assert_eq!(DatapathId::new(1).to_string(), "00-00-00-00-00-01");
        assert_eq!(DatapathId::new(0xabcd).to_string(), "00-00-00-00-ab-cd");
        assert_eq!(
            DatapathId::new(0x0001_0000_0000_0006).to_string(),
            "00-01-00-00-00-00-00-06"
        );
    }

    #[test]
    fn test_port_physical_range() {
        assert!(!PortNo::new(0).is_physical());
        assert!(PortNo::new(1).is_physical());
        assert!(PortNo::MAX_PHYSICAL.is_physical());
        assert!(!PortNo::new(0xff00).is_physical());
        assert!(!PortNo::FLOOD.is_physical());
    }

    #[test]
    fn test_port_display() {
        assert_eq!(PortNo::new(7).to_string(), "7");
        assert_eq!(PortNo::FLOOD.to_string(), "FLOOD");
    }

    #[test]
    fn test_buffer_id_wire() {
        assert_eq!(BufferId::from_wire(0xffff_ffff), None);
        let id = BufferId::from_wire(42);
        assert_eq!(id.map(|b| b.as_u32()), Some(42));
    }

    #[test]
    fn test_ip_proto_numbers() {
        assert_eq!(IpProto::from(1), IpProto::Icmp);
        assert_eq!(IpProto::from(6), IpProto::Tcp);
        assert_eq!(IpProto::from(17), IpProto::Udp);
        assert_eq!(IpProto::from(89), IpProto::Other(89));
        assert_eq!(IpProto::Tcp.as_u8(), 6);
        assert_eq!(serde_json::to_string(&IpProto::Icmp).unwrap(), "1");
    }

    #[test]
    fn test_ethertype_display() {
        assert_eq!(EtherType::ARP.to_string(), "ARP");
        assert_eq!(EtherType::new(0x88b5).to_string(), "0x88b5");
    }
}
