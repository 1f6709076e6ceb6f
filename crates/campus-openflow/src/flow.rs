//! Flow-mod messages.
//!
//! A [`FlowMatch`] is an OpenFlow 1.0 twelve-tuple where every field is
//! optional: `None` is a wildcard. A [`FlowMod`] with no actions installs a
//! drop rule.

use crate::packet::{NetworkLayer, Packet, Transport};
use crate::types::{BufferId, EtherType, PortNo};
use campus_types::{Ipv4Address, MacAddress};
use serde::{Deserialize, Serialize};

/// `dl_vlan` value for untagged frames.
pub const VLAN_NONE: u16 = 0xffff;

/// Match fields of a flow entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowMatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_port: Option<PortNo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dl_src: Option<MacAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dl_dst: Option<MacAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dl_vlan: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dl_vlan_pcp: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dl_type: Option<EtherType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nw_tos: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nw_proto: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nw_src: Option<Ipv4Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nw_dst: Option<Ipv4Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tp_src: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tp_dst: Option<u16>,
}

impl FlowMatch {
    /// A match with every field wildcarded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact match on every field present in `packet`, as a switch would
    /// report it for a packet received on `in_port`.
    ///
    /// Untagged frames match `dl_vlan = 0xffff`. For ARP, `nw_proto` holds the
    /// low byte of the opcode and `nw_src`/`nw_dst` the protocol addresses. For
    /// ICMP, `tp_src`/`tp_dst` hold the type and code. The IPv4 TOS is reduced
    /// to its DSCP bits.
    pub fn from_packet(packet: &Packet, in_port: PortNo) -> Self {
        let eth = &packet.ethernet;
        let mut m = FlowMatch {
            in_port: Some(in_port),
            dl_src: Some(eth.src),
            dl_dst: Some(eth.dst),
            dl_vlan: Some(eth.vlan.map_or(VLAN_NONE, |tag| tag.vid)),
            dl_vlan_pcp: Some(eth.vlan.map_or(0, |tag| tag.pcp)),
            dl_type: Some(eth.ether_type),
            ..Self::default()
        };

        match &packet.network {
            NetworkLayer::Arp(arp) => {
                m.nw_proto = Some((arp.opcode & 0xff) as u8);
                m.nw_src = Some(arp.sender_ip);
                m.nw_dst = Some(arp.target_ip);
            }
            NetworkLayer::Ipv4(ip, transport) => {
                m.nw_tos = Some(ip.tos & 0xfc);
                m.nw_proto = Some(ip.protocol.as_u8());
                m.nw_src = Some(ip.src);
                m.nw_dst = Some(ip.dst);
                match transport {
                    Transport::Tcp(tcp) => {
                        m.tp_src = Some(tcp.src_port);
                        m.tp_dst = Some(tcp.dst_port);
                    }
                    Transport::Udp(udp) => {
                        m.tp_src = Some(udp.src_port);
                        m.tp_dst = Some(udp.dst_port);
                    }
                    Transport::Icmp(icmp) => {
                        m.tp_src = Some(u16::from(icmp.icmp_type));
                        m.tp_dst = Some(u16::from(icmp.code));
                    }
                    Transport::None => {}
                }
            }
            NetworkLayer::Other => {}
        }

        m
    }

    pub fn with_in_port(mut self, port: PortNo) -> Self {
        self.in_port = Some(port);
        self
    }

    pub fn with_dl_type(mut self, dl_type: EtherType) -> Self {
        self.dl_type = Some(dl_type);
        self
    }

    pub fn with_nw_proto(mut self, proto: u8) -> Self {
        self.nw_proto = Some(proto);
        self
    }

    pub fn with_nw_src(mut self, addr: Ipv4Address) -> Self {
        self.nw_src = Some(addr);
        self
    }

    pub fn with_nw_dst(mut self, addr: Ipv4Address) -> Self {
        self.nw_dst = Some(addr);
        self
    }

    /// Returns true if every field this match sets has the same value in
    /// `exact`, i.e. a packet described by `exact` would hit this entry.
    pub fn covers(&self, exact: &FlowMatch) -> bool {
        fn field<T: PartialEq>(rule: &Option<T>, exact: &Option<T>) -> bool {
            rule.as_ref().map_or(true, |value| exact.as_ref() == Some(value))
        }

        field(&self.in_port, &exact.in_port)
            && field(&self.dl_src, &exact.dl_src)
            && field(&self.dl_dst, &exact.dl_dst)
            && field(&self.dl_vlan, &exact.dl_vlan)
            && field(&self.dl_vlan_pcp, &exact.dl_vlan_pcp)
            && field(&self.dl_type, &exact.dl_type)
            && field(&self.nw_tos, &exact.nw_tos)
            && field(&self.nw_proto, &exact.nw_proto)
            && field(&self.nw_src, &exact.nw_src)
            && field(&self.nw_dst, &exact.nw_dst)
            && field(&self.tp_src, &exact.tp_src)
            && field(&self.tp_dst, &exact.tp_dst)
    }
}

/// A flow entry action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowAction {
    Output { port: PortNo },
    /// Output on every port except the ingress port.
    Flood,
}

/// An `OFPFC_ADD` flow-mod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowMod {
    #[serde(rename = "match")]
    pub flow_match: FlowMatch,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    /// Buffered packet to release through the new entry.
    pub buffer_id: Option<BufferId>,
    pub actions: Vec<FlowAction>,
}

impl FlowMod {
    /// A permanent drop entry for `flow_match`.
    pub fn new(flow_match: FlowMatch) -> Self {
        Self {
            flow_match,
            idle_timeout: 0,
            hard_timeout: 0,
            buffer_id: None,
            actions: Vec::new(),
        }
    }

    pub fn with_timeouts(mut self, idle: u16, hard: u16) -> Self {
        self.idle_timeout = idle;
        self.hard_timeout = hard;
        self
    }

    pub fn with_buffer_id(mut self, buffer_id: Option<BufferId>) -> Self {
        self.buffer_id = buffer_id;
        self
    }

    pub fn with_action(mut self, action: FlowAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn output(self, port: PortNo) -> Self {
        self.with_action(FlowAction::Output { port })
    }

    pub fn flood(self) -> Self {
        self.with_action(FlowAction::Flood)
    }

    /// Returns true if matching packets are discarded.
    pub fn is_drop(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameBuilder, Segment};
    use crate::packet::ArpHeader;
    use crate::types::IpProto;
    use pretty_assertions::assert_eq;

    fn mac(last: u8) -> MacAddress {
        MacAddress::new([0, 0, 0, 0, 0, last])
    }

    #[test]
    fn test_from_packet_tcp() {
        let frame = FrameBuilder::new(mac(1), mac(2)).ipv4(
            Ipv4Address::new(20, 2, 1, 10),
            Ipv4Address::new(30, 1, 4, 66),
            Segment::Tcp {
                src_port: 40000,
                dst_port: 443,
            },
        );
        let packet = Packet::parse(&frame).unwrap();
        let m = FlowMatch::from_packet(&packet, PortNo::new(2));

        assert_eq!(
            m,
            FlowMatch {
                in_port: Some(PortNo::new(2)),
                dl_src: Some(mac(1)),
                dl_dst: Some(mac(2)),
                dl_vlan: Some(VLAN_NONE),
                dl_vlan_pcp: Some(0),
                dl_type: Some(EtherType::IPV4),
                nw_tos: Some(0),
                nw_proto: Some(6),
                nw_src: Some(Ipv4Address::new(20, 2, 1, 10)),
                nw_dst: Some(Ipv4Address::new(30, 1, 4, 66)),
                tp_src: Some(40000),
                tp_dst: Some(443),
            }
        );
    }

    #[test]
    fn test_from_packet_arp_and_icmp() {
        let arp = FrameBuilder::new(mac(1), MacAddress::BROADCAST).arp(
            ArpHeader::REPLY,
            Ipv4Address::new(10, 2, 7, 10),
            mac(2),
            Ipv4Address::new(10, 2, 7, 20),
        );
        let m = FlowMatch::from_packet(&Packet::parse(&arp).unwrap(), PortNo::new(3));
        assert_eq!(m.nw_proto, Some(2));
        assert_eq!(m.nw_src, Some(Ipv4Address::new(10, 2, 7, 10)));
        assert_eq!(m.tp_src, None);

        let icmp = FrameBuilder::new(mac(1), mac(2)).ipv4(
            Ipv4Address::new(10, 2, 7, 10),
            Ipv4Address::new(10, 2, 7, 20),
            Segment::Icmp {
                icmp_type: 3,
                code: 1,
            },
        );
        let m = FlowMatch::from_packet(&Packet::parse(&icmp).unwrap(), PortNo::new(3));
        assert_eq!(m.nw_proto, Some(IpProto::Icmp.as_u8()));
        assert_eq!((m.tp_src, m.tp_dst), (Some(3), Some(1)));
    }

    #[test]
    fn test_from_packet_non_ip() {
        let frame = FrameBuilder::new(mac(1), mac(2))
            .with_vlan(7, 2)
            .ethertype(EtherType::LLDP, &[0u8; 20]);
        let m = FlowMatch::from_packet(&Packet::parse(&frame).unwrap(), PortNo::new(1));
        assert_eq!(m.dl_vlan, Some(7));
        assert_eq!(m.dl_vlan_pcp, Some(2));
        assert_eq!(m.dl_type, Some(EtherType::LLDP));
        assert_eq!(m.nw_src, None);
        assert_eq!(m.nw_proto, None);
    }

    #[test]
    fn test_covers() {
        let exact = FlowMatch::new()
            .with_in_port(PortNo::new(6))
            .with_dl_type(EtherType::IPV4)
            .with_nw_proto(6)
            .with_nw_src(Ipv4Address::new(104, 24, 32, 100))
            .with_nw_dst(Ipv4Address::new(30, 1, 4, 66));

        let rule = FlowMatch::new()
            .with_dl_type(EtherType::IPV4)
            .with_nw_src(Ipv4Address::new(104, 24, 32, 100));
        assert!(rule.covers(&exact));
        assert!(FlowMatch::new().covers(&exact));

        let other = rule.clone().with_nw_proto(1);
        assert!(!other.covers(&exact));
    }

    #[test]
    fn test_flow_mod_json() {
        let flow = FlowMod::new(
            FlowMatch::new()
                .with_dl_type(EtherType::IPV4)
                .with_nw_proto(1),
        )
        .with_timeouts(50, 50)
        .with_buffer_id(BufferId::from_wire(7))
        .output(PortNo::new(5));

        let json = serde_json::to_value(&flow).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "match": { "dl_type": 2048, "nw_proto": 1 },
                "idle_timeout": 50,
                "hard_timeout": 50,
                "buffer_id": 7,
                "actions": [{ "type": "output", "port": 5 }],
            })
        );
        assert!(!flow.is_drop());
    }

    #[test]
    fn test_drop_and_flood() {
        let drop = FlowMod::new(FlowMatch::new());
        assert!(drop.is_drop());

        let flood = FlowMod::new(FlowMatch::new()).flood();
        assert_eq!(flood.actions, vec![FlowAction::Flood]);
    }
}
