//! Firewall rule types.

use crate::classify::Ipv4Flow;
use campus_openflow::IpProto;
use campus_types::{Ipv4Address, Ipv4Prefix, ParseError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which IP protocols a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolSelector {
    /// Every IPv4 protocol.
    #[default]
    #[serde(alias = "ip")]
    Any,
    Icmp,
    Tcp,
    Udp,
}

impl ProtocolSelector {
    pub fn matches(&self, protocol: IpProto) -> bool {
        match self {
            Self::Any => true,
            Self::Icmp => protocol == IpProto::Icmp,
            Self::Tcp => protocol == IpProto::Tcp,
            Self::Udp => protocol == IpProto::Udp,
        }
    }

    /// The `nw_proto` value a drop entry for this selector matches on.
    /// `None` leaves the field wildcarded.
    pub fn nw_proto(&self) -> Option<u8> {
        match self {
            Self::Any => None,
            Self::Icmp => Some(IpProto::Icmp.as_u8()),
            Self::Tcp => Some(IpProto::Tcp.as_u8()),
            Self::Udp => Some(IpProto::Udp.as_u8()),
        }
    }
}

impl fmt::Display for ProtocolSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "IP"),
            Self::Icmp => write!(f, "ICMP"),
            Self::Tcp => write!(f, "TCP"),
            Self::Udp => write!(f, "UDP"),
        }
    }
}

/// Source or destination test of a rule.
///
/// Written as `any`, a bare address (`30.1.4.66`) or a prefix
/// (`20.2.1.0/24`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AddressPredicate {
    Any,
    Host(Ipv4Address),
    Subnet(Ipv4Prefix),
}

impl AddressPredicate {
    pub fn matches(&self, addr: &Ipv4Address) -> bool {
        match self {
            Self::Any => true,
            Self::Host(host) => host == addr,
            Self::Subnet(prefix) => prefix.contains(addr),
        }
    }
}

impl fmt::Display for AddressPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Host(host) => write!(f, "{}", host),
            Self::Subnet(prefix) => write!(f, "{}", prefix),
        }
    }
}

impl FromStr for AddressPredicate {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("any") {
            Ok(Self::Any)
        } else if s.contains('/') {
            s.parse().map(Self::Subnet)
        } else {
            s.parse().map(Self::Host)
        }
    }
}

impl TryFrom<String> for AddressPredicate {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AddressPredicate> for String {
    fn from(predicate: AddressPredicate) -> Self {
        predicate.to_string()
    }
}

impl From<Ipv4Address> for AddressPredicate {
    fn from(addr: Ipv4Address) -> Self {
        Self::Host(addr)
    }
}

impl From<Ipv4Prefix> for AddressPredicate {
    fn from(prefix: Ipv4Prefix) -> Self {
        Self::Subnet(prefix)
    }
}

/// A deny rule. Deny is the only action, so it is not stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub name: String,
    #[serde(default)]
    pub protocol: ProtocolSelector,
    pub src: AddressPredicate,
    pub dst: AddressPredicate,
}

impl PolicyRule {
    pub fn deny(
        name: impl Into<String>,
        protocol: ProtocolSelector,
        src: impl Into<AddressPredicate>,
        dst: impl Into<AddressPredicate>,
    ) -> Self {
        Self {
            name: name.into(),
            protocol,
            src: src.into(),
            dst: dst.into(),
        }
    }

    pub fn matches(&self, flow: &Ipv4Flow) -> bool {
        self.protocol.matches(flow.protocol)
            && self.src.matches(&flow.src)
            && self.dst.matches(&flow.dst)
    }
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: deny {} {} -> {}",
            self.name, self.protocol, self.src, self.dst
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_selector_matches() {
        assert!(ProtocolSelector::Any.matches(IpProto::Other(47)));
        assert!(ProtocolSelector::Icmp.matches(IpProto::Icmp));
        assert!(!ProtocolSelector::Icmp.matches(IpProto::Tcp));
        assert!(ProtocolSelector::Tcp.matches(IpProto::Tcp));
        assert!(!ProtocolSelector::Udp.matches(IpProto::Tcp));
    }

    #[test]
    fn test_selector_nw_proto() {
        assert_eq!(ProtocolSelector::Any.nw_proto(), None);
        assert_eq!(ProtocolSelector::Icmp.nw_proto(), Some(1));
        assert_eq!(ProtocolSelector::Tcp.nw_proto(), Some(6));
    }

    #[test]
    fn test_predicate_parse() {
        assert_eq!("any".parse::<AddressPredicate>().unwrap(), AddressPredicate::Any);
        assert_eq!(
            "30.1.4.66".parse::<AddressPredicate>().unwrap(),
            AddressPredicate::Host(Ipv4Address::new(30, 1, 4, 66))
        );
        assert_eq!(
            "20.2.1.0/24".parse::<AddressPredicate>().unwrap(),
            AddressPredicate::Subnet("20.2.1.0/24".parse().unwrap())
        );
        assert!("floor1".parse::<AddressPredicate>().is_err());
    }

    #[test]
    fn test_predicate_matches() {
        let subnet: AddressPredicate = "10.2.7.0/24".parse().unwrap();
        assert!(subnet.matches(&Ipv4Address::new(10, 2, 7, 20)));
        assert!(!subnet.matches(&Ipv4Address::new(10, 2, 8, 20)));

        let host = AddressPredicate::Host(Ipv4Address::new(30, 1, 4, 66));
        assert!(host.matches(&Ipv4Address::new(30, 1, 4, 66)));
        assert!(!host.matches(&Ipv4Address::new(30, 1, 4, 67)));
    }

    #[test]
    fn test_rule_matches_all_three_fields() {
        let rule = PolicyRule::deny(
            "trusted-tcp-to-server",
            ProtocolSelector::Tcp,
            Ipv4Address::new(104, 24, 32, 100),
            Ipv4Address::new(30, 1, 4, 66),
        );
        let flow = Ipv4Flow::new(
            Ipv4Address::new(104, 24, 32, 100),
            Ipv4Address::new(30, 1, 4, 66),
            IpProto::Tcp,
        );
        assert!(rule.matches(&flow));
        assert!(!rule.matches(&Ipv4Flow {
            protocol: IpProto::Icmp,
            ..flow
        }));
        assert!(!rule.matches(&Ipv4Flow {
            src: Ipv4Address::new(108, 44, 83, 103),
            ..flow
        }));
        assert_eq!(
            rule.to_string(),
            "trusted-tcp-to-server: deny TCP 104.24.32.100 -> 30.1.4.66"
        );
    }
}
