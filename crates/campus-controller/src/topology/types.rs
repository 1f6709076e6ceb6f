//! Topology value types.

use campus_types::Ipv4Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tier a switch sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchKind {
    Core,
    /// Distribution/access tier: local hosts plus one uplink.
    Distribution,
    /// Air-gapped segment; only intra-subnet traffic is allowed.
    Isolation,
}

impl fmt::Display for SwitchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Core => write!(f, "core"),
            Self::Distribution => write!(f, "distribution"),
            Self::Isolation => write!(f, "isolation"),
        }
    }
}

/// What sits behind a switch port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NeighborKey {
    Switch(String),
    Host(Ipv4Address),
}

impl NeighborKey {
    /// Interprets a configuration key: anything that parses as an IPv4
    /// address is a host, everything else names a switch.
    pub fn parse(key: &str) -> Self {
        match key.parse::<Ipv4Address>() {
            Ok(addr) => Self::Host(addr),
            Err(_) => Self::Switch(key.to_string()),
        }
    }

    pub fn host(&self) -> Option<Ipv4Address> {
        match self {
            Self::Host(addr) => Some(*addr),
            Self::Switch(_) => None,
        }
    }

    pub fn switch(&self) -> Option<&str> {
        match self {
            Self::Switch(name) => Some(name),
            Self::Host(_) => None,
        }
    }
}

impl fmt::Display for NeighborKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Switch(name) => write!(f, "{}", name),
            Self::Host(addr) => write!(f, "{}", addr),
        }
    }
}
