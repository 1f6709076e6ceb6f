//! Per-switch forwarding resolution.
//!
//! Every switch gets one [`SwitchRole`] at startup, built from the topology
//! map. Resolution is always "attached locally" or "send upward"; the tree
//! is two levels deep, so no path computation is needed.

use crate::classify::Ipv4Flow;
use crate::decision::FlowDecision;
use crate::policy::{PolicyRule, ProtocolSelector};
use crate::topology::SwitchKind;
use campus_openflow::PortNo;
use campus_types::{Ipv4Address, Ipv4Prefix};
use std::collections::HashMap;

/// Rule name reported for traffic crossing the isolation boundary.
pub const ISOLATION_RULE: &str = "isolation";

/// Core tier: every reachable host and the port facing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreTable {
    /// Directly attached hosts, plus every host behind a distribution switch
    /// mapped to the port facing that switch.
    pub hosts: HashMap<Ipv4Address, PortNo>,
    /// Isolation subnet and the port facing the isolation switch.
    pub isolation: Option<(Ipv4Prefix, PortNo)>,
    /// Set when the server is attached directly to the core.
    pub guard: Option<PolicyRule>,
}

impl CoreTable {
    pub fn resolve(&self, flow: &Ipv4Flow) -> FlowDecision {
        if let Some(guard) = self.guard.as_ref().filter(|guard| guard.matches(flow)) {
            return FlowDecision::deny(guard.protocol, guard.name.clone());
        }
        if let Some(port) = self.hosts.get(&flow.dst) {
            return FlowDecision::forward(*port);
        }
        match self.isolation {
            Some((subnet, port)) if subnet.contains(&flow.dst) => FlowDecision::forward(port),
            _ => FlowDecision::implicit_drop(),
        }
    }
}

/// Distribution/access tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionTable {
    pub hosts: HashMap<Ipv4Address, PortNo>,
    pub uplink: PortNo,
    /// Deny re-checked before local delivery on the switch facing the server.
    pub guard: Option<PolicyRule>,
}

impl DistributionTable {
    pub fn resolve(&self, flow: &Ipv4Flow) -> FlowDecision {
        if let Some(guard) = self.guard.as_ref().filter(|guard| guard.matches(flow)) {
            return FlowDecision::deny(guard.protocol, guard.name.clone());
        }
        match self.hosts.get(&flow.dst) {
            Some(port) => FlowDecision::forward(*port),
            None => FlowDecision::forward(self.uplink),
        }
    }
}

/// Air-gapped segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsolationTable {
    pub subnet: Ipv4Prefix,
    pub uplink: PortNo,
}

impl IsolationTable {
    /// Port 1 is the uplink, so host `x.y.z.n` sits on port `n + 1`.
    pub fn host_port(addr: &Ipv4Address) -> PortNo {
        PortNo::new(u16::from(addr.last_octet()) + 1)
    }

    /// Only traffic with both ends inside the subnet is forwarded.
    pub fn resolve(&self, flow: &Ipv4Flow) -> FlowDecision {
        if self.subnet.contains(&flow.src) && self.subnet.contains(&flow.dst) {
            FlowDecision::forward(Self::host_port(&flow.dst))
        } else {
            FlowDecision::deny(ProtocolSelector::Any, ISOLATION_RULE)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchRole {
    Core(CoreTable),
    Distribution(DistributionTable),
    Isolation(IsolationTable),
}

impl SwitchRole {
    pub fn resolve(&self, flow: &Ipv4Flow) -> FlowDecision {
        match self {
            Self::Core(table) => table.resolve(flow),
            Self::Distribution(table) => table.resolve(flow),
            Self::Isolation(table) => table.resolve(flow),
        }
    }

    pub fn kind(&self) -> SwitchKind {
        match self {
            Self::Core(_) => SwitchKind::Core,
            Self::Distribution(_) => SwitchKind::Distribution,
            Self::Isolation(_) => SwitchKind::Isolation,
        }
    }

    /// The isolation switch decides alone; the campus rules are not consulted.
    pub fn bypasses_policy(&self) -> bool {
        matches!(self, Self::Isolation(_))
    }
}
