//! Topology construction and validation.

use super::types::{NeighborKey, SwitchKind};
use crate::config::{CampusConfig, RolesConfig, SwitchConfig};
use crate::error::TopologyError;
use crate::policy::server_guard;
use crate::resolver::{CoreTable, DistributionTable, IsolationTable, SwitchRole};
use campus_openflow::{DatapathId, PortNo};
use campus_types::{Ipv4Address, Ipv4Prefix};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// A switch, its neighbors and its forwarding role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchNode {
    pub name: String,
    pub dpid: DatapathId,
    pub neighbors: BTreeMap<NeighborKey, PortNo>,
    pub role: SwitchRole,
}

impl SwitchNode {
    pub fn kind(&self) -> SwitchKind {
        self.role.kind()
    }

    /// Local port facing the core, for non-core switches.
    pub fn uplink(&self) -> Option<PortNo> {
        match &self.role {
            SwitchRole::Core(_) => None,
            SwitchRole::Distribution(table) => Some(table.uplink),
            SwitchRole::Isolation(table) => Some(table.uplink),
        }
    }
}

/// Validated, immutable campus topology.
#[derive(Debug, Clone, Default)]
pub struct TopologyMap {
    switches: HashMap<DatapathId, SwitchNode>,
    names: HashMap<String, DatapathId>,
    host_names: BTreeMap<Ipv4Address, String>,
}

impl TopologyMap {
    /// Validates the configured switches and builds every switch's role.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found. Nothing is partially built.
    pub fn build(config: &CampusConfig) -> Result<Self, TopologyError> {
        let validated = Validated::check(&config.switches, &config.roles)?;

        let mut map = TopologyMap {
            host_names: config.hosts.clone(),
            ..Default::default()
        };
        for switch in &config.switches {
            let neighbors = neighbors_of(switch);
            let role = validated.role_for(switch, &neighbors, &config.roles)?;
            debug!(
                switch = %switch.name,
                dpid = %switch.dpid,
                role = %role.kind(),
                ports = neighbors.len(),
                "campus-controller: switch table built"
            );
            map.names.insert(switch.name.clone(), switch.dpid);
            map.switches.insert(
                switch.dpid,
                SwitchNode {
                    name: switch.name.clone(),
                    dpid: switch.dpid,
                    neighbors,
                    role,
                },
            );
        }
        Ok(map)
    }

    pub fn switch(&self, dpid: DatapathId) -> Option<&SwitchNode> {
        self.switches.get(&dpid)
    }

    pub fn switch_by_name(&self, name: &str) -> Option<&SwitchNode> {
        self.names.get(name).and_then(|dpid| self.switches.get(dpid))
    }

    /// Port on `dpid` that faces `neighbor`.
    pub fn port_for(&self, dpid: DatapathId, neighbor: &NeighborKey) -> Option<PortNo> {
        self.switch(dpid)
            .and_then(|node| node.neighbors.get(neighbor))
            .copied()
    }

    pub fn host_name(&self, addr: &Ipv4Address) -> Option<&str> {
        self.host_names.get(addr).map(String::as_str)
    }

    /// Name of `dpid` for log output, falling back to the datapath id.
    pub fn switch_label(&self, dpid: DatapathId) -> String {
        match self.switch(dpid) {
            Some(node) => node.name.clone(),
            None => dpid.to_string(),
        }
    }

    pub fn switches(&self) -> impl Iterator<Item = &SwitchNode> {
        self.switches.values()
    }

    pub fn len(&self) -> usize {
        self.switches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
    }
}

fn neighbors_of(switch: &SwitchConfig) -> BTreeMap<NeighborKey, PortNo> {
    switch
        .ports
        .iter()
        .map(|(key, port)| (NeighborKey::parse(key), PortNo::new(*port)))
        .collect()
}

/// What validation established about the switch list.
struct Validated<'a> {
    by_name: HashMap<&'a str, &'a SwitchConfig>,
    core: &'a SwitchConfig,
    isolation: Option<(&'a SwitchConfig, Ipv4Prefix)>,
}

impl<'a> Validated<'a> {
    fn check(switches: &'a [SwitchConfig], roles: &RolesConfig) -> Result<Self, TopologyError> {
        let mut by_name: HashMap<&str, &SwitchConfig> = HashMap::new();
        let mut by_dpid: HashMap<DatapathId, &str> = HashMap::new();
        for switch in switches {
            if by_name.insert(switch.name.as_str(), switch).is_some() {
                return Err(TopologyError::DuplicateName(switch.name.clone()));
            }
            if let Some(first) = by_dpid.insert(switch.dpid, switch.name.as_str()) {
                return Err(TopologyError::DuplicateDpid(
                    switch.dpid,
                    first.to_string(),
                    switch.name.clone(),
                ));
            }
        }

        let core = match of_kind(switches, SwitchKind::Core).as_slice() {
            [] => return Err(TopologyError::NoCore),
            [core] => *core,
            cores => return Err(TopologyError::MultipleCore(names(cores))),
        };

        let isolation = match (of_kind(switches, SwitchKind::Isolation).as_slice(), roles.isolation) {
            ([], None) => None,
            ([switch], Some(subnet)) => Some((*switch, subnet)),
            ([switch], None) => {
                return Err(TopologyError::MissingIsolationSubnet(switch.name.clone()))
            }
            ([], Some(subnet)) => return Err(TopologyError::MissingIsolationSwitch(subnet)),
            (many, _) => return Err(TopologyError::MultipleIsolation(names(many))),
        };

        let mut host_owner: HashMap<Ipv4Address, &str> = HashMap::new();
        for switch in switches {
            let mut used: HashMap<u16, &str> = HashMap::new();
            for (key, port) in &switch.ports {
                if !PortNo::new(*port).is_physical() {
                    return Err(TopologyError::InvalidPort {
                        switch: switch.name.clone(),
                        neighbor: key.clone(),
                        port: *port,
                    });
                }

                let neighbor = NeighborKey::parse(key);
                let peer = match &neighbor {
                    NeighborKey::Switch(name) => match by_name.get(name.as_str()) {
                        Some(peer) => Some(*peer),
                        None => {
                            return Err(TopologyError::UnknownNeighbor {
                                switch: switch.name.clone(),
                                neighbor: key.clone(),
                            })
                        }
                    },
                    NeighborKey::Host(_) => None,
                };

                if let Some(first) = used.insert(*port, key.as_str()) {
                    return Err(TopologyError::PortCollision {
                        switch: switch.name.clone(),
                        port: *port,
                        first: first.to_string(),
                        second: key.clone(),
                    });
                }

                match (neighbor.host(), peer) {
                    (Some(host), _) => check_host(switch, host, roles, &mut host_owner)?,
                    (None, Some(peer)) => check_link(switch, peer)?,
                    (None, None) => {}
                }
            }

            if switch.role != SwitchKind::Core {
                let uplink = switch
                    .ports
                    .get(&core.name)
                    .ok_or_else(|| TopologyError::MissingUplink(switch.name.clone()))?;
                if switch.role == SwitchKind::Isolation && *uplink != 1 {
                    return Err(TopologyError::IsolationUplinkNotReserved {
                        switch: switch.name.clone(),
                        port: *uplink,
                    });
                }
            }
        }

        for (role, host) in [
            ("server", roles.server),
            ("trusted", roles.trusted),
            ("untrusted", roles.untrusted),
        ] {
            if !host_owner.contains_key(&host) {
                return Err(TopologyError::UnknownRoleHost { role, host });
            }
        }

        Ok(Self {
            by_name,
            core,
            isolation,
        })
    }

    fn role_for(
        &self,
        switch: &SwitchConfig,
        neighbors: &BTreeMap<NeighborKey, PortNo>,
        roles: &RolesConfig,
    ) -> Result<SwitchRole, TopologyError> {
        let mut hosts: HashMap<Ipv4Address, PortNo> = neighbors
            .iter()
            .filter_map(|(key, port)| key.host().map(|host| (host, *port)))
            .collect();

        let guard = hosts
            .contains_key(&roles.server)
            .then(|| server_guard(roles));

        if switch.role == SwitchKind::Core {
            let mut isolation = None;
            for (key, port) in neighbors {
                let Some(peer) = key.switch().and_then(|name| self.by_name.get(name)) else {
                    continue;
                };
                match self.isolation {
                    Some((iso, subnet)) if iso.name == peer.name => {
                        isolation = Some((subnet, *port));
                    }
                    _ => {
                        for peer_key in peer.ports.keys() {
                            if let NeighborKey::Host(host) = NeighborKey::parse(peer_key) {
                                hosts.insert(host, *port);
                            }
                        }
                    }
                }
            }
            return Ok(SwitchRole::Core(CoreTable {
                hosts,
                isolation,
                guard,
            }));
        }

        let uplink = switch
            .ports
            .get(&self.core.name)
            .map(|port| PortNo::new(*port))
            .ok_or_else(|| TopologyError::MissingUplink(switch.name.clone()))?;

        if switch.role == SwitchKind::Isolation {
            let (_, subnet) = self
                .isolation
                .ok_or_else(|| TopologyError::MissingIsolationSubnet(switch.name.clone()))?;
            return Ok(SwitchRole::Isolation(IsolationTable { subnet, uplink }));
        }

        Ok(SwitchRole::Distribution(DistributionTable {
            hosts,
            uplink,
            guard,
        }))
    }
}

fn of_kind(switches: &[SwitchConfig], kind: SwitchKind) -> Vec<&SwitchConfig> {
    switches.iter().filter(|s| s.role == kind).collect()
}

fn names(switches: &[&SwitchConfig]) -> Vec<String> {
    switches.iter().map(|s| s.name.clone()).collect()
}

fn check_host<'a>(
    switch: &'a SwitchConfig,
    host: Ipv4Address,
    roles: &RolesConfig,
    host_owner: &mut HashMap<Ipv4Address, &'a str>,
) -> Result<(), TopologyError> {
    if switch.role == SwitchKind::Isolation {
        return Err(TopologyError::IsolationHostEntry {
            switch: switch.name.clone(),
            host,
        });
    }
    if let Some(subnet) = roles.isolation.filter(|subnet| subnet.contains(&host)) {
        return Err(TopologyError::HostInIsolationSubnet {
            switch: switch.name.clone(),
            host,
            subnet,
        });
    }
    if let Some(first) = host_owner.insert(host, switch.name.as_str()) {
        return Err(TopologyError::DuplicateHost {
            host,
            first: first.to_string(),
            second: switch.name.clone(),
        });
    }
    Ok(())
}

/// Only core-to-switch links are allowed, and both ends must list each other.
fn check_link(switch: &SwitchConfig, peer: &SwitchConfig) -> Result<(), TopologyError> {
    let tree_link = switch.name != peer.name
        && (switch.role == SwitchKind::Core || peer.role == SwitchKind::Core);
    if !tree_link {
        return Err(TopologyError::UnexpectedSwitchLink {
            switch: switch.name.clone(),
            neighbor: peer.name.clone(),
        });
    }
    if !peer.ports.contains_key(&switch.name) {
        return Err(TopologyError::AsymmetricLink {
            switch: switch.name.clone(),
            neighbor: peer.name.clone(),
        });
    }
    Ok(())
}
