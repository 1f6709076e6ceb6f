//! Controller configuration.
//!
//! Loaded once at startup from a TOML file. Every section has a default, and
//! the defaults together describe the built-in campus network, so an empty
//! file (or no file) yields a working controller.
//!
//! ```toml
//! [flow]
//! idle_timeout_secs = 50
//! hard_timeout_secs = 50
//!
//! [roles]
//! server = "30.1.4.66"
//! trusted = "104.24.32.100"
//! untrusted = "108.44.83.103"
//! internal_a = "20.2.1.0/24"
//! internal_b = "10.2.7.0/24"
//! isolation = "40.2.5.0/24"
//!
//! [[switch]]
//! name = "floor1_s1"
//! dpid = 3
//! role = "distribution"
//! ports = { core_s1 = 1, "20.2.1.10" = 2, "20.2.1.20" = 3 }
//!
//! [[policy.rules]]
//! name = "no-udp-to-server"
//! protocol = "udp"
//! src = "any"
//! dst = "30.1.4.66"
//! ```

use crate::error::ConfigError;
use crate::policy::PolicyRule;
use crate::topology::SwitchKind;
use campus_openflow::DatapathId;
use campus_types::{Ipv4Address, Ipv4Prefix};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/campus-controller/campus.toml";

const CAMPUS_INTERNAL_A: Ipv4Prefix = Ipv4Prefix::new_const(Ipv4Address::new(20, 2, 1, 0), 24);
const CAMPUS_INTERNAL_B: Ipv4Prefix = Ipv4Prefix::new_const(Ipv4Address::new(10, 2, 7, 0), 24);
const CAMPUS_ISOLATION: Ipv4Prefix = Ipv4Prefix::new_const(Ipv4Address::new(40, 2, 5, 0), 24);

/// Flow entry lifetime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Seconds without traffic before an entry expires
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u16,

    /// Seconds after installation before an entry expires regardless of traffic
    #[serde(default = "default_hard_timeout")]
    pub hard_timeout_secs: u16,
}

/// Addresses that policy rules are written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolesConfig {
    /// Protected server
    pub server: Ipv4Address,
    /// External host with partial access
    pub trusted: Ipv4Address,
    /// External host with no ICMP reachability and no path to the server
    pub untrusted: Ipv4Address,
    pub internal_a: Ipv4Prefix,
    pub internal_b: Ipv4Prefix,
    /// Subnet behind the isolation switch, if there is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isolation: Option<Ipv4Prefix>,
}

/// One switch and the neighbors on its ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchConfig {
    pub name: String,
    pub dpid: DatapathId,
    pub role: SwitchKind,
    /// Neighbor (switch name or host address) to local port
    #[serde(default)]
    pub ports: BTreeMap<String, u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Deny rules evaluated after the campus rules
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

/// Complete controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampusConfig {
    #[serde(default)]
    pub flow: FlowConfig,

    #[serde(default)]
    pub roles: RolesConfig,

    /// Display names for host addresses, used in logs only
    #[serde(default = "campus_host_names")]
    pub hosts: BTreeMap<Ipv4Address, String>,

    #[serde(default = "campus_switches", rename = "switch")]
    pub switches: Vec<SwitchConfig>,

    #[serde(default)]
    pub policy: PolicyConfig,
}

fn default_idle_timeout() -> u16 {
    50
}

fn default_hard_timeout() -> u16 {
    50
}

fn campus_host_names() -> BTreeMap<Ipv4Address, String> {
    [
        (Ipv4Address::new(30, 1, 4, 66), "w_s"),
        (Ipv4Address::new(20, 2, 1, 10), "laptop"),
        (Ipv4Address::new(20, 2, 1, 20), "l_m"),
        (Ipv4Address::new(20, 2, 1, 30), "device1"),
        (Ipv4Address::new(20, 2, 1, 40), "device2"),
        (Ipv4Address::new(10, 2, 7, 10), "host1"),
        (Ipv4Address::new(10, 2, 7, 20), "host2"),
        (Ipv4Address::new(104, 24, 32, 100), "trust_h"),
        (Ipv4Address::new(108, 44, 83, 103), "untrust_h"),
    ]
    .into_iter()
    .map(|(addr, name)| (addr, name.to_string()))
    .collect()
}

fn switch(name: &str, dpid: u64, role: SwitchKind, ports: &[(&str, u16)]) -> SwitchConfig {
    SwitchConfig {
        name: name.to_string(),
        dpid: DatapathId::new(dpid),
        role,
        ports: ports
            .iter()
            .map(|(neighbor, port)| (neighbor.to_string(), *port))
            .collect(),
    }
}

fn campus_switches() -> Vec<SwitchConfig> {
    vec![
        switch(
            "core_s1",
            1,
            SwitchKind::Core,
            &[
                ("d_c_s1", 1),
                ("floor1_s1", 2),
                ("floor1_s2", 3),
                ("floor2_s1", 4),
                ("a_g_s1", 5),
                ("104.24.32.100", 6),
                ("108.44.83.103", 7),
            ],
        ),
        switch(
            "d_c_s1",
            2,
            SwitchKind::Distribution,
            &[("core_s1", 1), ("30.1.4.66", 2)],
        ),
        switch(
            "floor1_s1",
            3,
            SwitchKind::Distribution,
            &[("core_s1", 1), ("20.2.1.10", 2), ("20.2.1.20", 3)],
        ),
        switch(
            "floor1_s2",
            4,
            SwitchKind::Distribution,
            &[("core_s1", 1), ("20.2.1.30", 2), ("20.2.1.40", 3)],
        ),
        switch(
            "floor2_s1",
            5,
            SwitchKind::Distribution,
            &[("core_s1", 1), ("10.2.7.10", 2), ("10.2.7.20", 3)],
        ),
        switch("a_g_s1", 6, SwitchKind::Isolation, &[("core_s1", 1)]),
    ]
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            hard_timeout_secs: default_hard_timeout(),
        }
    }
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            server: Ipv4Address::new(30, 1, 4, 66),
            trusted: Ipv4Address::new(104, 24, 32, 100),
            untrusted: Ipv4Address::new(108, 44, 83, 103),
            internal_a: CAMPUS_INTERNAL_A,
            internal_b: CAMPUS_INTERNAL_B,
            isolation: Some(CAMPUS_ISOLATION),
        }
    }
}

impl Default for CampusConfig {
    fn default() -> Self {
        Self {
            flow: FlowConfig::default(),
            roles: RolesConfig::default(),
            hosts: campus_host_names(),
            switches: campus_switches(),
            policy: PolicyConfig::default(),
        }
    }
}

impl CampusConfig {
    /// Parses a configuration document.
    pub fn from_toml_str(content: &str, origin: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.as_ref().to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from `path`. The file must exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, path)
    }

    /// Loads configuration from `path`, falling back to the built-in campus
    /// network if the file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    path = %path.display(),
                    "campus-controller: config file not found, using built-in campus topology"
                );
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        fs::write(path, self.to_toml_string()?).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks the settings that do not depend on the topology.
    ///
    /// Topology consistency is checked when the switch tables are built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flow.idle_timeout_secs == 0 || self.flow.hard_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "flow timeouts must be greater than zero".to_string(),
            ));
        }

        if let Some(rule) = self.policy.rules.iter().find(|rule| rule.name.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "policy rule has an empty name: {}",
                rule
            )));
        }

        Ok(())
    }

    pub fn host_name(&self, addr: &Ipv4Address) -> Option<&str> {
        self.hosts.get(addr).map(String::as_str)
    }
}
