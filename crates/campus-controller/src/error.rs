//! Error types for the campus controller.

use campus_openflow::{DatapathId, PacketError};
use campus_types::{Ipv4Address, Ipv4Prefix};
use std::path::PathBuf;
use thiserror::Error;

/// Topology inconsistencies detected while building the switch tables.
///
/// Every variant is fatal: the controller refuses to start rather than
/// forward traffic on a map it cannot trust.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("duplicate datapath id {0} ({1} and {2})")]
    DuplicateDpid(DatapathId, String, String),

    #[error("duplicate switch name: {0}")]
    DuplicateName(String),

    #[error("port {port} on {switch} is used by both {first} and {second}")]
    PortCollision {
        switch: String,
        port: u16,
        first: String,
        second: String,
    },

    #[error("port {port} for {neighbor} on {switch} is outside 1..=65279")]
    InvalidPort {
        switch: String,
        neighbor: String,
        port: u16,
    },

    #[error("{switch} lists unknown neighbor {neighbor:?}")]
    UnknownNeighbor { switch: String, neighbor: String },

    #[error("{switch} links to {neighbor} but {neighbor} has no link back")]
    AsymmetricLink { switch: String, neighbor: String },

    #[error("{switch} links to {neighbor}; only core-to-switch links are allowed")]
    UnexpectedSwitchLink { switch: String, neighbor: String },

    #[error("no core switch defined")]
    NoCore,

    #[error("more than one core switch: {0:?}")]
    MultipleCore(Vec<String>),

    #[error("more than one isolation switch: {0:?}")]
    MultipleIsolation(Vec<String>),

    #[error("{0} has no uplink to the core switch")]
    MissingUplink(String),

    #[error("isolation switch {switch} must use port 1 for its uplink, found {port}")]
    IsolationUplinkNotReserved { switch: String, port: u16 },

    #[error("isolation switch {switch} may not list host {host}; its ports follow the subnet")]
    IsolationHostEntry { switch: String, host: Ipv4Address },

    #[error("host {host} is attached to both {first} and {second}")]
    DuplicateHost {
        host: Ipv4Address,
        first: String,
        second: String,
    },

    #[error("host {host} on {switch} lies inside the isolation subnet {subnet}")]
    HostInIsolationSubnet {
        switch: String,
        host: Ipv4Address,
        subnet: Ipv4Prefix,
    },

    #[error("{role} host {host} is not attached to any switch")]
    UnknownRoleHost { role: &'static str, host: Ipv4Address },

    #[error("isolation switch {0} is defined but no isolation subnet is configured")]
    MissingIsolationSubnet(String),

    #[error("isolation subnet {0} is configured but no isolation switch is defined")]
    MissingIsolationSwitch(Ipv4Prefix),
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// Errors raised while handling packet-in events.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("packet-in from {dpid} was not parsed by the switch")]
    Unparsed { dpid: DatapathId },

    #[error("malformed packet-in from {dpid}: {source}")]
    MalformedPacket {
        dpid: DatapathId,
        source: PacketError,
    },

    #[error("failed to deliver flow-mod to {dpid}: {message}")]
    Sink { dpid: DatapathId, message: String },
}

/// Result type for controller operations.
pub type Result<T> = std::result::Result<T, ControllerError>;
