//! Campus SDN controller.
//!
//! Decides, for every packet a switch cannot match, whether it is flooded,
//! forwarded out a port, or dropped, and builds the flow-mod that makes the
//! switch do so without asking again:
//!
//! - [`classify`]: splits packets into ARP, other non-IP and IPv4
//! - [`policy`]: ordered deny rules for the campus roles
//! - [`topology`]: validated switch/port/neighbor map
//! - [`resolver`]: per-switch "attached locally or send upward" forwarding
//! - [`disposer`]: flow-mod construction
//! - [`controller`]: packet-in dispatch tying the above together
//!
//! # Example
//!
//! ```ignore
//! use campus_controller::{CampusConfig, Controller, PacketIn};
//!
//! let controller = Controller::from_config(&CampusConfig::default())?;
//! let disposition = controller.dispatch(&PacketIn::new(dpid, in_port, frame))?;
//! ```

pub mod audit;
pub mod classify;
pub mod config;
pub mod controller;
pub mod decision;
pub mod disposer;
pub mod error;
pub mod policy;
pub mod resolver;
pub mod topology;

pub use audit::{AuditCategory, AuditOutcome, AuditRecord};
pub use classify::{classify, Ipv4Flow, PacketClass};
pub use config::{CampusConfig, FlowConfig, PolicyConfig, RolesConfig, SwitchConfig};
pub use controller::{Controller, Disposition, FlowSink, PacketIn};
pub use decision::{DropKind, FloodScope, FlowDecision};
pub use disposer::{DispositionContext, FlowDisposer};
pub use error::{ConfigError, ControllerError, Result, TopologyError};
pub use policy::{AddressPredicate, PolicyEngine, PolicyRule, ProtocolSelector};
pub use resolver::SwitchRole;
pub use topology::{NeighborKey, SwitchKind, SwitchNode, TopologyMap};
