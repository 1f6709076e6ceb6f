//! Campus firewall policy.
//!
//! Rules are deny-only and evaluated in a fixed order; the first match
//! decides. Anything not denied falls through to forwarding.

mod engine;
mod types;

pub use engine::{campus_rules, server_guard, PolicyEngine};
pub use types::{AddressPredicate, PolicyRule, ProtocolSelector};
