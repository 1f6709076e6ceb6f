//! Ordered first-match deny evaluation.

use super::types::{AddressPredicate, PolicyRule, ProtocolSelector};
use crate::classify::Ipv4Flow;
use crate::config::RolesConfig;

/// Immutable, ordered deny list.
///
/// The campus rules derived from the role table always come first; any
/// configured extra rules are appended after them.
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    rules: Vec<PolicyRule>,
}

impl PolicyEngine {
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self { rules }
    }

    /// Campus rules for `roles` followed by `extra`.
    pub fn from_roles(roles: &RolesConfig, extra: &[PolicyRule]) -> Self {
        let mut rules = campus_rules(roles);
        rules.extend_from_slice(extra);
        Self { rules }
    }

    /// Returns the first rule denying `flow`, if any.
    pub fn evaluate(&self, flow: &Ipv4Flow) -> Option<&PolicyRule> {
        self.rules.iter().find(|rule| rule.matches(flow))
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// The fixed campus firewall, in evaluation order.
pub fn campus_rules(roles: &RolesConfig) -> Vec<PolicyRule> {
    use ProtocolSelector::{Icmp, Tcp};

    let internal_a = AddressPredicate::Subnet(roles.internal_a);
    let internal_b = AddressPredicate::Subnet(roles.internal_b);

    vec![
        PolicyRule::deny("trusted-tcp-to-server", Tcp, roles.trusted, roles.server),
        PolicyRule::deny("untrusted-icmp-to-internal-a", Icmp, roles.untrusted, internal_a),
        PolicyRule::deny("untrusted-icmp-to-internal-b", Icmp, roles.untrusted, internal_b),
        PolicyRule::deny("untrusted-icmp-to-server", Icmp, roles.untrusted, roles.server),
        PolicyRule::deny("trusted-icmp-to-internal-a", Icmp, roles.trusted, internal_a),
        PolicyRule::deny("trusted-icmp-to-server", Icmp, roles.trusted, roles.server),
        PolicyRule::deny("internal-a-icmp-to-internal-b", Icmp, internal_a, internal_b),
        PolicyRule::deny("internal-b-icmp-to-internal-a", Icmp, internal_b, internal_a),
    ]
}

/// Deny checked by the switch facing the server, ahead of local delivery.
pub fn server_guard(roles: &RolesConfig) -> PolicyRule {
    PolicyRule::deny(
        "untrusted-to-server",
        ProtocolSelector::Any,
        roles.untrusted,
        roles.server,
    )
}
