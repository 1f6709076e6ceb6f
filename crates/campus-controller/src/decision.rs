//! The outcome of evaluating one packet.

use crate::policy::ProtocolSelector;
use campus_openflow::PortNo;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum FlowDecision {
    Flood { scope: FloodScope },
    Forward { out_port: PortNo },
    Drop { kind: DropKind },
}

/// What a flood entry matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FloodScope {
    /// Every ARP frame, whatever its addresses or ingress port.
    Arp,
    /// This exact frame signature on this ingress port.
    ExactPacket,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DropKind {
    /// A deny rule matched; a drop entry is installed.
    Explicit {
        protocol: ProtocolSelector,
        rule: String,
    },
    /// No route at the core; nothing is installed.
    Implicit,
}

impl FlowDecision {
    pub fn flood(scope: FloodScope) -> Self {
        Self::Flood { scope }
    }

    pub fn forward(out_port: PortNo) -> Self {
        Self::Forward { out_port }
    }

    pub fn deny(protocol: ProtocolSelector, rule: impl Into<String>) -> Self {
        Self::Drop {
            kind: DropKind::Explicit {
                protocol,
                rule: rule.into(),
            },
        }
    }

    pub fn implicit_drop() -> Self {
        Self::Drop {
            kind: DropKind::Implicit,
        }
    }

    pub fn is_denied(&self) -> bool {
        matches!(
            self,
            Self::Drop {
                kind: DropKind::Explicit { .. }
            }
        )
    }

    pub fn out_port(&self) -> Option<PortNo> {
        match self {
            Self::Forward { out_port } => Some(*out_port),
            _ => None,
        }
    }
}

impl fmt::Display for FlowDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flood {
                scope: FloodScope::Arp,
            } => write!(f, "flood (arp)"),
            Self::Flood {
                scope: FloodScope::ExactPacket,
            } => write!(f, "flood (exact packet)"),
            Self::Forward { out_port } => write!(f, "forward to port {}", out_port),
            Self::Drop {
                kind: DropKind::Explicit { protocol, rule },
            } => write!(f, "deny {} ({})", protocol, rule),
            Self::Drop {
                kind: DropKind::Implicit,
            } => write!(f, "drop (no route)"),
        }
    }
}
