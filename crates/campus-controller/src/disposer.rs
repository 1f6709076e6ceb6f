//! Turns a [`FlowDecision`] into the flow-mod the switch should install.

use crate::config::FlowConfig;
use crate::decision::{DropKind, FloodScope, FlowDecision};
use campus_openflow::{BufferId, EtherType, FlowMatch, FlowMod, Packet, PortNo};

/// The packet a decision was made for.
#[derive(Debug, Clone, Copy)]
pub struct DispositionContext<'a> {
    pub packet: &'a Packet,
    pub in_port: PortNo,
    pub buffer_id: Option<BufferId>,
}

/// Builds flow-mods. Every entry shares the same idle and hard timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowDisposer {
    idle_timeout: u16,
    hard_timeout: u16,
}

impl Default for FlowDisposer {
    fn default() -> Self {
        Self::from_config(&FlowConfig::default())
    }
}

impl FlowDisposer {
    pub fn new(idle_timeout: u16, hard_timeout: u16) -> Self {
        Self {
            idle_timeout,
            hard_timeout,
        }
    }

    pub fn from_config(config: &FlowConfig) -> Self {
        Self::new(config.idle_timeout_secs, config.hard_timeout_secs)
    }

    /// Returns `None` for an implicit drop: nothing is installed and later
    /// identical packets come back to the controller.
    ///
    /// Forward and explicit-drop entries match on the addresses of the IPv4
    /// header; a decision of either kind for a packet without one yields
    /// `None`.
    pub fn dispose(&self, decision: &FlowDecision, ctx: &DispositionContext<'_>) -> Option<FlowMod> {
        let flow_match = match decision {
            FlowDecision::Flood {
                scope: FloodScope::Arp,
            } => FlowMatch::new().with_dl_type(EtherType::ARP),
            FlowDecision::Flood {
                scope: FloodScope::ExactPacket,
            } => FlowMatch::from_packet(ctx.packet, ctx.in_port),
            FlowDecision::Forward { .. } => {
                let ip = ctx.packet.ipv4()?;
                FlowMatch::new()
                    .with_dl_type(EtherType::IPV4)
                    .with_nw_proto(ip.protocol.as_u8())
                    .with_in_port(ctx.in_port)
                    .with_nw_src(ip.src)
                    .with_nw_dst(ip.dst)
            }
            FlowDecision::Drop {
                kind: DropKind::Explicit { protocol, .. },
            } => {
                let ip = ctx.packet.ipv4()?;
                let mut m = FlowMatch::new()
                    .with_dl_type(EtherType::IPV4)
                    .with_nw_src(ip.src)
                    .with_nw_dst(ip.dst);
                if let Some(proto) = protocol.nw_proto() {
                    m = m.with_nw_proto(proto);
                }
                m
            }
            FlowDecision::Drop {
                kind: DropKind::Implicit,
            } => return None,
        };

        let flow_mod = FlowMod::new(flow_match)
            .with_timeouts(self.idle_timeout, self.hard_timeout)
            .with_buffer_id(ctx.buffer_id);

        Some(match decision {
            FlowDecision::Flood { .. } => flow_mod.flood(),
            FlowDecision::Forward { out_port } => flow_mod.output(*out_port),
            FlowDecision::Drop { .. } => flow_mod,
        })
    }
}
