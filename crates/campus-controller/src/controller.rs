//! Packet-in dispatch.
//!
//! [`Controller`] owns the read-only switch tables and policy. It keeps no
//! per-event state, so one instance behind an `Arc` can serve events from
//! any number of tasks.

use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use crate::classify::{classify, Ipv4Flow, PacketClass};
use crate::config::CampusConfig;
use crate::decision::{DropKind, FloodScope, FlowDecision};
use crate::disposer::{DispositionContext, FlowDisposer};
use crate::error::{ConfigError, ControllerError, Result};
use crate::policy::PolicyEngine;
use crate::topology::TopologyMap;
use campus_openflow::{BufferId, DatapathId, FlowMod, Packet, PortNo};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// A packet the switch could not match, as reported to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketIn {
    pub dpid: DatapathId,
    pub in_port: PortNo,
    #[serde(default)]
    pub buffer_id: Option<BufferId>,
    /// False when the runtime could not decode the frame.
    #[serde(default = "default_parsed")]
    pub parsed: bool,
    pub data: Vec<u8>,
}

fn default_parsed() -> bool {
    true
}

impl PacketIn {
    pub fn new(dpid: DatapathId, in_port: PortNo, data: Vec<u8>) -> Self {
        Self {
            dpid,
            in_port,
            buffer_id: None,
            parsed: true,
            data,
        }
    }

    pub fn with_buffer_id(mut self, buffer_id: Option<BufferId>) -> Self {
        self.buffer_id = buffer_id;
        self
    }
}

/// Delivers flow-mods to switches.
pub trait FlowSink: Send + Sync {
    fn send_flow_mod(&self, dpid: DatapathId, flow_mod: &FlowMod) -> std::result::Result<(), String>;
}

/// What the controller did with one packet-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Disposition {
    pub decision: FlowDecision,
    /// `None` for an implicit drop.
    pub flow_mod: Option<FlowMod>,
}

#[derive(Debug, Clone)]
pub struct Controller {
    topology: Arc<TopologyMap>,
    policy: Arc<PolicyEngine>,
    disposer: FlowDisposer,
}

impl Controller {
    pub fn new(topology: Arc<TopologyMap>, policy: Arc<PolicyEngine>, disposer: FlowDisposer) -> Self {
        Self {
            topology,
            policy,
            disposer,
        }
    }

    /// Builds and validates the switch tables and policy from `config`.
    pub fn from_config(config: &CampusConfig) -> std::result::Result<Self, ConfigError> {
        let topology = match TopologyMap::build(config) {
            Ok(topology) => topology,
            Err(e) => {
                audit_log!(AuditRecord::new(
                    AuditCategory::ConfigurationChange,
                    "Controller",
                    "load_topology"
                )
                .with_object_type("topology")
                .with_error(e.to_string()));
                return Err(e.into());
            }
        };
        let policy = PolicyEngine::from_roles(&config.roles, &config.policy.rules);

        audit_log!(AuditRecord::new(
            AuditCategory::ConfigurationChange,
            "Controller",
            "load_topology"
        )
        .with_outcome(AuditOutcome::Success)
        .with_object_type("topology")
        .with_details(serde_json::json!({
            "switches": topology.len(),
            "policy_rules": policy.len(),
            "idle_timeout_secs": config.flow.idle_timeout_secs,
            "hard_timeout_secs": config.flow.hard_timeout_secs,
        })));

        Ok(Self::new(
            Arc::new(topology),
            Arc::new(policy),
            FlowDisposer::from_config(&config.flow),
        ))
    }

    pub fn topology(&self) -> &TopologyMap {
        &self.topology
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    /// Decides what `dpid` should do with `packet`.
    pub fn decide(&self, dpid: DatapathId, packet: &Packet) -> FlowDecision {
        let flow = match classify(packet) {
            PacketClass::Arp(_) => return FlowDecision::flood(FloodScope::Arp),
            PacketClass::NonIp => return FlowDecision::flood(FloodScope::ExactPacket),
            PacketClass::Ipv4(flow) => flow,
        };

        let node = self.topology.switch(dpid);
        if let Some(node) = node.filter(|node| node.role.bypasses_policy()) {
            return node.role.resolve(&flow);
        }

        if let Some(rule) = self.policy.evaluate(&flow) {
            return FlowDecision::deny(rule.protocol, rule.name.clone());
        }

        match node {
            Some(node) => node.role.resolve(&flow),
            None => {
                warn!(
                    dpid = %dpid,
                    flow = %flow,
                    "campus-controller: packet-in from unknown switch, dropping"
                );
                FlowDecision::implicit_drop()
            }
        }
    }

    /// Decodes `event`, decides, and builds the flow-mod without sending it.
    pub fn dispatch(&self, event: &PacketIn) -> Result<Disposition> {
        if !event.parsed {
            return Err(ControllerError::Unparsed { dpid: event.dpid });
        }
        let packet = Packet::parse(&event.data).map_err(|source| ControllerError::MalformedPacket {
            dpid: event.dpid,
            source,
        })?;

        let decision = self.decide(event.dpid, &packet);
        let flow_mod = self.disposer.dispose(
            &decision,
            &DispositionContext {
                packet: &packet,
                in_port: event.in_port,
                buffer_id: event.buffer_id,
            },
        );

        if let (Some(flow), FlowDecision::Drop { kind }) = (ipv4_flow(&packet), &decision) {
            self.record_drop(event.dpid, &flow, kind);
        }

        debug!(
            switch = %self.topology.switch_label(event.dpid),
            in_port = %event.in_port,
            decision = %decision,
            "campus-controller: packet-in handled"
        );

        Ok(Disposition { decision, flow_mod })
    }

    /// Dispatches `event` and sends any resulting flow-mod through `sink`.
    ///
    /// Malformed and unparsed events are logged and returned as errors; no
    /// flow-mod is sent for them.
    pub fn handle(&self, event: &PacketIn, sink: &dyn FlowSink) -> Result<Disposition> {
        let disposition = match self.dispatch(event) {
            Ok(disposition) => disposition,
            Err(e) => {
                warn!(
                    switch = %self.topology.switch_label(event.dpid),
                    in_port = %event.in_port,
                    error = %e,
                    "campus-controller: discarding packet-in"
                );
                audit_log!(AuditRecord::new(
                    AuditCategory::ErrorCondition,
                    "Controller",
                    "packet_in"
                )
                .with_object_id(event.dpid.to_string())
                .with_object_type("switch")
                .with_error(e.to_string()));
                return Err(e);
            }
        };

        if let Some(flow_mod) = &disposition.flow_mod {
            if let Err(message) = sink.send_flow_mod(event.dpid, flow_mod) {
                audit_log!(AuditRecord::new(
                    AuditCategory::FlowInstall,
                    "Controller",
                    "send_flow_mod"
                )
                .with_object_id(event.dpid.to_string())
                .with_object_type("switch")
                .with_error(message.clone()));
                return Err(ControllerError::Sink {
                    dpid: event.dpid,
                    message,
                });
            }
        }

        Ok(disposition)
    }

    fn record_drop(&self, dpid: DatapathId, flow: &Ipv4Flow, kind: &DropKind) {
        let DropKind::Explicit { protocol, rule } = kind else {
            debug!(
                switch = %self.topology.switch_label(dpid),
                flow = %flow,
                "campus-controller: no route, not installing a rule"
            );
            return;
        };

        audit_log!(AuditRecord::new(
            AuditCategory::SecurityPolicy,
            "PolicyEngine",
            "deny"
        )
        .with_outcome(AuditOutcome::Denied)
        .with_object_id(self.topology.switch_label(dpid))
        .with_object_type("switch")
        .with_details(serde_json::json!({
            "rule": rule,
            "protocol": protocol,
            "src": flow.src,
            "dst": flow.dst,
            "src_name": self.topology.host_name(&flow.src),
            "dst_name": self.topology.host_name(&flow.dst),
        })));
    }
}

fn ipv4_flow(packet: &Packet) -> Option<Ipv4Flow> {
    match classify(packet) {
        PacketClass::Ipv4(flow) => Some(flow),
        _ => None,
    }
}
