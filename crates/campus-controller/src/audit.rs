//! Audit records and logging setup.
//!
//! Security-relevant controller events (policy denies, topology loads,
//! lifecycle transitions, rejected input) are emitted as structured records
//! on the `audit` tracing target so they can be filtered apart from
//! operational logs. Each record also carries its own JSON rendering for
//! log pipelines that only keep the message fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Audit event categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditCategory {
    /// Topology or policy loaded or rejected
    ConfigurationChange,
    /// Controller start and stop
    SystemLifecycle,
    /// Firewall and isolation decisions
    SecurityPolicy,
    /// Flow entries pushed to a switch
    FlowInstall,
    /// Malformed or undeliverable input
    ErrorCondition,
}

impl fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditCategory::ConfigurationChange => write!(f, "CONFIGURATION_CHANGE"),
            AuditCategory::SystemLifecycle => write!(f, "SYSTEM_LIFECYCLE"),
            AuditCategory::SecurityPolicy => write!(f, "SECURITY_POLICY"),
            AuditCategory::FlowInstall => write!(f, "FLOW_INSTALL"),
            AuditCategory::ErrorCondition => write!(f, "ERROR_CONDITION"),
        }
    }
}

/// Outcome of an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Failure,
    InProgress,
    /// Traffic or a request refused by policy
    Denied,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Success => write!(f, "success"),
            AuditOutcome::Failure => write!(f, "failure"),
            AuditOutcome::InProgress => write!(f, "in_progress"),
            AuditOutcome::Denied => write!(f, "denied"),
        }
    }
}

/// A single audit event.
///
/// Built with [`AuditRecord::new`] and the `with_*` methods, then handed to
/// [`audit_log!`](crate::audit_log).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub category: AuditCategory,
    /// Component that produced the event (e.g. `PolicyEngine`).
    pub source: String,
    pub action: String,
    pub outcome: AuditOutcome,
    /// Affected object, such as a switch name or a host address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditRecord {
    /// Creates a record stamped with the current time. The outcome starts as
    /// `InProgress`.
    pub fn new(
        category: AuditCategory,
        source: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            category,
            source: source.into(),
            action: action.into(),
            outcome: AuditOutcome::InProgress,
            object_id: None,
            object_type: None,
            details: None,
            error: None,
        }
    }

    pub fn with_outcome(mut self, outcome: AuditOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_object_id(mut self, id: impl Into<String>) -> Self {
        self.object_id = Some(id.into());
        self
    }

    pub fn with_object_type(mut self, obj_type: impl Into<String>) -> Self {
        self.object_type = Some(obj_type.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Records an error message and marks the outcome as `Failure`.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self.outcome = AuditOutcome::Failure;
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization_failed","message":"{}"}}"#, e))
    }
}

/// Emits an [`AuditRecord`] on the `audit` target.
///
/// Success is logged at info, in-progress at debug, failure and denied at
/// warn.
///
/// ```ignore
/// audit_log!(AuditRecord::new(AuditCategory::SecurityPolicy, "PolicyEngine", "deny")
///     .with_outcome(AuditOutcome::Denied)
///     .with_object_id("core_s1"));
/// ```
#[macro_export]
macro_rules! audit_log {
    ($record:expr) => {
        let record = $record;
        match record.outcome {
            $crate::audit::AuditOutcome::Success => {
                tracing::info!(
                    target: "audit",
                    category = %record.category,
                    source = %record.source,
                    action = %record.action,
                    outcome = %record.outcome,
                    audit_json = %record.to_json(),
                    "AUDIT: {} - {} - {}",
                    record.category,
                    record.action,
                    record.outcome
                );
            }
            $crate::audit::AuditOutcome::InProgress => {
                tracing::debug!(
                    target: "audit",
                    category = %record.category,
                    source = %record.source,
                    action = %record.action,
                    outcome = %record.outcome,
                    audit_json = %record.to_json(),
                    "AUDIT: {} - {} - {}",
                    record.category,
                    record.action,
                    record.outcome
                );
            }
            $crate::audit::AuditOutcome::Failure | $crate::audit::AuditOutcome::Denied => {
                tracing::warn!(
                    target: "audit",
                    category = %record.category,
                    source = %record.source,
                    action = %record.action,
                    outcome = %record.outcome,
                    error = record.error.as_deref().unwrap_or(""),
                    audit_json = %record.to_json(),
                    "AUDIT: {} - {} - {}",
                    record.category,
                    record.action,
                    record.outcome
                );
            }
        }
    };
}

/// Installs a JSON tracing subscriber. `RUST_LOG` overrides `log_level`.
///
/// Logs go to stderr; stdout carries the flow-mod stream.
pub fn init_logging(log_level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .json(),
        )
        .init();
}

/// Installs a human-readable tracing subscriber for interactive use.
pub fn init_logging_pretty(log_level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .pretty(),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_policy_deny_record() {
        let record = AuditRecord::new(AuditCategory::SecurityPolicy, "PolicyEngine", "deny")
            .with_outcome(AuditOutcome::Denied)
            .with_object_id("core_s1")
            .with_object_type("switch");

        assert_eq!(record.category, AuditCategory::SecurityPolicy);
        assert_eq!(record.source, "PolicyEngine");
        assert_eq!(record.outcome, AuditOutcome::Denied);
        assert_eq!(record.object_id.as_deref(), Some("core_s1"));
        assert_eq!(record.object_type.as_deref(), Some("switch"));
    }

    #[test]
    fn test_with_error_marks_failure() {
        let record = AuditRecord::new(AuditCategory::ErrorCondition, "Controller", "parse_packet")
            .with_error("truncated ipv4 header: need 20 bytes, have 16");

        assert_eq!(record.outcome, AuditOutcome::Failure);
        assert_eq!(
            record.error.as_deref(),
            Some("truncated ipv4 header: need 20 bytes, have 16")
        );
    }

    #[test]
    fn test_json_rendering() {
        let record = AuditRecord::new(
            AuditCategory::ConfigurationChange,
            "TopologyMap",
            "load_topology",
        )
        .with_outcome(AuditOutcome::Success)
        .with_details(serde_json::json!({ "switches": 6, "hosts": 9 }));

        let json: serde_json::Value = serde_json::from_str(&record.to_json()).unwrap();
        assert_eq!(json["category"], "CONFIGURATION_CHANGE");
        assert_eq!(json["outcome"], "success");
        assert_eq!(json["details"]["switches"], 6);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(AuditCategory::FlowInstall.to_string(), "FLOW_INSTALL");
        assert_eq!(AuditCategory::SystemLifecycle.to_string(), "SYSTEM_LIFECYCLE");
        assert_eq!(AuditOutcome::InProgress.to_string(), "in_progress");
        assert_eq!(AuditOutcome::Denied.to_string(), "denied");
    }
}
