//! Security events: the write-once records both engines produce on deny.
//!
//! Events are handed to a [`SecurityEventSink`] *after* the decision that
//! produced them has been made. [`emit`] is the only way the gate writes
//! to a sink, and it swallows sink failures into the `forgegate::sink`
//! tracing target so they can never change an outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::SinkError;

/// Attack signature family matched by the WAF stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttackCategory {
    SqlInjection,
    Xss,
    PathTraversal,
    PromptInjection,
}

impl AttackCategory {
    /// Evaluation order used by the WAF stage.
    pub const ALL: [AttackCategory; 4] = [
        AttackCategory::SqlInjection,
        AttackCategory::Xss,
        AttackCategory::PathTraversal,
        AttackCategory::PromptInjection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttackCategory::SqlInjection => "sqlInjection",
            AttackCategory::Xss => "xss",
            AttackCategory::PathTraversal => "pathTraversal",
            AttackCategory::PromptInjection => "promptInjection",
        }
    }
}

impl fmt::Display for AttackCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened, with the category-specific detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecurityEventKind {
    /// A decoy endpoint was requested.
    HoneypotAccess,
    /// The WAF matched an attack signature.
    WafBlocked {
        category: AttackCategory,
        pattern: String,
    },
    /// A body parsed but did not satisfy its route schema.
    SchemaValidationFailed { errors: Vec<String> },
    /// A body for a schema-guarded route could not be read or parsed.
    RequestParsingFailed { error: String },
    /// The action authorizer denied a privileged action.
    PolicyDenied {
        violated_law: u32,
        action: String,
        reason: String,
    },
}

impl SecurityEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            SecurityEventKind::HoneypotAccess => "honeypot_access",
            SecurityEventKind::WafBlocked { .. } => "waf_blocked",
            SecurityEventKind::SchemaValidationFailed { .. } => "schema_validation_failed",
            SecurityEventKind::RequestParsingFailed { .. } => "request_parsing_failed",
            SecurityEventKind::PolicyDenied { .. } => "policy_denied",
        }
    }
}

/// A flat, append-only security record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityEvent {
    #[serde(flatten)]
    pub kind: SecurityEventKind,
    pub path: String,
    pub ip: String,
    #[serde(
        rename = "userAgent",
        alias = "user_agent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl SecurityEvent {
    pub fn new(
        kind: SecurityEventKind,
        path: impl Into<String>,
        ip: impl Into<String>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            ip: ip.into(),
            user_agent,
            timestamp: Utc::now(),
        }
    }
}

/// Where security events are written (the audit trail).
pub trait SecurityEventSink: Send + Sync {
    fn record(&self, event: &SecurityEvent) -> Result<(), SinkError>;
}

impl<T: SecurityEventSink + ?Sized> SecurityEventSink for Arc<T> {
    fn record(&self, event: &SecurityEvent) -> Result<(), SinkError> {
        (**self).record(event)
    }
}

impl<T: SecurityEventSink + ?Sized> SecurityEventSink for Box<T> {
    fn record(&self, event: &SecurityEvent) -> Result<(), SinkError> {
        (**self).record(event)
    }
}

/// Hand an event to a sink, reporting (never propagating) failure.
pub fn emit(sink: &dyn SecurityEventSink, event: &SecurityEvent) {
    if let Err(e) = sink.record(event) {
        tracing::error!(
            target: "forgegate::sink",
            error = %e,
            event_type = event.kind.name(),
            path = %event.path,
            "Failed to record security event"
        );
    }
}
