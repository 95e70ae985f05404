//! The ordered guard chain and the gate that owns it.
//!
//! Order is fixed: CSP/headers, honeypot, WAF, schema. Headers come first
//! so rejections carry them too; the honeypot answers decoys before any
//! signature work; the WAF runs before the costlier structural pass.

use forgegate_config::AppConfig;
use forgegate_core::{SecurityEvent, SecurityEventSink, emit};
use forgegate_security::PatternLibrary;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::guards::{
    CspGuard, Guard, GuardContext, GuardOutcome, HoneypotGuard, Rejection, SchemaGuard, WafGuard,
};
use crate::request::GuardRequest;
use crate::schema::SchemaRegistry;

/// What the chain decided, plus everything guards attached on the way.
#[derive(Debug)]
pub struct ChainOutcome {
    pub context: GuardContext,
    /// `None` means admitted.
    pub rejection: Option<Rejection>,
}

impl ChainOutcome {
    pub fn is_admitted(&self) -> bool {
        self.rejection.is_none()
    }
}

/// Guards run in registration order; the first rejection ends the chain.
#[derive(Default)]
pub struct GuardChain {
    guards: Vec<Arc<dyn Guard>>,
}

impl GuardChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard four-stage chain.
    pub fn standard(
        config: &AppConfig,
        patterns: Arc<PatternLibrary>,
        schemas: SchemaRegistry,
    ) -> Self {
        Self::new()
            .with(Arc::new(CspGuard::new(&config.csp)))
            .with(Arc::new(HoneypotGuard::new(&config.honeypot.extra_paths)))
            .with(Arc::new(WafGuard::new(patterns)))
            .with(Arc::new(SchemaGuard::new(schemas)))
    }

    pub fn with(mut self, guard: Arc<dyn Guard>) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.guards.iter().map(|g| g.name()).collect()
    }

    /// Run the chain. Pure: nothing is logged to a sink here.
    pub fn evaluate(&self, request: &GuardRequest) -> ChainOutcome {
        let mut context = GuardContext::default();

        for guard in &self.guards {
            match guard.check(request, &mut context) {
                GuardOutcome::Continue => {}
                GuardOutcome::Reject(rejection) => {
                    warn!(
                        guard = guard.name(),
                        path = %request.path(),
                        status = rejection.status.as_u16(),
                        error = rejection.body.error,
                        "Request rejected"
                    );
                    return ChainOutcome {
                        context,
                        rejection: Some(rejection),
                    };
                }
            }
        }

        debug!(path = %request.path(), "Request admitted");
        ChainOutcome {
            context,
            rejection: None,
        }
    }
}

/// The request-side gate: the guard chain plus its audit sink.
pub struct SecurityGate {
    chain: GuardChain,
    sink: Arc<dyn SecurityEventSink>,
    max_body_bytes: usize,
}

impl SecurityGate {
    pub fn new(chain: GuardChain, sink: Arc<dyn SecurityEventSink>, max_body_bytes: usize) -> Self {
        Self {
            chain,
            sink,
            max_body_bytes,
        }
    }

    /// Standard chain with the built-in signatures and route schemas.
    pub fn from_config(
        config: &AppConfig,
        sink: Arc<dyn SecurityEventSink>,
    ) -> Result<Self, GatewayError> {
        let patterns = Arc::new(PatternLibrary::builtin()?);
        let schemas = SchemaRegistry::builtin()?;
        let chain = GuardChain::standard(config, patterns, schemas);
        tracing::info!(guards = ?chain.names(), "Security gate assembled");
        Ok(Self::new(chain, sink, config.gateway.max_body_bytes))
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    pub fn chain(&self) -> &GuardChain {
        &self.chain
    }

    /// Decide, then audit. The sink is touched only after the outcome is
    /// fixed, and its failure cannot change it.
    pub fn admit(&self, request: &GuardRequest) -> ChainOutcome {
        let outcome = self.chain.evaluate(request);

        if let Some(rejection) = &outcome.rejection
            && let Some(kind) = &rejection.event
        {
            let event = SecurityEvent::new(
                kind.clone(),
                request.path(),
                request.client_ip(),
                request.user_agent().map(str::to_string),
            );
            emit(self.sink.as_ref(), &event);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guards::test_support::{get, post};
    use axum::http::{StatusCode, header};
    use forgegate_core::{AttackCategory, SecurityEventKind, SinkError};
    use forgegate_security::MemorySink;

    fn gate_with(sink: Arc<dyn SecurityEventSink>) -> SecurityGate {
        SecurityGate::from_config(&AppConfig::default(), sink).unwrap()
    }

    struct Offline;

    impl SecurityEventSink for Offline {
        fn record(&self, _event: &SecurityEvent) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("offline".into()))
        }
    }

    #[test]
    fn standard_chain_order() {
        let gate = gate_with(Arc::new(MemorySink::default()));
        assert_eq!(gate.chain().names(), vec!["csp", "honeypot", "waf", "schema"]);
    }

    #[test]
    fn rejections_still_carry_headers() {
        let gate = gate_with(Arc::new(MemorySink::default()));
        let outcome = gate.admit(&get("/.env"));
        assert_eq!(outcome.rejection.unwrap().status, StatusCode::NOT_FOUND);
        assert!(outcome
            .context
            .response_headers
            .contains_key(header::CONTENT_SECURITY_POLICY));
    }

    #[test]
    fn honeypot_wins_over_waf() {
        let sink = Arc::new(MemorySink::default());
        let gate = gate_with(sink.clone());
        let outcome = gate.admit(&get("/admin/../../etc/passwd"));
        assert_eq!(outcome.rejection.unwrap().status, StatusCode::NOT_FOUND);
        assert_eq!(sink.events_of("honeypot_access").len(), 1);
        assert!(sink.events_of("waf_blocked").is_empty());
    }

    #[test]
    fn waf_wins_over_schema() {
        let sink = Arc::new(MemorySink::default());
        let gate = gate_with(sink.clone());
        let outcome = gate.admit(&post("/api/gpt-test", "<script>alert(1)</script>"));
        assert_eq!(outcome.rejection.unwrap().status, StatusCode::FORBIDDEN);

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].kind,
            SecurityEventKind::WafBlocked {
                category: AttackCategory::Xss,
                ..
            }
        ));
    }

    #[test]
    fn admitted_request_emits_nothing() {
        let sink = Arc::new(MemorySink::default());
        let gate = gate_with(sink.clone());
        let outcome = gate.admit(&get("/pricing"));
        assert!(outcome.is_admitted());
        assert!(outcome.context.nonce.is_some());
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn sink_failure_does_not_change_outcome() {
        let healthy = gate_with(Arc::new(MemorySink::default()));
        let broken = gate_with(Arc::new(Offline));
        for request in [get("/.env"), get("/files/../../etc/passwd"), get("/pricing")] {
            let a = healthy.admit(&request).rejection.map(|r| r.status);
            let b = broken.admit(&request).rejection.map(|r| r.status);
            assert_eq!(a, b, "{}", request.path());
        }
    }

    #[test]
    fn replayed_request_gets_same_decision_and_new_nonce() {
        let gate = gate_with(Arc::new(MemorySink::default()));
        let requests = [
            get("/pricing"),
            get("/.env"),
            get("/search?q=%27%20OR%201%3D1"),
            post("/api/export", r#"{"format":"docx"}"#),
        ];

        for request in &requests {
            let first = gate.admit(request);
            let second = gate.admit(request);

            let decision = |o: &ChainOutcome| {
                o.rejection
                    .as_ref()
                    .map(|r| (r.status, r.body.clone(), r.event.clone()))
            };
            assert_eq!(decision(&first), decision(&second), "{}", request.path());
            assert_ne!(
                first.context.response_headers[header::CONTENT_SECURITY_POLICY],
                second.context.response_headers[header::CONTENT_SECURITY_POLICY],
                "{}",
                request.path()
            );
        }

        let admitted = gate.admit(&requests[0]).context.nonce.unwrap();
        let again = gate.admit(&requests[0]).context.nonce.unwrap();
        assert_ne!(admitted.as_str(), again.as_str());
    }

    #[test]
    fn event_records_client_and_agent() {
        let sink = Arc::new(MemorySink::default());
        let gate = gate_with(sink.clone());
        let _ = gate.admit(&get("/wp-admin"));
        let event = &sink.events()[0];
        assert_eq!(event.path, "/wp-admin");
        assert_eq!(event.ip, "unknown");
        assert!(event.user_agent.as_deref().unwrap().contains("Firefox"));
    }
}
