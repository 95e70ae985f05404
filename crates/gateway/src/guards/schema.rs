//! Payload stage: body readability and per-route schema validation.

use serde_json::Value;

use super::{Guard, GuardContext, GuardOutcome, Rejection};
use crate::request::GuardRequest;
use crate::schema::SchemaRegistry;

pub struct SchemaGuard {
    registry: SchemaRegistry,
}

impl SchemaGuard {
    pub fn new(registry: SchemaRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }
}

impl Guard for SchemaGuard {
    fn name(&self) -> &'static str {
        "schema"
    }

    fn check(&self, request: &GuardRequest, _ctx: &mut GuardContext) -> GuardOutcome {
        // A body that could not be buffered cannot be forwarded either.
        if let Some(error) = request.body_error() {
            return GuardOutcome::Reject(Rejection::malformed("Invalid request format", error));
        }

        // Unregistered routes pass unvalidated.
        let Some(schema) = self.registry.get(request.path()) else {
            return GuardOutcome::Continue;
        };

        if request.body().iter().all(u8::is_ascii_whitespace) {
            return GuardOutcome::Reject(Rejection::malformed(
                "Request body required",
                "empty request body",
            ));
        }

        let body: Value = match serde_json::from_slice(request.body()) {
            Ok(body) => body,
            Err(e) => {
                return GuardOutcome::Reject(Rejection::malformed(
                    "Invalid request format",
                    e.to_string(),
                ));
            }
        };

        match schema.validate(&body) {
            Ok(()) => GuardOutcome::Continue,
            Err(errors) => GuardOutcome::Reject(Rejection::validation(errors)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guards::test_support::{get, post, rejection, run};
    use axum::http::StatusCode;
    use forgegate_core::SecurityEventKind;

    fn guard() -> SchemaGuard {
        SchemaGuard::new(SchemaRegistry::builtin().unwrap())
    }

    #[test]
    fn missing_required_field_lists_details() {
        let (outcome, _) = run(&guard(), &post("/api/export", r#"{"format":"pdf"}"#));
        let rejection = rejection(outcome);
        assert_eq!(rejection.status, StatusCode::BAD_REQUEST);
        assert_eq!(rejection.body.error, "VALIDATION_ERROR");
        let details = rejection.body.details.unwrap();
        assert!(details.iter().any(|d| d.starts_with("run_id")));
        assert!(matches!(
            rejection.event,
            Some(SecurityEventKind::SchemaValidationFailed { .. })
        ));
    }

    #[test]
    fn valid_body_passes_without_side_effects() {
        let (outcome, ctx) = run(
            &guard(),
            &post("/api/gpt-test", r#"{"prompt":"summarize this","temperature":0.7}"#),
        );
        assert!(matches!(outcome, GuardOutcome::Continue));
        assert!(ctx.response_headers.is_empty());
        assert!(ctx.nonce.is_none());
    }

    #[test]
    fn unparseable_body_is_bad_request() {
        let (outcome, _) = run(&guard(), &post("/api/run", "{not json"));
        let rejection = rejection(outcome);
        assert_eq!(rejection.body.error, "BAD_REQUEST");
        assert_eq!(rejection.body.message, "Invalid request format");
        assert!(matches!(
            rejection.event,
            Some(SecurityEventKind::RequestParsingFailed { .. })
        ));
    }

    #[test]
    fn empty_body_is_bad_request() {
        let (outcome, _) = run(&guard(), &post("/v1/authorize", "  "));
        let rejection = rejection(outcome);
        assert_eq!(rejection.body.error, "BAD_REQUEST");
        assert_eq!(rejection.body.message, "Request body required");
    }

    #[test]
    fn unregistered_route_passes() {
        let (outcome, _) = run(&guard(), &post("/api/feedback", "{not json"));
        assert!(matches!(outcome, GuardOutcome::Continue));
        let (outcome, _) = run(&guard(), &get("/pricing"));
        assert!(matches!(outcome, GuardOutcome::Continue));
    }

    #[test]
    fn unreadable_body_rejected_on_any_route() {
        let request = get("/pricing").with_body_error("length limit exceeded");
        let (outcome, _) = run(&guard(), &request);
        let rejection = rejection(outcome);
        assert_eq!(rejection.status, StatusCode::BAD_REQUEST);
        assert!(matches!(
            rejection.event,
            Some(SecurityEventKind::RequestParsingFailed { .. })
        ));
    }
}
