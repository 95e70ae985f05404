//! Request guards.
//!
//! A guard inspects a [`GuardRequest`] and either lets it continue or ends
//! it with a [`Rejection`]. Guards are stateless and synchronous: every
//! check is pure computation over buffered bytes. Side effects (the audit
//! event) are described by the rejection and performed by the gate after
//! the decision is final.

mod csp;
mod honeypot;
mod schema;
mod waf;

pub use csp::{CspGuard, CspNonce, NONCE_HEADER};
pub use honeypot::{DEFAULT_HONEYPOT_PATHS, HoneypotGuard};
pub use schema::SchemaGuard;
pub use waf::WafGuard;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use forgegate_core::SecurityEventKind;
use serde::Serialize;

use crate::request::GuardRequest;

/// Per-request state guards may write to.
#[derive(Debug, Default)]
pub struct GuardContext {
    /// Headers added to the final response, rejected or not.
    pub response_headers: HeaderMap,
    pub nonce: Option<CspNonce>,
}

/// Result of a single guard.
#[derive(Debug)]
pub enum GuardOutcome {
    Continue,
    Reject(Rejection),
}

/// Guard trait for request admission.
pub trait Guard: Send + Sync {
    /// Guard name for identification in logs.
    fn name(&self) -> &'static str;

    fn check(&self, request: &GuardRequest, ctx: &mut GuardContext) -> GuardOutcome;
}

/// JSON body of every rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

/// A terminal response plus the event to audit for it.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub status: StatusCode,
    pub body: ErrorBody,
    pub event: Option<SecurityEventKind>,
}

impl Rejection {
    /// Honeypot hit: indistinguishable from a missing route.
    pub fn not_found(event: Option<SecurityEventKind>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: ErrorBody {
                error: "NOT_FOUND",
                message: "Endpoint not found",
                details: None,
            },
            event,
        }
    }

    pub fn forbidden(event: SecurityEventKind) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            body: ErrorBody {
                error: "FORBIDDEN",
                message: "Request blocked by security policy",
                details: None,
            },
            event: Some(event),
        }
    }

    pub fn validation(errors: Vec<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: "VALIDATION_ERROR",
                message: "Request validation failed",
                details: Some(errors.clone()),
            },
            event: Some(SecurityEventKind::SchemaValidationFailed { errors }),
        }
    }

    /// Unreadable, oversized, empty, or non-JSON payload.
    pub fn malformed(message: &'static str, error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: "BAD_REQUEST",
                message,
                details: None,
            },
            event: Some(SecurityEventKind::RequestParsingFailed {
                error: error.into(),
            }),
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{HeaderValue, Method, Uri, header};

    pub fn get(uri: &str) -> GuardRequest {
        request(Method::GET, uri, "")
    }

    pub fn post(uri: &str, body: &str) -> GuardRequest {
        request(Method::POST, uri, body)
    }

    pub fn request(method: Method, uri: &str, body: &str) -> GuardRequest {
        let uri: Uri = uri.parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static("Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0"),
        );
        GuardRequest::new(method, &uri, headers, Bytes::from(body.to_string()))
    }

    pub fn run(guard: &dyn Guard, request: &GuardRequest) -> (GuardOutcome, GuardContext) {
        let mut ctx = GuardContext::default();
        let outcome = guard.check(request, &mut ctx);
        (outcome, ctx)
    }

    pub fn rejection(outcome: GuardOutcome) -> Rejection {
        match outcome {
            GuardOutcome::Reject(r) => r,
            GuardOutcome::Continue => panic!("expected rejection"),
        }
    }
}
