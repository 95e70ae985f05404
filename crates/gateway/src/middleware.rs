//! Axum middleware running every request through the [`SecurityGate`].

use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::chain::SecurityGate;
use crate::guards::NONCE_HEADER;
use crate::request::GuardRequest;

/// Buffer the body, run the chain, then forward or reject. Security
/// headers are added to every response either way.
///
/// Events are handed to the gate's sink inline; `start` wraps the file
/// trail in a [`BackgroundSink`](crate::BackgroundSink) so that hand-off
/// is a queue push, not a disk write.
pub async fn security_gate(
    State(gate): State<Arc<SecurityGate>>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let (bytes, guard_request) = match to_bytes(body, gate.max_body_bytes()).await {
        Ok(bytes) => {
            let guard_request = GuardRequest::new(
                parts.method.clone(),
                &parts.uri,
                parts.headers.clone(),
                bytes.clone(),
            );
            (bytes, guard_request)
        }
        Err(e) => {
            let guard_request = GuardRequest::new(
                parts.method.clone(),
                &parts.uri,
                parts.headers.clone(),
                Default::default(),
            )
            .with_body_error(e.to_string());
            (Default::default(), guard_request)
        }
    };

    let outcome = gate.admit(&guard_request);

    let mut response = match outcome.rejection {
        Some(rejection) => rejection.into_response(),
        None => {
            if let Some(nonce) = outcome.context.nonce {
                if let Ok(value) = HeaderValue::from_str(nonce.as_str()) {
                    parts.headers.insert(NONCE_HEADER, value);
                }
                parts.extensions.insert(nonce);
            }
            next.run(Request::from_parts(parts, Body::from(bytes))).await
        }
    };

    response.headers_mut().extend(outcome.context.response_headers);
    response
}
