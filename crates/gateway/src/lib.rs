//! HTTP security gate for ForgeGate.
//!
//! Every request passes an ordered chain of guards (security headers,
//! honeypot, WAF, schema) before reaching a handler. [`protect`] wraps any
//! axum router with the gate; [`build_router`] adds the gate's own routes:
//! `GET /health` and `POST /v1/authorize`, which runs an action request
//! through the [`ActionAuthorizer`].
//!
//! Built on Axum.

pub mod background;
pub mod chain;
pub mod error;
pub mod guards;
pub mod middleware;
pub mod request;
pub mod schema;

pub use background::BackgroundSink;
pub use chain::{ChainOutcome, GuardChain, SecurityGate};
pub use error::GatewayError;
pub use guards::{CspNonce, Guard, GuardContext, GuardOutcome, Rejection};
pub use request::GuardRequest;
pub use schema::{FieldKind, FieldSpec, RouteSchema, SchemaRegistry};

use axum::{
    Router,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use forgegate_config::{AppConfig, AuditConfig};
use forgegate_core::{ActionRequest, SecurityEventSink, SinkError, Verdict};
use forgegate_security::{ActionAuthorizer, FanoutSink, JsonlAuditSink, PolicyStore, TracingSink};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Shared state for the gate's own routes.
pub struct AppState {
    pub authorizer: ActionAuthorizer,
    pub sink: Arc<dyn SecurityEventSink>,
}

type SharedState = Arc<AppState>;

/// Wrap `router` with the security gate and HTTP trace logging.
///
/// Routes added to `router` after this call are not protected.
pub fn protect(router: Router, gate: Arc<SecurityGate>) -> Router {
    router
        .layer(axum::middleware::from_fn_with_state(gate, middleware::security_gate))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// The gate's own routes. The JSON 404 fallback keeps unknown paths
/// inside the middleware stack.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/authorize", post(authorize_handler))
        .fallback(fallback_handler)
        .with_state(state)
}

/// Audit sinks from config: tracing always, plus the JSONL trail when
/// `audit.log_path` is set.
pub fn build_sink(config: &AuditConfig) -> Result<Arc<dyn SecurityEventSink>, SinkError> {
    let Some(path) = &config.log_path else {
        return Ok(Arc::new(TracingSink));
    };

    let key = config.hmac_secret.as_deref().map(str::as_bytes);
    if key.is_none() {
        tracing::warn!("audit.hmac_secret not set, audit chain uses unkeyed SHA-256");
    }
    let trail = JsonlAuditSink::open(path, key)?;
    let sinks: Vec<Box<dyn SecurityEventSink>> = vec![Box::new(TracingSink), Box::new(trail)];
    Ok(Arc::new(FanoutSink::new(sinks)))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), GatewayError> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let policy = PolicyStore::load(&config.ssot_path)?;
    let (queue, writer) = BackgroundSink::spawn(build_sink(&config.audit)?);
    let sink: Arc<dyn SecurityEventSink> = Arc::new(queue);
    let gate = Arc::new(SecurityGate::from_config(&config, sink.clone())?);
    let state = Arc::new(AppState {
        authorizer: ActionAuthorizer::new(policy),
        sink,
    });

    let app = protect(build_router(state), gate);

    info!(addr = %addr, "Security gate listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    // The router held the last senders; wait for queued events to land.
    if let Err(e) = writer.await {
        tracing::error!(target: "forgegate::sink", error = %e, "Audit writer failed");
    }
    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn authorize_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(action): Json<ActionRequest>,
) -> Json<Verdict> {
    let origin = request::client_ip(&headers);
    let verdict = state
        .authorizer
        .guard_request_audited(&action, &origin, state.sink.as_ref());
    Json(verdict)
}

async fn fallback_handler() -> Response {
    Rejection::not_found(None).into_response()
}
