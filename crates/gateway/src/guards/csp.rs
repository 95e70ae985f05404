//! Security headers and the per-request CSP nonce.

use axum::http::{HeaderName, HeaderValue, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use forgegate_config::CspConfig;
use rand::RngCore;

use super::{Guard, GuardContext, GuardOutcome};
use crate::request::GuardRequest;

/// Request header carrying the nonce to handlers.
pub const NONCE_HEADER: &str = "x-nonce";

/// A fresh CSP nonce, available to handlers as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CspNonce(String);

impl CspNonce {
    /// 16 bytes from the thread-local CSPRNG, base64 encoded.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        Self(STANDARD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CspNonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sets the Content-Security-Policy and hardening headers. Never terminal.
pub struct CspGuard {
    /// Policy text before and after the nonce source.
    policy_head: String,
    policy_tail: String,
    hardening: Vec<(HeaderName, HeaderValue)>,
}

impl CspGuard {
    pub fn new(config: &CspConfig) -> Self {
        let script_origins = join_origins(&config.script_origins);
        let connect_origins = join_origins(&config.connect_origins);

        let policy_head =
            "default-src 'self'; script-src 'self' 'strict-dynamic' 'nonce-".to_string();
        let policy_tail = format!(
            "'{script_origins}; connect-src 'self'{connect_origins}; img-src 'self' data: blob:; \
             style-src 'self' 'unsafe-inline'; font-src 'self'; frame-ancestors 'none'; \
             base-uri 'self'; form-action 'self'; object-src 'none'"
        );

        let hardening = vec![
            (header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
            (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
            (
                header::REFERRER_POLICY,
                HeaderValue::from_static("strict-origin-when-cross-origin"),
            ),
            (
                HeaderName::from_static("permissions-policy"),
                HeaderValue::from_static("camera=(), microphone=(), geolocation=(), payment=()"),
            ),
            (header::X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block")),
            (
                header::STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static("max-age=31536000; includeSubDomains"),
            ),
        ];

        Self {
            policy_head,
            policy_tail,
            hardening,
        }
    }

    /// The full policy for a given nonce.
    pub fn policy(&self, nonce: &CspNonce) -> String {
        format!("{}{}{}", self.policy_head, nonce, self.policy_tail)
    }
}

fn join_origins(origins: &[String]) -> String {
    origins.iter().map(|o| format!(" {o}")).collect()
}

impl Guard for CspGuard {
    fn name(&self) -> &'static str {
        "csp"
    }

    fn check(&self, _request: &GuardRequest, ctx: &mut GuardContext) -> GuardOutcome {
        let nonce = CspNonce::generate();

        match HeaderValue::from_str(&self.policy(&nonce)) {
            Ok(value) => {
                ctx.response_headers
                    .insert(header::CONTENT_SECURITY_POLICY, value);
            }
            Err(e) => {
                // Origins are validated at load; fall back to the strictest policy.
                tracing::error!(error = %e, "CSP header rejected, sending lockdown policy");
                ctx.response_headers.insert(
                    header::CONTENT_SECURITY_POLICY,
                    HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
                );
            }
        }

        for (name, value) in &self.hardening {
            ctx.response_headers.insert(name.clone(), value.clone());
        }

        ctx.nonce = Some(nonce);
        GuardOutcome::Continue
    }
}
