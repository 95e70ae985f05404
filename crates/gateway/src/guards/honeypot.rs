//! Decoy endpoints. Any hit is logged and answered like a missing route.

use forgegate_core::SecurityEventKind;

use super::{Guard, GuardContext, GuardOutcome, Rejection};
use crate::request::GuardRequest;

/// Paths nothing legitimate ever requests.
pub const DEFAULT_HONEYPOT_PATHS: &[&str] = &[
    "/.env",
    "/.env.local",
    "/.env.production",
    "/api/admin/users",
    "/api/debug/dump",
    "/api/internal/status",
    "/admin",
    "/wp-admin",
    "/phpmyadmin",
    "/.git",
    "/config.php",
    "/backup.sql",
];

pub struct HoneypotGuard {
    paths: Vec<String>,
}

impl HoneypotGuard {
    /// The built-in decoys plus `extra`.
    pub fn new(extra: &[String]) -> Self {
        let mut paths: Vec<String> = DEFAULT_HONEYPOT_PATHS.iter().map(|p| p.to_string()).collect();
        for path in extra {
            if !paths.contains(path) {
                paths.push(path.clone());
            }
        }
        Self { paths }
    }

    /// Exact match or prefix match, so `/.git/config` and `/admin/login`
    /// are decoys too.
    pub fn is_decoy(&self, path: &str) -> bool {
        self.paths.iter().any(|decoy| path.starts_with(decoy.as_str()))
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}

impl Guard for HoneypotGuard {
    fn name(&self) -> &'static str {
        "honeypot"
    }

    fn check(&self, request: &GuardRequest, _ctx: &mut GuardContext) -> GuardOutcome {
        if self.is_decoy(request.path()) {
            return GuardOutcome::Reject(Rejection::not_found(Some(
                SecurityEventKind::HoneypotAccess,
            )));
        }
        GuardOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guards::test_support::{get, rejection, run};
    use axum::http::StatusCode;

    #[test]
    fn decoy_paths_return_not_found() {
        let guard = HoneypotGuard::new(&[]);
        for path in ["/.env", "/wp-admin", "/.git/config", "/admin/login", "/backup.sql"] {
            let (outcome, _) = run(&guard, &get(path));
            let rejection = rejection(outcome);
            assert_eq!(rejection.status, StatusCode::NOT_FOUND, "{path}");
            assert_eq!(rejection.body.error, "NOT_FOUND");
            assert_eq!(rejection.event, Some(SecurityEventKind::HoneypotAccess));
        }
    }

    #[test]
    fn ordinary_paths_continue() {
        let guard = HoneypotGuard::new(&[]);
        for path in ["/", "/pricing", "/api/run", "/docs/admin"] {
            let (outcome, _) = run(&guard, &get(path));
            assert!(matches!(outcome, GuardOutcome::Continue), "{path}");
        }
    }

    #[test]
    fn extra_paths_are_added_once() {
        let guard = HoneypotGuard::new(&["/server-status".into(), "/.env".into()]);
        assert_eq!(guard.paths().len(), DEFAULT_HONEYPOT_PATHS.len() + 1);
        assert!(guard.is_decoy("/server-status"));
    }
}
