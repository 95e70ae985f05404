//! Action authorizer: the law-driven guard over privileged filesystem actions.
//!
//! [`ActionAuthorizer::guard`] is total: every [`Action`] yields a
//! [`Verdict`], nothing panics, and no I/O happens except the metadata
//! lookups path resolution and the licence check need. Emitting audit
//! events is the caller's job, or use [`ActionAuthorizer::guard_audited`].

use forgegate_core::{
    Action, ActionRequest, LawClass, SecurityEvent, SecurityEventKind, SecurityEventSink, Verdict,
    Violation, emit,
};
use std::path::Path;
use tracing::{debug, warn};

use crate::path::{is_under, is_under_or_equal};
use crate::policy::PolicyStore;

/// Decides whether a privileged action may proceed.
#[derive(Debug, Clone)]
pub struct ActionAuthorizer {
    policy: PolicyStore,
}

impl ActionAuthorizer {
    pub fn new(policy: PolicyStore) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PolicyStore {
        &self.policy
    }

    /// Authorize a typed action.
    pub fn guard(&self, action: &Action) -> Verdict {
        let verdict = match action {
            Action::Read { target } => self.check_read(target),
            Action::Write { target } | Action::Delete { target } => self.check_write(target),
            Action::Generate { target_dir } => self.check_generate(target_dir),
            Action::Migrate { target_dir } => self.check_migrate(target_dir.as_deref()),
            Action::Export { target_dir } => self.check_export(target_dir),
            Action::LicenseCheck => self.check_license(),
        };

        match &verdict {
            Verdict::Allowed => debug!(action = %action.kind(), "Action allowed"),
            Verdict::Denied {
                violated_law,
                reason,
                ..
            } => warn!(
                action = %action.kind(),
                target = ?action.target(),
                law = violated_law,
                reason = %reason,
                "Action denied"
            ),
        }
        verdict
    }

    /// Authorize an action arriving from an untyped boundary.
    ///
    /// Unknown kinds and missing targets are denied under the
    /// `unsupported` law; this is the gate's default-deny branch.
    pub fn guard_request(&self, request: &ActionRequest) -> Verdict {
        match Action::try_from(request) {
            Ok(action) => self.guard(&action),
            Err(e) => {
                warn!(kind = %request.kind, error = %e, "Unsupported action request");
                self.deny(LawClass::Unsupported, Violation::UnknownAction, e.to_string())
            }
        }
    }

    /// Authorize, then record a `policy_denied` event on deny.
    ///
    /// The verdict is fixed before the sink is touched; a sink failure is
    /// reported and otherwise ignored.
    pub fn guard_audited(
        &self,
        action: &Action,
        origin: &str,
        sink: &dyn SecurityEventSink,
    ) -> Verdict {
        let verdict = self.guard(action);
        let path = action
            .target()
            .map(|t| t.display().to_string())
            .unwrap_or_default();
        audit_denial(&verdict, action.kind().as_str(), &path, origin, sink);
        verdict
    }

    /// [`Self::guard_request`] plus deny auditing.
    pub fn guard_request_audited(
        &self,
        request: &ActionRequest,
        origin: &str,
        sink: &dyn SecurityEventSink,
    ) -> Verdict {
        let verdict = self.guard_request(request);
        let path = request.target.clone().unwrap_or_default();
        audit_denial(&verdict, &request.kind, &path, origin, sink);
        verdict
    }

    fn check_read(&self, target: &Path) -> Verdict {
        let target = self.policy.resolve_target(target);
        if is_under(self.policy.root_dir(), &target) {
            Verdict::Allowed
        } else {
            self.deny(
                LawClass::Boundary,
                Violation::BoundaryViolation,
                format!("{} is outside the root directory", target.display()),
            )
        }
    }

    /// Write and Delete. The deny-list is consulted first, so an explicit
    /// entry wins over any allow-list directory containing it.
    fn check_write(&self, target: &Path) -> Verdict {
        let target = self.policy.resolve_target(target);

        if self.policy.write_forbidden().iter().any(|f| *f == target) {
            return self.deny(
                LawClass::Forbidden,
                Violation::ForbiddenTarget,
                format!("{} is write-forbidden", target.display()),
            );
        }

        self.check_writable_location(&target)
    }

    /// Generate targets a directory of new files, so only containment is
    /// checked; the deny-list names files and is not consulted here.
    fn check_generate(&self, target_dir: &Path) -> Verdict {
        let target = self.policy.resolve_target(target_dir);
        self.check_writable_location(&target)
    }

    fn check_writable_location(&self, target: &Path) -> Verdict {
        if !is_under(self.policy.docs_root_dir(), target) {
            return self.deny(
                LawClass::Boundary,
                Violation::BoundaryViolation,
                format!("{} is outside the docs root", target.display()),
            );
        }

        let whitelisted = self
            .policy
            .write_allowed()
            .iter()
            .any(|dir| is_under_or_equal(dir, target));
        if !whitelisted {
            return self.deny(
                LawClass::Boundary,
                Violation::BoundaryViolation,
                format!("{} is not in a whitelisted directory", target.display()),
            );
        }

        Verdict::Allowed
    }

    fn check_migrate(&self, target_dir: Option<&Path>) -> Verdict {
        let Some(target_dir) = target_dir else {
            return Verdict::Allowed;
        };
        let target = self.policy.resolve_target(target_dir);
        if target == self.policy.migrations_target() {
            Verdict::Allowed
        } else {
            self.deny(
                LawClass::Migrate,
                Violation::BoundaryViolation,
                format!(
                    "migrations must target {}, got {}",
                    self.policy.migrations_target().display(),
                    target.display()
                ),
            )
        }
    }

    fn check_export(&self, target_dir: &Path) -> Verdict {
        let target = self.policy.resolve_target(target_dir);
        if target == self.policy.bundles_target() {
            Verdict::Allowed
        } else {
            self.deny(
                LawClass::Export,
                Violation::BoundaryViolation,
                format!(
                    "exports must target {}, got {}",
                    self.policy.bundles_target().display(),
                    target.display()
                ),
            )
        }
    }

    fn check_license(&self) -> Verdict {
        match self.policy.entitlements_path() {
            Some(path) if path.is_file() => Verdict::Allowed,
            Some(path) => self.deny(
                LawClass::License,
                Violation::MissingEntitlements,
                format!("entitlements artifact {} not found", path.display()),
            ),
            None => self.deny(
                LawClass::License,
                Violation::MissingEntitlements,
                "no entitlements artifact configured",
            ),
        }
    }

    fn deny(&self, class: LawClass, violation: Violation, reason: impl Into<String>) -> Verdict {
        Verdict::deny(self.policy.law_id(class), violation, reason)
    }
}

fn audit_denial(
    verdict: &Verdict,
    action: &str,
    path: &str,
    origin: &str,
    sink: &dyn SecurityEventSink,
) {
    if let Verdict::Denied {
        violated_law,
        reason,
        ..
    } = verdict
    {
        let event = SecurityEvent::new(
            SecurityEventKind::PolicyDenied {
                violated_law: *violated_law,
                action: action.to_string(),
                reason: reason.clone(),
            },
            path,
            origin,
            None,
        );
        emit(sink, &event);
    }
}
