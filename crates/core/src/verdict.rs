//! Authorization verdicts.

use serde::{Deserialize, Serialize};

/// The outcome of authorizing an [`crate::Action`].
///
/// A pure value returned synchronously. Callers must branch on it; there
/// is no error path that could be mistaken for an allow.
#[must_use = "a verdict must be checked before the action runs"]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Verdict {
    Allowed,
    Denied {
        violated_law: u32,
        violation: Violation,
        reason: String,
    },
}

impl Verdict {
    pub fn deny(violated_law: u32, violation: Violation, reason: impl Into<String>) -> Self {
        Verdict::Denied {
            violated_law,
            violation,
            reason: reason.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }

    pub fn is_denied(&self) -> bool {
        !self.is_allowed()
    }

    /// The law id cited by a denial.
    pub fn violated_law(&self) -> Option<u32> {
        match self {
            Verdict::Allowed => None,
            Verdict::Denied { violated_law, .. } => Some(*violated_law),
        }
    }

    pub fn violation(&self) -> Option<Violation> {
        match self {
            Verdict::Allowed => None,
            Verdict::Denied { violation, .. } => Some(*violation),
        }
    }
}

/// Classification of a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Violation {
    /// The target escapes its permitted directory, or is not the exact
    /// directory a migration/export must use.
    BoundaryViolation,
    /// The target is on the write deny-list.
    ForbiddenTarget,
    /// The entitlements artifact is absent.
    MissingEntitlements,
    /// The action kind is not recognised.
    UnknownAction,
}
