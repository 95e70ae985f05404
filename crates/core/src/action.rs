//! Privileged actions submitted to the authorizer.
//!
//! [`Action`] is a closed set: adding a variant forces every decision
//! site to handle it. Input arriving from outside the type system goes
//! through [`ActionRequest`] first, and that conversion is the only place
//! an unknown kind can appear.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A privileged filesystem or licensing operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Read { target: PathBuf },
    Write { target: PathBuf },
    Delete { target: PathBuf },
    Generate { target_dir: PathBuf },
    /// `None` means "the configured migrations directory".
    Migrate { target_dir: Option<PathBuf> },
    Export { target_dir: PathBuf },
    LicenseCheck,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Read { .. } => ActionKind::Read,
            Action::Write { .. } => ActionKind::Write,
            Action::Delete { .. } => ActionKind::Delete,
            Action::Generate { .. } => ActionKind::Generate,
            Action::Migrate { .. } => ActionKind::Migrate,
            Action::Export { .. } => ActionKind::Export,
            Action::LicenseCheck => ActionKind::LicenseCheck,
        }
    }

    /// The path the action operates on, if it names one.
    pub fn target(&self) -> Option<&PathBuf> {
        match self {
            Action::Read { target } | Action::Write { target } | Action::Delete { target } => {
                Some(target)
            }
            Action::Generate { target_dir } | Action::Export { target_dir } => Some(target_dir),
            Action::Migrate { target_dir } => target_dir.as_ref(),
            Action::LicenseCheck => None,
        }
    }
}

/// The name of an action variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Read,
    Write,
    Delete,
    Generate,
    Migrate,
    Export,
    LicenseCheck,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Read => "read",
            ActionKind::Write => "write",
            ActionKind::Delete => "delete",
            ActionKind::Generate => "generate",
            ActionKind::Migrate => "migrate",
            ActionKind::Export => "export",
            ActionKind::LicenseCheck => "license_check",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ActionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "read" => Ok(ActionKind::Read),
            "write" => Ok(ActionKind::Write),
            "delete" => Ok(ActionKind::Delete),
            "generate" => Ok(ActionKind::Generate),
            "migrate" => Ok(ActionKind::Migrate),
            "export" => Ok(ActionKind::Export),
            "license_check" | "licensecheck" => Ok(ActionKind::LicenseCheck),
            _ => Err(ActionParseError::UnknownKind(s.to_string())),
        }
    }
}

/// An action as it arrives from an untyped boundary (CLI, HTTP).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl ActionRequest {
    pub fn new(kind: impl Into<String>, target: Option<String>) -> Self {
        Self {
            kind: kind.into(),
            target,
        }
    }
}

/// Why an [`ActionRequest`] could not become an [`Action`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionParseError {
    #[error("unsupported action kind '{0}'")]
    UnknownKind(String),

    #[error("action '{0}' requires a target path")]
    MissingTarget(ActionKind),
}

impl TryFrom<&ActionRequest> for Action {
    type Error = ActionParseError;

    fn try_from(req: &ActionRequest) -> Result<Self, Self::Error> {
        let kind: ActionKind = req.kind.parse()?;
        let target = req
            .target
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(PathBuf::from);
        let required = || target.clone().ok_or(ActionParseError::MissingTarget(kind));

        Ok(match kind {
            ActionKind::Read => Action::Read { target: required()? },
            ActionKind::Write => Action::Write { target: required()? },
            ActionKind::Delete => Action::Delete { target: required()? },
            ActionKind::Generate => Action::Generate {
                target_dir: required()?,
            },
            ActionKind::Migrate => Action::Migrate {
                target_dir: target.clone(),
            },
            ActionKind::Export => Action::Export {
                target_dir: required()?,
            },
            ActionKind::LicenseCheck => Action::LicenseCheck,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_converts_to_action() {
        let req = ActionRequest::new("write", Some("/srv/docs/a.md".into()));
        let action = Action::try_from(&req).unwrap();
        assert_eq!(
            action,
            Action::Write {
                target: PathBuf::from("/srv/docs/a.md")
            }
        );
        assert_eq!(action.kind(), ActionKind::Write);
    }

    #[test]
    fn unknown_kind_rejected() {
        let req = ActionRequest::new("chmod", Some("/srv/docs".into()));
        assert_eq!(
            Action::try_from(&req),
            Err(ActionParseError::UnknownKind("chmod".into()))
        );
    }

    #[test]
    fn missing_target_rejected() {
        let req = ActionRequest::new("export", None);
        assert_eq!(
            Action::try_from(&req),
            Err(ActionParseError::MissingTarget(ActionKind::Export))
        );

        let blank = ActionRequest::new("read", Some("   ".into()));
        assert!(Action::try_from(&blank).is_err());
    }

    #[test]
    fn migrate_target_is_optional() {
        let req = ActionRequest::new("migrate", None);
        assert_eq!(
            Action::try_from(&req).unwrap(),
            Action::Migrate { target_dir: None }
        );
    }

    #[test]
    fn kind_names_are_lenient() {
        assert_eq!("License-Check".parse::<ActionKind>().unwrap(), ActionKind::LicenseCheck);
        assert_eq!(" READ ".parse::<ActionKind>().unwrap(), ActionKind::Read);
    }

    #[test]
    fn action_serializes_with_kind_tag() {
        let json = serde_json::to_value(Action::Export {
            target_dir: PathBuf::from("/srv/bundles"),
        })
        .unwrap();
        assert_eq!(json["kind"], "export");
        assert_eq!(json["target_dir"], "/srv/bundles");
    }
}
