//! Laws: numbered, human-readable invariants cited by every denial.

use serde::{Deserialize, Serialize};

/// A single law from the source-of-truth configuration.
///
/// The `id` is stable for the life of the process and doubles as the
/// error code carried by [`crate::Verdict::Denied`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Law {
    pub id: u32,
    pub text: String,
}

impl Law {
    pub fn new(id: u32, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }
}

/// The decision classes the authorizer can cite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LawClass {
    /// A target escapes its permitted directory.
    Boundary,
    /// A target is on the explicit write deny-list.
    Forbidden,
    /// A migration targets anything but the configured migrations directory.
    Migrate,
    /// An export targets anything but the configured bundles directory.
    Export,
    /// The entitlements artifact is missing.
    License,
    /// The action kind is not one the gate knows.
    Unsupported,
}

impl LawClass {
    pub const ALL: [LawClass; 6] = [
        LawClass::Boundary,
        LawClass::Forbidden,
        LawClass::Migrate,
        LawClass::Export,
        LawClass::License,
        LawClass::Unsupported,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LawClass::Boundary => "boundary",
            LawClass::Forbidden => "forbidden",
            LawClass::Migrate => "migrate",
            LawClass::Export => "export",
            LawClass::License => "license",
            LawClass::Unsupported => "unsupported",
        }
    }
}

/// Which law id each decision class cites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LawRefs {
    #[serde(default = "default_boundary")]
    pub boundary: u32,
    #[serde(default = "default_forbidden")]
    pub forbidden: u32,
    #[serde(default = "default_migrate")]
    pub migrate: u32,
    #[serde(default = "default_export")]
    pub export: u32,
    #[serde(default = "default_license")]
    pub license: u32,
    #[serde(default = "default_unsupported")]
    pub unsupported: u32,
}

fn default_boundary() -> u32 {
    1
}
fn default_forbidden() -> u32 {
    2
}
fn default_migrate() -> u32 {
    3
}
fn default_export() -> u32 {
    4
}
fn default_license() -> u32 {
    5
}
fn default_unsupported() -> u32 {
    6
}

impl Default for LawRefs {
    fn default() -> Self {
        Self {
            boundary: default_boundary(),
            forbidden: default_forbidden(),
            migrate: default_migrate(),
            export: default_export(),
            license: default_license(),
            unsupported: default_unsupported(),
        }
    }
}

impl LawRefs {
    /// The law id cited for a decision class.
    pub fn id_for(&self, class: LawClass) -> u32 {
        match class {
            LawClass::Boundary => self.boundary,
            LawClass::Forbidden => self.forbidden,
            LawClass::Migrate => self.migrate,
            LawClass::Export => self.export,
            LawClass::License => self.license,
            LawClass::Unsupported => self.unsupported,
        }
    }
}

/// The law set used when the SSOT file declares none.
pub fn default_laws() -> Vec<Law> {
    vec![
        Law::new(1, "Privileged actions never touch a path outside their permitted root"),
        Law::new(2, "A path on the write deny-list is never written, whatever the allow-list says"),
        Law::new(3, "Migrations are written only to the configured migrations directory"),
        Law::new(4, "Exports are written only to the configured bundles directory"),
        Law::new(5, "Licensed operations require the entitlements artifact on disk"),
        Law::new(6, "Actions the gate does not recognise are denied"),
    ]
}
