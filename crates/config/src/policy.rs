//! The source-of-truth (SSOT) policy file.
//!
//! This is the raw, on-disk shape. Paths here may still be relative;
//! `forgegate_security::PolicyStore` resolves and freezes them at boot.

use forgegate_core::law::default_laws;
use forgegate_core::{Law, LawClass, LawRefs};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::ConfigError;

/// Environment variable naming the SSOT file.
pub const SSOT_ENV: &str = "FORGEGATE_SSOT";
/// Environment variable overriding the entitlements artifact path.
pub const ENTITLEMENTS_ENV: &str = "FORGEGATE_ENTITLEMENTS";

/// Raw SSOT as written by an operator (TOML, or JSON by extension).
///
/// `root_dir` is resolved against the file's directory; every other path
/// is resolved against `root_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyFile {
    #[serde(alias = "rootDir")]
    pub root_dir: PathBuf,

    #[serde(alias = "docsRootDir")]
    pub docs_root_dir: PathBuf,

    #[serde(default, alias = "writeAllowed")]
    pub write_allowed: Vec<PathBuf>,

    #[serde(default, alias = "writeForbidden")]
    pub write_forbidden: Vec<PathBuf>,

    #[serde(default, alias = "precedenceOrder")]
    pub precedence_order: Vec<PrecedenceFileEntry>,

    #[serde(alias = "migrationsTarget")]
    pub migrations_target: PathBuf,

    #[serde(alias = "bundlesTarget")]
    pub bundles_target: PathBuf,

    #[serde(default, alias = "entitlementsPath", skip_serializing_if = "Option::is_none")]
    pub entitlements_path: Option<PathBuf>,

    #[serde(default = "default_laws")]
    pub laws: Vec<Law>,

    #[serde(default, alias = "lawRefs")]
    pub law_refs: LawRefs,
}

/// One entry of the document precedence order.
///
/// Either `path` or `paths` (or both) may be given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecedenceFileEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<PathBuf>,
    pub level: u32,
}

impl PrecedenceFileEntry {
    /// All paths of this entry, `path` first.
    pub fn all_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.path.iter().chain(self.paths.iter())
    }
}

impl PolicyFile {
    /// Load and validate the SSOT from disk.
    ///
    /// Unlike the app config, a missing SSOT is an error: the gate has
    /// nothing to enforce without it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let file = if is_json {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        }
        .map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;

        tracing::info!(
            path = %path.display(),
            laws = file.laws.len(),
            write_allowed = file.write_allowed.len(),
            write_forbidden = file.write_forbidden.len(),
            "Loaded SSOT policy file"
        );
        Ok(file)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let file: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            reason: e.to_string(),
        })?;
        file.validate()?;
        Ok(file)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let file: Self = serde_json::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            reason: e.to_string(),
        })?;
        file.validate()?;
        Ok(file)
    }

    /// Structural checks that do not need the filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError("root_dir must not be empty".into()));
        }
        if self.docs_root_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "docs_root_dir must not be empty".into(),
            ));
        }
        if self.migrations_target.as_os_str().is_empty()
            || self.bundles_target.as_os_str().is_empty()
        {
            return Err(ConfigError::ValidationError(
                "migrations_target and bundles_target must not be empty".into(),
            ));
        }

        let mut seen = HashSet::new();
        for law in &self.laws {
            if !seen.insert(law.id) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate law id {}",
                    law.id
                )));
            }
        }

        for class in LawClass::ALL {
            let id = self.law_refs.id_for(class);
            if !seen.contains(&id) {
                return Err(ConfigError::ValidationError(format!(
                    "law_refs.{} points at law {id}, which is not defined",
                    class.as_str()
                )));
            }
        }

        for entry in &self.precedence_order {
            if entry.all_paths().next().is_none() {
                return Err(ConfigError::ValidationError(format!(
                    "precedence entry '{}' has neither path nor paths",
                    entry.id
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
root_dir = "/srv/forge"
docs_root_dir = "docs"
write_allowed = ["docs/migrations", "docs/bundles"]
write_forbidden = ["docs/LAWS.md"]
migrations_target = "docs/migrations"
bundles_target = "docs/bundles"

[[precedence_order]]
id = "laws"
path = "docs/LAWS.md"
level = 0

[[precedence_order]]
id = "guides"
paths = ["docs/guides", "docs/howto"]
level = 2
"#;

    #[test]
    fn minimal_toml_uses_default_laws() {
        let file = PolicyFile::from_toml(MINIMAL).unwrap();
        assert_eq!(file.laws.len(), 6);
        assert_eq!(file.law_refs, LawRefs::default());
        assert_eq!(file.write_allowed.len(), 2);
        assert_eq!(file.precedence_order[1].all_paths().count(), 2);
    }

    #[test]
    fn json_accepts_camel_case_keys() {
        let json = r#"{
            "rootDir": "/srv/forge",
            "docsRootDir": "/srv/forge/docs",
            "writeAllowed": ["/srv/forge/docs/migrations"],
            "writeForbidden": [],
            "migrationsTarget": "/srv/forge/docs/migrations",
            "bundlesTarget": "/srv/forge/docs/bundles",
            "laws": [
                {"id": 1, "text": "a"}, {"id": 2, "text": "b"}, {"id": 3, "text": "c"},
                {"id": 4, "text": "d"}, {"id": 5, "text": "e"}, {"id": 6, "text": "f"}
            ]
        }"#;
        let file = PolicyFile::from_json(json).unwrap();
        assert_eq!(file.root_dir, PathBuf::from("/srv/forge"));
        assert_eq!(file.write_allowed.len(), 1);
    }

    #[test]
    fn duplicate_law_ids_rejected() {
        let toml_str = format!(
            "{MINIMAL}\n{}",
            r#"
[[laws]]
id = 1
text = "one"
[[laws]]
id = 1
text = "again"
"#
        );
        let err = PolicyFile::from_toml(&toml_str).unwrap_err();
        assert!(err.to_string().contains("duplicate law id 1"));
    }

    #[test]
    fn dangling_law_ref_rejected() {
        let toml_str = format!("{MINIMAL}\n[law_refs]\nboundary = 99\n");
        let err = PolicyFile::from_toml(&toml_str).unwrap_err();
        assert!(err.to_string().contains("law_refs.boundary"));
    }

    #[test]
    fn precedence_entry_without_paths_rejected() {
        let toml_str = MINIMAL.replace("path = \"docs/LAWS.md\"\n", "");
        assert!(PolicyFile::from_toml(&toml_str).is_err());
    }

    #[test]
    fn missing_ssot_is_an_error() {
        let result = PolicyFile::load(Path::new("/nonexistent/ssot.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn load_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ssot.toml");
        std::fs::write(&path, MINIMAL).unwrap();
        let file = PolicyFile::load(&path).unwrap();
        assert_eq!(file.bundles_target, PathBuf::from("docs/bundles"));

        let bad = dir.path().join("ssot.json");
        std::fs::write(&bad, MINIMAL).unwrap();
        match PolicyFile::load(&bad) {
            Err(ConfigError::ParseError { path, .. }) => assert_eq!(path, bad),
            other => panic!("expected ParseError, got {other:?}"),
        }
    }
}
