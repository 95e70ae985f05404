//! The frozen source-of-truth policy.
//!
//! [`PolicyStore`] turns a raw [`PolicyFile`] into a [`PolicyConfig`] once,
//! at boot: every path is made absolute against its base, normalized, and
//! symlink-resolved, so no request-time input can change what the
//! configured directories mean. The result is shared behind an `Arc` and
//! has no setters; changing policy means restarting the process.

use forgegate_config::ConfigError;
use forgegate_config::policy::{ENTITLEMENTS_ENV, PolicyFile};
use forgegate_core::{Law, LawClass, LawRefs};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::path::{absolutize, is_under_or_equal, resolve};

/// A resolved entry of the document precedence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecedenceEntry {
    pub id: String,
    pub paths: Vec<PathBuf>,
    /// Lower wins.
    pub level: u32,
}

/// The resolved, read-only SSOT.
#[derive(Debug)]
pub struct PolicyConfig {
    root_dir: PathBuf,
    docs_root_dir: PathBuf,
    write_allowed: Vec<PathBuf>,
    write_forbidden: Vec<PathBuf>,
    precedence_order: Vec<PrecedenceEntry>,
    migrations_target: PathBuf,
    bundles_target: PathBuf,
    entitlements_path: Option<PathBuf>,
    laws: Vec<Law>,
    law_refs: LawRefs,
}

impl PolicyConfig {
    /// Resolve a raw policy file. `base_dir` anchors a relative `root_dir`.
    pub fn from_file(file: PolicyFile, base_dir: &Path) -> Result<Self, ConfigError> {
        file.validate()?;

        let root_dir = resolve(&absolutize(base_dir, &file.root_dir));
        let under_root = |p: &Path| resolve(&absolutize(&root_dir, p));

        let docs_root_dir = under_root(file.docs_root_dir.as_path());
        if !is_under_or_equal(&root_dir, &docs_root_dir) {
            return Err(ConfigError::ValidationError(format!(
                "docs_root_dir {} is not inside root_dir {}",
                docs_root_dir.display(),
                root_dir.display()
            )));
        }

        let precedence_order = file
            .precedence_order
            .iter()
            .map(|entry| PrecedenceEntry {
                id: entry.id.clone(),
                paths: entry.all_paths().map(|p| under_root(p.as_path())).collect(),
                level: entry.level,
            })
            .collect();

        Ok(Self {
            write_allowed: file.write_allowed.iter().map(|p| under_root(p.as_path())).collect(),
            write_forbidden: file
                .write_forbidden
                .iter()
                .map(|p| under_root(p.as_path()))
                .collect(),
            migrations_target: under_root(file.migrations_target.as_path()),
            bundles_target: under_root(file.bundles_target.as_path()),
            entitlements_path: file.entitlements_path.as_deref().map(under_root),
            precedence_order,
            laws: file.laws,
            law_refs: file.law_refs,
            docs_root_dir,
            root_dir,
        })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn docs_root_dir(&self) -> &Path {
        &self.docs_root_dir
    }

    pub fn write_allowed(&self) -> &[PathBuf] {
        &self.write_allowed
    }

    pub fn write_forbidden(&self) -> &[PathBuf] {
        &self.write_forbidden
    }

    pub fn precedence_order(&self) -> &[PrecedenceEntry] {
        &self.precedence_order
    }

    pub fn migrations_target(&self) -> &Path {
        &self.migrations_target
    }

    pub fn bundles_target(&self) -> &Path {
        &self.bundles_target
    }

    pub fn entitlements_path(&self) -> Option<&Path> {
        self.entitlements_path.as_deref()
    }

    pub fn laws(&self) -> &[Law] {
        &self.laws
    }

    pub fn law_refs(&self) -> &LawRefs {
        &self.law_refs
    }

    pub fn law(&self, id: u32) -> Option<&Law> {
        self.laws.iter().find(|l| l.id == id)
    }

    /// The law id a decision class cites.
    pub fn law_id(&self, class: LawClass) -> u32 {
        self.law_refs.id_for(class)
    }

    /// Resolve a request-time target into the same space as the
    /// configured paths. Relative targets are taken relative to `root_dir`.
    pub fn resolve_target(&self, target: &Path) -> PathBuf {
        resolve(&absolutize(&self.root_dir, target))
    }

    /// The precedence entry governing `target`: among entries with a path
    /// equal to or containing it, the lowest level (first declared on ties).
    pub fn precedence_of(&self, target: &Path) -> Option<&PrecedenceEntry> {
        let target = self.resolve_target(target);
        self.precedence_order
            .iter()
            .filter(|entry| entry.paths.iter().any(|p| is_under_or_equal(p, &target)))
            .min_by_key(|entry| entry.level)
    }
}

/// Boot-time loader and shared handle for the frozen policy.
///
/// Cloning is cheap; every clone reads the same [`PolicyConfig`].
#[derive(Debug, Clone)]
pub struct PolicyStore {
    config: Arc<PolicyConfig>,
}

impl PolicyStore {
    /// Load the SSOT from disk.
    ///
    /// `FORGEGATE_ENTITLEMENTS`, when set, replaces the file's
    /// `entitlements_path`. It is read here, once.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut file = PolicyFile::load(path)?;
        if let Ok(entitlements) = std::env::var(ENTITLEMENTS_ENV) {
            file.entitlements_path = Some(PathBuf::from(entitlements));
        }

        let base_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => std::env::current_dir().map_err(|e| ConfigError::ReadError {
                path: path.to_path_buf(),
                reason: format!("cannot determine working directory: {e}"),
            })?,
        };

        let store = Self::from_file(file, &base_dir)?;
        tracing::info!(
            root = %store.root_dir().display(),
            docs_root = %store.docs_root_dir().display(),
            laws = store.laws().len(),
            "SSOT policy frozen"
        );
        Ok(store)
    }

    pub fn from_file(file: PolicyFile, base_dir: &Path) -> Result<Self, ConfigError> {
        Ok(Self {
            config: Arc::new(PolicyConfig::from_file(file, base_dir)?),
        })
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn shared(&self) -> Arc<PolicyConfig> {
        Arc::clone(&self.config)
    }
}

impl Deref for PolicyStore {
    type Target = PolicyConfig;

    fn deref(&self) -> &PolicyConfig {
        &self.config
    }
}
