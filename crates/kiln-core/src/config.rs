//! Package build configuration (`kiln.toml`)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paths::normalize;

/// Config file name, looked up in the package root.
pub const CONFIG_FILE: &str = "kiln.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Lint rule overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LintConfig {
    /// Rules that are not reported.
    pub allow: Vec<String>,
    /// Rules promoted to errors.
    pub deny: Vec<String>,
}

/// Generated `index.ts` re-exporting every module under `root_dir`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    pub enabled: bool,
    /// Side-effect imports placed at the top of the index.
    pub polyfills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Absolute package root. Every other path is relative to it.
    #[serde(skip)]
    pub package_root: PathBuf,
    /// Directories scanned for root source files.
    pub roots: Vec<PathBuf>,
    /// Output paths mirror the layout below this directory.
    pub root_dir: PathBuf,
    pub out_dir: PathBuf,
    /// Globs (relative to the package root) a root file must match.
    pub include: Vec<String>,
    /// Globs excluding files from the roots.
    pub exclude: Vec<String>,
    pub debounce_ms: u64,
    pub lint: LintConfig,
    pub index: IndexConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            package_root: PathBuf::new(),
            roots: vec![PathBuf::from("src")],
            root_dir: PathBuf::from("src"),
            out_dir: PathBuf::from("dist"),
            include: vec![
                "**/*.ts".to_string(),
                "**/*.tsx".to_string(),
                "**/*.mts".to_string(),
                "**/*.cts".to_string(),
            ],
            exclude: vec!["**/*.spec.ts".to_string(), "**/node_modules/**".to_string()],
            debounce_ms: 100,
            lint: LintConfig::default(),
            index: IndexConfig::default(),
        }
    }
}

impl BuildConfig {
    /// Default configuration for a package root.
    pub fn for_package(package_root: impl Into<PathBuf>) -> Self {
        BuildConfig {
            package_root: package_root.into(),
            ..Default::default()
        }
    }

    /// Load `kiln.toml` from the package root, falling back to defaults when
    /// the file does not exist. The root is canonicalized so paths reported
    /// by the watcher compare equal to the ones the compiler produces.
    pub fn load(package_root: &Path) -> Result<Self, ConfigError> {
        let package_root = package_root
            .canonicalize()
            .map_err(|source| ConfigError::Io {
                path: package_root.to_path_buf(),
                source,
            })?;
        let path = package_root.join(CONFIG_FILE);
        if !path.exists() {
            tracing::debug!("No {} in {}, using defaults", CONFIG_FILE, package_root.display());
            return Ok(Self::for_package(package_root));
        }

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml_str(&package_root, &text)
            .map_err(|source| ConfigError::Parse { path: path.clone(), source })?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(package_root: &Path, text: &str) -> Result<Self, toml::de::Error> {
        let mut config: BuildConfig = toml::from_str(text)?;
        config.package_root = package_root.to_path_buf();
        Ok(config)
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        normalize(&self.package_root.join(path))
    }

    /// Absolute source roots.
    pub fn root_paths(&self) -> Vec<PathBuf> {
        self.roots.iter().map(|r| self.absolute(r)).collect()
    }

    pub fn root_dir_path(&self) -> PathBuf {
        self.absolute(&self.root_dir)
    }

    pub fn out_root(&self) -> PathBuf {
        self.absolute(&self.out_dir)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
