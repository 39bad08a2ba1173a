// modgraph-common/src/config.rs
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{ModgraphError, Result};
use crate::model::ast::SourceType;

const CONFIG_ENV_VAR: &str = "MODGRAPH_CONFIG";
const DEFAULT_CONFIG_FILENAME: &str = "modgraph.toml";

/// Loaded configuration: the bundler options plus the directory relative
/// paths in them are anchored at.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_dir: PathBuf,
    pub bundler: BundlerOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundlerOptions {
    /// Specifiers that resolve to an empty, filename-less module.
    pub exclude: Vec<String>,
    /// Specifiers whose source is replaced by an empty module stand-in.
    pub ignore: Vec<String>,
    /// Specifiers that are loaded but never parsed or walked.
    pub no_parse: Vec<String>,
    pub parser: ParserOptions,
    pub resolve: ResolveConfig,
    /// Enables the shim table below.
    pub add_node_globals: bool,
    pub shims: BTreeMap<String, PathBuf>,
}

impl Default for BundlerOptions {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            ignore: Vec::new(),
            no_parse: Vec::new(),
            parser: ParserOptions::default(),
            resolve: ResolveConfig::default(),
            add_node_globals: false,
            shims: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    pub source_type: SourceType,
    pub allow_hash_bang: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            source_type: SourceType::Module,
            allow_hash_bang: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    pub extensions: Vec<String>,
    pub directories: Vec<String>,
    /// Evaluated in order; a later match overrides an earlier one.
    pub alias: Vec<AliasRule>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            extensions: [".js", ".json", ".ts", ".tsx"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            directories: vec!["node_modules".to_string()],
            alias: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRule {
    pub pattern: String,
    pub suffix: String,
}

impl Config {
    /// Loads configuration from `explicit`, then `$MODGRAPH_CONFIG`, then
    /// `./modgraph.toml`; falls back to defaults anchored at the current
    /// directory when none of them exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        debug!("Loading modgraph configuration");

        let candidate = explicit.map(Path::to_path_buf).or_else(|| {
            env::var(CONFIG_ENV_VAR)
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
        });

        if let Some(path) = candidate {
            return Self::from_file(&path);
        }

        let cwd = env::current_dir()?;
        let default_path = cwd.join(DEFAULT_CONFIG_FILENAME);
        if default_path.is_file() {
            return Self::from_file(&default_path);
        }

        debug!(
            "No {} found, using default options anchored at {}",
            DEFAULT_CONFIG_FILENAME,
            cwd.display()
        );
        Ok(Self::with_defaults(cwd))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Reading configuration file: {}", path.display());
        let text = fs::read_to_string(path).map_err(|e| {
            ModgraphError::Config(format!("Could not read {}: {e}", path.display()))
        })?;
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .map_or_else(env::current_dir, Ok)?;
        Self::from_toml_str(&text, base_dir)
    }

    pub fn from_toml_str(text: &str, base_dir: impl Into<PathBuf>) -> Result<Self> {
        let bundler: BundlerOptions = toml::from_str(text)?;
        let config = Self {
            base_dir: base_dir.into(),
            bundler,
        };
        config.validate()?;
        debug!("Configuration loaded successfully.");
        Ok(config)
    }

    pub fn with_defaults(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            bundler: BundlerOptions::default(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.bundler.resolve.extensions.is_empty() {
            return Err(ModgraphError::Config(
                "resolve.extensions must not be empty".to_string(),
            ));
        }
        if let Some(bad) = self
            .bundler
            .resolve
            .extensions
            .iter()
            .find(|ext| !ext.starts_with('.'))
        {
            return Err(ModgraphError::Config(format!(
                "extension '{bad}' must start with '.'"
            )));
        }
        Ok(())
    }

    /// Shim table with relative paths anchored at `base_dir`. Empty unless
    /// `add_node_globals` is set.
    pub fn shim_table(&self) -> BTreeMap<String, PathBuf> {
        if !self.bundler.add_node_globals {
            return BTreeMap::new();
        }
        self.bundler
            .shims
            .iter()
            .map(|(name, path)| (name.clone(), self.base_dir.join(path)))
            .collect()
    }
}
