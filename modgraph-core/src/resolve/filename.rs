// modgraph-core/src/resolve/filename.rs
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use modgraph_common::config::{AliasRule, Config};
use modgraph_common::error::{ModgraphError, Result};
use modgraph_common::model::module::is_package_specifier;
use modgraph_common::path::{fix_windows_path, normalize_lexically};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, instrument, trace};

use super::node::PackageManifest;
use super::SpecifierResolver;

/// Options handed to the [`SpecifierResolver`]. Serialized into resolution
/// failure messages.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOptions {
    /// Anchor file; unset for package lookups.
    pub filename: Option<PathBuf>,
    pub basedir: PathBuf,
    pub extensions: Vec<String>,
    pub module_directory: Vec<String>,
    /// Shim table; empty unless node globals are enabled.
    pub modules: BTreeMap<String, PathBuf>,
    pub alias: Vec<AliasRule>,
    #[serde(skip)]
    pub path_filter: PathFilter,
}

/// Rewrites a candidate path found inside a package.
#[derive(Clone)]
pub struct PathFilter(Arc<AliasFilter>);

impl PathFilter {
    pub fn apply(
        &self,
        pkg: Option<&PackageManifest>,
        full_path: &Path,
        relative_path: &Path,
    ) -> Option<PathBuf> {
        self.0.filter(pkg, full_path, relative_path)
    }
}

impl fmt::Debug for PathFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathFilter").field(&self.0.rules.len()).finish()
    }
}

impl Default for PathFilter {
    fn default() -> Self {
        Self(Arc::new(AliasFilter::default()))
    }
}

/// Compiled alias rules.
#[derive(Debug, Default)]
pub struct AliasFilter {
    rules: Vec<(Regex, String)>,
}

impl AliasFilter {
    pub fn new(rules: &[AliasRule]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|re| (re, rule.suffix.clone()))
                    .map_err(|e| {
                        ModgraphError::Config(format!(
                            "invalid alias pattern '{}': {e}",
                            rule.pattern
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Every matching rule is applied in order, so the last match wins.
    /// Only fires for candidates inside a package with a non-empty path
    /// relative to the package root.
    pub fn filter(
        &self,
        pkg: Option<&PackageManifest>,
        full_path: &Path,
        relative_path: &Path,
    ) -> Option<PathBuf> {
        if pkg.is_none() || relative_path.as_os_str().is_empty() {
            return None;
        }
        let normalized = fix_windows_path(full_path);
        let mut filtered = None;
        for (pattern, suffix) in &self.rules {
            if pattern.is_match(&normalized) {
                trace!("Alias '{}' matched {}", pattern.as_str(), normalized);
                filtered = Some(normalize_lexically(&full_path.join(suffix)));
            }
        }
        filtered
    }
}

/// Resolves the filename of a required module.
pub struct FilenameResolver {
    resolver: Arc<dyn SpecifierResolver>,
    base_options: ResolveOptions,
}

impl fmt::Debug for FilenameResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilenameResolver")
            .field("base_options", &self.base_options)
            .finish()
    }
}

impl FilenameResolver {
    pub fn new(config: &Config, resolver: Arc<dyn SpecifierResolver>) -> Result<Self> {
        let bundler = &config.bundler;
        let modules = config.shim_table();
        if !modules.is_empty() {
            debug!("Node global shims enabled: {:?}", modules.keys().collect::<Vec<_>>());
        }
        let path_filter = PathFilter(Arc::new(AliasFilter::new(&bundler.resolve.alias)?));
        Ok(Self {
            resolver,
            base_options: ResolveOptions {
                filename: None,
                basedir: config.base_dir.clone(),
                extensions: bundler.resolve.extensions.clone(),
                module_directory: bundler.resolve.directories.clone(),
                modules,
                alias: bundler.resolve.alias.clone(),
                path_filter,
            },
        })
    }

    /// Package lookups are not anchored at the requiring file.
    pub fn options_for(&self, requiring_file: &Path, module_name: &str) -> ResolveOptions {
        let mut options = self.base_options.clone();
        if !is_package_specifier(module_name) {
            options.filename = Some(requiring_file.to_path_buf());
        }
        options
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn resolve_filename(
        &self,
        requiring_file: &Path,
        module_name: &str,
    ) -> Result<PathBuf> {
        let options = self.options_for(requiring_file, module_name);
        let resolver = Arc::clone(&self.resolver);
        let specifier = module_name.to_string();
        let task_options = options.clone();
        let outcome =
            tokio::task::spawn_blocking(move || resolver.resolve(&specifier, &task_options))
                .await
                .map_err(|e| ModgraphError::Join(e.to_string()))?;

        match outcome {
            Ok(filename) => {
                debug!("Resolved [{}] to {}", module_name, filename.display());
                Ok(filename)
            }
            Err(e) => Err(ModgraphError::Resolution {
                specifier: module_name.to_string(),
                requiring_file: requiring_file.to_path_buf(),
                options: serde_json::to_string_pretty(&options)
                    .unwrap_or_else(|_| format!("{options:?}")),
                reason: e.to_string(),
            }),
        }
    }
}
