// modgraph-core/src/resolve/node.rs
//! Default specifier resolution following the node module lookup rules,
//! with the `browser` field preferred over `main`.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use modgraph_common::error::{ModgraphError, Result};
use modgraph_common::model::module::is_package_specifier;
use modgraph_common::path::normalize_lexically;
use serde::Deserialize;
use tracing::trace;

use super::filename::ResolveOptions;
use super::SpecifierResolver;

const MANIFEST_FILENAME: &str = "package.json";

/// The subset of `package.json` used for resolution.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageManifest {
    #[serde(skip)]
    pub dir: PathBuf,
    pub main: Option<String>,
    pub browser: Option<serde_json::Value>,
}

impl PackageManifest {
    pub fn entry_point(&self, prefer_browser: bool) -> Option<&str> {
        let browser = self
            .browser
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .filter(|_| prefer_browser);
        browser.or(self.main.as_deref()).filter(|s| !s.is_empty())
    }
}

#[derive(Debug)]
pub struct NodeResolver {
    prefer_browser: bool,
    manifests: Mutex<HashMap<PathBuf, Option<Arc<PackageManifest>>>>,
}

impl Default for NodeResolver {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NodeResolver {
    pub fn new(prefer_browser: bool) -> Self {
        Self {
            prefer_browser,
            manifests: Mutex::new(HashMap::new()),
        }
    }

    fn load_as_file(&self, candidate: &Path, options: &ResolveOptions) -> Result<Option<PathBuf>> {
        let mut candidate = candidate.to_path_buf();
        if let Some(pkg) = self.enclosing_package(&candidate, options)? {
            let relative = candidate
                .strip_prefix(&pkg.dir)
                .map(Path::to_path_buf)
                .unwrap_or_default();
            let filtered = options
                .path_filter
                .apply(Some(pkg.as_ref()), &candidate, &relative);
            if let Some(filtered) = filtered {
                trace!(
                    "Path filter rewrote {} to {}",
                    candidate.display(),
                    filtered.display()
                );
                candidate = filtered;
            }
        }

        if candidate.is_file() {
            return Ok(Some(candidate));
        }
        for ext in &options.extensions {
            let mut with_ext = OsString::from(candidate.as_os_str());
            with_ext.push(ext);
            let with_ext = PathBuf::from(with_ext);
            if with_ext.is_file() {
                return Ok(Some(with_ext));
            }
        }
        Ok(None)
    }

    fn load_as_directory(&self, dir: &Path, options: &ResolveOptions) -> Result<Option<PathBuf>> {
        if !dir.is_dir() {
            return Ok(None);
        }
        if let Some(pkg) = self.manifest(dir)? {
            if let Some(entry) = pkg.entry_point(self.prefer_browser) {
                let main = normalize_lexically(&dir.join(entry));
                if let Some(found) = self.load_as_file(&main, options)? {
                    return Ok(Some(found));
                }
                if let Some(found) = self.load_as_file(&main.join("index"), options)? {
                    return Ok(Some(found));
                }
            }
        }
        self.load_as_file(&dir.join("index"), options)
    }

    fn load(
        &self,
        candidate: &Path,
        directory_only: bool,
        options: &ResolveOptions,
    ) -> Result<Option<PathBuf>> {
        if !directory_only {
            if let Some(found) = self.load_as_file(candidate, options)? {
                return Ok(Some(found));
            }
        }
        self.load_as_directory(candidate, options)
    }

    /// Nearest manifest above `path`, stopping at a module directory.
    fn enclosing_package(
        &self,
        path: &Path,
        options: &ResolveOptions,
    ) -> Result<Option<Arc<PackageManifest>>> {
        let Some(start) = path.parent() else {
            return Ok(None);
        };
        for dir in start.ancestors() {
            let is_module_dir = dir
                .file_name()
                .is_some_and(|n| options.module_directory.iter().any(|m| n == m.as_str()));
            if is_module_dir {
                return Ok(None);
            }
            if let Some(pkg) = self.manifest(dir)? {
                return Ok(Some(pkg));
            }
        }
        Ok(None)
    }

    fn manifest(&self, dir: &Path) -> Result<Option<Arc<PackageManifest>>> {
        if let Some(cached) = self
            .manifests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(dir)
        {
            return Ok(cached.clone());
        }
        let path = dir.join(MANIFEST_FILENAME);
        let manifest = if path.is_file() {
            let text = fs::read_to_string(&path)?;
            let mut pkg: PackageManifest = serde_json::from_str(&text).map_err(|e| {
                ModgraphError::Config(format!("Invalid manifest {}: {e}", path.display()))
            })?;
            pkg.dir = dir.to_path_buf();
            Some(Arc::new(pkg))
        } else {
            None
        };
        self.manifests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(dir.to_path_buf(), manifest.clone());
        Ok(manifest)
    }
}

impl SpecifierResolver for NodeResolver {
    fn resolve(&self, specifier: &str, options: &ResolveOptions) -> Result<PathBuf> {
        if let Some(shim) = options.modules.get(specifier) {
            return Ok(shim.clone());
        }

        let anchor_dir = options
            .filename
            .as_deref()
            .and_then(Path::parent)
            .map_or_else(|| options.basedir.clone(), Path::to_path_buf);
        let directory_only = specifier.ends_with('/');

        if is_package_specifier(specifier) {
            for dir in anchor_dir.ancestors() {
                let inside_module_dir = dir
                    .file_name()
                    .is_some_and(|n| options.module_directory.iter().any(|m| n == m.as_str()));
                if inside_module_dir {
                    continue;
                }
                for module_dir in &options.module_directory {
                    let candidate = dir.join(module_dir).join(specifier);
                    if let Some(found) = self.load(&candidate, directory_only, options)? {
                        return Ok(found);
                    }
                }
            }
        } else {
            let candidate = normalize_lexically(&anchor_dir.join(specifier));
            if let Some(found) = self.load(&candidate, directory_only, options)? {
                return Ok(found);
            }
        }

        Err(ModgraphError::NotFound(format!(
            "Cannot find module '{specifier}' from '{}'",
            anchor_dir.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use modgraph_common::config::{AliasRule, Config};

    use super::*;
    use crate::resolve::FilenameResolver;

    fn write(root: &Path, rel: &str, text: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, text).unwrap();
        path
    }

    fn options(root: &Path, anchor: Option<&Path>) -> ResolveOptions {
        let config = Config::with_defaults(root);
        let resolver = FilenameResolver::new(&config, Arc::new(NodeResolver::default())).unwrap();
        let mut options = resolver.options_for(anchor.unwrap_or(root), "x");
        options.filename = anchor.map(Path::to_path_buf);
        options
    }

    #[test]
    fn tries_extensions_in_configured_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let entry = write(root, "src/index.js", "");
        write(root, "src/util.json", "{}");
        let util_js = write(root, "src/util.js", "");
        let found = NodeResolver::default()
            .resolve("./util", &options(root, Some(&entry)))
            .unwrap();
        assert_eq!(found, util_js);
    }

    #[test]
    fn resolves_directory_index_and_main() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let entry = write(root, "index.js", "");
        let index = write(root, "lib/index.js", "");
        let main = write(root, "node_modules/pkg/lib/main.js", "");
        write(root, "node_modules/pkg/package.json", r#"{"name":"pkg","main":"lib/main"}"#);

        let resolver = NodeResolver::default();
        assert_eq!(resolver.resolve("./lib", &options(root, Some(&entry))).unwrap(), index);
        assert_eq!(resolver.resolve("pkg", &options(root, None)).unwrap(), main);
    }

    #[test]
    fn manifest_keeps_only_resolution_fields() {
        let manifest: PackageManifest = serde_json::from_str(
            r#"{"name":"pkg","version":"1.0.0","main":"lib/main","browser":{"fs":false}}"#,
        )
        .unwrap();
        assert_eq!(manifest.entry_point(true), Some("lib/main"));
        assert_eq!(manifest.entry_point(false), Some("lib/main"));
    }

    #[test]
    fn prefers_browser_field() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "node_modules/pkg/node.js", "");
        let browser = write(root, "node_modules/pkg/browser.js", "");
        write(
            root,
            "node_modules/pkg/package.json",
            r#"{"main":"node.js","browser":"browser.js"}"#,
        );
        assert_eq!(
            NodeResolver::default().resolve("pkg", &options(root, None)).unwrap(),
            browser
        );
    }

    #[test]
    fn shims_bypass_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = options(dir.path(), None);
        opts.modules
            .insert("buffer".to_string(), PathBuf::from("/shims/buffer.js"));
        assert_eq!(
            NodeResolver::default().resolve("buffer", &opts).unwrap(),
            PathBuf::from("/shims/buffer.js")
        );
    }

    #[test]
    fn alias_redirects_inside_package() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "node_modules/aliased/package.json", r#"{"name":"aliased"}"#);
        write(root, "node_modules/aliased/index.js", "");
        let real = write(root, "node_modules/aliased/dist/real.js", "");
        let config = Config {
            bundler: modgraph_common::config::BundlerOptions {
                resolve: modgraph_common::config::ResolveConfig {
                    alias: vec![AliasRule {
                        pattern: "node_modules/aliased/index$".to_string(),
                        suffix: "../dist/real".to_string(),
                    }],
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Config::with_defaults(root)
        };
        let resolver = FilenameResolver::new(&config, Arc::new(NodeResolver::default())).unwrap();
        let opts = resolver.options_for(root, "aliased");
        assert_eq!(NodeResolver::default().resolve("aliased", &opts).unwrap(), real);
    }

    #[test]
    fn missing_module_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = NodeResolver::default()
            .resolve("nope", &options(dir.path(), None))
            .unwrap_err();
        assert!(matches!(err, ModgraphError::NotFound(_)));
    }
}
