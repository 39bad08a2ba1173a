// modgraph-core/tests/resolver.rs
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use modgraph_common::config::{BundlerOptions, Config};
use modgraph_common::error::{ModgraphError, Result};
use modgraph_common::model::{ModuleUnit, RequiredModule, Resolution};
use modgraph_core::parse::{OxcParser, Parser};
use modgraph_core::resolve::ResolveOptions;
use modgraph_core::source::EMPTY_MODULE;
use modgraph_core::{ModuleResolver, NodeResolver, SpecifierResolver, Transform, Traversal};
use tempfile::TempDir;

fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (rel, text) in files {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }
    dir
}

fn config_with(root: &Path, bundler: BundlerOptions) -> Config {
    Config {
        base_dir: root.to_path_buf(),
        bundler,
    }
}

fn names(modules: &[Arc<RequiredModule>], root: &Path) -> Vec<String> {
    modules
        .iter()
        .map(|m| {
            m.filename()
                .and_then(|f| f.strip_prefix(root).ok())
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
        .collect()
}

/// Counts how often each file goes through the transform step.
#[derive(Default)]
struct LoadCounter(Mutex<HashMap<PathBuf, usize>>);

impl LoadCounter {
    fn count(&self, path: &Path) -> usize {
        self.0.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    fn total(&self) -> usize {
        self.0.lock().unwrap().values().sum()
    }
}

impl Transform for LoadCounter {
    fn name(&self) -> &str {
        "load-counter"
    }

    fn apply(&self, unit: &mut ModuleUnit) -> std::result::Result<(), String> {
        *self.0.lock().unwrap().entry(unit.filename.clone()).or_default() += 1;
        Ok(())
    }
}

/// Counts calls into the specifier resolver.
#[derive(Default)]
struct CountingResolver {
    inner: NodeResolver,
    calls: AtomicUsize,
}

impl SpecifierResolver for CountingResolver {
    fn resolve(&self, specifier: &str, options: &ResolveOptions) -> Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve(specifier, options)
    }
}

#[tokio::test]
async fn shared_dependency_is_emitted_once_and_first() {
    let dir = project(&[
        ("index.js", ""),
        ("a.js", "module.exports = require('./shared');"),
        ("b.js", "module.exports = require('./shared') + 1;"),
        ("shared.js", "module.exports = 1;"),
    ]);
    let root = dir.path();
    let resolver = ModuleResolver::new(Config::with_defaults(root)).unwrap();
    let traversal = Traversal::new();
    let entry = root.join("index.js");

    let (a, b) = futures::future::try_join(
        resolver.resolve_module(&traversal, &entry, "./a".to_string()),
        resolver.resolve_module(&traversal, &entry, "./b".to_string()),
    )
    .await
    .unwrap();

    let buffer = traversal.into_modules();
    let order = names(&buffer, root);
    assert_eq!(buffer.len(), 3, "{order:?}");
    assert_eq!(order.iter().filter(|n| *n == "shared.js").count(), 1);
    let shared_at = order.iter().position(|n| n == "shared.js").unwrap();
    assert!(shared_at < order.iter().position(|n| n == "a.js").unwrap());
    assert!(shared_at < order.iter().position(|n| n == "b.js").unwrap());
    assert_eq!(a.required_modules().len(), 1);
    assert_eq!(b.required_modules().len(), 1);
}

#[tokio::test]
async fn every_module_follows_its_dependencies() {
    let dir = project(&[
        ("index.js", "require('./a'); require('./b'); require('./c');"),
        ("a.js", "require('./b'); require('./d');"),
        ("b.js", "require('./d'); require('./lib/e');"),
        ("c.js", "require('./lib/e'); require('./a');"),
        ("d.js", ""),
        ("lib/e.js", "require('../d');"),
    ]);
    let root = dir.path();
    let resolver = ModuleResolver::new(Config::with_defaults(root)).unwrap();
    let graph = resolver.resolve_entry(&root.join("index.js")).await.unwrap();

    let order = names(&graph.modules, root);
    assert_eq!(order.len(), 6, "{order:?}");
    assert_eq!(order.last().map(String::as_str), Some("index.js"));
    for (index, module) in graph.modules.iter().enumerate() {
        for child in module.required_modules() {
            let child_at = graph.position(child.filename().unwrap()).unwrap();
            assert!(child_at < index, "{order:?}");
        }
    }
}

#[tokio::test]
async fn distinct_specifiers_for_one_file_load_it_once() {
    let dir = project(&[
        ("index.js", "require('./x'); require('./x.js'); require('./sub/y');"),
        ("x.js", "module.exports = 'x';"),
        ("sub/y.js", "require('../x'); require('./../x.js');"),
    ]);
    let root = dir.path();
    let counter = Arc::new(LoadCounter::default());
    let resolver = ModuleResolver::builder(Config::with_defaults(root))
        .transform(counter.clone())
        .build()
        .unwrap();
    let graph = resolver.resolve_entry(&root.join("index.js")).await.unwrap();

    assert_eq!(counter.count(&root.join("x.js")), 1);
    assert_eq!(counter.total(), 3);
    assert_eq!(graph.modules.len(), 3);
    let entry = graph.entries[0].clone();
    assert_eq!(entry.required_modules().len(), 3);
}

#[tokio::test]
async fn lookup_cache_skips_filename_resolution() {
    let dir = project(&[
        ("index.js", "require('./a');"),
        ("a.js", "require('./b');"),
        ("b.js", "require('./a');"),
    ]);
    let root = dir.path();
    let counting = Arc::new(CountingResolver::default());
    let resolver = ModuleResolver::builder(Config::with_defaults(root))
        .specifier_resolver(counting.clone())
        .build()
        .unwrap();
    resolver.resolve_entry(&root.join("index.js")).await.unwrap();
    // index.js, ./a and ./b; the second './a' is a lookup hit.
    assert_eq!(counting.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn cycles_terminate_with_leaf_references() {
    let dir = project(&[
        ("a.js", "require('./b');"),
        ("b.js", "require('./a');"),
    ]);
    let root = dir.path();
    let resolver = ModuleResolver::new(Config::with_defaults(root)).unwrap();
    let graph = resolver.resolve_entry(&root.join("a.js")).await.unwrap();

    assert_eq!(names(&graph.modules, root), vec!["b.js", "a.js"]);
    let b = &graph.modules[0];
    let back_edge = &b.required_modules()[0];
    assert!(matches!(back_edge.resolution, Resolution::Cached { .. }));
    assert_eq!(back_edge.filename(), Some(root.join("a.js").as_path()));
}

#[tokio::test]
async fn crossed_sibling_cycle_does_not_deadlock() {
    let dir = project(&[
        ("index.js", "require('./b'); require('./c');"),
        ("b.js", "require('./c');"),
        ("c.js", "require('./b');"),
    ]);
    let root = dir.path();
    let resolver = ModuleResolver::new(Config::with_defaults(root)).unwrap();
    let graph = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        resolver.resolve_entry(&root.join("index.js")),
    )
    .await
    .expect("traversal finished")
    .unwrap();

    let mut order = names(&graph.modules, root);
    assert_eq!(order.pop().as_deref(), Some("index.js"));
    order.sort();
    assert_eq!(order, vec!["b.js", "c.js"]);
}

#[tokio::test]
async fn excluded_module_is_empty_and_not_attached() {
    let dir = project(&[("index.js", "var fs = require('fs'); require('./a');"), ("a.js", "")]);
    let root = dir.path();
    let bundler = BundlerOptions {
        exclude: vec!["fs".to_string()],
        ..BundlerOptions::default()
    };
    let resolver = ModuleResolver::new(config_with(root, bundler)).unwrap();
    let graph = resolver.resolve_entry(&root.join("index.js")).await.unwrap();

    let entry = &graph.entries[0];
    assert_eq!(names(entry.required_modules(), root), vec!["a.js"]);
    assert_eq!(graph.modules.len(), 2);

    let traversal = Traversal::new();
    let fs_module = resolver
        .resolve_module(&traversal, &root.join("index.js"), "fs".to_string())
        .await
        .unwrap();
    assert!(fs_module.is_excluded());
    assert!(fs_module.filename().is_none());
    assert!(fs_module.ast().is_none());
    assert!(traversal.is_empty());
}

/// Resolves everything to a path that does not exist.
struct Phantom(PathBuf);

impl SpecifierResolver for Phantom {
    fn resolve(&self, specifier: &str, options: &ResolveOptions) -> Result<PathBuf> {
        if specifier == "os" {
            return Ok(self.0.clone());
        }
        NodeResolver::default().resolve(specifier, options)
    }
}

#[tokio::test]
async fn ignored_module_gets_stand_in_without_reading() {
    let dir = project(&[("index.js", "require('os');")]);
    let root = dir.path();
    let bundler = BundlerOptions {
        ignore: vec!["os".to_string()],
        ..BundlerOptions::default()
    };
    let resolver = ModuleResolver::builder(config_with(root, bundler))
        .specifier_resolver(Arc::new(Phantom(root.join("missing/os.js"))))
        .build()
        .unwrap();
    let graph = resolver.resolve_entry(&root.join("index.js")).await.unwrap();

    let os = &graph.modules[0];
    assert_eq!(os.module_name, "os");
    assert_eq!(os.source(), Some(EMPTY_MODULE));
    assert!(os.ast().is_some_and(|ast| ast.is_stub()));
    assert!(os.required_modules().is_empty());
}

#[tokio::test]
async fn unresolvable_specifier_fails_the_traversal() {
    let dir = project(&[
        ("index.js", "require('./a'); require('./b');"),
        ("a.js", "require('./missing');"),
        ("b.js", ""),
    ]);
    let root = dir.path();
    let resolver = ModuleResolver::new(Config::with_defaults(root)).unwrap();
    let err = resolver
        .resolve_entry(&root.join("index.js"))
        .await
        .unwrap_err();
    match err {
        ModgraphError::Resolution {
            specifier,
            requiring_file,
            ..
        } => {
            assert_eq!(specifier, "./missing");
            assert_eq!(requiring_file, root.join("a.js"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn parse_failure_fails_the_traversal() {
    let dir = project(&[("index.js", "require('./bad');"), ("bad.js", "var s = 'open;\n")]);
    let root = dir.path();
    let resolver = ModuleResolver::new(Config::with_defaults(root)).unwrap();
    let err = resolver
        .resolve_entry(&root.join("index.js"))
        .await
        .unwrap_err();
    assert!(matches!(err, ModgraphError::Parse { ref filename, .. } if filename == &root.join("bad.js")));
}

#[tokio::test]
async fn division_does_not_hide_later_requires() {
    let dir = project(&[
        ("index.js", "var i = 4; var half = i++ / 2;\nrequire('./b');"),
        ("b.js", "var s = 'x';\nif (s) /'/.test(s); require('./a');"),
        ("a.js", "module.exports = { import: 1 };"),
    ]);
    let root = dir.path();
    let resolver = ModuleResolver::new(Config::with_defaults(root)).unwrap();
    let graph = resolver.resolve_entry(&root.join("index.js")).await.unwrap();
    assert_eq!(names(&graph.modules, root), vec!["a.js", "b.js", "index.js"]);
}

#[tokio::test]
async fn json_asset_round_trips() {
    let json = "{\n  \"name\": \"demo\",\n  \"list\": [1, 2.5, \"require('./x')\"],\n  \"nested\": {\"ok\": true}\n}\n";
    let dir = project(&[("index.js", "var data = require('./data.json');"), ("data.json", json)]);
    let root = dir.path();
    let resolver = ModuleResolver::new(Config::with_defaults(root)).unwrap();
    let graph = resolver.resolve_entry(&root.join("index.js")).await.unwrap();

    let data = &graph.modules[0];
    assert!(data.is_json());
    assert!(data.required_modules().is_empty());
    assert!(!data.ast().unwrap().is_stub());
    let literal = data
        .source()
        .unwrap()
        .strip_prefix("\nmodule.isJSON = true;\nmodule.exports = JSON.parse(")
        .and_then(|s| s.strip_suffix(");"))
        .expect("JSON.parse wrapper");
    let embedded: String = serde_json::from_str(literal).unwrap();
    let exported: serde_json::Value = serde_json::from_str(&embedded).unwrap();
    let original: serde_json::Value = serde_json::from_str(json).unwrap();
    assert_eq!(exported, original);
}

#[tokio::test]
async fn other_assets_become_string_exports() {
    let dir = project(&[("index.js", "require('./style.css');"), ("style.css", "a { b: c }")]);
    let root = dir.path();
    let resolver = ModuleResolver::new(Config::with_defaults(root)).unwrap();
    let graph = resolver.resolve_entry(&root.join("index.js")).await.unwrap();
    assert_eq!(
        graph.modules[0].source(),
        Some("\nmodule.exports = \"a { b: c }\";")
    );
}

#[tokio::test]
async fn no_parse_modules_are_opaque_leaves() {
    let dir = project(&[
        ("index.js", "require('./vendor');"),
        ("vendor.js", "require('./not-there');"),
    ]);
    let root = dir.path();
    let bundler = BundlerOptions {
        no_parse: vec!["./vendor".to_string()],
        ..BundlerOptions::default()
    };
    let resolver = ModuleResolver::new(config_with(root, bundler)).unwrap();
    let graph = resolver.resolve_entry(&root.join("index.js")).await.unwrap();

    let vendor = &graph.modules[0];
    assert!(vendor.ast().is_some_and(|ast| ast.is_stub()));
    assert!(vendor.required_modules().is_empty());
}

#[tokio::test]
async fn precompiled_modules_are_not_loaded() {
    let dir = project(&[
        ("index.js", "require('./typed');"),
        ("typed.ts", "this is not javascript ((("),
    ]);
    let root = dir.path();
    let resolver = ModuleResolver::new(Config::with_defaults(root)).unwrap();
    let graph = resolver.resolve_entry(&root.join("index.js")).await.unwrap();

    assert_eq!(names(&graph.modules, root), vec!["index.js"]);
    let typed = &graph.entries[0].required_modules()[0];
    assert!(typed.is_precompiled());
    assert!(typed.source().is_none());
}

/// Redirects `./old` imports to `./new` and re-parses.
struct Redirect;

impl Transform for Redirect {
    fn name(&self) -> &str {
        "redirect"
    }

    fn apply(&self, unit: &mut ModuleUnit) -> std::result::Result<(), String> {
        unit.source = unit.source.replace("'./old'", "'./new'");
        unit.ast = OxcParser
            .parse(&unit.source, &unit.filename, &Default::default())
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}

#[tokio::test]
async fn transforms_run_before_dependency_discovery() {
    let dir = project(&[("index.js", "require('./old');"), ("new.js", "")]);
    let root = dir.path();
    let resolver = ModuleResolver::builder(Config::with_defaults(root))
        .transform(Arc::new(Redirect))
        .build()
        .unwrap();
    let graph = resolver.resolve_entry(&root.join("index.js")).await.unwrap();
    assert_eq!(names(&graph.modules, root), vec!["new.js", "index.js"]);
}

struct Reject;

impl Transform for Reject {
    fn name(&self) -> &str {
        "reject"
    }

    fn apply(&self, unit: &mut ModuleUnit) -> std::result::Result<(), String> {
        if unit.source.contains("forbidden") {
            return Err("forbidden content".to_string());
        }
        Ok(())
    }
}

#[tokio::test]
async fn transform_failure_fails_the_traversal() {
    let dir = project(&[("index.js", "require('./a');"), ("a.js", "forbidden();")]);
    let root = dir.path();
    let resolver = ModuleResolver::builder(Config::with_defaults(root))
        .transform(Arc::new(Reject))
        .build()
        .unwrap();
    let err = resolver
        .resolve_entry(&root.join("index.js"))
        .await
        .unwrap_err();
    assert!(matches!(err, ModgraphError::Transform { .. }));
}

#[tokio::test]
async fn package_modules_resolve_from_module_directories() {
    let dir = project(&[
        ("src/index.js", "require('dep'); require('../lib/local');"),
        ("lib/local.js", "require('dep');"),
        ("node_modules/dep/package.json", r#"{"main": "main.js"}"#),
        ("node_modules/dep/main.js", "module.exports = 1;"),
    ]);
    let root = dir.path();
    let resolver = ModuleResolver::new(Config::with_defaults(root)).unwrap();
    let graph = resolver
        .resolve_entry(&root.join("src/index.js"))
        .await
        .unwrap();
    assert_eq!(
        names(&graph.modules, root),
        vec!["node_modules/dep/main.js", "lib/local.js", "src/index.js"]
    );
    let dep = &graph.modules[0];
    assert!(dep.is_package_module());
    assert_eq!(dep.lookup_name, "dep");
}

#[tokio::test]
async fn multiple_entries_share_one_traversal() {
    let dir = project(&[
        ("one.js", "require('./common');"),
        ("two.js", "require('./common');"),
        ("common.js", ""),
    ]);
    let root = dir.path();
    let resolver = ModuleResolver::new(Config::with_defaults(root)).unwrap();
    let graph = resolver
        .resolve_entries(&[root.join("one.js"), root.join("two.js")])
        .await
        .unwrap();
    let order = names(&graph.modules, root);
    assert_eq!(order.len(), 3);
    assert_eq!(order[0], "common.js");
    assert_eq!(graph.entries.len(), 2);
}
