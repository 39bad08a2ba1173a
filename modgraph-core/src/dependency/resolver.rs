// modgraph-core/src/dependency/resolver.rs
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_recursion::async_recursion;
use futures::future::try_join_all;
use modgraph_common::cache::{Claim, ResolutionCache};
use modgraph_common::config::{BundlerOptions, Config};
use modgraph_common::error::{ModgraphError, Result};
use modgraph_common::model::{ModuleTag, ModuleUnit, Program, RequiredModule};
use modgraph_common::path::normalize_lexically;
use tracing::{debug, instrument, trace};

use crate::parse::{OxcParser, Parser};
use crate::resolve::{FilenameResolver, NodeResolver, SpecifierResolver};
use crate::source::SourceLoader;
use crate::transform::{Transform, TransformPipeline};
use crate::walker::{DependencyWalker, RequireWalker};

/// State shared by every resolution step of one traversal: both caches and
/// the append-only output buffer. Dropped when the traversal ends.
#[derive(Debug, Default)]
pub struct Traversal {
    cache: ResolutionCache,
    buffer: Mutex<Vec<Arc<RequiredModule>>>,
}

impl Traversal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    fn push(&self, module: Arc<RequiredModule>) {
        self.buffer
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(module);
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_modules(self) -> Vec<Arc<RequiredModule>> {
        self.buffer.into_inner().unwrap_or_else(|p| p.into_inner())
    }
}

/// Output of a completed traversal.
#[derive(Debug, Clone)]
pub struct ResolvedGraph {
    /// Every loaded module, each physical file once, dependencies first.
    pub modules: Vec<Arc<RequiredModule>>,
    /// One node per entry file, in the order given.
    pub entries: Vec<Arc<RequiredModule>>,
}

impl ResolvedGraph {
    pub fn position(&self, filename: &Path) -> Option<usize> {
        self.modules
            .iter()
            .position(|m| m.filename() == Some(filename))
    }
}

pub struct ResolverBuilder {
    config: Config,
    specifier_resolver: Arc<dyn SpecifierResolver>,
    parser: Arc<dyn Parser>,
    walker: Arc<dyn DependencyWalker>,
    transforms: TransformPipeline,
}

impl ResolverBuilder {
    pub fn specifier_resolver(mut self, resolver: Arc<dyn SpecifierResolver>) -> Self {
        self.specifier_resolver = resolver;
        self
    }

    pub fn parser(mut self, parser: Arc<dyn Parser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn walker(mut self, walker: Arc<dyn DependencyWalker>) -> Self {
        self.walker = walker;
        self
    }

    pub fn transform(mut self, transform: Arc<dyn Transform>) -> Self {
        self.transforms.push(transform);
        self
    }

    pub fn build(self) -> Result<ModuleResolver> {
        let filename_resolver = FilenameResolver::new(&self.config, self.specifier_resolver)?;
        let bundler = &self.config.bundler;
        Ok(ModuleResolver {
            source_loader: SourceLoader::new(bundler),
            exclude: bundler.exclude.iter().cloned().collect(),
            no_parse: bundler.no_parse.iter().cloned().collect(),
            options: Arc::new(bundler.clone()),
            filename_resolver,
            parser: self.parser,
            walker: self.walker,
            transforms: self.transforms,
        })
    }
}

/// Builds the module graph: resolves filenames, loads, parses, transforms
/// and walks each module, recursing into its dependencies.
pub struct ModuleResolver {
    options: Arc<BundlerOptions>,
    exclude: HashSet<String>,
    no_parse: HashSet<String>,
    filename_resolver: FilenameResolver,
    source_loader: SourceLoader,
    parser: Arc<dyn Parser>,
    walker: Arc<dyn DependencyWalker>,
    transforms: TransformPipeline,
}

impl ModuleResolver {
    pub fn builder(config: Config) -> ResolverBuilder {
        ResolverBuilder {
            config,
            specifier_resolver: Arc::new(NodeResolver::default()),
            parser: Arc::new(OxcParser),
            walker: Arc::new(RequireWalker),
            transforms: TransformPipeline::new(),
        }
    }

    pub fn new(config: Config) -> Result<Self> {
        Self::builder(config).build()
    }

    pub async fn resolve_entry(&self, entry: &Path) -> Result<ResolvedGraph> {
        self.resolve_entries(&[entry.to_path_buf()]).await
    }

    /// Resolves every entry file within a single traversal. Fails as a
    /// whole on the first fatal error.
    #[instrument(skip_all, fields(entries = entries.len()))]
    pub async fn resolve_entries(&self, entries: &[PathBuf]) -> Result<ResolvedGraph> {
        let traversal = Traversal::new();
        let anchors = entries
            .iter()
            .map(|entry| absolute(entry))
            .collect::<Result<Vec<_>>>()?;

        let resolved = try_join_all(anchors.iter().map(|anchor| {
            let module_name = entry_specifier(anchor);
            self.resolve_module(&traversal, anchor, module_name)
        }))
        .await?;

        let modules = traversal.into_modules();
        debug!("Resolved {} modules from {} entries", modules.len(), entries.len());
        Ok(ResolvedGraph {
            modules,
            entries: resolved,
        })
    }

    /// Resolves `module_name` as required from `requiring_file`, appending
    /// it and everything it newly reaches to the traversal buffer.
    #[async_recursion]
    pub async fn resolve_module(
        &self,
        traversal: &Traversal,
        requiring_file: &Path,
        module_name: String,
    ) -> Result<Arc<RequiredModule>> {
        let cache = traversal.cache();
        let lookup_name = RequiredModule::lookup_name_for(requiring_file, &module_name);

        if let Some(filename) = cache.lookup(&lookup_name) {
            trace!("Lookup cache hit for {}", lookup_name);
            cache.wait_settled(&filename, requiring_file).await?;
            return Ok(Arc::new(RequiredModule::cached(module_name, lookup_name, filename)));
        }

        if self.exclude.contains(&module_name) {
            debug!(
                "Excluding module {} from {}",
                module_name,
                requiring_file.display()
            );
            return Ok(Arc::new(RequiredModule::excluded(module_name, lookup_name)));
        }

        let filename = self
            .filename_resolver
            .resolve_filename(requiring_file, &module_name)
            .await?;
        cache.record_lookup(&lookup_name, &filename);

        let tags = ModuleTag::from_specifier(&module_name) | ModuleTag::from_filename(&filename);
        if tags.contains(ModuleTag::PRECOMPILED) {
            trace!("Not walking precompiled {}", filename.display());
            return Ok(Arc::new(RequiredModule::cached(module_name, lookup_name, filename)));
        }
        if let Claim::Seen = cache.claim(&filename, requiring_file) {
            trace!("Filename cache hit for {}", filename.display());
            cache.wait_settled(&filename, requiring_file).await?;
            return Ok(Arc::new(RequiredModule::cached(module_name, lookup_name, filename)));
        }

        let unit = self.load_module(module_name, filename.clone(), tags).await?;
        let required_modules = self.resolve_dependencies(traversal, &unit).await?;
        let module = Arc::new(RequiredModule::from_unit(unit, lookup_name, required_modules));

        traversal.push(Arc::clone(&module));
        cache.settle(&filename);
        Ok(module)
    }

    /// Reads, parses and transforms a newly claimed file.
    async fn load_module(
        &self,
        module_name: String,
        filename: PathBuf,
        tags: ModuleTag,
    ) -> Result<ModuleUnit> {
        let source = self
            .source_loader
            .read_source(&module_name, &filename, tags)
            .await?;
        let ast = self.create_abstract_syntax_tree(&module_name, &filename, &source)?;
        let mut unit = ModuleUnit {
            module_name,
            filename,
            tags,
            source,
            ast,
        };
        if unit.tags.contains(ModuleTag::SCRIPT) && !unit.ast.is_stub() {
            self.transforms.apply_transforms(&mut unit)?;
        }
        Ok(unit)
    }

    fn create_abstract_syntax_tree(
        &self,
        module_name: &str,
        filename: &Path,
        source: &str,
    ) -> Result<Program> {
        if self.no_parse.contains(module_name) || self.source_loader.is_ignored(module_name) {
            debug!("Not parsing {} ({})", module_name, filename.display());
            return Ok(Program::stub());
        }
        self.parser.parse(source, filename, &self.options.parser)
    }

    /// Resolves the imports of `unit` concurrently. Excluded children are
    /// dropped; the first failure aborts the remaining siblings.
    async fn resolve_dependencies(
        &self,
        traversal: &Traversal,
        unit: &ModuleUnit,
    ) -> Result<Vec<Arc<RequiredModule>>> {
        if !unit.tags.contains(ModuleTag::SCRIPT) || !self.walker.has_imports(&unit.source) {
            return Ok(Vec::new());
        }
        let specifiers = self.walker.collect_specifiers(unit)?;
        trace!(
            "{} requires {:?}",
            unit.filename.display(),
            specifiers
        );

        let children = try_join_all(
            specifiers
                .into_iter()
                .map(|name| self.resolve_module(traversal, &unit.filename, name)),
        )
        .await?;

        Ok(children
            .into_iter()
            .filter(|child| child.filename().is_some())
            .collect())
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(normalize_lexically(path));
    }
    let cwd = env::current_dir().map_err(ModgraphError::from)?;
    Ok(normalize_lexically(&cwd.join(path)))
}

/// An entry is required from itself, by file name.
fn entry_specifier(anchor: &Path) -> String {
    let name = anchor
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("./{name}")
}
