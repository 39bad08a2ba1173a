// modgraph-core/src/resolve/mod.rs
use std::path::PathBuf;

use modgraph_common::error::Result;

pub mod filename;
pub mod node;

pub use filename::{AliasFilter, FilenameResolver, PathFilter, ResolveOptions};
pub use node::{NodeResolver, PackageManifest};

/// Maps a specifier to an absolute file path. Called from a blocking
/// thread, so implementations may do synchronous filesystem work.
pub trait SpecifierResolver: Send + Sync {
    fn resolve(&self, specifier: &str, options: &ResolveOptions) -> Result<PathBuf>;
}
