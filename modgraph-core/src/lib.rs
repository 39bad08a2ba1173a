// modgraph-core/src/lib.rs

// Declare the top-level modules within the library crate
pub mod dependency;
pub mod parse;
pub mod resolve;
pub mod source;
pub mod transform;
pub mod walker;

// Re-export key types for easier use by the CLI crate
pub use dependency::{ModuleResolver, ResolvedGraph, Traversal};
pub use parse::{OxcParser, Parser};
pub use resolve::{FilenameResolver, NodeResolver, SpecifierResolver};
pub use source::SourceLoader;
pub use transform::{Transform, TransformPipeline};
pub use walker::{DependencyWalker, RequireWalker};
