// modgraph-core/src/dependency/mod.rs
pub mod resolver;

pub use resolver::{ModuleResolver, ResolvedGraph, ResolverBuilder, Traversal};
