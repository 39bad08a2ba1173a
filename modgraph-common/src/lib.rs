// modgraph-common/src/lib.rs
pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod path;

// Re-export key types
pub use cache::ResolutionCache;
pub use config::{BundlerOptions, Config};
pub use error::{ModgraphError, Result};
pub use model::{ModuleTag, Program, RequiredModule, Resolution};
