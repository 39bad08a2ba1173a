// modgraph-common/src/model/mod.rs
pub mod ast;
pub mod module;

pub use ast::{Program, SourceType, Statement, StatementKind};
pub use module::{LoadedModule, ModuleTag, ModuleUnit, RequiredModule, Resolution};
