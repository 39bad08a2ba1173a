// modgraph-common/src/model/ast.rs
//! Owned outline of a parsed program. The parser's own tree is arena
//! allocated and does not outlive a parse call; this is what survives.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Script,
    #[default]
    Module,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Import,
    Export,
    Declaration,
    Expression,
    Other,
}

/// A top-level statement and its byte range in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statement {
    pub kind: StatementKind,
    pub start: u32,
    pub end: u32,
}

/// `body` is `None` for modules whose parsing was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub source_type: SourceType,
    pub hashbang: bool,
    pub body: Option<Vec<Statement>>,
}

impl Program {
    pub fn stub() -> Self {
        Self {
            source_type: SourceType::Script,
            hashbang: false,
            body: None,
        }
    }

    pub fn is_stub(&self) -> bool {
        self.body.is_none()
    }

    pub fn statements(&self) -> &[Statement] {
        self.body.as_deref().unwrap_or(&[])
    }
}
