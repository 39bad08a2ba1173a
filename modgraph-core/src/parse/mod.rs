// modgraph-core/src/parse/mod.rs
use std::path::Path;

use modgraph_common::config::ParserOptions;
use modgraph_common::error::{ModgraphError, Result};
use modgraph_common::model::{Program, SourceType, Statement, StatementKind};
use oxc_allocator::Allocator;
use oxc_ast::ast;
use oxc_span::GetSpan;
use tracing::trace;

/// Turns module source text into a [`Program`].
pub trait Parser: Send + Sync {
    fn parse(&self, source: &str, filename: &Path, options: &ParserOptions) -> Result<Program>;
}

/// Default parser backed by `oxc_parser`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OxcParser;

impl Parser for OxcParser {
    fn parse(&self, source: &str, filename: &Path, options: &ParserOptions) -> Result<Program> {
        trace!("Parsing {}", filename.display());
        let (hashbang, body) = with_program(source, filename, options.source_type, |program| {
            let body = program
                .body
                .iter()
                .map(|statement| {
                    let span = statement.span();
                    Statement {
                        kind: statement_kind(statement),
                        start: span.start,
                        end: span.end,
                    }
                })
                .collect::<Vec<_>>();
            (program.hashbang.is_some(), body)
        })?;

        if hashbang && !options.allow_hash_bang {
            return Err(ModgraphError::Parse {
                filename: filename.to_path_buf(),
                line: 1,
                column: 1,
                message: "Unexpected character '#'".to_string(),
            });
        }
        Ok(Program {
            source_type: options.source_type,
            hashbang,
            body: Some(body),
        })
    }
}

/// Parses `source` into a scratch arena and hands the tree to `inspect`.
/// The first diagnostic becomes a [`ModgraphError::Parse`].
pub(crate) fn with_program<R, F>(
    source: &str,
    filename: &Path,
    source_type: SourceType,
    inspect: F,
) -> Result<R>
where
    F: FnOnce(&ast::Program<'_>) -> R,
{
    let allocator = Allocator::default();
    let parsed =
        oxc_parser::Parser::new(&allocator, source, oxc_source_type(filename, source_type)).parse();

    if let Some(error) = parsed.errors.first() {
        let offset = error
            .labels
            .as_ref()
            .and_then(|labels| labels.first())
            .map_or(0, |label| label.offset());
        let (line, column) = line_column(source, offset);
        return Err(ModgraphError::Parse {
            filename: filename.to_path_buf(),
            line,
            column,
            message: error.message.to_string(),
        });
    }
    if parsed.panicked {
        return Err(ModgraphError::Parse {
            filename: filename.to_path_buf(),
            line: 1,
            column: 1,
            message: "Parser gave up on this file".to_string(),
        });
    }
    Ok(inspect(&parsed.program))
}

fn oxc_source_type(filename: &Path, source_type: SourceType) -> oxc_span::SourceType {
    let base = oxc_span::SourceType::from_path(filename).unwrap_or_default();
    let base = if base.is_typescript() {
        base
    } else {
        base.with_jsx(true)
    };
    base.with_module(source_type == SourceType::Module)
}

fn statement_kind(statement: &ast::Statement<'_>) -> StatementKind {
    match statement {
        ast::Statement::ImportDeclaration(_) => StatementKind::Import,
        ast::Statement::ExportAllDeclaration(_)
        | ast::Statement::ExportDefaultDeclaration(_)
        | ast::Statement::ExportNamedDeclaration(_) => StatementKind::Export,
        ast::Statement::VariableDeclaration(_)
        | ast::Statement::FunctionDeclaration(_)
        | ast::Statement::ClassDeclaration(_) => StatementKind::Declaration,
        ast::Statement::ExpressionStatement(_) => StatementKind::Expression,
        _ => StatementKind::Other,
    }
}

/// 1-based line and column of a byte offset.
fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let mut end = offset.min(source.len());
    while !source.is_char_boundary(end) {
        end -= 1;
    }
    let upto = &source[..end];
    let line = upto.matches('\n').count() + 1;
    let column = upto.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    (line, column)
}
