// modgraph-core/src/walker.rs
use modgraph_common::error::Result;
use modgraph_common::model::ModuleUnit;
use once_cell::sync::Lazy;
use oxc_ast::ast::{
    Argument, CallExpression, ExportAllDeclaration, ExportNamedDeclaration, Expression,
    ImportDeclaration, ImportExpression,
};
use oxc_ast::{visit::walk, Visit};
use regex::Regex;

use crate::parse::with_program;

/// Finds the specifiers a module requires.
pub trait DependencyWalker: Send + Sync {
    /// Cheap textual check run before the full extraction.
    fn has_imports(&self, source: &str) -> bool;

    /// Specifiers in first-occurrence order, without duplicates.
    fn collect_specifiers(&self, unit: &ModuleUnit) -> Result<Vec<String>>;
}

static IMPORT_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\brequire\s*\(|\bimport\b|\bexport\b[^;]*\bfrom\b"#)
        .expect("import hint pattern is valid")
});

/// Recognizes `require("x")`, static `import`/`export ... from` declarations
/// and `import("x")` with a string literal argument.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequireWalker;

impl DependencyWalker for RequireWalker {
    fn has_imports(&self, source: &str) -> bool {
        IMPORT_HINT.is_match(source)
    }

    fn collect_specifiers(&self, unit: &ModuleUnit) -> Result<Vec<String>> {
        if unit.ast.is_stub() {
            return Ok(Vec::new());
        }
        with_program(&unit.source, &unit.filename, unit.ast.source_type, |program| {
            let mut collector = SpecifierCollector::default();
            collector.visit_program(program);
            collector.found
        })
    }
}

#[derive(Default)]
struct SpecifierCollector {
    found: Vec<String>,
}

impl SpecifierCollector {
    fn add(&mut self, specifier: &str) {
        if !self.found.iter().any(|s| s == specifier) {
            self.found.push(specifier.to_string());
        }
    }
}

impl<'a> Visit<'a> for SpecifierCollector {
    fn visit_import_declaration(&mut self, it: &ImportDeclaration<'a>) {
        self.add(it.source.value.as_str());
        walk::walk_import_declaration(self, it);
    }

    fn visit_export_named_declaration(&mut self, it: &ExportNamedDeclaration<'a>) {
        if let Some(source) = &it.source {
            self.add(source.value.as_str());
        }
        walk::walk_export_named_declaration(self, it);
    }

    fn visit_export_all_declaration(&mut self, it: &ExportAllDeclaration<'a>) {
        self.add(it.source.value.as_str());
        walk::walk_export_all_declaration(self, it);
    }

    fn visit_import_expression(&mut self, it: &ImportExpression<'a>) {
        if let Expression::StringLiteral(literal) = &it.source {
            self.add(literal.value.as_str());
        }
        walk::walk_import_expression(self, it);
    }

    // Only a bare `require`; `obj.require(...)` is someone else's method.
    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        if let Expression::Identifier(callee) = &it.callee {
            if callee.name.as_str() == "require" && it.arguments.len() == 1 {
                if let Some(Argument::StringLiteral(literal)) = it.arguments.first() {
                    self.add(literal.value.as_str());
                }
            }
        }
        walk::walk_call_expression(self, it);
    }
}
