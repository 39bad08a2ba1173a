// modgraph-core/src/source.rs
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use modgraph_common::config::BundlerOptions;
use modgraph_common::error::{ModgraphError, Result};
use modgraph_common::model::ModuleTag;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Stand-in text for modules on the ignore list.
pub const EMPTY_MODULE: &str = "module.exports={};";

static SOURCE_MAP_COMMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)(?://[@#][ \t]+sourceMappingURL=[^\s'"`]+?[ \t]*$)|(?:/\*[@#][ \t]+sourceMappingURL=[^*]+?[ \t]*\*/[ \t]*$)"#,
    )
    .expect("source map comment pattern is valid")
});

/// Produces the text of a resolved module.
#[derive(Debug, Clone, Default)]
pub struct SourceLoader {
    ignore: Arc<HashSet<String>>,
}

impl SourceLoader {
    pub fn new(options: &BundlerOptions) -> Self {
        Self {
            ignore: Arc::new(options.ignore.iter().cloned().collect()),
        }
    }

    pub fn is_ignored(&self, module_name: &str) -> bool {
        self.ignore.contains(module_name)
    }

    /// Reads `filename`. Scripts lose their source-map annotations; any
    /// other asset is wrapped verbatim into an export statement. Ignored
    /// modules never touch disk.
    pub async fn read_source(
        &self,
        module_name: &str,
        filename: &Path,
        tags: ModuleTag,
    ) -> Result<String> {
        if self.is_ignored(module_name) {
            debug!("Ignoring module {} ({})", module_name, filename.display());
            return Ok(EMPTY_MODULE.to_string());
        }

        let raw = tokio::fs::read(filename)
            .await
            .map_err(|e| ModgraphError::Read {
                path: filename.to_path_buf(),
                source: Arc::new(e),
            })?;
        let text = String::from_utf8_lossy(&raw);
        if tags.contains(ModuleTag::SCRIPT) {
            return Ok(delete_source_map_comment(&text));
        }
        Ok(wrap_asset(text.into_owned(), tags))
    }
}

pub fn delete_source_map_comment(source: &str) -> String {
    SOURCE_MAP_COMMENT.replace_all(source, "").into_owned()
}

/// Script text passes through; JSON becomes a `JSON.parse` export of the
/// original text and any other asset a string export.
pub fn wrap_asset(source: String, tags: ModuleTag) -> String {
    if tags.contains(ModuleTag::SCRIPT) {
        return source;
    }
    let literal = js_string_literal(&source);
    if tags.contains(ModuleTag::JSON) {
        format!("\nmodule.isJSON = true;\nmodule.exports = JSON.parse({literal});")
    } else {
        format!("\nmodule.exports = {literal};")
    }
}

/// A JSON string is also a valid JavaScript string literal.
fn js_string_literal(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}
