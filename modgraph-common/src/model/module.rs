// modgraph-common/src/model/module.rs
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::ast::Program;
use crate::path::join_with_dirname;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ModuleTag: u8 {
        /// Resolved by name through the module directories.
        const PACKAGE     = 0b00000001;
        const SCRIPT      = 0b00000010;
        const JSON        = 0b00000100;
        const ASSET       = 0b00001000;
        /// Compiled elsewhere; never loaded or walked here.
        const PRECOMPILED = 0b00010000;
    }
}

impl Default for ModuleTag {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for ModuleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl ModuleTag {
    pub fn from_specifier(specifier: &str) -> Self {
        if is_package_specifier(specifier) {
            Self::PACKAGE
        } else {
            Self::empty()
        }
    }

    /// Classification bits that depend on the resolved filename.
    pub fn from_filename(filename: &Path) -> Self {
        let name = filename
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let ext = filename
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "ts" | "tsx" if !name.ends_with(".d.ts") => Self::SCRIPT | Self::PRECOMPILED,
            "js" | "jsx" | "mjs" | "cjs" | "ts" | "tsx" => Self::SCRIPT,
            "json" => Self::JSON,
            _ => Self::ASSET,
        }
    }
}

/// A specifier that is neither relative nor absolute is looked up by name.
pub fn is_package_specifier(specifier: &str) -> bool {
    !(specifier.starts_with('.') || specifier.starts_with('/') || Path::new(specifier).is_absolute())
}

/// Source and syntax tree of a module while it is being transformed.
#[derive(Debug, Clone)]
pub struct ModuleUnit {
    pub module_name: String,
    pub filename: PathBuf,
    pub tags: ModuleTag,
    pub source: String,
    pub ast: Program,
}

#[derive(Debug, Clone)]
pub struct LoadedModule {
    pub filename: PathBuf,
    pub source: String,
    pub ast: Program,
    /// Children that completed resolution, in import order.
    pub required_modules: Vec<Arc<RequiredModule>>,
}

#[derive(Debug, Clone)]
pub enum Resolution {
    /// On the exclusion list: no filename, source, syntax tree or children.
    Excluded,
    /// Leaf reference to a file that is handled through another edge, or
    /// one that needs no walking.
    Cached { filename: PathBuf },
    Loaded(Box<LoadedModule>),
}

/// A node of the dependency graph. Immutable once built.
#[derive(Debug, Clone)]
pub struct RequiredModule {
    pub module_name: String,
    pub lookup_name: String,
    pub tags: ModuleTag,
    pub resolution: Resolution,
}

impl RequiredModule {
    pub fn excluded(module_name: impl Into<String>, lookup_name: impl Into<String>) -> Self {
        let module_name = module_name.into();
        Self {
            tags: ModuleTag::from_specifier(&module_name),
            lookup_name: lookup_name.into(),
            module_name,
            resolution: Resolution::Excluded,
        }
    }

    pub fn cached(
        module_name: impl Into<String>,
        lookup_name: impl Into<String>,
        filename: PathBuf,
    ) -> Self {
        let module_name = module_name.into();
        Self {
            tags: ModuleTag::from_specifier(&module_name) | ModuleTag::from_filename(&filename),
            lookup_name: lookup_name.into(),
            module_name,
            resolution: Resolution::Cached { filename },
        }
    }

    pub fn from_unit(
        unit: ModuleUnit,
        lookup_name: impl Into<String>,
        required_modules: Vec<Arc<RequiredModule>>,
    ) -> Self {
        Self {
            module_name: unit.module_name,
            lookup_name: lookup_name.into(),
            tags: unit.tags,
            resolution: Resolution::Loaded(Box::new(LoadedModule {
                filename: unit.filename,
                source: unit.source,
                ast: unit.ast,
                required_modules,
            })),
        }
    }

    /// Computes the logical identity of `module_name` as required from
    /// `requiring_file`.
    pub fn lookup_name_for(requiring_file: &Path, module_name: &str) -> String {
        if is_package_specifier(module_name) {
            module_name.to_string()
        } else {
            join_with_dirname(requiring_file, module_name)
                .to_string_lossy()
                .into_owned()
        }
    }

    pub fn filename(&self) -> Option<&Path> {
        match &self.resolution {
            Resolution::Excluded => None,
            Resolution::Cached { filename } => Some(filename),
            Resolution::Loaded(loaded) => Some(&loaded.filename),
        }
    }

    pub fn source(&self) -> Option<&str> {
        self.loaded().map(|m| m.source.as_str())
    }

    pub fn ast(&self) -> Option<&Program> {
        self.loaded().map(|m| &m.ast)
    }

    pub fn required_modules(&self) -> &[Arc<RequiredModule>] {
        self.loaded()
            .map(|m| m.required_modules.as_slice())
            .unwrap_or(&[])
    }

    pub fn loaded(&self) -> Option<&LoadedModule> {
        match &self.resolution {
            Resolution::Loaded(loaded) => Some(loaded),
            _ => None,
        }
    }

    pub fn is_excluded(&self) -> bool {
        matches!(self.resolution, Resolution::Excluded)
    }

    pub fn is_package_module(&self) -> bool {
        self.tags.contains(ModuleTag::PACKAGE)
    }

    pub fn is_script(&self) -> bool {
        self.tags.contains(ModuleTag::SCRIPT)
    }

    pub fn is_json(&self) -> bool {
        self.tags.contains(ModuleTag::JSON)
    }

    pub fn is_precompiled(&self) -> bool {
        self.tags.contains(ModuleTag::PRECOMPILED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_specifiers() {
        assert!(is_package_specifier("lodash"));
        assert!(is_package_specifier("@scope/pkg/sub"));
        assert!(!is_package_specifier("./util"));
        assert!(!is_package_specifier("../util"));
        assert!(!is_package_specifier("/abs/util.js"));
    }

    #[test]
    fn classifies_filenames() {
        assert_eq!(ModuleTag::from_filename(Path::new("/a/b.js")), ModuleTag::SCRIPT);
        assert_eq!(
            ModuleTag::from_filename(Path::new("/a/b.ts")),
            ModuleTag::SCRIPT | ModuleTag::PRECOMPILED
        );
        assert_eq!(ModuleTag::from_filename(Path::new("/a/b.d.ts")), ModuleTag::SCRIPT);
        assert_eq!(ModuleTag::from_filename(Path::new("/a/b.json")), ModuleTag::JSON);
        assert_eq!(ModuleTag::from_filename(Path::new("/a/b.css")), ModuleTag::ASSET);
    }

    #[test]
    fn lookup_name_depends_on_specifier_kind() {
        let requiring = Path::new("/proj/src/index.js");
        assert_eq!(RequiredModule::lookup_name_for(requiring, "lodash"), "lodash");
        assert_eq!(
            RequiredModule::lookup_name_for(requiring, "./lib/../util"),
            "/proj/src/util"
        );
    }

    #[test]
    fn excluded_module_has_nothing_populated() {
        let module = RequiredModule::excluded("fs", "fs");
        assert!(module.filename().is_none());
        assert!(module.source().is_none());
        assert!(module.ast().is_none());
        assert!(module.required_modules().is_empty());
        assert!(module.is_package_module());
    }

    #[test]
    fn loaded_module_exposes_its_unit() {
        let unit = ModuleUnit {
            module_name: "./a".to_string(),
            filename: PathBuf::from("/proj/a.js"),
            tags: ModuleTag::SCRIPT,
            source: "require('./b');".to_string(),
            ast: Program::stub(),
        };
        let child = Arc::new(RequiredModule::cached("./b", "/proj/b", PathBuf::from("/proj/b.js")));
        let module = RequiredModule::from_unit(unit, "/proj/a", vec![child]);

        let loaded = module.loaded().expect("loaded resolution");
        assert_eq!(loaded.filename, PathBuf::from("/proj/a.js"));
        assert_eq!(module.source(), Some("require('./b');"));
        assert!(module.ast().is_some_and(Program::is_stub));
        assert_eq!(module.required_modules().len(), 1);
        assert_eq!(module.lookup_name, "/proj/a");
    }
}
