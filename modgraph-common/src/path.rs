// modgraph-common/src/path.rs
//! Lexical path helpers. None of these touch the filesystem.

use std::path::{Component, Path, PathBuf};

/// Folds `.` and `..` components without consulting the filesystem.
///
/// A `..` that would climb above the root (or above the start of a relative
/// path) is kept, matching what a plain string join would produce.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Joins `specifier` onto the directory containing `requiring_file`.
pub fn join_with_dirname(requiring_file: &Path, specifier: &str) -> PathBuf {
    let dir = requiring_file.parent().unwrap_or_else(|| Path::new(""));
    normalize_lexically(&dir.join(specifier))
}

/// Renders a path with forward slashes so patterns behave the same on every
/// platform.
pub fn fix_windows_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
