//! Path helpers for package discovery
//!
//! Handles project-root lookup, `node_modules` discovery and locating the
//! package that owns a bare specifier.

use crate::manifest::MANIFEST_FILE;
use std::path::{Component, Path, PathBuf};

/// Name of the directory holding installed packages
pub const NODE_MODULES: &str = "node_modules";

/// A package located from a bare specifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRoot {
    /// Directory containing the package's manifest
    pub dir: PathBuf,
    /// Specifier remainder past the package directory ("" for the root)
    pub subpath: String,
}

/// Normalize a path lexically: drop `.` and fold `..` into its parent
pub fn normalize(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                if matches!(components.last(), Some(Component::Normal(_))) {
                    components.pop();
                }
            }
            Component::CurDir => {}
            _ => components.push(component),
        }
    }

    components.iter().collect()
}

/// Find the project root by looking for package.json
pub fn find_project_root(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir;

    loop {
        if current.join(MANIFEST_FILE).is_file() {
            return Some(current.to_path_buf());
        }

        current = current.parent()?;
    }
}

/// Every `node_modules` directory visible from `start_dir`, nearest first
pub fn node_modules_dirs(start_dir: &Path) -> Vec<PathBuf> {
    start_dir
        .ancestors()
        .filter(|dir| dir.file_name().map_or(true, |name| name != NODE_MODULES))
        .map(|dir| dir.join(NODE_MODULES))
        .filter(|dir| dir.is_dir())
        .collect()
}

/// Locate the package owning `specifier` inside one `node_modules` directory
///
/// Specifier segments are accumulated onto `node_modules` until a directory with
/// a manifest is found, which handles both `lib/sub` and `@scope/lib/sub`.
pub fn find_package_root(node_modules: &Path, specifier: &str) -> Option<PackageRoot> {
    let segments: Vec<&str> = specifier.split('/').filter(|s| !s.is_empty()).collect();
    let mut candidate = node_modules.to_path_buf();

    for (i, segment) in segments.iter().enumerate() {
        if *segment == "." || *segment == ".." {
            return None;
        }
        candidate.push(segment);
        if candidate.join(MANIFEST_FILE).is_file() {
            return Some(PackageRoot {
                dir: candidate,
                subpath: segments[i + 1..].join("/"),
            });
        }
    }

    None
}
