//! Module dependency graph
//!
//! Walks static imports depth-first from an entry file and produces:
//! - One description per resolved file, deduplicated by path
//! - Distinct-importer counts (`use_count`)
//! - Dependency-first ordering for emission
//!
//! Files are accumulated in discovery order, so every file sits before the files
//! it imports. A file found again is promoted to the back together with its
//! recorded imports, which keeps that property without re-walking anything. The
//! finished accumulator is reversed.

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashSet;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use quark_pm::{normalize, PackageManifest, NODE_MODULES};

use super::classify::{classify, FileKind};
use super::path::normalize_module_name;
use super::resolver::{module_name_in, ModuleLocation, ModuleResolver};
use super::specifier::{SourceParser, SpecifierError};

/// Errors that abort a graph build
#[derive(Debug, Error)]
pub enum GraphError {
    /// A script in the graph could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A script in the graph could not be parsed
    #[error(transparent)]
    Parse(#[from] SpecifierError),
}

/// Stable identity of a file: hash of its normalized absolute path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(String);

impl FileId {
    /// Identity of the file at `path`
    pub fn from_path(path: &Path) -> Self {
        let normalized = normalize(path);
        let digest = Sha256::digest(normalized.to_string_lossy().as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(16);
        FileId(hex)
    }

    /// The 16-character hex form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the bundler needs to know about one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescription {
    /// Identity derived from the path
    pub id: FileId,
    /// Absolute path
    pub path: PathBuf,
    /// Classification
    pub kind: FileKind,
    /// Owning package
    pub package_name: String,
    /// Module name inside the package
    pub module_name: String,
    /// `package_name/module_name`
    pub full_module_name: String,
    /// Number of distinct importers (0 for the entry)
    pub use_count: usize,
    /// Resolved imports, in source order
    pub imports: Vec<PathBuf>,
    importers: IndexSet<PathBuf>,
}

impl FileDescription {
    fn from_location(location: &ModuleLocation) -> Self {
        Self {
            id: FileId::from_path(&location.path),
            path: location.path.clone(),
            kind: classify(&location.path),
            package_name: location.package_name.clone(),
            module_name: location.module_name.clone(),
            full_module_name: location.full_module_name(),
            use_count: 0,
            imports: Vec::new(),
            importers: IndexSet::new(),
        }
    }

    /// Files that import this one, in discovery order
    pub fn importers(&self) -> impl Iterator<Item = &Path> {
        self.importers.iter().map(PathBuf::as_path)
    }

    fn add_importer(&mut self, importer: &Path) {
        self.importers.insert(importer.to_path_buf());
        self.use_count = self.importers.len();
    }
}

/// Dependency-first list of file descriptions
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    files: Vec<FileDescription>,
}

impl DependencyGraph {
    /// All files, dependencies first
    pub fn files(&self) -> &[FileDescription] {
        &self.files
    }

    /// Consume the graph, keeping the ordered files
    pub fn into_files(self) -> Vec<FileDescription> {
        self.files
    }

    /// Look a file up by path
    pub fn get(&self, path: &Path) -> Option<&FileDescription> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Position of a file in emission order
    pub fn position(&self, path: &Path) -> Option<usize> {
        self.files.iter().position(|f| f.path == path)
    }

    /// The entry file (always last)
    pub fn entry(&self) -> Option<&FileDescription> {
        self.files.last()
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the graph holds no files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl<'a> IntoIterator for &'a DependencyGraph {
    type Item = &'a FileDescription;
    type IntoIter = std::slice::Iter<'a, FileDescription>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

/// Builds a [`DependencyGraph`] from an entry file
pub struct GraphBuilder<'a> {
    resolver: &'a ModuleResolver,
    parser: &'a dyn SourceParser,
}

impl<'a> GraphBuilder<'a> {
    /// Create a builder from a resolver and a source parser
    pub fn new(resolver: &'a ModuleResolver, parser: &'a dyn SourceParser) -> Self {
        Self { resolver, parser }
    }

    /// Walk every static import reachable from `entry`
    pub fn build(&self, entry: ModuleLocation) -> Result<DependencyGraph, GraphError> {
        let mut walk = Walk {
            resolver: self.resolver,
            parser: self.parser,
            files: IndexMap::new(),
        };
        walk.visit(&entry)?;

        let mut files: Vec<FileDescription> = walk.files.into_values().collect();
        files.reverse();
        debug!(files = files.len(), entry = %entry.path.display(), "built dependency graph");
        Ok(DependencyGraph { files })
    }
}

/// State of one build: the discovery-ordered accumulator
struct Walk<'a> {
    resolver: &'a ModuleResolver,
    parser: &'a dyn SourceParser,
    files: IndexMap<PathBuf, FileDescription>,
}

/// A script whose specifiers are still being followed
struct Frame {
    location: ModuleLocation,
    specifiers: std::vec::IntoIter<String>,
}

impl Walk<'_> {
    /// Depth-first walk from `entry`, following specifiers in source order
    fn visit(&mut self, entry: &ModuleLocation) -> Result<(), GraphError> {
        let mut stack: Vec<Frame> = self.enter(entry, None)?.into_iter().collect();

        while let Some(frame) = stack.last_mut() {
            let specifier = match frame.specifiers.next() {
                Some(specifier) => specifier,
                None => {
                    stack.pop();
                    continue;
                }
            };

            let resolved = match self.resolver.resolve(&specifier, &frame.location) {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!(
                        file = %frame.location.path.display(),
                        specifier = %specifier,
                        error = %e,
                        "omitting unresolved import"
                    );
                    continue;
                }
            };

            let importer = frame.location.path.clone();
            if let Some(current) = self.files.get_mut(&importer) {
                if !current.imports.contains(&resolved.path) {
                    current.imports.push(resolved.path.clone());
                }
            }
            if let Some(next) = self.enter(&resolved, Some(&importer))? {
                stack.push(next);
            }
        }

        Ok(())
    }

    /// Record one arrival at `location`; a frame when it is a new script
    fn enter(&mut self, location: &ModuleLocation, importer: Option<&Path>) -> Result<Option<Frame>, GraphError> {
        if let Some(existing) = self.files.get_mut(&location.path) {
            if let Some(importer) = importer {
                existing.add_importer(importer);
            }
            self.promote(&location.path);
            return Ok(None);
        }

        let mut description = FileDescription::from_location(location);
        if let Some(importer) = importer {
            description.add_importer(importer);
        }
        let kind = description.kind;
        self.files.insert(location.path.clone(), description);

        if !kind.is_script() {
            return Ok(None);
        }

        let source = fs::read_to_string(&location.path).map_err(|source| GraphError::Io {
            path: location.path.clone(),
            source,
        })?;
        let specifiers = self.parser.dependencies(&location.path, &source)?;
        Ok(Some(Frame {
            location: location.clone(),
            specifiers: specifiers.into_iter(),
        }))
    }

    /// Move `path` and its recorded imports to the back, importers first
    fn promote(&mut self, path: &Path) {
        for path in self.postorder(path).into_iter().rev() {
            if let Some((key, description)) = self.files.shift_remove_entry(&path) {
                self.files.insert(key, description);
            }
        }
    }

    /// Recorded imports reachable from `root`, each after its own imports
    fn postorder(&self, root: &Path) -> Vec<PathBuf> {
        let mut visited = FxHashSet::default();
        let mut out = Vec::new();
        visited.insert(root.to_path_buf());
        let mut stack = vec![(root.to_path_buf(), 0usize)];

        while let Some((current, next)) = stack.last_mut() {
            let import = self
                .files
                .get(current.as_path())
                .and_then(|description| description.imports.get(*next))
                .cloned();
            match import {
                Some(import) => {
                    *next += 1;
                    if visited.insert(import.clone()) {
                        stack.push((import, 0));
                    }
                }
                None => {
                    out.push(current.clone());
                    stack.pop();
                }
            }
        }
        out
    }
}

/// Describe one file without walking its imports
///
/// Used for watch mode: files under `node_modules` belong to the package that
/// owns them, everything else to the application rooted at `app.package_dir`.
pub fn describe(path: &Path, app: &ModuleLocation) -> FileDescription {
    let path = normalize(path);
    let location = match owning_package(&path) {
        Some((dir, name)) => ModuleLocation {
            module_name: normalize_module_name(&path.strip_prefix(&dir).unwrap_or(&path).to_string_lossy()),
            path: path.clone(),
            package_name: name,
            package_dir: dir,
            base_url: None,
        },
        None => ModuleLocation {
            module_name: module_name_in(&app.package_dir, &path),
            path: path.clone(),
            package_name: app.package_name.clone(),
            package_dir: app.package_dir.clone(),
            base_url: app.base_url.clone(),
        },
    };
    FileDescription::from_location(&location)
}

/// Nearest manifest directory inside a `node_modules` tree, with its package name
fn owning_package(path: &Path) -> Option<(PathBuf, String)> {
    let in_node_modules = path
        .components()
        .any(|c| matches!(c, Component::Normal(name) if name == NODE_MODULES));
    if !in_node_modules {
        return None;
    }

    path.ancestors()
        .skip(1)
        .take_while(|dir| dir.file_name().map_or(false, |name| name != NODE_MODULES))
        .find_map(|dir| {
            let manifest = PackageManifest::from_dir(dir).ok()?;
            let name = manifest
                .name
                .unwrap_or_else(|| dir.file_name().unwrap_or_default().to_string_lossy().into_owned());
            Some((dir.to_path_buf(), name))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::StaticImportScanner;
    use tempfile::TempDir;

    fn write(root: &Path, name: &str, content: &str) -> PathBuf {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    fn build(root: &Path, entry: &str) -> DependencyGraph {
        let resolver = ModuleResolver::new();
        let parser = StaticImportScanner::new();
        let entry = ModuleLocation::entry(root.join(entry), "app", None);
        GraphBuilder::new(&resolver, &parser).build(entry).unwrap()
    }

    fn names(graph: &DependencyGraph) -> Vec<&str> {
        graph.files().iter().map(|f| f.module_name.as_str()).collect()
    }

    #[test]
    fn test_chain_is_dependency_first() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.ts", "import './b';");
        write(temp.path(), "b.ts", "import './c';");
        write(temp.path(), "c.ts", "export const c = 1;");

        let graph = build(temp.path(), "a.ts");
        assert_eq!(names(&graph), vec!["c", "b", "a"]);
        assert_eq!(graph.entry().unwrap().use_count, 0);
    }

    #[test]
    fn test_rediscovery_promotes_shared_import() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.ts", "import './c';\nimport './b';");
        write(temp.path(), "b.ts", "import './c';");
        write(temp.path(), "c.ts", "import './d';");
        write(temp.path(), "d.ts", "");

        let graph = build(temp.path(), "a.ts");
        assert_eq!(names(&graph), vec!["d", "c", "b", "a"]);

        let c = graph.get(&temp.path().join("c.ts")).unwrap();
        assert_eq!(c.use_count, 2);
        let importers: Vec<&Path> = c.importers().collect();
        assert_eq!(importers, vec![temp.path().join("a.ts"), temp.path().join("b.ts")]);
    }

    #[test]
    fn test_cycle_terminates() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.ts", "import './b';");
        write(temp.path(), "b.ts", "import './a';");

        let graph = build(temp.path(), "a.ts");
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.get(&temp.path().join("a.ts")).unwrap().use_count, 1);
        assert_eq!(graph.get(&temp.path().join("b.ts")).unwrap().use_count, 1);
    }

    #[test]
    fn test_styles_are_leaves_and_missing_is_omitted() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "index.tsx",
            "import './card.module.css';\nimport 'nowhere';\nimport { Atom } from 'quark';",
        );
        write(temp.path(), "card.module.css", "@import './other.css';\n.card {}");

        let graph = build(temp.path(), "index.tsx");
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.files()[0].kind, FileKind::StyleModule);
        assert_eq!(graph.files()[0].module_name, "card.module.css");
        assert_eq!(graph.entry().unwrap().imports, vec![temp.path().join("card.module.css")]);
    }

    #[test]
    fn test_file_id_is_stable() {
        let a = FileId::from_path(Path::new("/app/src/../src/a.ts"));
        let b = FileId::from_path(Path::new("/app/src/a.ts"));
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 16);
    }

    #[test]
    fn test_describe_app_and_package_files() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let app = ModuleLocation::entry(write(&src, "index.tsx", ""), "app", None);

        let button = describe(&write(&src, "ui/button.tsx", ""), &app);
        assert_eq!(button.full_module_name, "app/ui/button");
        assert_eq!(button.use_count, 0);

        let pkg = temp.path().join("node_modules/colors");
        write(&pkg, "package.json", r#"{ "name": "colors" }"#);
        let palette = describe(&write(&pkg, "lib/palette.js", ""), &app);
        assert_eq!(palette.package_name, "colors");
        assert_eq!(palette.module_name, "lib/palette");
    }
}
