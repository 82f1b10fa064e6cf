//! Module discovery and resolution
//!
//! This module turns a source tree into an ordered list of files:
//! - File classification with compiled-to-source extension fallback
//! - Static import/export specifier scanning
//! - Specifier resolution (relative, alias root, package exports)
//! - Dependency graph construction in dependency-first order

mod classify;
mod graph;
mod path;
mod resolver;
mod specifier;

pub use classify::{classify, locate, FileKind};
pub use graph::{describe, DependencyGraph, FileDescription, FileId, GraphBuilder, GraphError};
pub use path::{dirname, full_module_name, normalize_module_name, sum_path, SOURCE_EXTENSIONS};
pub use resolver::{ModuleLocation, ModuleResolver, ResolveError};
pub use specifier::{SourceParser, SpecifierError, StaticImportScanner};
