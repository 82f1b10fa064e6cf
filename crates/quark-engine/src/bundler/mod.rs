//! Bundle emission
//!
//! One sequential pass over the dependency-first file list:
//! - Scoped style modules: prefixed CSS plus a `dS(...)` token definition
//! - Global stylesheets: copied as-is
//! - Scripts: handed to a [`ScriptEmitter`]
//! - Everything else: skipped
//!
//! The script artifact opens with the application's package name and closes with
//! the loader call and the injected environment. Every processed file feeds a
//! SHA-256 fingerprint whose first seven hex characters version the bundle.

mod config;
mod emit;
mod style;

pub use config::{BundleConfig, ConfigError, QuarkConfig, ReloadConfig, CONFIG_FILE, ENV_PREFIX};
pub use emit::{AmdEmitter, EmitError, ScriptEmitter};
pub use style::{scope_stylesheet, style_define, unique_id, ScopedStyle};

use parking_lot::RwLock;
use quark_pm::normalize;
use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::module::{
    describe, DependencyGraph, FileDescription, FileKind, GraphBuilder, GraphError, ModuleResolver,
    SourceParser, SpecifierError, StaticImportScanner,
};

/// Errors that abort a bundle pass
#[derive(Debug, Error)]
pub enum BundleError {
    /// Reading a source or writing an artifact failed
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The dependency graph could not be built
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A script could not be parsed
    #[error(transparent)]
    Parse(#[from] SpecifierError),

    /// A script emitter failed
    #[error("Failed to emit {path}: {source}")]
    Emit {
        path: PathBuf,
        #[source]
        source: EmitError,
    },

    /// The file kind produces no artifact
    #[error("Nothing to emit for {0}")]
    Unsupported(PathBuf),
}

/// Summary of a finished bundle pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleReport {
    /// Files emitted into either artifact
    pub files: usize,
    /// Files skipped as non-emittable
    pub skipped: usize,
    /// Seven-character content fingerprint
    pub version: String,
    /// Where the script artifact was written
    pub script_path: PathBuf,
    /// Where the stylesheet artifact was written
    pub style_path: PathBuf,
}

impl BundleReport {
    /// Artifact file names, as referenced by the page
    pub fn filenames(&self) -> Vec<String> {
        [&self.script_path, &self.style_path]
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }
}

/// Output for a single changed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileArtifact {
    /// Stylesheet text, plus the token definition for scoped modules
    Style {
        /// Description of the file
        file: FileDescription,
        /// CSS to apply
        css: String,
        /// Token definition (scoped modules only)
        js: Option<String>,
    },
    /// Emitted module definition
    Script {
        /// Description of the file
        file: FileDescription,
        /// Module definition text
        js: String,
    },
}

/// Sequential bundle pass over one application
pub struct Bundler {
    config: BundleConfig,
    resolver: ModuleResolver,
    parser: Box<dyn SourceParser>,
    emitter: Box<dyn ScriptEmitter>,
    /// Files of the last graph built, by path
    known: RwLock<FxHashMap<PathBuf, FileDescription>>,
}

impl Bundler {
    /// Create a bundler with the static import scanner and the AMD emitter
    pub fn new(config: BundleConfig) -> Self {
        Self {
            config,
            resolver: ModuleResolver::new(),
            parser: Box::new(StaticImportScanner::new()),
            emitter: Box::new(AmdEmitter),
            known: RwLock::new(FxHashMap::default()),
        }
    }

    /// Replace the source parser
    pub fn with_parser(mut self, parser: Box<dyn SourceParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Replace the script emitter
    pub fn with_emitter(mut self, emitter: Box<dyn ScriptEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// Bundle settings
    pub fn config(&self) -> &BundleConfig {
        &self.config
    }

    /// Build the dependency graph from the configured entry
    ///
    /// The files are remembered so later single-file builds keep the names the
    /// graph gave them.
    pub fn graph(&self) -> Result<DependencyGraph, BundleError> {
        let builder = GraphBuilder::new(&self.resolver, self.parser.as_ref());
        let graph = builder.build(self.config.entry_location())?;
        *self.known.write() = graph.files().iter().map(|f| (f.path.clone(), f.clone())).collect();
        Ok(graph)
    }

    /// Run a full pass and write both artifacts
    ///
    /// When a file fails, the buffers accumulated so far are still written and
    /// the failure is returned.
    pub fn bundle(&self) -> Result<BundleReport, BundleError> {
        let graph = self.graph()?;
        let package_name = self.config.package_name();

        let mut buffers = Buffers::default();
        buffers.script.push_str(&format!("quark.baseAtoms={};\n", serde_json::Value::from(package_name)));

        let mut files = 0;
        let mut skipped = 0;
        for file in &graph {
            match self.append(file, &mut buffers) {
                Ok(true) => files += 1,
                Ok(false) => skipped += 1,
                Err(e) => {
                    error!(file = %file.path.display(), error = %e, "bundle pass aborted");
                    self.write_artifacts(&buffers)?;
                    return Err(e);
                }
            }
        }

        buffers.script.push_str("quark.load();\n");
        buffers.script.push_str(&env_call(&self.config.environment()));

        self.write_artifacts(&buffers)?;
        let version = fingerprint(buffers.hasher);

        info!(files, skipped, version = %version, "bundle written");
        Ok(BundleReport {
            files,
            skipped,
            version,
            script_path: self.config.out_script.clone(),
            style_path: self.config.out_style.clone(),
        })
    }

    /// Produce the artifact for one changed file
    ///
    /// Files in the last graph keep their graph description; anything else is
    /// described from its path.
    pub fn bundle_file(&self, path: &Path) -> Result<FileArtifact, BundleError> {
        let known = self.known.read().get(&normalize(path)).cloned();
        let file = match known {
            Some(file) => file,
            None => describe(path, &self.config.entry_location()),
        };
        let source = read_source(&file.path)?;

        match file.kind {
            FileKind::StyleModule => {
                let scoped = scope_stylesheet(&source, &unique_id(&file.path));
                let js = style_define(&file.full_module_name, &scoped);
                Ok(FileArtifact::Style {
                    file,
                    css: scoped.css,
                    js: Some(js),
                })
            }
            FileKind::GlobalStyle => Ok(FileArtifact::Style {
                file,
                css: source,
                js: None,
            }),
            kind if kind.is_script() => {
                let js = self.emit_script(&file, &source)?;
                Ok(FileArtifact::Script { file, js })
            }
            _ => Err(BundleError::Unsupported(file.path)),
        }
    }

    /// Append one file; `Ok(false)` when the kind is skipped
    fn append(&self, file: &FileDescription, buffers: &mut Buffers) -> Result<bool, BundleError> {
        if file.kind == FileKind::Other {
            debug!(file = %file.path.display(), "skipping non-emittable file");
            return Ok(false);
        }

        let source = read_source(&file.path)?;
        buffers.hasher.update(source.as_bytes());

        match file.kind {
            FileKind::StyleModule => {
                let scoped = scope_stylesheet(&source, &unique_id(&file.path));
                buffers.style.push_str(&scoped.css);
                buffers.style.push('\n');
                buffers.script.push_str(&style_define(&file.full_module_name, &scoped));
                buffers.script.push('\n');
            }
            FileKind::GlobalStyle => {
                buffers.style.push_str(&source);
                buffers.style.push('\n');
            }
            _ => {
                let js = self.emit_script(file, &source)?;
                buffers.script.push_str(&js);
            }
        }

        if self.config.verbose {
            info!(module = %file.full_module_name, uses = file.use_count, "emitted");
        } else {
            debug!(module = %file.full_module_name, uses = file.use_count, "emitted");
        }
        Ok(true)
    }

    fn emit_script(&self, file: &FileDescription, source: &str) -> Result<String, BundleError> {
        let specifiers = self.parser.dependencies(&file.path, source)?;
        self.emitter
            .emit(file, source, &specifiers)
            .map_err(|source| BundleError::Emit {
                path: file.path.clone(),
                source,
            })
    }

    fn write_artifacts(&self, buffers: &Buffers) -> Result<(), BundleError> {
        write_artifact(&self.config.out_script, &buffers.script)?;
        write_artifact(&self.config.out_style, &buffers.style)
    }
}

#[derive(Default)]
struct Buffers {
    script: String,
    style: String,
    hasher: Sha256,
}

fn read_source(path: &Path) -> Result<String, BundleError> {
    fs::read_to_string(path).map_err(|source| BundleError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_artifact(path: &Path, content: &str) -> Result<(), BundleError> {
    let io_err = |source| BundleError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, content).map_err(io_err)
}

/// First seven hex characters of the accumulated digest
fn fingerprint(hasher: Sha256) -> String {
    let mut hex = hex::encode(hasher.finalize());
    hex.truncate(7);
    hex
}

fn env_call(env: &BTreeMap<String, String>) -> String {
    let json = serde_json::to_string(env).unwrap_or_else(|_| "{}".to_string());
    format!("quark.lib.Quark.setEnv({});\n", json)
}
