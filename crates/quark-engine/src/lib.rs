//! Quark Engine
//!
//! This crate provides the build-time and run-time halves of the quark toolchain:
//! - **Module**: file classification, specifier scanning, resolution and the
//!   dependency graph (`module`)
//! - **Bundler**: configuration, scoped styles and artifact emission (`bundler`)
//! - **Runtime**: the namespace registry and the define/require linker with
//!   hot swap (`runtime`)
//! - **Reload**: the hot-reload wire protocol, client and server (`reload`)
//!
//! # Example
//!
//! ```rust,ignore
//! use quark_engine::bundler::{Bundler, QuarkConfig};
//!
//! let config = QuarkConfig::from_file(Path::new("quark.toml"))?;
//! let report = Bundler::new(config.bundle).bundle()?;
//! println!("bundled {} files, version #{}", report.files, report.version);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Build Time
// ============================================================================

/// Module discovery: classification, resolution, dependency graph
pub mod module;

/// Artifact emission: configuration, scoped styles, script/style buffers
pub mod bundler;

// ============================================================================
// Run Time
// ============================================================================

/// Define/require linker, namespace registry and hot swap
pub mod runtime;

/// Hot-reload protocol, client and server
pub mod reload;

/// Specifiers that always name the framework itself
pub const FRAMEWORK_ALIASES: &[&str] = &["quark", "quark-ts"];

/// Whether `specifier` names the framework (`quark`, `quark-ts`, `quark/...`)
pub fn is_framework_specifier(specifier: &str) -> bool {
    let head = specifier.split('/').next().unwrap_or(specifier);
    FRAMEWORK_ALIASES.contains(&head)
}
