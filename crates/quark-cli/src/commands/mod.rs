//! Subcommand implementations

pub mod bundle;
pub mod graph;
pub mod serve;

use anyhow::Context;
use quark_engine::bundler::{BundleConfig, QuarkConfig, CONFIG_FILE};
use std::path::PathBuf;

/// Command-line values layered over `quark.toml`
#[derive(Debug, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub verbose: bool,
    pub entry: Option<PathBuf>,
    pub out_script: Option<PathBuf>,
    pub out_style: Option<PathBuf>,
    pub package_name: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Load the configuration and apply command-line overrides
///
/// Relative override paths are taken from the working directory. Without a
/// config file, an entry given on the command line places the artifacts beside it.
pub fn load_config(overrides: &Overrides) -> anyhow::Result<QuarkConfig> {
    let cwd = std::env::current_dir().context("cannot read the working directory")?;
    let config_path = match &overrides.config {
        Some(path) => Some(cwd.join(path)),
        None => Some(cwd.join(CONFIG_FILE)).filter(|path| path.is_file()),
    };

    let mut config = match (&config_path, &overrides.entry) {
        (Some(path), entry) => {
            let mut config = QuarkConfig::from_file(path)
                .with_context(|| format!("cannot load {}", path.display()))?;
            if let Some(entry) = entry {
                config.bundle.entry = cwd.join(entry);
            }
            config
        }
        (None, Some(entry)) => QuarkConfig {
            bundle: BundleConfig::for_entry(cwd.join(entry)),
            ..QuarkConfig::default()
        },
        (None, None) => QuarkConfig::discover(&cwd)?,
    };

    if let Some(path) = &overrides.out_script {
        config.bundle.out_script = cwd.join(path);
    }
    if let Some(path) = &overrides.out_style {
        config.bundle.out_style = cwd.join(path);
    }
    if let Some(name) = &overrides.package_name {
        config.bundle.package_name = Some(name.clone());
    }
    if let Some(host) = &overrides.host {
        config.reload.host = host.clone();
    }
    if let Some(port) = overrides.port {
        config.reload.port = port;
    }
    if overrides.verbose {
        config.bundle.verbose = true;
        config.reload.verbose = true;
    }

    config.validate()?;
    Ok(config)
}
