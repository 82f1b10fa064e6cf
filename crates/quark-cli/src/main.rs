//! Quark CLI tool
//!
//! Builds bundles, prints dependency graphs and runs the hot-reload server.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::Overrides;
use output::{resolve_color_choice, StyledOutput};

/// Environment variable holding the log filter
const LOG_ENV: &str = "QUARK_LOG";

#[derive(Parser)]
#[command(name = "quark")]
#[command(about = "Quark module bundler and hot-reload server", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to quark.toml (defaults to ./quark.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Colored output: auto, always or never
    #[arg(long, global = true)]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bundle an application into a script and a stylesheet
    Bundle {
        /// Entry file
        entry: Option<PathBuf>,
        /// Script artifact path
        #[arg(long)]
        out_script: Option<PathBuf>,
        /// Stylesheet artifact path
        #[arg(long)]
        out_style: Option<PathBuf>,
        /// Application package name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Print the dependency-first file list
    Graph {
        /// Entry file
        entry: Option<PathBuf>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Bundle, then watch sources and push changes to connected pages
    Serve {
        /// Entry file
        entry: Option<PathBuf>,
        /// Address to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to bind
        #[arg(short, long)]
        port: Option<u16>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let mut out = StyledOutput::new(resolve_color_choice(cli.color.as_deref()));

    let mut overrides = Overrides {
        config: cli.config,
        verbose: cli.verbose,
        ..Overrides::default()
    };

    let result = match cli.command {
        Commands::Bundle {
            entry,
            out_script,
            out_style,
            name,
        } => {
            overrides.entry = entry;
            overrides.out_script = out_script;
            overrides.out_style = out_style;
            overrides.package_name = name;
            commands::bundle::execute(&overrides, &mut out)
        }

        Commands::Graph { entry, json } => {
            overrides.entry = entry;
            commands::graph::execute(&overrides, json, &mut out)
        }

        Commands::Serve { entry, host, port } => {
            overrides.entry = entry;
            overrides.host = host;
            overrides.port = port;
            commands::serve::execute(&overrides, &mut out)
        }
    };

    if let Err(e) = result {
        out.stderr_error(&format!("error: {:#}\n", e));
        std::process::exit(1);
    }
    Ok(())
}
