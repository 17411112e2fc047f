// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tessera_cli::commands;
use tessera_cli::config::{Config, Overrides};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tessera")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "Directive template compiler with layout inheritance", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Configuration file (default: tessera.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Template root directory
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Cache directory for compiled artifacts
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Do not persist compiled artifacts
    #[arg(long, global = true)]
    no_cache: bool,

    /// Emit traceability comments and markers
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template to stdout
    Render {
        /// Template name, relative to the template root
        template: String,
        /// JSON file with the template variables
        #[arg(long)]
        vars: Option<PathBuf>,
        /// Write the output to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compile a template and show its artifact
    Compile {
        /// Template name, relative to the template root
        template: String,
        /// Print the generated Lua instead of the artifact path
        #[arg(long)]
        print: bool,
    },
    /// Precompile every template below the template root
    Build,
    /// Remove every cached artifact
    ClearCache,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with the specified log level
    let filter = EnvFilter::try_new(&cli.log_level)
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let file_config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let overrides = Overrides {
        root: cli.root,
        cache_dir: cli.cache_dir,
        no_cache: cli.no_cache,
        debug: cli.debug,
    };
    let config = file_config.into_compiler_config(&overrides);

    match cli.command {
        Commands::Render { template, vars, output } => {
            commands::render::run(config, &template, vars.as_deref(), output.as_deref())
        }
        Commands::Compile { template, print } => {
            commands::compile::run(config, &template, print)
        }
        Commands::Build => {
            commands::build::run(config)
        }
        Commands::ClearCache => {
            commands::clear_cache::run(config)
        }
    }
}
