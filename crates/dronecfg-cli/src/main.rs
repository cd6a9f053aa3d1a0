//! dronecfg - compose and resolve layered training configurations.
//!
//! # Settings
//!
//! Settings are loaded from multiple sources with priority:
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`DRONECFG_*`)
//! 3. Project settings (`.dronecfg/config.toml` in the project root)
//! 4. Global settings (`~/.dronecfg/config.toml`)
//! 5. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `DRONECFG_CONFIG_DIR`: Directory holding named configs
//! - `DRONECFG_SEARCH_PATH`: Extra search roots, `:`-separated
//! - `DRONECFG_FORMAT`: Output format (`yaml`/`json`)
//! - `DRONECFG_SORT_KEYS`: Sort keys in output (`true`/`false`)
//!
//! Logs go to stderr; stdout carries only the rendered result.

mod output;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use dronecfg_runtime::settings::{OutputFormat, Settings, SettingsLoader, SettingsResolver};
use dronecfg_runtime::ConfigLoader;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Compose and resolve layered training configurations.
#[derive(Parser, Debug)]
#[command(name = "dronecfg")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project root for `.dronecfg/config.toml` (defaults to current directory)
    #[arg(short = 'C', long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the resolved configuration
    Compose {
        #[command(flatten)]
        target: Target,

        /// Output format (also: DRONECFG_FORMAT)
        #[arg(long, value_parser = parse_format)]
        format: Option<OutputFormat>,

        /// Print the composed tree without resolving `${...}` references
        #[arg(long)]
        unresolved: bool,
    },

    /// Print the documents merged into the configuration, in merge order
    Defaults {
        #[command(flatten)]
        target: Target,
    },

    /// Compose, resolve and validate the run parameters
    Check {
        #[command(flatten)]
        target: Target,
    },
}

/// Arguments naming what to load.
#[derive(ClapArgs, Debug)]
struct Target {
    /// Config file, or a name looked up in the configured config dir
    config: String,

    /// Overrides: `key=value`, `group=variant`, `+key=value`, `++key=value`, `~key`
    overrides: Vec<String>,

    /// Extra search root, probed before the roots documents declare (repeatable)
    #[arg(long = "search-path", value_name = "DIR")]
    search_path: Vec<PathBuf>,
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    s.parse()
}

/// CLI-based settings resolver.
///
/// Applies command-line flags on top of file/env settings.
struct CliSettingsResolver {
    search_roots: Vec<PathBuf>,
    format: Option<OutputFormat>,
}

impl CliSettingsResolver {
    fn from_command(command: &Command) -> Self {
        match command {
            Command::Compose { target, format, .. } => Self {
                search_roots: target.search_path.clone(),
                format: *format,
            },
            Command::Defaults { target } | Command::Check { target } => Self {
                search_roots: target.search_path.clone(),
                format: None,
            },
        }
    }
}

impl SettingsResolver for CliSettingsResolver {
    fn apply(&self, settings: &mut Settings) {
        settings.merge(&Settings {
            search_roots: self.search_roots.clone(),
            ..Settings::default()
        });
        if let Some(format) = self.format {
            settings.output.format = format;
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args);

    match run(args) {
        Ok(code) => code,
        Err(err) => {
            match output::error_code(&err) {
                Some(code) => eprintln!("error[{code}]: {err:#}"),
                None => eprintln!("error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

/// Terminal filter: --debug > --verbose > RUST_LOG env > default "warn".
fn init_tracing(args: &Args) {
    let filter = if args.debug {
        EnvFilter::new("debug")
    } else if args.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .init();
}

fn run(args: Args) -> Result<ExitCode> {
    let project_root = match args.project {
        Some(p) => p,
        None => std::env::current_dir().context("cannot determine current directory")?,
    };

    let mut settings = SettingsLoader::new()
        .with_project_root(&project_root)
        .load()?;
    CliSettingsResolver::from_command(&args.command).apply(&mut settings);
    debug!(?settings, "Resolved settings");

    let target = match &args.command {
        Command::Compose { target, .. }
        | Command::Defaults { target }
        | Command::Check { target } => target,
    };
    let config_path = settings.config_path(&target.config);
    info!(
        config = %config_path.display(),
        project = %project_root.display(),
        "Loading configuration"
    );

    let loader = ConfigLoader::new()
        .with_search_roots(&settings.search_roots)
        .with_override_args(&target.overrides)?;

    match &args.command {
        Command::Compose { unresolved, .. } => {
            let tree = if *unresolved {
                loader.compose(&config_path)?.tree
            } else {
                loader.load(&config_path)?.tree
            };
            print!("{}", output::render(tree, &settings.output)?);
        }
        Command::Defaults { .. } => {
            for applied in loader.compose(&config_path)?.applied {
                println!("{applied}");
            }
        }
        Command::Check { .. } => {
            loader.load(&config_path)?.run_config()?;
            println!("ok");
        }
    }

    Ok(ExitCode::SUCCESS)
}
