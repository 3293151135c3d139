//! # sprig-cli
//!
//! Command-line front end for the sprig dependency resolver.
//!
//! Parses the command line, sets up logging, and dispatches to the command
//! handlers. Errors are rendered with suggestions; a cancelled resolution
//! exits with status 130 and no error output.

use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use sprig_core::error::{SprigError, SprigResult};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::CommandContext;
use output::errors::ErrorFormatter;

/// Exit status after Ctrl-C
const EXIT_INTERRUPTED: u8 = 130;

/// Dependency resolver for sprig.toml projects
#[derive(Parser)]
#[command(name = "sprig", version, about = "Resolve and lock project dependencies")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub resolve: ResolveArgs,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve dependencies and write sprig.lock
    Lock,
    /// Compute the install plan from sprig.lock
    Install {
        /// Fail instead of re-resolving when sprig.lock is missing or stale
        #[arg(long)]
        frozen: bool,
        /// Show the plan without writing sprig.lock
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the resolved dependency tree
    Tree,
    /// Validate the manifest, settings and lock file
    Check,
    /// Show version information
    Version,
}

/// Flags shared by every command that resolves
#[derive(Args, Debug, Clone, Default)]
pub struct ResolveArgs {
    /// Feature groups to activate
    #[arg(long, global = true, value_delimiter = ',')]
    pub features: Vec<String>,

    /// Activate every feature group
    #[arg(long, global = true)]
    pub all_features: bool,

    /// Leave out dev-dependencies
    #[arg(long, global = true)]
    pub no_dev: bool,

    /// Override a target environment key
    #[arg(long = "env", global = true, value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub environment: Vec<(String, String)>,

    /// Consider pre-release versions during selection
    #[arg(long, global = true)]
    pub allow_prereleases: bool,

    /// Package index directory
    #[arg(long, global = true, value_name = "DIR")]
    pub index: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        },
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.log_format);
    setup_panic_handler();

    info!("Starting sprig v{}", env!("CARGO_PKG_VERSION"));

    let runtime = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
    let outcome = runtime.block_on(run_cli(cli));

    Ok(match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(SprigError::Cancelled) => ExitCode::from(EXIT_INTERRUPTED),
        Err(err) => {
            eprintln!("{}", ErrorFormatter::new().format_error(&err));
            ExitCode::FAILURE
        },
    })
}

async fn run_cli(cli: Cli) -> SprigResult<()> {
    let ctx = CommandContext::new(cli.resolve)?;
    commands::dispatch_command(cli.command, &ctx).await
}

fn setup_logging(verbose: bool, format: LogFormat) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "sprig={level},sprig_cli={level},sprig_core={level},sprig_config={level},\
             sprig_registry={level},sprig_resolver={level},sprig_lockfile={level}"
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("sprig encountered an unexpected error: {}", panic_info);
        eprintln!("sprig crashed! This is a bug.");
        eprintln!("Please report this at: https://github.com/sprig-pm/sprig/issues");
        eprintln!("Error: {}", panic_info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "sprig",
            "install",
            "--frozen",
            "--features",
            "tls,cli",
            "--env",
            "os=windows",
            "--no-dev",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Install { frozen: true, dry_run: false }));
        assert_eq!(cli.resolve.features, vec!["tls", "cli"]);
        assert_eq!(
            cli.resolve.environment,
            vec![("os".to_string(), "windows".to_string())]
        );
        assert!(cli.resolve.no_dev);
        assert!(!cli.resolve.all_features);
    }

    #[test]
    fn test_rejects_bad_env_override() {
        assert!(Cli::try_parse_from(["sprig", "lock", "--env", "novalue"]).is_err());
        assert!(Cli::try_parse_from(["sprig", "lock", "--env", "=x"]).is_err());
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("python_version = 3.11"),
            Ok(("python_version".to_string(), "3.11".to_string()))
        );
        assert_eq!(parse_key_value("empty="), Ok(("empty".to_string(), String::new())));
    }
}
