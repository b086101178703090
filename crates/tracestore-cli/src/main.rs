use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracestore_core::StoreSettings;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(
    name = "tracestore",
    version,
    about = "Inspect, edit and merge trace stores"
)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: output::OutputFormat,

    /// Store settings file (JSON)
    #[arg(long, global = true, env = "TRACESTORE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(path: Option<&PathBuf>) -> Result<StoreSettings> {
    match path {
        Some(path) => StoreSettings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => Ok(StoreSettings::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let settings = load_settings(cli.config.as_ref())?;

    match &cli.command {
        commands::Commands::Peek(args) => commands::peek::run(args, &settings, cli.format),
        commands::Commands::Merge(args) => commands::merge::run(args, &settings),
        commands::Commands::Show(args) => commands::show::run(args, &settings, cli.format),
        commands::Commands::Set(args) => commands::set::run(args, &settings),
        commands::Commands::Validate(args) => commands::validate::run(args, &settings, cli.format),
    }
}
