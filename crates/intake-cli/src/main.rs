//! CLI application for email invoice intake.

mod commands;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::builder::{PossibleValue, PossibleValuesParser, TypedValueParser};
use clap::{Parser, Subcommand};
use console::style;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use intake_core::{LogLevel, RuntimeConfig};

use commands::{config, run};

/// Invoice intake - turn an invoice email into a Customer Service notification
#[derive(Parser)]
#[command(name = "invoice-intake")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Show progress and stream the model output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Console log level
    #[arg(long, global = true, ignore_case = true, value_parser = log_level_parser())]
    log_level: Option<LogLevel>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Inbound email record (overrides paths.email)
    #[arg(long, global = true)]
    email: Option<PathBuf>,

    /// Directory for notification files (overrides paths.outputs_dir)
    #[arg(long, global = true)]
    outputs_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config(config::ConfigArgs),
}

/// Accepts the level names plus the short aliases `LogLevel` parses.
fn log_level_parser() -> impl TypedValueParser<Value = LogLevel> {
    PossibleValuesParser::new([
        PossibleValue::new("minimal").aliases(["min", "0"]),
        PossibleValue::new("verbose").aliases(["v", "1"]),
        PossibleValue::new("debug").aliases(["d", "2"]),
    ])
    .try_map(|s| s.parse::<LogLevel>())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Keys may live in a .env file; real environment variables win
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", style("[ERROR]").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    let runtime = RuntimeConfig::new(cli.log_level, cli.verbose, !cli.no_color);
    init_tracing(&runtime)?;

    let (mut config, source) = commands::load_config(cli.config.as_deref())?;
    if let Some(email) = cli.email {
        config.paths.email = email;
    }
    if let Some(outputs_dir) = cli.outputs_dir {
        config.paths.outputs_dir = outputs_dir;
    }

    match cli.command {
        None => run::run(config, runtime).await,
        Some(Commands::Config(args)) => {
            config::run(args, &config, source.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(runtime: &RuntimeConfig) -> anyhow::Result<()> {
    let level = match runtime.log_level {
        LogLevel::Minimal => LevelFilter::WARN,
        LogLevel::Verbose => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
    };

    // RUST_LOG, when set, replaces the level derived from the flags
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(runtime.color)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}
