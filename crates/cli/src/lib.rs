pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use procureflow_core::config::{AppConfig, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "procureflow",
    about = "ProcureFlow requisition CLI",
    long_about = "Price purchase requisition drafts, resolve their approval chains, and submit them for approval.",
    after_help = "Examples:\n  procureflow price draft.json\n  procureflow route --department IT --amount RM1,250.00\n  procureflow submit draft.json --requestor \"Jane Smith\"\n  procureflow config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Compute line, subtotal, tax, and grand totals for a draft JSON file")]
    Price {
        #[arg(help = "Path to the requisition draft JSON document")]
        path: PathBuf,
    },
    #[command(about = "Resolve the ordered approval chain for a department and amount")]
    Route {
        #[arg(long, help = "Requesting department, e.g. IT or Finance")]
        department: String,
        #[arg(long, help = "Grand total to route, e.g. 1250.00 or RM1,250.00")]
        amount: String,
    },
    #[command(about = "Validate, price, route, and submit a draft; notifies the approvers")]
    Submit {
        #[arg(help = "Path to the requisition draft JSON document")]
        path: PathBuf,
        #[arg(long, help = "Name of the person submitting the requisition")]
        requestor: String,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // A broken config is reported by the command itself; logging falls back
    // to defaults so that report still reaches stderr.
    let logging_config = AppConfig::load(LoadOptions::default()).unwrap_or_default();
    init_logging(&logging_config);

    let result = match cli.command {
        Command::Price { path } => commands::price::run(&path),
        Command::Route { department, amount } => commands::route::run(&department, &amount),
        Command::Submit { path, requestor } => commands::submit::run(&path, &requestor),
        Command::Config => commands::config::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout carries only the JSON command payload.
pub fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let result = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(error) = result {
        eprintln!("logging already initialized: {error}");
    }
}
