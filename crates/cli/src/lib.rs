pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use reqdraft_core::config::{AppConfig, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "reqdraft",
    about = "Reqdraft operator CLI",
    long_about = "Inspect configuration, check backend readiness, probe catalog domains, and \
                  preview the next requisition number.",
    after_help = "Examples:\n  reqdraft doctor --json\n  reqdraft probe product\n  reqdraft probe item_description --product 15\n  reqdraft reserve"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with redaction")]
    Config,
    #[command(about = "Validate config and backend reachability checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Resolve one catalog domain through its candidate endpoints")]
    Probe {
        #[arg(help = "Domain name, e.g. product, unit_of_measure, item_description")]
        domain: String,
        #[arg(long, help = "Parent product id for scoped domains")]
        product: Option<String>,
    },
    #[command(about = "Compute the provisional number the next draft would display")]
    Reserve,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Probe { domain, product } => commands::probe::run(&domain, product.as_deref()),
        Command::Reserve => commands::reserve::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn init_logging() {
    // Logging follows the same config the commands run under; a config error
    // here is left for the command itself to report.
    let Ok(config) = AppConfig::load(LoadOptions::default()) else {
        return;
    };

    let log_level = config.logging.level.parse::<tracing::Level>().unwrap_or(tracing::Level::INFO);
    match config.logging.format {
        LogFormat::Compact => {
            let _ = tracing_subscriber::fmt()
                .with_target(false)
                .with_max_level(log_level)
                .compact()
                .try_init();
        }
        LogFormat::Pretty => {
            let _ = tracing_subscriber::fmt()
                .with_target(false)
                .with_max_level(log_level)
                .pretty()
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .with_target(false)
                .with_max_level(log_level)
                .json()
                .try_init();
        }
    }
}
