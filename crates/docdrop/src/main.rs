use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tracing::{error, info, warn};

use docdrop::{
    init_logging, load_config, Controller, DocdropError, LogFormat, RunMode, WorkerError,
};

/// Loads staged JSON/YAML documents into a CouchDB-compatible store.
///
/// Files dropped into the staging directory are claimed into processing,
/// upserted, and moved to completed/ or failed/ with the outcome encoded
/// in the file name.
#[derive(Parser)]
#[command(name = "docdrop")]
#[command(version, about)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, env = "DOCDROP_CONFIG")]
    config: PathBuf,

    /// Keep watching the staging directory (overrides `mode`)
    #[arg(long, conflicts_with = "batch")]
    watch: bool,

    /// Drain the staging directory once and exit (overrides `mode`)
    #[arg(long)]
    batch: bool,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG wins when set.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Log output format: text or json
    #[arg(long, default_value = "text")]
    log_format: LogFormat,
}

const EXIT_STARTUP_FAILURE: u8 = 1;
const EXIT_DRAIN_TIMEOUT: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.log_format) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::from(EXIT_STARTUP_FAILURE);
    }

    info!("Starting docdrop v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load {}: {}", cli.config.display(), e);
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
    };
    if cli.watch {
        config.mode = RunMode::Watch;
    } else if cli.batch {
        config.mode = RunMode::Batch;
    }

    let controller = match Controller::from_config(&config) {
        Ok(controller) => controller,
        Err(e) => {
            error!("Failed to start pipeline: {}", e);
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
    };

    let token = controller.cancellation_token();
    if let Err(e) = ctrlc::set_handler(move || {
        if !token.is_cancelled() {
            warn!("Interrupt received, finishing in-flight files...");
        }
        token.cancel();
    }) {
        error!("Failed to install signal handler: {}", e);
        return ExitCode::from(EXIT_STARTUP_FAILURE);
    }

    match controller.run() {
        Ok(summary) => {
            if summary.relocation_failed > 0 {
                warn!(
                    "{} files could not be moved out of {}",
                    summary.relocation_failed,
                    config.directories.processing.display()
                );
            }
            ExitCode::SUCCESS
        }
        Err(DocdropError::Worker(WorkerError::DrainTimeout(timeout))) => {
            error!("In-flight files did not finish within {:?}", timeout);
            ExitCode::from(EXIT_DRAIN_TIMEOUT)
        }
        Err(e) => {
            error!("Pipeline failed: {}", e);
            ExitCode::from(EXIT_STARTUP_FAILURE)
        }
    }
}
