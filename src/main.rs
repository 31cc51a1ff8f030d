//! fpp-guard
//!
//! Keeps a show-control device's status available while the device itself
//! comes and goes.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────┐
//!                 │                  fpp-guard                    │
//!                 │                                               │
//!   FPP device ◀──┼── poller ──────┐          ┌── dependent jobs ─┼──▶ FPP device
//!                 │                ▼          ▼                   │
//!                 │          ┌──────────────────────┐             │
//!                 │          │   circuit breaker    │──▶ state file
//!                 │          └──────────┬───────────┘             │
//!                 │                     ▼                         │
//!   consumers ◀───┼──── /status, /admin (snapshot + breaker)      │
//!                 └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use fpp_guard::config::loader::load_config;
use fpp_guard::config::validation::validate_config;
use fpp_guard::config::GuardConfig;
use fpp_guard::lifecycle::startup;
use fpp_guard::observability::{logging, metrics};
use fpp_guard::Shutdown;

#[derive(Parser)]
#[command(name = "fpp-guard", version, about = "Circuit-breaking status cache for an FPP device")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "FPP_GUARD_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => {
            let config = GuardConfig::default();
            if let Err(errors) = validate_config(&config) {
                for e in errors {
                    eprintln!("Invalid default configuration: {e}");
                }
                return ExitCode::FAILURE;
            }
            config
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "fpp-guard starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        device = %config.device.base_url,
        failure_threshold = config.breaker.failure_threshold,
        reset_timeout_ms = config.breaker.reset_timeout_ms,
        jobs = config.jobs.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    match startup::run(config, Shutdown::new()).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "fpp-guard failed");
            ExitCode::FAILURE
        }
    }
}
