//! CLI module for scrapeflow
//!
//! Provides subcommands:
//! - `run`: execute workflow definitions and report the outcome
//! - `validate`: check definitions without touching the network

pub mod run;
pub mod validate;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// scrapeflow - declarative scraping workflows
#[derive(Parser)]
#[command(name = "scrapeflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run workflow definitions
    Run(run::RunArgs),

    /// Validate workflow definitions
    Validate(validate::ValidateArgs),
}

/// Cancel `token` on Ctrl+C or SIGTERM
pub fn cancel_on_shutdown(token: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        token.cancel();
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping at the next action");
        }
        _ = terminate => {
            info!("Received SIGTERM, stopping at the next action");
        }
    }
}
