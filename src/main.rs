//! WFST Decoder - Viterbi decoding of acoustic cost tables over a recognition graph.
//!
//! Loads a decoding graph and its symbol tables, decodes every observation file
//! in a directory, and reports word error rate and timing for the batch.

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::LocalTime;

use wfst_decoder::batch::{discover_sessions, run_batch};
use wfst_decoder::config::AppConfig;
use wfst_decoder::decoder::Decoder;
use wfst_decoder::wfst::{Automaton, read_att};

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn wait_for_shutdown(cancel: CancellationToken) {
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("🛑 Received Ctrl+C, finishing running sessions...");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        warn!("Failed to register SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("🛑 Received SIGTERM, finishing running sessions...");
        }
        _ = cancel.cancelled() => return,
    }

    cancel.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments (and the config file, if any)
    let config = match AppConfig::from_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };

    // Respect RUST_LOG env var, fallback to verbose flag, default to info
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(if config.verbose { "debug" } else { "info" }))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(LocalTime::new(time::macros::format_description!("[hour]:[minute]:[second]")))
        .init();

    info!("🔎 WFST Decoder v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = config.validate() {
        error!("❌ Configuration error: {}", e);
        std::process::exit(1);
    }
    config.log_config();

    let fst = match read_att(&config.fst_path(), &config.isyms_path(), &config.osyms_path()) {
        Ok(fst) => fst,
        Err(e) => {
            error!("❌ Failed to load decoding graph: {}", e);
            std::process::exit(1);
        }
    };
    info!("Loaded decoding graph: {} states, {} arcs", fst.num_states(), fst.num_arcs());

    let decoder = match Decoder::new(fst, config.search_config()) {
        Ok(decoder) => Arc::new(decoder),
        Err(e) => {
            error!("❌ Malformed decoding graph: {}", e);
            std::process::exit(1);
        }
    };

    let inputs = discover_sessions(&config.observations_path())?;
    if inputs.is_empty() {
        warn!("No observation files found in {}", config.observations_path().display());
    }

    let cancel = CancellationToken::new();
    let shutdown_handle = tokio::spawn(wait_for_shutdown(cancel.clone()));

    let report = run_batch(decoder, inputs, config.jobs, cancel.clone()).await?;

    // Stop listening for signals once the batch is done
    cancel.cancel();
    let _ = shutdown_handle.await;

    report.log_summary();
    if let Some(ref output) = config.output {
        report.write_json(output)?;
        info!("Report written to {}", output.display());
    }

    Ok(())
}
