//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::cli::RunArgs;
use crate::session::{self, RunConfig};

/// Execute the `run` command
pub async fn run_stream(args: &RunArgs) -> Result<()> {
    let mut config = session::load_config(args.config.as_deref())?;

    // Apply CLI overrides
    if let Some(serial) = args.serial {
        info!(serial, "Overriding serial number from CLI");
        config.serial_number = Some(serial);
    }
    if args.verbose_protocol {
        config.verbose = true;
    }

    info!(
        serial_number = ?config.serial_number,
        read_timeout_ms = config.read_timeout_ms,
        ping_interval = config.ping_interval,
        video_sync = config.video_sync,
        "Configuration loaded"
    );

    let metrics =
        observability::ObservabilityConfig::default().with_metrics_port(args.metrics_port);
    if let Some(addr) = metrics.metrics_addr {
        observability::install_prometheus(addr)?;
    }

    let backend = args.source.backend()?;
    let run_config = RunConfig {
        capture: config,
        duration: (args.duration > 0).then(|| Duration::from_secs(args.duration)),
        print_every: args.print_every,
        poll_timeout: Duration::from_millis(args.poll_timeout_ms),
    };

    let mut running =
        session::start(run_config, backend.as_ref()).context("Failed to start capture")?;
    info!("Streaming started, press Ctrl-C to stop");

    let finished = tokio::select! {
        joined = running.handle_mut() => Some(joined),
        _ = shutdown_signal() => None,
    };
    let stats = match finished {
        Some(joined) => joined.context("Consumer task failed")?,
        None => {
            warn!("Received shutdown signal, stopping capture...");
            running.request_stop();
            running.wait().await?
        }
    };

    info!(
        reports_read = stats.capture.reports_read,
        failed_reads = stats.capture.failed_reads(),
        imu_rate_hz = format!("{:.1}", stats.imu_rate_hz()),
        duration_secs = stats.duration.as_secs_f64(),
        "Capture finished"
    );
    stats.print_summary();
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
