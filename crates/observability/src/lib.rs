//! # Observability
//!
//! Logging and Prometheus setup shared by the `zed-sensors` binary and the
//! demos, plus the gauges and consumer-side statistics in [`metrics`].
//!
//! ## Example
//!
//! ```ignore
//! let config = ObservabilityConfig::default()
//!     .with_verbosity(1, false)
//!     .with_metrics_port(9000);
//! observability::init(&config)?;
//!
//! observability::record_sync_snapshot(capture.serial_number(), &capture.sync_snapshot());
//! ```

pub mod metrics;

use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use crate::metrics::{
    record_capture_snapshot, record_sample_consumed, record_sync_snapshot, KindSummary,
    RateSummary, RunningStats, SampleRateAggregator, StatsSummary,
};

/// Log line layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => bail!("unknown log format '{other}', expected json, pretty or compact"),
        }
    }
}

/// Process-wide logging and metrics settings
#[derive(Debug, Clone, PartialEq)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,

    /// Filter directives used when `RUST_LOG` is unset
    pub default_filter: String,

    /// Prometheus scrape endpoint (None = no exporter)
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Compact,
            default_filter: "info".to_string(),
            metrics_addr: None,
        }
    }
}

impl ObservabilityConfig {
    pub fn with_format(mut self, log_format: LogFormat) -> Self {
        self.log_format = log_format;
        self
    }

    /// `-q` keeps warnings and errors; each `-v` goes one level deeper
    pub fn with_verbosity(mut self, verbose: u8, quiet: bool) -> Self {
        let level = match (quiet, verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        };
        self.default_filter = level.to_string();
        self
    }

    /// Serve metrics on all interfaces; port 0 disables the exporter
    pub fn with_metrics_port(mut self, port: u16) -> Self {
        self.metrics_addr = (port != 0).then(|| SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)));
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_filter))
    }
}

/// Install the global subscriber and, when configured, the exporter
///
/// Fails if a global subscriber is already set.
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    tracing_subscriber::registry()
        .with(config.filter())
        .with(fmt_layer(config.log_format))
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(addr) = config.metrics_addr {
        install_prometheus(addr)?;
    }

    tracing::debug!(
        log_format = ?config.log_format,
        filter = %config.default_filter,
        metrics_addr = ?config.metrics_addr,
        "Observability initialized"
    );
    Ok(())
}

/// Install only the Prometheus recorder, for hosts that own tracing setup
pub fn install_prometheus(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("Failed to install Prometheus recorder on {addr}"))?;

    tracing::info!(%addr, "Prometheus metrics endpoint initialized");
    Ok(())
}

// acquisition threads are named after the device serial, so thread names stay on
fn fmt_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_thread_names(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_thread_names(true).boxed(),
    }
}
