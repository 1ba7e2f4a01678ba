//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ZED Sensors - sensor MCU acquisition for ZED stereo cameras
#[derive(Parser, Debug)]
#[command(
    name = "zed-sensors",
    author,
    version,
    about = "ZED camera sensor MCU acquisition",
    long_about = "Streams IMU, magnetometer, environmental and board-temperature data from the\n\
                  sensor MCU of a ZED camera, aligned to the host clock.\n\n\
                  Without hardware access the driver runs against a synthetic device or\n\
                  replays a recorded report dump."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "ZED_SENSORS_VERBOSE")]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "ZED_SENSORS_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open a device and stream sensor data
    Run(RunArgs),

    /// Validate a configuration file without opening a device
    Validate(ValidateArgs),

    /// Display the effective configuration and attached devices
    Info(InfoArgs),

    /// Write a synthetic report dump usable with `run --replay`
    Record(RecordArgs),
}

/// Where reports come from
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Replay a report dump instead of the synthetic device
    #[arg(long, env = "ZED_SENSORS_REPLAY")]
    pub replay: Option<PathBuf>,

    /// Replay pacing in reports per second (0 = as fast as possible)
    #[arg(long, default_value = "800", env = "ZED_SENSORS_REPLAY_RATE")]
    pub replay_rate: f64,

    /// Restart the dump from the beginning when it ends
    #[arg(long)]
    pub replay_loop: bool,

    /// Serial number reported by the synthetic or replayed device
    #[arg(long, default_value = "28470615", env = "ZED_SENSORS_DEVICE_SERIAL")]
    pub device_serial: u32,

    /// Firmware version reported by the device, as `major.minor`
    #[arg(long, default_value = "3.9")]
    pub firmware: String,

    /// Camera model reported by the device
    #[arg(long, value_enum, default_value = "zed2")]
    pub model: ModelArg,
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); defaults apply when absent
    #[arg(short, long, env = "ZED_SENSORS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Serial number of the device to open (overrides the config file)
    #[arg(long, env = "ZED_SENSORS_SERIAL")]
    pub serial: Option<u32>,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Streaming duration in seconds (0 = until Ctrl-C)
    #[arg(short, long, default_value = "0", env = "ZED_SENSORS_DURATION")]
    pub duration: u64,

    /// Print every Nth inertial sample (0 = none)
    #[arg(long, default_value = "400")]
    pub print_every: u64,

    /// Bound on each inertial sample wait in milliseconds
    #[arg(long, default_value = "50")]
    pub poll_timeout_ms: u64,

    /// Raise recoverable protocol warnings to warn level
    #[arg(long)]
    pub verbose_protocol: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "ZED_SENSORS_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "zed-sensors.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file; defaults apply when absent
    #[arg(short, long, env = "ZED_SENSORS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `record` command
#[derive(Parser, Debug)]
pub struct RecordArgs {
    /// Output dump file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Number of reports to write
    #[arg(short = 'n', long, default_value = "8000")]
    pub reports: u64,

    /// Reports between frame-sync pulses (0 = no pulses)
    #[arg(long, default_value = "27")]
    pub sync_every: u64,

    /// Corrupt every Nth report id (0 = none)
    #[arg(long, default_value = "0")]
    pub corrupt_every: u64,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

/// Camera model of a simulated device
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ModelArg {
    ZedMini,
    Zed2,
    Zed2i,
}
