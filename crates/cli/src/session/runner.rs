//! Streaming session runner - opens the device and drives the consumer side.
//!
//! The acquisition thread belongs to `SensorCapture`; the runner adds one
//! blocking consumer task that polls every channel, feeds the rate
//! aggregator and the Prometheus gauges, and prints samples.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use capture::SensorCapture;
use contracts::{CaptureConfig, HidBackend, Sample, SensorKind};
use observability::{
    record_capture_snapshot, record_sample_consumed, record_sync_snapshot, SampleRateAggregator,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::RunStats;
use crate::error::{CliError, Result};

/// Gauges refresh period
const SNAPSHOT_PERIOD: Duration = Duration::from_secs(1);

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub capture: CaptureConfig,

    /// Stop after this long (None = until stopped)
    pub duration: Option<Duration>,

    /// Print every Nth inertial sample (0 = none)
    pub print_every: u64,

    /// Bound on each inertial wait
    pub poll_timeout: Duration,
}

/// A running consumer task
pub struct RunningSession {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<RunStats>,
}

impl RunningSession {
    /// Ask the consumer to finish; `wait` returns shortly after
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn handle_mut(&mut self) -> &mut JoinHandle<RunStats> {
        &mut self.handle
    }

    pub async fn wait(self) -> Result<RunStats> {
        self.handle
            .await
            .map_err(|e| CliError::consumer(e.to_string()))
    }
}

/// Open the device and start consuming
///
/// Must be called from within a tokio runtime. Video sync is refused: the
/// CLI has no video pipeline to supply frame timestamps.
pub fn start(config: RunConfig, backend: &dyn HidBackend) -> Result<RunningSession> {
    if config.capture.video_sync {
        return Err(CliError::invalid_argument(
            "video_sync",
            "the CLI has no video source; video sync needs a camera pipeline",
        ));
    }
    let capture = SensorCapture::open(config.capture.clone(), backend, None)?;
    info!(
        serial_number = capture.serial_number(),
        model = %capture.device_model(),
        firmware = %capture.firmware_version(),
        stream_enabled = capture.is_data_stream_enabled(),
        "Device opened"
    );

    let stop = Arc::new(AtomicBool::new(false));
    let consumer_stop = stop.clone();
    let handle = tokio::task::spawn_blocking(move || consume(capture, &config, &consumer_stop));

    Ok(RunningSession { stop, handle })
}

fn consume(mut capture: SensorCapture, config: &RunConfig, stop: &AtomicBool) -> RunStats {
    let started = Instant::now();
    let mut rates = SampleRateAggregator::new();
    let mut last_snapshot = Instant::now();
    let serial_number = capture.serial_number();

    while !stop.load(Ordering::Acquire) {
        if config.duration.is_some_and(|d| started.elapsed() >= d) {
            info!("Requested duration reached");
            break;
        }

        if let Some(imu) = capture.get_last_imu(config.poll_timeout) {
            observe(&mut rates, &imu);
            if imu.motion.falling {
                warn!(falling_count = imu.motion.falling_count, "free fall detected");
            }
            let count = rates.count(SensorKind::Imu);
            if config.print_every > 0 && count % config.print_every == 0 {
                println!(
                    "[imu #{count}] t={} acc=({:+.3}, {:+.3}, {:+.3}) m/s2 gyro=({:+.3}, {:+.3}, {:+.3}) deg/s temp={:.2}C",
                    imu.timestamp_ns,
                    imu.accel.x,
                    imu.accel.y,
                    imu.accel.z,
                    imu.gyro.x,
                    imu.gyro.y,
                    imu.gyro.z,
                    imu.temperature_c
                );
            }
        }
        if let Some(mag) = capture.get_last_mag(Duration::ZERO) {
            observe(&mut rates, &mag);
        }
        if let Some(env) = capture.get_last_env(Duration::ZERO) {
            observe(&mut rates, &env);
            debug!(
                temperature_c = env.temperature_c,
                pressure_hpa = env.pressure_hpa,
                humidity_pct = env.humidity_pct,
                "environment sample"
            );
        }
        if let Some(cam_temp) = capture.get_last_cam_temp(Duration::ZERO) {
            observe(&mut rates, &cam_temp);
        }

        if last_snapshot.elapsed() >= SNAPSHOT_PERIOD {
            record_capture_snapshot(serial_number, &capture.metrics());
            record_sync_snapshot(serial_number, &capture.sync_snapshot());
            last_snapshot = Instant::now();
        }
    }

    capture.stop();

    RunStats {
        serial_number,
        duration: started.elapsed(),
        capture: capture.metrics(),
        sync: capture.sync_snapshot(),
        rates,
    }
}

fn observe<T: Sample>(rates: &mut SampleRateAggregator, sample: &T) {
    rates.update(T::KIND, sample.timestamp_ns());
    record_sample_consumed(T::KIND, latency_ms(sample.timestamp_ns()));
}

/// Host time elapsed since `timestamp_ns`, zero for timestamps in the future
fn latency_ms(timestamp_ns: u64) -> f64 {
    let now_ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64);
    now_ns.saturating_sub(timestamp_ns) as f64 / 1e6
}
