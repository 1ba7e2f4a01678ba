//! Mock Capture Example
//!
//! Streams from the synthetic 800 Hz sensor device for a few seconds and
//! prints what a consumer sees. No camera required.
//!
//! Run with: cargo run -p demos --bin mock_capture [config_path]

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use capture::{MockHidBackend, SensorCapture, SyntheticReports, REPORT_RATE_HZ};
use config_loader::ConfigLoader;
use contracts::{CaptureConfig, DeviceInfo, FirmwareVersion, SensorKind, PID_MCU_ZED_2I};
use observability::SampleRateAggregator;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

const RUN_FOR: Duration = Duration::from_secs(3);

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_thread_names(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Mock Capture Demo");

    // ==== Stage 1: Configuration ====
    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => ConfigLoader::load_from_path(&path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => CaptureConfig::default(),
    };

    // ==== Stage 2: Synthetic device ====
    let device = DeviceInfo {
        serial_number: 38_100_042,
        product_id: PID_MCU_ZED_2I,
        firmware: FirmwareVersion::new(4, 1),
    };
    let (backend, probe) =
        MockHidBackend::synthetic(device, SyntheticReports::default(), Some(REPORT_RATE_HZ));

    for found in SensorCapture::enumerate_devices(&backend)? {
        info!(
            serial_number = found.serial_number,
            model = %found.model(),
            firmware = %found.firmware,
            "Device found"
        );
    }

    // ==== Stage 3: Stream ====
    let mut capture = SensorCapture::open(config, &backend, None)?;
    let mut rates = SampleRateAggregator::new();
    let started = Instant::now();

    while started.elapsed() < RUN_FOR {
        if let Some(imu) = capture.get_last_imu(Duration::from_millis(10)) {
            rates.update(SensorKind::Imu, imu.timestamp_ns);
            if rates.count(SensorKind::Imu) % 200 == 0 {
                info!(
                    timestamp_ns = imu.timestamp_ns,
                    accel_z = format!("{:.3}", imu.accel.z),
                    gyro_x = format!("{:.3}", imu.gyro.x),
                    "imu"
                );
            }
        }
        if let Some(mag) = capture.get_last_mag(Duration::ZERO) {
            rates.update(SensorKind::Magnetometer, mag.timestamp_ns);
        }
        if let Some(env) = capture.get_last_env(Duration::ZERO) {
            rates.update(SensorKind::Environment, env.timestamp_ns);
            info!(
                temperature_c = env.temperature_c,
                pressure_hpa = env.pressure_hpa,
                humidity_pct = env.humidity_pct,
                "environment"
            );
        }
        if let Some(temp) = capture.get_last_cam_temp(Duration::ZERO) {
            rates.update(SensorKind::CameraTemperature, temp.timestamp_ns);
        }
    }

    // ==== Stage 4: Shutdown ====
    capture.stop();
    let metrics = capture.metrics();
    info!(
        reports = metrics.reports_read,
        pings = probe.pings(),
        scale = capture.sync_snapshot().scale,
        "Capture stopped"
    );
    println!("{}", rates.summary(started.elapsed().as_secs_f64()));

    Ok(())
}
