//! Video Sync Example
//!
//! Pairs the synthetic sensor device with a simulated video pipeline whose
//! frames trail the sensor timeline, and shows the offset correction pulling
//! sensor timestamps onto the video timeline.
//!
//! Run with: cargo run -p demos --bin video_sync_capture

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use capture::{MockHidBackend, SensorCapture, SyntheticReports, REPORT_RATE_HZ};
use contracts::{CaptureConfig, DeviceInfo, FirmwareVersion, VideoClock, PID_MCU_ZED_2};
use tracing::info;

/// Latency of the simulated video pipeline
const VIDEO_LAG: Duration = Duration::from_millis(12);

fn main() -> Result<()> {
    observability::init(&observability::ObservabilityConfig::default())?;

    let device = DeviceInfo {
        serial_number: 21_000_007,
        product_id: PID_MCU_ZED_2,
        firmware: FirmwareVersion::new(3, 9),
    };
    let (backend, _probe) =
        MockHidBackend::synthetic(device, SyntheticReports::default(), Some(REPORT_RATE_HZ));

    // last frame timestamp = host wall clock minus the pipeline lag
    let video: Arc<dyn VideoClock> = Arc::new(|| {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos() as u64);
        now.saturating_sub(VIDEO_LAG.as_nanos() as u64)
    });

    let config = CaptureConfig {
        video_sync: true,
        ..Default::default()
    };
    let mut capture = SensorCapture::open(config, &backend, Some(video))?;

    let started = Instant::now();
    let mut last_offset = 0;
    while started.elapsed() < Duration::from_secs(2) {
        std::thread::sleep(Duration::from_millis(100));
        let snapshot = capture.sync_snapshot();
        if snapshot.video_offset_ns != last_offset {
            info!(
                sync_events = snapshot.sync_events,
                video_offset_ms = snapshot.video_offset_ns as f64 / 1e6,
                "Video offset corrected"
            );
            last_offset = snapshot.video_offset_ns;
        }
    }

    capture.stop();
    let snapshot = capture.sync_snapshot();
    info!(
        sync_events = snapshot.sync_events,
        video_offset_ms = snapshot.video_offset_ns as f64 / 1e6,
        expected_ms = VIDEO_LAG.as_secs_f64() * 1e3,
        "Done"
    );
    Ok(())
}
