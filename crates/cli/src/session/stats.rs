//! Run statistics.

use std::time::Duration;

use contracts::{scale_to_ppm, CaptureMetricsSnapshot, SensorKind, SyncSnapshot};
use observability::SampleRateAggregator;

/// Statistics from one streaming run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub serial_number: u32,

    /// Wall time between open and stop
    pub duration: Duration,

    /// Acquisition-side counters at stop
    pub capture: CaptureMetricsSnapshot,

    /// Synchronizer state at stop
    pub sync: SyncSnapshot,

    /// Consumer-side sample statistics
    pub rates: SampleRateAggregator,
}

impl RunStats {
    /// Inertial samples received per second by the consumer
    pub fn imu_rate_hz(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.rates.count(SensorKind::Imu) as f64 / secs
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        let c = &self.capture;
        println!("\n=================== Capture Statistics ===================\n");

        println!("Device {}", self.serial_number);
        println!("   |- Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   |- Reports read: {}", c.reports_read);
        println!(
            "   |- Failed reads: {} (timeouts {}, transport {}, decode {}, short {})",
            c.failed_reads(),
            c.timeouts,
            c.transport_errors,
            c.decode_errors,
            c.short_reads
        );
        println!("   `- Pings: {} sent, {} failed", c.pings_sent, c.ping_failures);

        println!("\nPublished");
        for kind in SensorKind::ALL {
            println!("   |- {:<20} {}", kind.as_str(), c.published(kind));
        }

        println!("\nClock sync");
        println!(
            "   |- Scale: {:.6} ({:+.1} ppm)",
            self.sync.scale,
            scale_to_ppm(self.sync.scale)
        );
        println!("   |- Adjustments: {}", self.sync.adjustments);
        println!("   |- Sync events: {}", self.sync.sync_events);
        println!(
            "   `- Video offset: {:.3} ms",
            self.sync.video_offset_ns as f64 / 1e6
        );

        println!("\n{}", self.rates.summary(self.duration.as_secs_f64()));
    }
}
