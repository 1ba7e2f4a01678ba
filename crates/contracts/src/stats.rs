//! Capture counters snapshot

use serde::{Deserialize, Serialize};

use crate::SensorKind;

/// Point-in-time copy of the acquisition counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureMetricsSnapshot {
    pub reports_read: u64,
    pub decode_errors: u64,
    pub short_reads: u64,
    pub timeouts: u64,
    pub transport_errors: u64,
    pub pings_sent: u64,
    pub ping_failures: u64,
    pub imu_published: u64,
    pub mag_published: u64,
    pub env_published: u64,
    pub cam_temp_published: u64,
    pub sync_events: u64,
    pub scale_adjustments: u64,
}

impl CaptureMetricsSnapshot {
    pub fn published(&self, kind: SensorKind) -> u64 {
        match kind {
            SensorKind::Imu => self.imu_published,
            SensorKind::Magnetometer => self.mag_published,
            SensorKind::Environment => self.env_published,
            SensorKind::CameraTemperature => self.cam_temp_published,
        }
    }

    /// Reads that did not yield a usable report
    pub fn failed_reads(&self) -> u64 {
        self.decode_errors + self.short_reads + self.timeouts + self.transport_errors
    }
}
