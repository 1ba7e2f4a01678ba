//! Capture metrics
//!
//! Atomic counters updated by the acquisition thread. Every `record_*` also
//! feeds the `metrics` facade so an installed exporter sees the same numbers.

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{CaptureMetricsSnapshot, SensorKind};
use metrics::counter;

/// Acquisition loop metrics
#[derive(Debug, Default)]
pub struct CaptureMetrics {
    /// Reports read from the transport (any content)
    pub reports_read: AtomicU64,

    /// Reports with a wrong id
    pub decode_errors: AtomicU64,

    /// Reports shorter than the packed layout
    pub short_reads: AtomicU64,

    /// Reads that returned nothing within the bound
    pub timeouts: AtomicU64,

    /// Transport failures below protocol level
    pub transport_errors: AtomicU64,

    /// Keep-alive pings sent
    pub pings_sent: AtomicU64,

    /// Keep-alive pings the transport rejected
    pub ping_failures: AtomicU64,

    pub imu_published: AtomicU64,
    pub mag_published: AtomicU64,
    pub env_published: AtomicU64,
    pub cam_temp_published: AtomicU64,

    /// Frame-sync events seen by the synchronizer
    pub sync_events: AtomicU64,

    /// Drift-scale adjustments applied
    pub scale_adjustments: AtomicU64,
}

impl CaptureMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_report(&self) {
        self.reports_read.fetch_add(1, Ordering::Relaxed);
        counter!("zed_sensors_reports_total").increment(1);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
        counter!("zed_sensors_protocol_errors_total", "kind" => "report_id").increment(1);
    }

    pub fn record_short_read(&self) {
        self.short_reads.fetch_add(1, Ordering::Relaxed);
        counter!("zed_sensors_protocol_errors_total", "kind" => "short_read").increment(1);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
        counter!("zed_sensors_read_timeouts_total").increment(1);
    }

    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
        counter!("zed_sensors_transport_errors_total").increment(1);
    }

    pub fn record_ping(&self, ok: bool) {
        if ok {
            self.pings_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.ping_failures.fetch_add(1, Ordering::Relaxed);
        }
        counter!("zed_sensors_pings_total", "status" => if ok { "ok" } else { "failed" })
            .increment(1);
    }

    pub fn record_publish(&self, kind: SensorKind) {
        let slot = match kind {
            SensorKind::Imu => &self.imu_published,
            SensorKind::Magnetometer => &self.mag_published,
            SensorKind::Environment => &self.env_published,
            SensorKind::CameraTemperature => &self.cam_temp_published,
        };
        slot.fetch_add(1, Ordering::Relaxed);
        counter!("zed_sensors_samples_published_total", "kind" => kind.as_str()).increment(1);
    }

    /// Mirror the synchronizer's running totals
    pub fn update_sync(&self, sync_events: u64, scale_adjustments: u64) {
        self.sync_events.store(sync_events, Ordering::Relaxed);
        self.scale_adjustments.store(scale_adjustments, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> CaptureMetricsSnapshot {
        CaptureMetricsSnapshot {
            reports_read: self.reports_read.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            short_reads: self.short_reads.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            pings_sent: self.pings_sent.load(Ordering::Relaxed),
            ping_failures: self.ping_failures.load(Ordering::Relaxed),
            imu_published: self.imu_published.load(Ordering::Relaxed),
            mag_published: self.mag_published.load(Ordering::Relaxed),
            env_published: self.env_published.load(Ordering::Relaxed),
            cam_temp_published: self.cam_temp_published.load(Ordering::Relaxed),
            sync_events: self.sync_events.load(Ordering::Relaxed),
            scale_adjustments: self.scale_adjustments.load(Ordering::Relaxed),
        }
    }
}
