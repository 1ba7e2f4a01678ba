//! Driver metrics
//!
//! Prometheus gauges fed from capture and synchronizer snapshots, plus an
//! in-memory aggregator of consumer-side sample rates and intervals.

use std::collections::BTreeMap;
use std::fmt;

use contracts::{scale_to_ppm, CaptureMetricsSnapshot, SensorKind, SyncSnapshot};
use metrics::{counter, gauge, histogram};

/// Record the synchronizer state of one device
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_sync_snapshot;
///
/// record_sync_snapshot(capture.serial_number(), &capture.sync_snapshot());
/// ```
pub fn record_sync_snapshot(serial_number: u32, snapshot: &SyncSnapshot) {
    let serial = serial_number.to_string();

    gauge!("zed_sensors_sync_scale", "serial" => serial.clone()).set(snapshot.scale);
    gauge!("zed_sensors_sync_drift_ppm", "serial" => serial.clone())
        .set(scale_to_ppm(snapshot.scale));
    gauge!("zed_sensors_sync_video_offset_ms", "serial" => serial.clone())
        .set(snapshot.video_offset_ns as f64 / 1e6);
    gauge!("zed_sensors_sync_pending_pairs", "serial" => serial.clone())
        .set(snapshot.pending_pairs as f64);
    gauge!("zed_sensors_sync_adjustments", "serial" => serial)
        .set(f64::from(snapshot.adjustments));
}

/// Record the acquisition counters of one device as gauges
pub fn record_capture_snapshot(serial_number: u32, snapshot: &CaptureMetricsSnapshot) {
    let serial = serial_number.to_string();

    gauge!("zed_sensors_reports_read", "serial" => serial.clone())
        .set(snapshot.reports_read as f64);
    gauge!("zed_sensors_failed_reads", "serial" => serial.clone())
        .set(snapshot.failed_reads() as f64);
    for kind in SensorKind::ALL {
        gauge!(
            "zed_sensors_samples_published",
            "serial" => serial.clone(),
            "kind" => kind.as_str()
        )
        .set(snapshot.published(kind) as f64);
    }
}

/// Record one sample seen by a consumer
pub fn record_sample_consumed(kind: SensorKind, latency_ms: f64) {
    counter!("zed_sensors_samples_consumed_total", "kind" => kind.as_str()).increment(1);
    histogram!("zed_sensors_sample_latency_ms", "kind" => kind.as_str()).record(latency_ms);
}

/// Consumer-side rate aggregator
///
/// Tracks, per data kind, how many samples a consumer received and the
/// spacing of their timestamps.
#[derive(Debug, Clone, Default)]
pub struct SampleRateAggregator {
    kinds: BTreeMap<SensorKind, KindStats>,
}

#[derive(Debug, Clone, Default)]
struct KindStats {
    count: u64,
    last_timestamp_ns: Option<u64>,
    interval_ms: RunningStats,
    backwards: u64,
}

impl SampleRateAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account one received sample
    pub fn update(&mut self, kind: SensorKind, timestamp_ns: u64) {
        let stats = self.kinds.entry(kind).or_default();
        stats.count += 1;
        if let Some(last) = stats.last_timestamp_ns {
            if timestamp_ns >= last {
                stats.interval_ms.push((timestamp_ns - last) as f64 / 1e6);
            } else {
                stats.backwards += 1;
            }
        }
        stats.last_timestamp_ns = Some(timestamp_ns);
    }

    pub fn count(&self, kind: SensorKind) -> u64 {
        self.kinds.get(&kind).map_or(0, |s| s.count)
    }

    /// Summary over a run of `elapsed_secs`
    pub fn summary(&self, elapsed_secs: f64) -> RateSummary {
        let kinds = self
            .kinds
            .iter()
            .map(|(kind, stats)| KindSummary {
                kind: *kind,
                count: stats.count,
                rate_hz: if elapsed_secs > 0.0 {
                    stats.count as f64 / elapsed_secs
                } else {
                    0.0
                },
                interval_ms: StatsSummary::from(&stats.interval_ms),
                backwards: stats.backwards,
            })
            .collect();
        RateSummary {
            elapsed_secs,
            kinds,
        }
    }

    pub fn reset(&mut self) {
        self.kinds.clear();
    }
}

/// Per-kind part of a `RateSummary`
#[derive(Debug, Clone)]
pub struct KindSummary {
    pub kind: SensorKind,
    pub count: u64,
    pub rate_hz: f64,
    pub interval_ms: StatsSummary,
    /// Timestamps older than their predecessor
    pub backwards: u64,
}

/// Consumer-side rate summary
#[derive(Debug, Clone, Default)]
pub struct RateSummary {
    pub elapsed_secs: f64,
    pub kinds: Vec<KindSummary>,
}

impl RateSummary {
    pub fn get(&self, kind: SensorKind) -> Option<&KindSummary> {
        self.kinds.iter().find(|k| k.kind == kind)
    }
}

impl fmt::Display for RateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Sample Rate Summary ({:.1}s) ===", self.elapsed_secs)?;
        if self.kinds.is_empty() {
            return writeln!(f, "no samples received");
        }
        for kind in &self.kinds {
            writeln!(
                f,
                "{:<20} {:>8} samples {:>9.2} Hz  interval(ms): {}",
                kind.kind.as_str(),
                kind.count,
                kind.rate_hz,
                kind.interval_ms
            )?;
            if kind.backwards > 0 {
                writeln!(f, "{:<20} {} timestamps went backwards", "", kind.backwards)?;
            }
        }
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            return write!(f, "N/A");
        }
        write!(
            f,
            "min={:.3}, max={:.3}, mean={:.3}, std={:.3}",
            self.min, self.max, self.mean, self.std_dev
        )
    }
}

/// Online mean and variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
