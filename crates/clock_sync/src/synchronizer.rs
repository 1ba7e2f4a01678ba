//! Clock synchronizer
//!
//! Turns the MCU tick into a host-aligned timestamp:
//!
//! ```text
//! ts = origin - video_offset + Σ (tick[n] - tick[n-1]) · scale
//! ```
//!
//! `scale` is re-estimated from (host steady, origin + scaled ticks) pairs
//! captured on frame-sync events, so offset corrections never leak into the
//! drift slope; `video_offset` from the discrepancy between `ts` and the last
//! video frame at those same events.

use std::sync::Arc;

use contracts::{ClockSyncConfig, FrameSyncInfo, SyncSnapshot, VideoClock};
use tracing::{debug, info, instrument, warn};

use crate::clock::{HostClock, SystemHostClock};
use crate::drift::{DriftEstimator, SyncPair};
use crate::offset::OffsetAccumulator;

/// Origin set by the first valid IMU report
#[derive(Debug, Clone, Copy)]
struct Anchor {
    origin_ns: u64,
    last_tick_ns: u64,
}

/// MCU to host clock synchronizer
///
/// Owned by the acquisition thread; never shared. The scale is clamped to
/// the configured bounds both per update and as a running product.
///
/// Timestamps are not clamped: a positive video offset correction steps the
/// emitted timeline back by up to the averaged discrepancy.
pub struct ClockSynchronizer {
    clock: Arc<dyn HostClock>,
    video: Option<Arc<dyn VideoClock>>,
    anchor: Option<Anchor>,
    /// Accumulated scaled MCU time since the origin (ns)
    relative_ns: f64,
    scale: f64,
    scale_min: f64,
    scale_max: f64,
    drift: DriftEstimator,
    offset: OffsetAccumulator,
    video_offset_ns: i64,
    last_sync_count: u32,
    sync_events: u64,
    tick_discontinuities: u64,
    last_timestamp_ns: Option<u64>,
}

impl std::fmt::Debug for ClockSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockSynchronizer")
            .field("scale", &self.scale)
            .field("video_offset_ns", &self.video_offset_ns)
            .field("anchored", &self.anchor.is_some())
            .field("drift", &self.drift)
            .finish()
    }
}

impl ClockSynchronizer {
    /// Synchronizer on the operating-system clocks
    pub fn new(config: &ClockSyncConfig, video: Option<Arc<dyn VideoClock>>) -> Self {
        Self::with_clock(config, video, Arc::new(SystemHostClock))
    }

    pub fn with_clock(
        config: &ClockSyncConfig,
        video: Option<Arc<dyn VideoClock>>,
        clock: Arc<dyn HostClock>,
    ) -> Self {
        Self {
            clock,
            video,
            anchor: None,
            relative_ns: 0.0,
            scale: 1.0,
            scale_min: config.scale_min,
            scale_max: config.scale_max,
            drift: DriftEstimator::new(config),
            offset: OffsetAccumulator::new(config.offset_window),
            video_offset_ns: 0,
            last_sync_count: 0,
            sync_events: 0,
            tick_discontinuities: 0,
            last_timestamp_ns: None,
        }
    }

    /// Feed one report's tick and sync fields
    ///
    /// Returns the host-aligned timestamp, or `None` while waiting for the
    /// first valid IMU report (which itself anchors the origin and is not
    /// emitted).
    pub fn process(&mut self, tick_ns: u64, imu_valid: bool, sync: FrameSyncInfo) -> Option<u64> {
        let Some(anchor) = self.anchor.as_mut() else {
            if imu_valid {
                self.anchor_at(tick_ns);
            }
            self.last_sync_count = sync.frame_sync_count;
            return None;
        };

        let delta_ns = if tick_ns < anchor.last_tick_ns {
            self.tick_discontinuities += 1;
            warn!(
                previous_tick_ns = anchor.last_tick_ns,
                tick_ns,
                discontinuities = self.tick_discontinuities,
                "MCU tick went backwards, re-anchoring reference"
            );
            metrics::counter!("zed_sensors_tick_discontinuities_total").increment(1);
            0
        } else {
            tick_ns - anchor.last_tick_ns
        };
        anchor.last_tick_ns = tick_ns;
        self.relative_ns += delta_ns as f64 * self.scale;

        let timestamp_ns = self.current_timestamp();

        if sync.is_supported() && self.is_sync_event(&sync) {
            self.on_sync_event(timestamp_ns);
        }
        self.last_sync_count = sync.frame_sync_count;

        self.last_timestamp_ns = Some(timestamp_ns);
        Some(timestamp_ns)
    }

    #[instrument(level = "debug", name = "clock_sync_anchor", skip(self))]
    fn anchor_at(&mut self, tick_ns: u64) {
        let origin_ns = self.clock.system_ns();
        self.anchor = Some(Anchor {
            origin_ns,
            last_tick_ns: tick_ns,
        });
        info!(origin_ns, tick_ns, "clock origin anchored on first valid IMU report");
    }

    fn is_sync_event(&self, sync: &FrameSyncInfo) -> bool {
        self.last_sync_count != 0
            && (sync.frame_sync || sync.frame_sync_count > self.last_sync_count)
    }

    /// Origin plus scaled MCU time, before the video offset
    fn mcu_timeline_ns(&self) -> i128 {
        let origin = self.anchor.map(|a| a.origin_ns).unwrap_or(0) as i128;
        origin + self.relative_ns as i128
    }

    fn current_timestamp(&self) -> u64 {
        let ts = self.mcu_timeline_ns() - self.video_offset_ns as i128;
        ts.clamp(0, u64::MAX as i128) as u64
    }

    fn on_sync_event(&mut self, timestamp_ns: u64) {
        self.sync_events += 1;
        metrics::counter!("zed_sensors_sync_events_total").increment(1);

        let pair = SyncPair {
            host_ns: self.clock.steady_ns(),
            mcu_ns: self.mcu_timeline_ns().clamp(0, u64::MAX as i128) as u64,
        };
        if let Some(update) = self.drift.push(pair) {
            self.scale = (self.scale * update).clamp(self.scale_min, self.scale_max);
            debug!(
                update,
                scale = self.scale,
                adjustments = self.drift.adjustments(),
                "drift scale adjusted"
            );
            metrics::counter!("zed_sensors_scale_adjustments_total").increment(1);
            metrics::gauge!("zed_sensors_clock_scale").set(self.scale);
        }

        if let Some(video) = &self.video {
            let frame_ns = video.last_frame_timestamp_ns();
            let discrepancy = timestamp_ns as i64 - frame_ns as i64;
            if let Some(correction) = self.offset.push(discrepancy) {
                self.video_offset_ns += correction;
                debug!(
                    correction_ns = correction,
                    video_offset_ns = self.video_offset_ns,
                    "video offset corrected"
                );
                metrics::gauge!("zed_sensors_video_offset_ns").set(self.video_offset_ns as f64);
            }
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn video_offset_ns(&self) -> i64 {
        self.video_offset_ns
    }

    pub fn is_anchored(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            scale: self.scale,
            video_offset_ns: self.video_offset_ns,
            adjustments: self.drift.adjustments(),
            pending_pairs: self.drift.len(),
            sync_events: self.sync_events,
            tick_discontinuities: self.tick_discontinuities,
            anchored: self.anchor.is_some(),
            last_timestamp_ns: self.last_timestamp_ns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualHostClock;
    use rand::Rng;

    const ORIGIN: u64 = 1_700_000_000_000_000_000;
    /// 800 Hz report period
    const PERIOD_NS: u64 = 1_250_000;

    fn no_sync() -> FrameSyncInfo {
        FrameSyncInfo::default()
    }

    fn sync_pulse(count: u32) -> FrameSyncInfo {
        FrameSyncInfo {
            frame_sync: true,
            frame_sync_count: count,
            sync_capabilities: 1,
        }
    }

    fn idle_sync(count: u32) -> FrameSyncInfo {
        FrameSyncInfo {
            frame_sync: false,
            frame_sync_count: count,
            sync_capabilities: 1,
        }
    }

    fn synchronizer(clock: Arc<ManualHostClock>) -> ClockSynchronizer {
        ClockSynchronizer::with_clock(&ClockSyncConfig::default(), None, clock)
    }

    #[test]
    fn test_first_valid_report_anchors_without_emitting() {
        let clock = Arc::new(ManualHostClock::new(ORIGIN));
        let mut sync = synchronizer(clock);

        assert_eq!(sync.process(1_000, false, no_sync()), None);
        assert!(!sync.is_anchored());
        assert_eq!(sync.process(2_000, true, no_sync()), None);
        assert!(sync.is_anchored());

        assert_eq!(
            sync.process(2_000 + PERIOD_NS, true, no_sync()),
            Some(ORIGIN + PERIOD_NS)
        );
        // invalid IMU still advances time once anchored
        assert_eq!(
            sync.process(2_000 + 2 * PERIOD_NS, false, no_sync()),
            Some(ORIGIN + 2 * PERIOD_NS)
        );
    }

    #[test]
    fn test_tick_discontinuity_keeps_timestamps_monotonic() {
        let clock = Arc::new(ManualHostClock::new(ORIGIN));
        let mut sync = synchronizer(clock);
        sync.process(10 * PERIOD_NS, true, no_sync());

        let before = sync.process(11 * PERIOD_NS, true, no_sync()).unwrap();
        let wrapped = sync.process(PERIOD_NS, true, no_sync()).unwrap();
        let after = sync.process(2 * PERIOD_NS, true, no_sync()).unwrap();

        assert_eq!(wrapped, before);
        assert_eq!(after, before + PERIOD_NS);
        assert_eq!(sync.snapshot().tick_discontinuities, 1);
    }

    #[test]
    fn test_sync_event_detection() {
        let clock = Arc::new(ManualHostClock::new(ORIGIN));
        let mut sync = synchronizer(clock);
        sync.process(0, true, no_sync());

        // counter still zero: not an event
        sync.process(PERIOD_NS, true, sync_pulse(0));
        // previous counter zero: not an event
        sync.process(2 * PERIOD_NS, true, sync_pulse(5));
        assert_eq!(sync.snapshot().sync_events, 0);

        // counter increased
        sync.process(3 * PERIOD_NS, true, idle_sync(6));
        // flag set, counter unchanged
        sync.process(4 * PERIOD_NS, true, sync_pulse(6));
        // nothing new
        sync.process(5 * PERIOD_NS, true, idle_sync(6));
        assert_eq!(sync.snapshot().sync_events, 2);

        // capability off
        let unsupported = FrameSyncInfo {
            frame_sync: true,
            frame_sync_count: 7,
            sync_capabilities: 0,
        };
        sync.process(6 * PERIOD_NS, true, unsupported);
        assert_eq!(sync.snapshot().sync_events, 2);
    }

    /// Drives `reports` reports with a sync pulse every `sync_every`, host
    /// time running at `host_rate` relative to MCU time. Returns the
    /// absolute timestamp error at each sync event.
    fn run_drift(
        sync: &mut ClockSynchronizer,
        clock: &ManualHostClock,
        host_rate: f64,
        reports: u64,
        sync_every: u64,
        noise_ns: i64,
    ) -> Vec<f64> {
        let mut rng = rand::rng();
        let mut errors = Vec::new();
        let mut count = 1u32;
        sync.process(0, true, idle_sync(count));

        for n in 1..=reports {
            let mcu_ns = n * PERIOD_NS;
            let host_elapsed = (mcu_ns as f64 * host_rate) as i64;
            let jitter = if noise_ns > 0 {
                rng.random_range(-noise_ns..=noise_ns)
            } else {
                0
            };
            clock.set((host_elapsed + jitter).max(0) as u64);

            let info = if n % sync_every == 0 {
                count += 1;
                sync_pulse(count)
            } else {
                idle_sync(count)
            };
            let ts = sync.process(mcu_ns, true, info).unwrap();
            if n % sync_every == 0 {
                let truth = ORIGIN + host_elapsed as u64;
                errors.push((ts as f64 - truth as f64).abs());
            }
        }
        errors
    }

    #[test]
    fn test_drift_converges_towards_host_rate() {
        for &k in &[0.85_f64, 0.95, 1.05, 1.15] {
            let clock = Arc::new(ManualHostClock::new(ORIGIN));
            let mut sync = synchronizer(clock.clone());
            // host rate R, MCU rate k·R
            let errors = run_drift(&mut sync, &clock, k, 30 * 50 * 4, 30, 0);

            let snapshot = sync.snapshot();
            assert!(snapshot.adjustments >= 3, "k={k}: {snapshot:?}");
            assert!((sync.scale() - k).abs() < 0.01, "k={k}: scale {}", sync.scale());

            // error growth per sync interval shrinks once the scale settles
            let early = errors[10] - errors[9];
            let late = errors[errors.len() - 1] - errors[errors.len() - 2];
            assert!(late.abs() < early.abs(), "k={k}: early {early} late {late}");
        }
    }

    #[test]
    fn test_scale_stays_bounded_under_noise() {
        let mut rng = rand::rng();
        for _ in 0..20 {
            let clock = Arc::new(ManualHostClock::new(ORIGIN));
            let mut sync = synchronizer(clock.clone());
            let rate = rng.random_range(0.5..2.0);
            run_drift(&mut sync, &clock, rate, 30 * 50 * 3, 30, 5_000_000);
            let scale = sync.scale();
            assert!((0.8..=1.2).contains(&scale), "rate {rate}: scale {scale}");
        }
    }

    #[test]
    fn test_single_update_is_clamped() {
        let clock = Arc::new(ManualHostClock::new(ORIGIN));
        let mut sync = synchronizer(clock.clone());
        // host running 3x faster: one adjustment must be clamped to 1.2
        run_drift(&mut sync, &clock, 3.0, 30 * 50, 30, 0);
        assert_eq!(sync.snapshot().adjustments, 1);
        assert!((sync.scale() - 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_drift_converges_with_video_offset_active() {
        for &k in &[0.9_f64, 1.1] {
            let clock = Arc::new(ManualHostClock::new(ORIGIN));
            // video frames stamped with true host time
            let video: Arc<dyn VideoClock> = {
                let clock = clock.clone();
                Arc::new(move || clock.system_ns())
            };
            let mut sync =
                ClockSynchronizer::with_clock(&ClockSyncConfig::default(), Some(video), clock.clone());
            let errors = run_drift(&mut sync, &clock, k, 30 * 50 * 6, 30, 0);

            assert!(sync.snapshot().adjustments >= 5);
            assert!((sync.scale() - k).abs() < 0.01, "k={k}: scale {}", sync.scale());
            let late = errors[errors.len() - 1];
            assert!(late < 1_000_000.0, "k={k}: late error {late}");
        }
    }

    #[test]
    fn test_video_offset_after_three_events() {
        let clock = Arc::new(ManualHostClock::new(ORIGIN));
        let d: i64 = 4_000_000;
        let video: Arc<dyn VideoClock> = {
            let clock = clock.clone();
            // video frames trail the sensor timeline by `d`
            Arc::new(move || clock.system_ns() - d as u64)
        };
        let mut sync =
            ClockSynchronizer::with_clock(&ClockSyncConfig::default(), Some(video), clock.clone());

        let mut count = 1u32;
        sync.process(0, true, idle_sync(count));
        for n in 1..=3u64 {
            clock.set(n * PERIOD_NS);
            count += 1;
            sync.process(n * PERIOD_NS, true, sync_pulse(count));
        }
        assert_eq!(sync.video_offset_ns(), d);

        let shifted = sync.process(4 * PERIOD_NS, true, idle_sync(count)).unwrap();
        assert_eq!(shifted, ORIGIN + 4 * PERIOD_NS - d as u64);

        // a fourth event alone does not move the offset
        clock.set(5 * PERIOD_NS);
        count += 1;
        sync.process(5 * PERIOD_NS, true, sync_pulse(count));
        assert_eq!(sync.video_offset_ns(), d);
    }
}
