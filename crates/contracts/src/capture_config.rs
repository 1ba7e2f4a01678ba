//! Capture configuration contracts that can be shared across crates.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Capture session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CaptureConfig {
    /// Serial number to open (None = first available)
    #[serde(default)]
    pub serial_number: Option<u32>,

    /// Raise recoverable protocol warnings from debug to warn
    #[serde(default)]
    pub verbose: bool,

    /// Bound on a single report read in milliseconds
    #[serde(default = "default_read_timeout_ms")]
    #[validate(range(min = 1, max = 10_000))]
    pub read_timeout_ms: u64,

    /// Loop iterations between two keep-alive pings
    #[serde(default = "default_ping_interval")]
    #[validate(range(min = 1, max = 100_000))]
    pub ping_interval: u32,

    /// Correlate MCU frame-sync events with the video clock
    #[serde(default)]
    pub video_sync: bool,

    /// Clock synchronizer configuration
    #[serde(default)]
    #[validate(nested)]
    pub clock: ClockSyncConfig,

    /// Consumer wait configuration
    #[serde(default)]
    #[validate(nested)]
    pub consumer: ConsumerConfig,
}

fn default_read_timeout_ms() -> u64 {
    500
}

fn default_ping_interval() -> u32 {
    400
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            serial_number: None,
            verbose: false,
            read_timeout_ms: default_read_timeout_ms(),
            ping_interval: default_ping_interval(),
            video_sync: false,
            clock: ClockSyncConfig::default(),
            consumer: ConsumerConfig::default(),
        }
    }
}

impl CaptureConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Drift-compensation loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_clock_sync"))]
pub struct ClockSyncConfig {
    /// Capacity of the paired (host, MCU) timestamp queues
    #[validate(range(min = 3, max = 10_000))]
    pub queue_capacity: usize,

    /// First queue index used once the estimate has settled
    pub steady_first_index: usize,

    /// Adjustments that still use the queue midpoint as first index
    pub warmup_adjustments: u32,

    /// Lower clamp for a single scale update
    pub scale_min: f64,

    /// Upper clamp for a single scale update
    pub scale_max: f64,

    /// Sync events averaged into one video offset correction
    #[validate(range(min = 1, max = 1_000))]
    pub offset_window: u32,
}

impl Default for ClockSyncConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 50,
            steady_first_index: 5,
            warmup_adjustments: 1,
            scale_min: 0.8,
            scale_max: 1.2,
            offset_window: 3,
        }
    }
}

fn validate_clock_sync(config: &ClockSyncConfig) -> Result<(), ValidationError> {
    if !(config.scale_min > 0.0 && config.scale_min <= 1.0 && config.scale_max >= 1.0) {
        let mut err = ValidationError::new("scale_bounds");
        err.message = Some("scale bounds must satisfy 0 < scale_min <= 1 <= scale_max".into());
        return Err(err);
    }
    if config.steady_first_index + 1 >= config.queue_capacity {
        let mut err = ValidationError::new("steady_first_index");
        err.message = Some("steady_first_index must be below the last queue index".into());
        return Err(err);
    }
    Ok(())
}

/// Consumer wait configuration
///
/// Waits are rounded up to the kind's grain and never shorter than
/// `min_timeout_us`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Wait grain for inertial data (µs)
    #[validate(range(min = 1, max = 1_000_000))]
    pub imu_grain_us: u64,

    /// Wait grain for magnetometer / environmental / temperature data (µs)
    #[validate(range(min = 1, max = 1_000_000))]
    pub aux_grain_us: u64,

    /// Shortest effective wait (µs)
    #[validate(range(min = 1, max = 1_000_000))]
    pub min_timeout_us: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            imu_grain_us: 100,
            aux_grain_us: 10,
            min_timeout_us: 100,
        }
    }
}

impl ConsumerConfig {
    /// Effective bound for a requested wait at the given grain
    pub fn effective_timeout(&self, requested: Duration, grain_us: u64) -> Duration {
        let grain = grain_us.max(1) as u128;
        let requested_us = requested.as_micros().max(self.min_timeout_us as u128);
        let rounded = requested_us.div_ceil(grain) * grain;
        Duration::from_micros(u64::try_from(rounded).unwrap_or(u64::MAX))
    }
}
