//! Decoded sensor samples - Capture output
//!
//! Human-unit measurements stamped on the host clock.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sample status
///
/// A sample is `NewValue` exactly once, until a consumer reads it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleStatus {
    /// Slot has never been written
    #[default]
    NotValid,
    /// Slot holds a value that was already consumed
    Valid,
    /// Slot holds a fresh, unread value
    NewValue,
}

impl SampleStatus {
    /// Whether the slot carries a measurement at all
    pub fn is_valid(self) -> bool {
        !matches!(self, Self::NotValid)
    }
}

/// Data kind, one per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Imu,
    Magnetometer,
    Environment,
    CameraTemperature,
}

impl SensorKind {
    pub const ALL: [SensorKind; 4] = [
        SensorKind::Imu,
        SensorKind::Magnetometer,
        SensorKind::Environment,
        SensorKind::CameraTemperature,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Imu => "imu",
            Self::Magnetometer => "magnetometer",
            Self::Environment => "environment",
            Self::CameraTemperature => "camera_temperature",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common accessors shared by every sample kind
pub trait Sample: Clone + Default + Send + 'static {
    const KIND: SensorKind;

    fn status(&self) -> SampleStatus;

    fn set_status(&mut self, status: SampleStatus);

    /// Host-aligned timestamp (ns)
    fn timestamp_ns(&self) -> u64;

    fn set_timestamp_ns(&mut self, timestamp_ns: u64);
}

/// 3D vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Motion interrupt state latched by the IMU
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionFlags {
    pub moving: bool,
    /// Movement interrupts since power-up
    pub moving_count: u32,
    pub falling: bool,
    /// Free-fall interrupts since power-up
    pub falling_count: u32,
}

/// Inertial sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImuSample {
    pub status: SampleStatus,

    /// Host-aligned timestamp (ns)
    pub timestamp_ns: u64,

    /// Report coincides with a camera frame
    pub frame_sync: bool,

    /// Acceleration (m/s²)
    pub accel: Vector3,

    /// Angular rate (deg/s)
    pub gyro: Vector3,

    /// IMU die temperature (°C)
    pub temperature_c: f64,

    pub motion: MotionFlags,
}

/// Magnetometer sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MagSample {
    pub status: SampleStatus,

    /// Host-aligned timestamp (ns)
    pub timestamp_ns: u64,

    /// Magnetic field (µT)
    pub field: Vector3,
}

/// Environmental sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvSample {
    pub status: SampleStatus,

    /// Host-aligned timestamp (ns)
    pub timestamp_ns: u64,

    /// Temperature (°C)
    pub temperature_c: f64,

    /// Atmospheric pressure (hPa)
    pub pressure_hpa: f64,

    /// Relative humidity (%)
    pub humidity_pct: f64,
}

/// Camera sensor-board temperature sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CamTempSample {
    pub status: SampleStatus,

    /// Host-aligned timestamp (ns)
    pub timestamp_ns: u64,

    /// Left image sensor temperature (°C)
    pub left_c: f64,

    /// Right image sensor temperature (°C)
    pub right_c: f64,
}

macro_rules! impl_sample {
    ($ty:ty, $kind:expr) => {
        impl Sample for $ty {
            const KIND: SensorKind = $kind;

            #[inline]
            fn status(&self) -> SampleStatus {
                self.status
            }

            #[inline]
            fn set_status(&mut self, status: SampleStatus) {
                self.status = status;
            }

            #[inline]
            fn timestamp_ns(&self) -> u64 {
                self.timestamp_ns
            }

            #[inline]
            fn set_timestamp_ns(&mut self, timestamp_ns: u64) {
                self.timestamp_ns = timestamp_ns;
            }
        }
    };
}

impl_sample!(ImuSample, SensorKind::Imu);
impl_sample!(MagSample, SensorKind::Magnetometer);
impl_sample!(EnvSample, SensorKind::Environment);
impl_sample!(CamTempSample, SensorKind::CameraTemperature);
