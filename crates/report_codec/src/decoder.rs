//! ReportDecoder - raw report to typed samples
//!
//! Pure transform. Samples come out with status `NewValue` and a zero
//! timestamp; the acquisition loop stamps them after clock synchronization.

use contracts::{
    CamTempSample, EnvSample, FirmwareVersion, FrameSyncInfo, ImuSample, MagSample,
    MotionFlags, SampleStatus, Vector3,
};

use crate::error::Result;
use crate::layout::{
    ACC_SCALE, ENV_SCALE_FW, GYRO_SCALE, HUMID_SCALE_NEW, HUMID_SCALE_OLD, MAG_SCALE,
    PRESS_SCALE_NEW, PRESS_SCALE_OLD, TEMP_NOT_VALID, TEMP_SCALE, ticks_to_ns,
};
use crate::report::{ChannelMarker, RawReport};

/// Firmware-dependent scale factors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalePolicy {
    /// hPa per LSB
    pub pressure: f64,
    /// % relative humidity per LSB
    pub humidity: f64,
}

impl ScalePolicy {
    /// Scales used by firmware 3.9 and later
    pub const CURRENT: ScalePolicy = ScalePolicy {
        pressure: PRESS_SCALE_NEW,
        humidity: HUMID_SCALE_NEW,
    };

    /// Scales used before firmware 3.9
    pub const LEGACY: ScalePolicy = ScalePolicy {
        pressure: PRESS_SCALE_OLD,
        humidity: HUMID_SCALE_OLD,
    };

    pub fn for_firmware(firmware: FirmwareVersion) -> Self {
        if firmware.at_least(ENV_SCALE_FW) {
            Self::CURRENT
        } else {
            Self::LEGACY
        }
    }
}

/// Typed content of one report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedReport {
    /// MCU tick scaled to nanoseconds
    pub tick_ns: u64,

    pub sync: FrameSyncInfo,

    pub mag_marker: ChannelMarker,

    pub env_marker: ChannelMarker,

    /// Present when the IMU block is valid
    pub imu: Option<ImuSample>,

    /// Present when the magnetometer marker is `NewValue`
    pub mag: Option<MagSample>,

    /// Present when the environmental marker is `NewValue`
    pub env: Option<EnvSample>,

    /// Present when both board temperatures are readable
    pub cam_temp: Option<CamTempSample>,
}

impl DecodedReport {
    pub fn imu_valid(&self) -> bool {
        self.imu.is_some()
    }

    /// Number of typed samples carried
    pub fn sample_count(&self) -> usize {
        usize::from(self.imu.is_some())
            + usize::from(self.mag.is_some())
            + usize::from(self.env.is_some())
            + usize::from(self.cam_temp.is_some())
    }
}

/// Sensor report decoder bound to one firmware revision
#[derive(Debug, Clone, Copy)]
pub struct ReportDecoder {
    policy: ScalePolicy,
}

impl ReportDecoder {
    pub fn new(policy: ScalePolicy) -> Self {
        Self { policy }
    }

    pub fn for_firmware(firmware: FirmwareVersion) -> Self {
        Self::new(ScalePolicy::for_firmware(firmware))
    }

    pub fn policy(&self) -> ScalePolicy {
        self.policy
    }

    /// Decode one HID report
    ///
    /// Fails without a partial result when the id or length is wrong.
    pub fn decode(&self, data: &[u8]) -> Result<DecodedReport> {
        let raw = RawReport::parse(data)?;
        Ok(self.decode_raw(&raw))
    }

    pub fn decode_raw(&self, raw: &RawReport) -> DecodedReport {
        let imu = raw.imu_valid().then(|| ImuSample {
            status: SampleStatus::NewValue,
            timestamp_ns: 0,
            frame_sync: raw.frame_sync != 0,
            accel: scale_axes(raw.accel, ACC_SCALE),
            gyro: scale_axes(raw.gyro, GYRO_SCALE),
            temperature_c: raw.imu_temp as f64 * TEMP_SCALE,
            motion: MotionFlags {
                moving: raw.camera_moving != 0,
                moving_count: raw.camera_moving_count,
                falling: raw.camera_falling != 0,
                falling_count: raw.camera_falling_count,
            },
        });

        let mag_marker = raw.mag_marker();
        let mag = mag_marker.is_new().then(|| MagSample {
            status: SampleStatus::NewValue,
            timestamp_ns: 0,
            field: scale_axes(raw.mag, MAG_SCALE),
        });

        let env_marker = raw.env_marker();
        let env = env_marker.is_new().then(|| EnvSample {
            status: SampleStatus::NewValue,
            timestamp_ns: 0,
            temperature_c: raw.temp as f64 * TEMP_SCALE,
            pressure_hpa: raw.press as f64 * self.policy.pressure,
            humidity_pct: raw.humid as f64 * self.policy.humidity,
        });

        let temps_readable =
            raw.temp_cam_left != TEMP_NOT_VALID && raw.temp_cam_right != TEMP_NOT_VALID;
        let cam_temp = temps_readable.then(|| CamTempSample {
            status: SampleStatus::NewValue,
            timestamp_ns: 0,
            left_c: raw.temp_cam_left as f64 * TEMP_SCALE,
            right_c: raw.temp_cam_right as f64 * TEMP_SCALE,
        });

        DecodedReport {
            tick_ns: ticks_to_ns(raw.timestamp),
            sync: FrameSyncInfo {
                frame_sync: raw.frame_sync != 0,
                frame_sync_count: raw.frame_sync_count,
                sync_capabilities: raw.sync_capabilities,
            },
            mag_marker,
            env_marker,
            imu,
            mag,
            env,
            cam_temp,
        }
    }
}

fn scale_axes(raw: [i16; 3], scale: f64) -> Vector3 {
    Vector3::new(
        raw[0] as f64 * scale,
        raw[1] as f64 * scale,
        raw[2] as f64 * scale,
    )
}
