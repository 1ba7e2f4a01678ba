//! RawReport - packed sensor data report
//!
//! Field-by-field little-endian decoding over `bytes::Buf`. The length is
//! checked once up front, after which every `get_*` is in bounds.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CodecError, Result};
use crate::layout::{MAX_REPORT_LEN, REPORT_ID_SENSOR_DATA, SENSOR_REPORT_LEN};

/// Channel marker carried by the magnetometer and environmental blocks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ChannelMarker {
    /// Sensor not fitted on this model
    #[default]
    NotPresent,
    /// Same reading as the previous report
    OldValue,
    /// Fresh reading
    NewValue,
    /// Marker value outside the known set
    Unknown(u8),
}

impl ChannelMarker {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::NotPresent,
            1 => Self::OldValue,
            2 => Self::NewValue,
            other => Self::Unknown(other),
        }
    }

    pub fn as_raw(self) -> u8 {
        match self {
            Self::NotPresent => 0,
            Self::OldValue => 1,
            Self::NewValue => 2,
            Self::Unknown(raw) => raw,
        }
    }

    pub fn is_new(self) -> bool {
        matches!(self, Self::NewValue)
    }
}

/// Raw integer content of one sensor data report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawReport {
    pub report_id: u8,
    pub imu_not_valid: u8,
    /// MCU tick counter
    pub timestamp: u64,
    pub gyro: [i16; 3],
    pub accel: [i16; 3],
    pub frame_sync: u8,
    pub sync_capabilities: u8,
    pub frame_sync_count: u32,
    pub imu_temp: i16,
    pub mag_valid: u8,
    pub mag: [i16; 3],
    pub camera_moving: u8,
    pub camera_moving_count: u32,
    pub camera_falling: u8,
    pub camera_falling_count: u32,
    pub env_valid: u8,
    pub temp: i16,
    pub press: u32,
    pub humid: u32,
    pub temp_cam_left: i16,
    pub temp_cam_right: i16,
}

impl RawReport {
    /// Parse a sensor data report
    ///
    /// Trailing bytes past the packed layout (HID padding) are ignored.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < SENSOR_REPORT_LEN {
            return Err(CodecError::TooShort {
                len: data.len(),
                expected: SENSOR_REPORT_LEN,
            });
        }
        if data[0] != REPORT_ID_SENSOR_DATA {
            return Err(CodecError::UnexpectedReportId {
                expected: REPORT_ID_SENSOR_DATA,
                found: data[0],
            });
        }

        let mut buf = &data[..SENSOR_REPORT_LEN];
        let report = Self {
            report_id: buf.get_u8(),
            imu_not_valid: buf.get_u8(),
            timestamp: buf.get_u64_le(),
            gyro: read_axes(&mut buf),
            accel: read_axes(&mut buf),
            frame_sync: buf.get_u8(),
            sync_capabilities: buf.get_u8(),
            frame_sync_count: buf.get_u32_le(),
            imu_temp: buf.get_i16_le(),
            mag_valid: buf.get_u8(),
            mag: read_axes(&mut buf),
            camera_moving: buf.get_u8(),
            camera_moving_count: buf.get_u32_le(),
            camera_falling: buf.get_u8(),
            camera_falling_count: buf.get_u32_le(),
            env_valid: buf.get_u8(),
            temp: buf.get_i16_le(),
            press: buf.get_u32_le(),
            humid: buf.get_u32_le(),
            temp_cam_left: buf.get_i16_le(),
            temp_cam_right: buf.get_i16_le(),
        };
        debug_assert!(!buf.has_remaining());

        Ok(report)
    }

    /// Serialize into a HID-sized (64 byte, zero padded) report
    ///
    /// Used by the mock device and to write replay dumps.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(MAX_REPORT_LEN);
        buf.put_u8(self.report_id);
        buf.put_u8(self.imu_not_valid);
        buf.put_u64_le(self.timestamp);
        write_axes(&mut buf, self.gyro);
        write_axes(&mut buf, self.accel);
        buf.put_u8(self.frame_sync);
        buf.put_u8(self.sync_capabilities);
        buf.put_u32_le(self.frame_sync_count);
        buf.put_i16_le(self.imu_temp);
        buf.put_u8(self.mag_valid);
        write_axes(&mut buf, self.mag);
        buf.put_u8(self.camera_moving);
        buf.put_u32_le(self.camera_moving_count);
        buf.put_u8(self.camera_falling);
        buf.put_u32_le(self.camera_falling_count);
        buf.put_u8(self.env_valid);
        buf.put_i16_le(self.temp);
        buf.put_u32_le(self.press);
        buf.put_u32_le(self.humid);
        buf.put_i16_le(self.temp_cam_left);
        buf.put_i16_le(self.temp_cam_right);
        buf.resize(MAX_REPORT_LEN, 0);
        buf.freeze()
    }

    pub fn imu_valid(&self) -> bool {
        self.imu_not_valid != 1
    }

    pub fn mag_marker(&self) -> ChannelMarker {
        ChannelMarker::from_raw(self.mag_valid)
    }

    pub fn env_marker(&self) -> ChannelMarker {
        ChannelMarker::from_raw(self.env_valid)
    }
}

fn read_axes(buf: &mut &[u8]) -> [i16; 3] {
    [buf.get_i16_le(), buf.get_i16_le(), buf.get_i16_le()]
}

fn write_axes(buf: &mut BytesMut, axes: [i16; 3]) {
    for v in axes {
        buf.put_i16_le(v);
    }
}
