//! Wire constants of the sensor MCU HID protocol.

use contracts::FirmwareVersion;

/// Input report carrying one sensor sample
pub const REPORT_ID_SENSOR_DATA: u8 = 0x01;
/// Feature report used to send commands
pub const REPORT_ID_REQUEST_SET: u8 = 0x21;
/// Feature report enabling/disabling the data stream
pub const REPORT_ID_STREAM_STATUS: u8 = 0x32;

/// Keep-alive command sent through `REPORT_ID_REQUEST_SET`
pub const CMD_PING: u8 = 0xF2;

/// Packed size of a sensor data report
pub const SENSOR_REPORT_LEN: usize = 62;
/// Packed size of a stream status feature report
pub const STREAM_STATUS_LEN: usize = 2;
/// Largest HID report the MCU produces
pub const MAX_REPORT_LEN: usize = 64;

/// MCU tick period, 39.0625 ns expressed as 625/16
pub const TICK_NS_NUM: u128 = 625;
pub const TICK_NS_DEN: u128 = 16;

/// Acceleration, ±8 g full scale (m/s² per LSB)
pub const ACC_SCALE: f64 = 9.81 * 8.0 / 32768.0;
/// Angular rate, ±1000 deg/s full scale (deg/s per LSB)
pub const GYRO_SCALE: f64 = 1000.0 / 32768.0;
/// Magnetic field (µT per LSB)
pub const MAG_SCALE: f64 = 1.0 / 16.0;
/// Temperature (°C per LSB)
pub const TEMP_SCALE: f64 = 0.01;

/// Pressure / humidity scale, firmware >= `ENV_SCALE_FW`
pub const PRESS_SCALE_NEW: f64 = 0.0001;
pub const HUMID_SCALE_NEW: f64 = 0.01;
/// Pressure / humidity scale, older firmware
pub const PRESS_SCALE_OLD: f64 = 0.01;
pub const HUMID_SCALE_OLD: f64 = 1.0 / 1024.0;

/// First firmware reporting pressure/humidity at the finer resolution
pub const ENV_SCALE_FW: FirmwareVersion = FirmwareVersion::new(3, 9);

/// Raw temperature value meaning "sensor not readable"
pub const TEMP_NOT_VALID: i16 = -27315;

/// Byte offsets inside a sensor data report
pub mod offset {
    pub const REPORT_ID: usize = 0;
    pub const IMU_NOT_VALID: usize = 1;
    pub const TIMESTAMP: usize = 2;
    pub const GYRO: usize = 10;
    pub const ACCEL: usize = 16;
    pub const FRAME_SYNC: usize = 22;
    pub const SYNC_CAPABILITIES: usize = 23;
    pub const FRAME_SYNC_COUNT: usize = 24;
    pub const IMU_TEMP: usize = 28;
    pub const MAG_VALID: usize = 30;
    pub const MAG: usize = 31;
    pub const CAMERA_MOVING: usize = 37;
    pub const CAMERA_MOVING_COUNT: usize = 38;
    pub const CAMERA_FALLING: usize = 42;
    pub const CAMERA_FALLING_COUNT: usize = 43;
    pub const ENV_VALID: usize = 47;
    pub const TEMP: usize = 48;
    pub const PRESS: usize = 50;
    pub const HUMID: usize = 54;
    pub const TEMP_CAM_LEFT: usize = 58;
    pub const TEMP_CAM_RIGHT: usize = 60;
}

/// Convert a raw MCU tick to nanoseconds (rounded to nearest)
#[inline]
pub fn ticks_to_ns(ticks: u64) -> u64 {
    let ns = (ticks as u128 * TICK_NS_NUM + TICK_NS_DEN / 2) / TICK_NS_DEN;
    u64::try_from(ns).unwrap_or(u64::MAX)
}
