//! Device identity - enumeration output
//!
//! USB identifiers and firmware revision of the sensor MCU.

use serde::{Deserialize, Serialize};
use std::fmt;

/// USB vendor id of the camera family
pub const USB_VENDOR_ID: u16 = 0x2b03;

/// MCU product id, ZED Mini
pub const PID_MCU_ZED_MINI: u16 = 0xf681;
/// MCU product id, ZED 2
pub const PID_MCU_ZED_2: u16 = 0xf781;
/// MCU product id, ZED 2i
pub const PID_MCU_ZED_2I: u16 = 0xf881;

/// Firmware revision, decoded from the USB release number (`major << 8 | minor`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
}

impl FirmwareVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    pub const fn from_release(release: u16) -> Self {
        Self {
            major: (release >> 8) as u8,
            minor: (release & 0x00ff) as u8,
        }
    }

    pub const fn release(self) -> u16 {
        ((self.major as u16) << 8) | self.minor as u16
    }

    /// Same ordering as the firmware's own `major.minor` comparison
    pub fn at_least(self, required: FirmwareVersion) -> bool {
        self >= required
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}", self.major, self.minor)
    }
}

/// Camera model carrying the sensor MCU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceModel {
    ZedMini,
    Zed2,
    Zed2i,
    Unknown(u16),
}

impl DeviceModel {
    pub fn from_product_id(product_id: u16) -> Self {
        match product_id {
            PID_MCU_ZED_MINI => Self::ZedMini,
            PID_MCU_ZED_2 => Self::Zed2,
            PID_MCU_ZED_2I => Self::Zed2i,
            other => Self::Unknown(other),
        }
    }

    /// Models with magnetometer and environmental sensors on board
    pub fn has_environment_sensors(self) -> bool {
        matches!(self, Self::Zed2 | Self::Zed2i)
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZedMini => f.write_str("ZED Mini"),
            Self::Zed2 => f.write_str("ZED 2"),
            Self::Zed2i => f.write_str("ZED 2i"),
            Self::Unknown(pid) => write!(f, "unknown (pid {pid:#06x})"),
        }
    }
}

/// One enumerated device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub serial_number: u32,
    pub product_id: u16,
    pub firmware: FirmwareVersion,
}

impl DeviceInfo {
    pub fn model(&self) -> DeviceModel {
        DeviceModel::from_product_id(self.product_id)
    }
}
