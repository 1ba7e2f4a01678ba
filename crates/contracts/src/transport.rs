//! Transport and video-clock traits - external collaborators
//!
//! The capture core never talks to a USB stack directly. It enumerates and
//! opens devices through `HidBackend` and reads reports through `HidDevice`,
//! which lets the same acquisition loop run against a real HID binding, a
//! scripted mock device or a recorded report dump.

use std::time::Duration;

use bytes::Bytes;

use crate::{ContractError, DeviceInfo};

/// Transport result alias
pub type TransportResult<T> = std::result::Result<T, ContractError>;

/// Device discovery and open
///
/// # Example
///
/// ```ignore
/// let devices = backend.enumerate(USB_VENDOR_ID)?;
/// let mut device = backend.open(&devices[0])?;
/// let report = device.read_report(Duration::from_millis(500))?;
/// device.close();
/// ```
pub trait HidBackend: Send + Sync {
    /// List attached sensor MCUs for the given vendor id
    fn enumerate(&self, vendor_id: u16) -> TransportResult<Vec<DeviceInfo>>;

    /// Open a device handle
    ///
    /// Fails with `ContractError::OpenFailed` when the transport refuses.
    fn open(&self, info: &DeviceInfo) -> TransportResult<Box<dyn HidDevice>>;
}

/// An open device handle
///
/// Owned by exactly one thread at a time; moved into the acquisition thread
/// once streaming starts.
pub trait HidDevice: Send {
    /// Read one input report
    ///
    /// Blocks at most `timeout`. Returns `ContractError::Timeout` when nothing
    /// arrived and `ContractError::TransportIo` on failures below protocol level.
    fn read_report(&mut self, timeout: Duration) -> TransportResult<Bytes>;

    /// Switch between blocking and non-blocking reads
    fn set_nonblocking(&mut self, nonblocking: bool) -> TransportResult<()>;

    /// Send a feature report; `payload[0]` is the report id
    fn send_feature_report(&mut self, payload: &[u8]) -> TransportResult<()>;

    /// Read a feature report back; the returned buffer starts with the report id
    fn get_feature_report(&mut self, report_id: u8) -> TransportResult<Bytes>;

    /// Release the handle; further calls fail with `TransportIo`
    fn close(&mut self);
}

/// Read access to the video pipeline clock
///
/// Installed by the owner before streaming starts when video/sensor sync is
/// enabled.
pub trait VideoClock: Send + Sync {
    /// Timestamp of the last grabbed video frame (ns, host clock)
    fn last_frame_timestamp_ns(&self) -> u64;
}

impl<F> VideoClock for F
where
    F: Fn() -> u64 + Send + Sync,
{
    fn last_frame_timestamp_ns(&self) -> u64 {
        self()
    }
}
