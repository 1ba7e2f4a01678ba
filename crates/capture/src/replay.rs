//! Replay of recorded report dumps
//!
//! A dump is a flat file of 64-byte HID reports exactly as they came off the
//! wire. Replay feeds them back through the mock device machinery, so the
//! acquisition loop cannot tell a replay from live hardware.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use contracts::{
    ContractError, DeviceInfo, HidBackend, HidDevice, TransportResult, USB_VENDOR_ID,
};
use report_codec::layout::MAX_REPORT_LEN;
use tracing::{debug, instrument};

use crate::error::{CaptureError, Result};
use crate::mock::MockHidDevice;

/// Backend serving one recorded device
#[derive(Debug)]
pub struct ReplayHidBackend {
    info: DeviceInfo,
    records: Arc<[Bytes]>,
    rate_hz: Option<f64>,
    looping: bool,
    in_use: Arc<AtomicBool>,
}

impl ReplayHidBackend {
    pub fn from_records(info: DeviceInfo, records: Vec<Bytes>) -> Self {
        Self {
            info,
            records: records.into(),
            rate_hz: None,
            looping: false,
            in_use: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Load a dump file
    #[instrument(name = "replay_load", skip(path, info), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>, info: DeviceInfo) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| CaptureError::replay(path, e.to_string()))?;
        let records = split_records(path, &data)?;
        debug!(records = records.len(), "replay dump loaded");
        Ok(Self::from_records(info, records))
    }

    /// Pace playback to `rate_hz` instead of reading as fast as possible
    pub fn with_rate(mut self, rate_hz: f64) -> Self {
        self.rate_hz = Some(rate_hz);
        self
    }

    /// Restart from the first record at the end of the dump
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl HidBackend for ReplayHidBackend {
    fn enumerate(&self, vendor_id: u16) -> TransportResult<Vec<DeviceInfo>> {
        if vendor_id != USB_VENDOR_ID {
            return Ok(Vec::new());
        }
        Ok(vec![self.info.clone()])
    }

    fn open(&self, info: &DeviceInfo) -> TransportResult<Box<dyn HidDevice>> {
        if info.serial_number != self.info.serial_number {
            return Err(ContractError::open_failed(info.serial_number, "device not attached"));
        }
        if self.in_use.swap(true, Ordering::AcqRel) {
            return Err(ContractError::open_failed(info.serial_number, "device busy"));
        }

        // every open replays the dump from its first record
        let (device, _) = MockHidDevice::records(
            self.info.clone(),
            self.records.clone(),
            self.looping,
            self.rate_hz,
        );
        Ok(Box::new(device.released_into(self.in_use.clone())))
    }
}

fn split_records(path: &Path, data: &[u8]) -> Result<Vec<Bytes>> {
    if data.is_empty() {
        return Err(CaptureError::replay(path, "dump is empty"));
    }
    if data.len() % MAX_REPORT_LEN != 0 {
        return Err(CaptureError::replay(
            path,
            format!(
                "size {} is not a multiple of {MAX_REPORT_LEN} bytes",
                data.len()
            ),
        ));
    }
    Ok(data
        .chunks_exact(MAX_REPORT_LEN)
        .map(Bytes::copy_from_slice)
        .collect())
}

/// Write reports as a dump file, padding each to 64 bytes
///
/// Returns the number of records written.
pub fn write_dump<I>(path: impl Into<PathBuf>, reports: I) -> Result<usize>
where
    I: IntoIterator<Item = Bytes>,
{
    let path = path.into();
    let mut data = Vec::new();
    let mut count = 0;
    for report in reports {
        if report.len() > MAX_REPORT_LEN {
            return Err(CaptureError::replay(
                &path,
                format!("report of {} bytes exceeds {MAX_REPORT_LEN}", report.len()),
            ));
        }
        let start = data.len();
        data.extend_from_slice(&report);
        data.resize(start + MAX_REPORT_LEN, 0);
        count += 1;
    }
    fs::write(&path, data).map_err(|e| CaptureError::replay(&path, e.to_string()))?;
    Ok(count)
}
