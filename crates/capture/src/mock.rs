//! Mock HID transport
//!
//! In-process sensor MCU for tests and offline runs. A device either plays a
//! fixed script of reads or generates an endless 800 Hz report stream; an
//! `MockProbe` records what the driver sent back to it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use contracts::{
    ContractError, DeviceInfo, HidBackend, HidDevice, TransportResult, USB_VENDOR_ID,
};
use report_codec::layout::{CMD_PING, REPORT_ID_REQUEST_SET, REPORT_ID_STREAM_STATUS};
use report_codec::RawReport;
use tracing::{debug, trace};

/// MCU ticks between two reports at 800 Hz (25.6 MHz tick clock)
pub const TICKS_PER_REPORT: u64 = 32_000;

/// Native report rate of the MCU
pub const REPORT_RATE_HZ: f64 = 800.0;

/// One scripted read outcome
#[derive(Debug, Clone)]
pub enum MockRead {
    /// Bytes returned as-is
    Data(Bytes),
    /// Read bound elapsed
    Timeout,
    /// Transport failure
    Error(String),
}

impl MockRead {
    pub fn report(report: RawReport) -> Self {
        Self::Data(report.encode())
    }
}

/// Deterministic sensor report generator
#[derive(Debug, Clone)]
pub struct SyntheticReports {
    /// Frame-sync pulse every N reports (0 = never)
    pub sync_every: u64,

    pub sync_capabilities: u8,

    /// Fresh magnetometer reading every N reports
    pub mag_every: u64,

    /// Fresh environmental reading every N reports
    pub env_every: u64,

    /// Replace the report id every N reports (0 = never)
    pub corrupt_every: u64,
}

impl Default for SyntheticReports {
    fn default() -> Self {
        Self {
            // ~30 fps video against 800 Hz reports
            sync_every: 27,
            sync_capabilities: 1,
            mag_every: 8,
            env_every: 32,
            corrupt_every: 0,
        }
    }
}

impl SyntheticReports {
    /// Report number `n` of the stream
    pub fn report(&self, n: u64) -> RawReport {
        let phase = n as f64 * 0.01;
        let pulse = self.sync_every > 0 && n > 0 && n % self.sync_every == 0;
        let fresh = |every: u64| if every > 0 && n % every == 0 { 2 } else { 1 };

        RawReport {
            report_id: report_codec::layout::REPORT_ID_SENSOR_DATA,
            imu_not_valid: 0,
            timestamp: n * TICKS_PER_REPORT,
            gyro: [(phase.sin() * 300.0) as i16, (phase.cos() * 150.0) as i16, 12],
            accel: [(phase.sin() * 80.0) as i16, -40, 4096],
            frame_sync: u8::from(pulse),
            sync_capabilities: self.sync_capabilities,
            frame_sync_count: if self.sync_every > 0 {
                (n / self.sync_every + 1) as u32
            } else {
                0
            },
            imu_temp: 3550,
            mag_valid: fresh(self.mag_every),
            mag: [420, -130, 610],
            env_valid: fresh(self.env_every),
            temp: 2530 + (n % 7) as i16,
            press: 10_132_500,
            humid: 4_520,
            temp_cam_left: 3210,
            temp_cam_right: 3240,
            ..Default::default()
        }
    }

    /// Encoded report `n`, corrupted if scheduled
    pub fn bytes(&self, n: u64) -> Bytes {
        let bytes = self.report(n).encode();
        if self.corrupt_every > 0 && n > 0 && n % self.corrupt_every == 0 {
            let mut corrupted = bytes.to_vec();
            corrupted[0] = 0xEE;
            return corrupted.into();
        }
        bytes
    }
}

/// Observation side of a mock device
#[derive(Debug, Default)]
pub struct MockProbe {
    feature_reports: Mutex<Vec<Vec<u8>>>,
    reads: AtomicU64,
    blocking_resets: AtomicU64,
    closed: AtomicBool,
    stream_enabled: AtomicBool,
    reject_feature_reports: AtomicBool,
}

impl MockProbe {
    fn sent(&self) -> std::sync::MutexGuard<'_, Vec<Vec<u8>>> {
        self.feature_reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Every feature report sent, oldest first
    pub fn feature_reports(&self) -> Vec<Vec<u8>> {
        self.sent().clone()
    }

    pub fn pings(&self) -> usize {
        self.sent()
            .iter()
            .filter(|r| r.as_slice() == [REPORT_ID_REQUEST_SET, CMD_PING])
            .count()
    }

    /// Last stream enable/disable request
    pub fn last_stream_request(&self) -> Option<bool> {
        self.sent()
            .iter()
            .rev()
            .find(|r| r.first() == Some(&REPORT_ID_STREAM_STATUS))
            .and_then(|r| r.get(1))
            .map(|&v| v == 1)
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn blocking_resets(&self) -> u64 {
        self.blocking_resets.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Make every feature report fail
    pub fn reject_feature_reports(&self, reject: bool) {
        self.reject_feature_reports.store(reject, Ordering::Relaxed);
    }
}

/// Paces reads to a fixed report rate
#[derive(Debug)]
struct Pacer {
    period: Duration,
    start: Option<Instant>,
    emitted: u32,
}

impl Pacer {
    fn new(rate_hz: f64) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / rate_hz.max(1.0)),
            start: None,
            emitted: 0,
        }
    }

    /// Wait for the next slot; false if it is further away than `timeout`
    fn wait(&mut self, timeout: Duration) -> bool {
        let start = *self.start.get_or_insert_with(Instant::now);
        let due = start + self.period * self.emitted;
        let now = Instant::now();
        if due > now + timeout {
            thread::sleep(timeout);
            return false;
        }
        if due > now {
            thread::sleep(due - now);
        }
        self.emitted = self.emitted.saturating_add(1);
        true
    }
}

#[derive(Debug)]
enum ReportSource {
    Script(VecDeque<MockRead>),
    Synthetic { generator: SyntheticReports, next: u64 },
    Records { records: Arc<[Bytes]>, next: usize, looping: bool },
}

/// How a closed device becomes available to its backend again
#[derive(Debug)]
enum Lease {
    /// Device goes back into its backend slot, stream position intact
    Slot(Arc<Mutex<Option<MockHidDevice>>>),
    /// Backend builds a fresh device on the next open; clear its busy flag
    Flag(Arc<AtomicBool>),
}

/// Mock device handle
///
/// Closing (or dropping) an opened device releases it, so the same backend
/// can open it again.
#[derive(Debug)]
pub struct MockHidDevice {
    info: DeviceInfo,
    source: ReportSource,
    rate_hz: Option<f64>,
    pacer: Option<Pacer>,
    probe: Arc<MockProbe>,
    lease: Option<Lease>,
}

impl MockHidDevice {
    fn with_source(
        info: DeviceInfo,
        source: ReportSource,
        rate_hz: Option<f64>,
    ) -> (Self, Arc<MockProbe>) {
        let probe = Arc::new(MockProbe::default());
        let device = Self {
            info,
            source,
            rate_hz,
            pacer: rate_hz.map(Pacer::new),
            probe: probe.clone(),
            lease: None,
        };
        (device, probe)
    }

    /// Device playing `script` once, as fast as it is read
    pub fn scripted(info: DeviceInfo, script: Vec<MockRead>) -> (Self, Arc<MockProbe>) {
        Self::with_source(info, ReportSource::Script(script.into()), None)
    }

    /// Endless generated stream, paced to `rate_hz` when given
    pub fn synthetic(
        info: DeviceInfo,
        generator: SyntheticReports,
        rate_hz: Option<f64>,
    ) -> (Self, Arc<MockProbe>) {
        Self::with_source(info, ReportSource::Synthetic { generator, next: 0 }, rate_hz)
    }

    /// Recorded reports played in order
    pub fn records(
        info: DeviceInfo,
        records: Arc<[Bytes]>,
        looping: bool,
        rate_hz: Option<f64>,
    ) -> (Self, Arc<MockProbe>) {
        Self::with_source(
            info,
            ReportSource::Records {
                records,
                next: 0,
                looping,
            },
            rate_hz,
        )
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Clear `in_use` once this device is closed
    pub(crate) fn released_into(mut self, in_use: Arc<AtomicBool>) -> Self {
        self.lease = Some(Lease::Flag(in_use));
        self
    }

    fn release(&mut self) {
        match self.lease.take() {
            Some(Lease::Slot(slot)) => {
                let source =
                    std::mem::replace(&mut self.source, ReportSource::Script(VecDeque::new()));
                let returned = MockHidDevice {
                    info: self.info.clone(),
                    source,
                    rate_hz: self.rate_hz,
                    pacer: self.rate_hz.map(Pacer::new),
                    probe: self.probe.clone(),
                    lease: None,
                };
                *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(returned);
            }
            Some(Lease::Flag(in_use)) => in_use.store(false, Ordering::Release),
            None => {}
        }
    }

    fn idle(timeout: Duration) -> TransportResult<Bytes> {
        thread::sleep(timeout);
        Err(ContractError::Timeout {
            waited_ms: timeout.as_millis() as u64,
        })
    }
}

impl HidDevice for MockHidDevice {
    fn read_report(&mut self, timeout: Duration) -> TransportResult<Bytes> {
        if self.probe.is_closed() {
            return Err(ContractError::transport_io("device closed"));
        }
        self.probe.reads.fetch_add(1, Ordering::Relaxed);

        if let Some(pacer) = self.pacer.as_mut() {
            if !pacer.wait(timeout) {
                return Err(ContractError::Timeout {
                    waited_ms: timeout.as_millis() as u64,
                });
            }
        }

        match &mut self.source {
            ReportSource::Script(script) => match script.pop_front() {
                Some(MockRead::Data(bytes)) => Ok(bytes),
                Some(MockRead::Timeout) => Err(ContractError::Timeout {
                    waited_ms: timeout.as_millis() as u64,
                }),
                Some(MockRead::Error(message)) => Err(ContractError::transport_io(message)),
                None => Self::idle(timeout),
            },
            ReportSource::Synthetic { generator, next } => {
                let bytes = generator.bytes(*next);
                *next += 1;
                Ok(bytes)
            }
            ReportSource::Records {
                records,
                next,
                looping,
            } => {
                if *next >= records.len() {
                    if !*looping || records.is_empty() {
                        return Self::idle(timeout);
                    }
                    trace!(records = records.len(), "replay wrapped around");
                    *next = 0;
                }
                let bytes = records[*next].clone();
                *next += 1;
                Ok(bytes)
            }
        }
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> TransportResult<()> {
        if !nonblocking {
            self.probe.blocking_resets.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn send_feature_report(&mut self, payload: &[u8]) -> TransportResult<()> {
        if self.probe.is_closed() {
            return Err(ContractError::transport_io("device closed"));
        }
        if self.probe.reject_feature_reports.load(Ordering::Relaxed) {
            return Err(ContractError::transport_io("feature report rejected"));
        }
        if let [REPORT_ID_STREAM_STATUS, enable, ..] = payload {
            self.probe.stream_enabled.store(*enable == 1, Ordering::Release);
        }
        self.probe.sent().push(payload.to_vec());
        Ok(())
    }

    fn get_feature_report(&mut self, report_id: u8) -> TransportResult<Bytes> {
        if self.probe.is_closed() {
            return Err(ContractError::transport_io("device closed"));
        }
        match report_id {
            REPORT_ID_STREAM_STATUS => {
                let enabled = self.probe.stream_enabled.load(Ordering::Acquire);
                Ok(Bytes::copy_from_slice(&[REPORT_ID_STREAM_STATUS, u8::from(enabled)]))
            }
            other => Err(ContractError::transport_io(format!(
                "unsupported feature report {other:#04x}"
            ))),
        }
    }

    fn close(&mut self) {
        if self.probe.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(serial_number = self.info.serial_number, "mock device closed");
        self.release();
    }
}

impl Drop for MockHidDevice {
    fn drop(&mut self) {
        self.close();
    }
}

/// Mock backend holding devices while they are not open
///
/// An open device is exclusive, like a HID handle, until it is closed.
#[derive(Debug, Default)]
pub struct MockHidBackend {
    devices: Vec<(DeviceInfo, Arc<Mutex<Option<MockHidDevice>>>)>,
}

impl MockHidBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, device: MockHidDevice) -> Self {
        self.devices
            .push((device.info.clone(), Arc::new(Mutex::new(Some(device)))));
        self
    }

    /// Backend with one synthetic device
    pub fn synthetic(
        info: DeviceInfo,
        generator: SyntheticReports,
        rate_hz: Option<f64>,
    ) -> (Self, Arc<MockProbe>) {
        let (device, probe) = MockHidDevice::synthetic(info, generator, rate_hz);
        (Self::new().with_device(device), probe)
    }
}

impl HidBackend for MockHidBackend {
    fn enumerate(&self, vendor_id: u16) -> TransportResult<Vec<DeviceInfo>> {
        if vendor_id != USB_VENDOR_ID {
            return Ok(Vec::new());
        }
        Ok(self.devices.iter().map(|(info, _)| info.clone()).collect())
    }

    fn open(&self, info: &DeviceInfo) -> TransportResult<Box<dyn HidDevice>> {
        let (_, slot) = self
            .devices
            .iter()
            .find(|(known, _)| known.serial_number == info.serial_number)
            .ok_or_else(|| ContractError::open_failed(info.serial_number, "device not attached"))?;

        let mut device = slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| ContractError::open_failed(info.serial_number, "device busy"))?;
        device.probe.closed.store(false, Ordering::Release);
        device.lease = Some(Lease::Slot(slot.clone()));
        Ok(Box::new(device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FirmwareVersion, PID_MCU_ZED_2};
    use report_codec::{ReportDecoder, ScalePolicy};

    fn info(serial_number: u32) -> DeviceInfo {
        DeviceInfo {
            serial_number,
            product_id: PID_MCU_ZED_2,
            firmware: FirmwareVersion::new(3, 9),
        }
    }

    #[test]
    fn test_synthetic_stream_decodes() {
        let generator = SyntheticReports::default();
        let decoder = ReportDecoder::new(ScalePolicy::CURRENT);

        let first = decoder.decode(&generator.bytes(0)).unwrap();
        let second = decoder.decode(&generator.bytes(1)).unwrap();
        assert_eq!(second.tick_ns - first.tick_ns, 1_250_000);
        assert!(first.mag.is_some() && first.env.is_some());
        assert!(second.mag.is_none());

        let pulse = decoder.decode(&generator.bytes(27)).unwrap();
        assert!(pulse.sync.frame_sync);
        assert_eq!(pulse.sync.frame_sync_count, 2);
        assert!((first.env.unwrap().pressure_hpa - 1013.25).abs() < 1e-6);
    }

    #[test]
    fn test_corruption_schedule() {
        let generator = SyntheticReports {
            corrupt_every: 5,
            ..Default::default()
        };
        assert_eq!(generator.bytes(4)[0], 0x01);
        assert_eq!(generator.bytes(5)[0], 0xEE);
    }

    #[test]
    fn test_backend_opens_each_device_once() {
        let (backend, _) = MockHidBackend::synthetic(info(7), SyntheticReports::default(), None);

        assert!(backend.enumerate(0x1234).unwrap().is_empty());
        let devices = backend.enumerate(USB_VENDOR_ID).unwrap();
        assert_eq!(devices.len(), 1);

        let mut first = backend.open(&devices[0]).unwrap();
        let err = backend.open(&devices[0]).err().unwrap();
        assert!(matches!(err, ContractError::OpenFailed { serial_number: 7, .. }));
        assert!(backend.open(&info(8)).is_err());

        first.close();
        assert!(backend.open(&devices[0]).is_ok());
    }

    #[test]
    fn test_reopened_device_continues_stream() {
        let generator = SyntheticReports::default();
        let (backend, probe) = MockHidBackend::synthetic(info(7), generator.clone(), None);
        let timeout = Duration::from_millis(10);

        let mut device = backend.open(&info(7)).unwrap();
        device.read_report(timeout).unwrap();
        device.read_report(timeout).unwrap();
        drop(device);
        assert!(probe.is_closed());

        let mut device = backend.open(&info(7)).unwrap();
        assert!(!probe.is_closed());
        assert_eq!(device.read_report(timeout).unwrap(), generator.bytes(2));
    }

    #[test]
    fn test_feature_reports_are_recorded() {
        let (mut device, probe) = MockHidDevice::scripted(info(1), Vec::new());
        device.send_feature_report(&[0x32, 1]).unwrap();
        device.send_feature_report(&[0x21, 0xF2]).unwrap();

        assert_eq!(probe.pings(), 1);
        assert_eq!(probe.last_stream_request(), Some(true));
        assert_eq!(&device.get_feature_report(0x32).unwrap()[..], &[0x32, 1]);

        device.close();
        assert!(probe.is_closed());
        assert!(device.read_report(Duration::from_millis(1)).is_err());
    }

    #[test]
    fn test_script_exhaustion_waits_for_timeout() {
        let (mut device, _) = MockHidDevice::scripted(info(1), vec![MockRead::Timeout]);
        let timeout = Duration::from_millis(10);
        assert!(matches!(
            device.read_report(timeout),
            Err(ContractError::Timeout { .. })
        ));

        let start = Instant::now();
        assert!(device.read_report(timeout).is_err());
        assert!(start.elapsed() >= timeout);
    }

    #[test]
    fn test_paced_stream_keeps_rate() {
        let (mut device, _) =
            MockHidDevice::synthetic(info(1), SyntheticReports::default(), Some(REPORT_RATE_HZ));
        let start = Instant::now();
        for _ in 0..41 {
            device.read_report(Duration::from_millis(500)).unwrap();
        }
        // 40 periods of 1.25 ms
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
