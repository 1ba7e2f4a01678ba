//! SensorCapture - device session and consumer API
//!
//! Opening a session enables the MCU data stream and starts one acquisition
//! thread. Consumers on any thread read the latest sample of each kind with
//! a bounded wait.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use clock_sync::{ClockSynchronizer, HostClock, SystemHostClock};
use contracts::{
    CamTempSample, CaptureConfig, CaptureMetricsSnapshot, ContractError, DeviceInfo, DeviceModel,
    EnvSample, FirmwareVersion, HidBackend, HidDevice, ImuSample, MagSample, PID_MCU_ZED_2,
    PID_MCU_ZED_2I, PID_MCU_ZED_MINI, SyncSnapshot, USB_VENDOR_ID, VideoClock,
};
use report_codec::layout::REPORT_ID_STREAM_STATUS;
use report_codec::{ReportDecoder, parse_stream_status, stream_status_request};
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use crate::acquisition::{Acquisition, AcquisitionState, SharedState};
use crate::error::{CaptureError, Result};
use crate::metrics::CaptureMetrics;
use crate::store::ChannelStore;

const MCU_PRODUCT_IDS: [u16; 3] = [PID_MCU_ZED_MINI, PID_MCU_ZED_2, PID_MCU_ZED_2I];

/// One streaming sensor device
///
/// # Example
///
/// ```ignore
/// let mut capture = SensorCapture::open(CaptureConfig::default(), &backend, None)?;
/// if let Some(imu) = capture.get_last_imu(Duration::from_millis(5)) {
///     println!("{} {:?}", imu.timestamp_ns, imu.accel);
/// }
/// capture.stop();
/// ```
pub struct SensorCapture {
    info: DeviceInfo,
    config: CaptureConfig,
    stream_enabled: bool,
    store: Arc<ChannelStore>,
    metrics: Arc<CaptureMetrics>,
    shared: Arc<SharedState>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SensorCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorCapture")
            .field("info", &self.info)
            .field("state", &self.shared.state())
            .finish()
    }
}

impl SensorCapture {
    /// Sensor MCUs attached to `backend`
    pub fn enumerate_devices(backend: &dyn HidBackend) -> Result<Vec<DeviceInfo>> {
        let devices = backend
            .enumerate(USB_VENDOR_ID)?
            .into_iter()
            .filter(|d| MCU_PRODUCT_IDS.contains(&d.product_id))
            .collect::<Vec<_>>();
        debug!(count = devices.len(), "enumerated sensor devices");
        Ok(devices)
    }

    /// Open a device and start streaming
    ///
    /// `config.serial_number` selects the device, `None` takes the first one.
    /// `video_clock` is used only when `config.video_sync` is set.
    pub fn open(
        config: CaptureConfig,
        backend: &dyn HidBackend,
        video_clock: Option<Arc<dyn VideoClock>>,
    ) -> Result<Self> {
        Self::open_with_clock(config, backend, video_clock, Arc::new(SystemHostClock))
    }

    #[instrument(
        name = "capture_open",
        skip(config, backend, video_clock, clock),
        fields(serial_number = ?config.serial_number)
    )]
    pub fn open_with_clock(
        config: CaptureConfig,
        backend: &dyn HidBackend,
        video_clock: Option<Arc<dyn VideoClock>>,
        clock: Arc<dyn HostClock>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ContractError::config_validation("capture", e.to_string()))?;

        let info = Self::select_device(backend, config.serial_number)?;
        let mut device = backend.open(&info)?;

        if let Err(source) = device.send_feature_report(&stream_status_request(true)) {
            device.close();
            return Err(CaptureError::StreamEnable {
                serial_number: info.serial_number,
                source,
            });
        }
        let stream_enabled = Self::read_stream_status(device.as_mut());

        let video = match (config.video_sync, video_clock) {
            (true, Some(video)) => Some(video),
            (true, None) => {
                warn!("video sync requested without a video clock, sync disabled");
                None
            }
            (false, _) => None,
        };

        let store = Arc::new(ChannelStore::new());
        let metrics = Arc::new(CaptureMetrics::new());
        let shared = Arc::new(SharedState::default());

        let acquisition = Acquisition::new(
            device,
            ReportDecoder::for_firmware(info.firmware),
            ClockSynchronizer::with_clock(&config.clock, video, clock),
            store.clone(),
            metrics.clone(),
            shared.clone(),
            info.serial_number,
            &config,
        );

        let worker = thread::Builder::new()
            .name(format!("zed-sensors-{}", info.serial_number))
            .spawn(move || acquisition.run())
            .map_err(CaptureError::ThreadSpawn)?;

        info!(
            serial_number = info.serial_number,
            model = %info.model(),
            firmware = %info.firmware,
            stream_enabled,
            "sensor capture started"
        );

        Ok(Self {
            info,
            config,
            stream_enabled,
            store,
            metrics,
            shared,
            worker: Some(worker),
        })
    }

    fn select_device(backend: &dyn HidBackend, serial_number: Option<u32>) -> Result<DeviceInfo> {
        let devices = Self::enumerate_devices(backend)?;
        let found = match serial_number {
            Some(sn) => devices.into_iter().find(|d| d.serial_number == sn),
            None => devices.into_iter().next(),
        };
        found.ok_or_else(|| ContractError::DeviceNotFound { serial_number }.into())
    }

    fn read_stream_status(device: &mut dyn HidDevice) -> bool {
        match device
            .get_feature_report(REPORT_ID_STREAM_STATUS)
            .map_err(|e| e.to_string())
            .and_then(|data| parse_stream_status(&data).map_err(|e| e.to_string()))
        {
            Ok(enabled) => enabled,
            Err(error) => {
                warn!(%error, "could not read back stream status, assuming enabled");
                true
            }
        }
    }

    // ===== Consumer API =====

    /// Latest unread inertial sample, waiting at most `timeout`
    pub fn get_last_imu(&self, timeout: Duration) -> Option<ImuSample> {
        let consumer = &self.config.consumer;
        self.store
            .imu
            .take(consumer.effective_timeout(timeout, consumer.imu_grain_us))
    }

    /// Latest unread magnetometer sample, waiting at most `timeout`
    pub fn get_last_mag(&self, timeout: Duration) -> Option<MagSample> {
        let consumer = &self.config.consumer;
        self.store
            .mag
            .take(consumer.effective_timeout(timeout, consumer.aux_grain_us))
    }

    /// Latest unread environmental sample, waiting at most `timeout`
    pub fn get_last_env(&self, timeout: Duration) -> Option<EnvSample> {
        let consumer = &self.config.consumer;
        self.store
            .env
            .take(consumer.effective_timeout(timeout, consumer.aux_grain_us))
    }

    /// Latest unread board-temperature sample, waiting at most `timeout`
    pub fn get_last_cam_temp(&self, timeout: Duration) -> Option<CamTempSample> {
        let consumer = &self.config.consumer;
        self.store
            .cam_temp
            .take(consumer.effective_timeout(timeout, consumer.aux_grain_us))
    }

    // ===== Session =====

    pub fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn serial_number(&self) -> u32 {
        self.info.serial_number
    }

    pub fn firmware_version(&self) -> FirmwareVersion {
        self.info.firmware
    }

    pub fn device_model(&self) -> DeviceModel {
        self.info.model()
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn state(&self) -> AcquisitionState {
        self.shared.state()
    }

    pub fn is_streaming(&self) -> bool {
        self.shared.state() == AcquisitionState::Streaming
    }

    /// Stream status read back from the MCU at open, while still running
    pub fn is_data_stream_enabled(&self) -> bool {
        self.stream_enabled && self.shared.state() != AcquisitionState::Stopped
    }

    pub fn sync_snapshot(&self) -> SyncSnapshot {
        self.shared.sync_snapshot()
    }

    pub fn metrics(&self) -> CaptureMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Stop the acquisition thread and wait for it
    ///
    /// Blocks at most about one read timeout. Idempotent.
    #[instrument(name = "capture_stop", skip(self), fields(serial_number = self.info.serial_number))]
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.shared.request_stop();
        if worker.join().is_err() {
            warn!("acquisition thread panicked");
        }
        info!("sensor capture stopped");
    }
}

impl Drop for SensorCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockHidBackend, MockHidDevice, MockRead, SyntheticReports};
    use contracts::PID_MCU_ZED_2;
    use std::time::Instant;

    fn info(serial_number: u32) -> DeviceInfo {
        DeviceInfo {
            serial_number,
            product_id: PID_MCU_ZED_2,
            firmware: FirmwareVersion::new(3, 9),
        }
    }

    fn fast_config() -> CaptureConfig {
        CaptureConfig {
            read_timeout_ms: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_enumerate_filters_foreign_products() {
        let foreign = DeviceInfo {
            product_id: 0xf582,
            ..info(2)
        };
        let backend = MockHidBackend::new()
            .with_device(MockHidDevice::scripted(info(1), Vec::new()).0)
            .with_device(MockHidDevice::scripted(foreign, Vec::new()).0);

        let devices = SensorCapture::enumerate_devices(&backend).unwrap();
        assert_eq!(devices, vec![info(1)]);
    }

    #[test]
    fn test_open_unknown_serial_fails() {
        let (backend, _) = MockHidBackend::synthetic(info(5), SyntheticReports::default(), None);
        let config = CaptureConfig {
            serial_number: Some(6),
            ..fast_config()
        };
        let err = SensorCapture::open(config, &backend, None).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Contract(ContractError::DeviceNotFound {
                serial_number: Some(6)
            })
        ));
    }

    #[test]
    fn test_open_with_no_devices_fails() {
        let backend = MockHidBackend::new();
        let err = SensorCapture::open(fast_config(), &backend, None).unwrap_err();
        assert!(err.to_string().contains("no sensor device found"));
    }

    #[test]
    fn test_stream_enable_failure_is_reported() {
        let (device, probe) = MockHidDevice::scripted(info(9), Vec::new());
        probe.reject_feature_reports(true);
        let backend = MockHidBackend::new().with_device(device);

        let err = SensorCapture::open(fast_config(), &backend, None).unwrap_err();
        assert!(matches!(err, CaptureError::StreamEnable { serial_number: 9, .. }));
        assert!(probe.is_closed());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (backend, _) = MockHidBackend::synthetic(info(5), SyntheticReports::default(), None);
        let config = CaptureConfig {
            read_timeout_ms: 0,
            ..Default::default()
        };
        let err = SensorCapture::open(config, &backend, None).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Contract(ContractError::ConfigValidation { .. })
        ));
    }

    #[test]
    fn test_session_streams_and_stops() {
        let (backend, probe) =
            MockHidBackend::synthetic(info(77), SyntheticReports::default(), Some(800.0));
        let mut capture = SensorCapture::open(fast_config(), &backend, None).unwrap();

        assert_eq!(capture.serial_number(), 77);
        assert_eq!(capture.device_model(), DeviceModel::Zed2);
        assert!(capture.is_data_stream_enabled());
        assert_eq!(probe.last_stream_request(), Some(true));

        let imu = capture.get_last_imu(Duration::from_secs(2)).unwrap();
        assert!(imu.timestamp_ns > 0);
        assert!((imu.accel.z - 9.81).abs() < 1e-6);
        assert!(capture.is_streaming());

        let env = capture.get_last_env(Duration::from_secs(2)).unwrap();
        assert!((env.pressure_hpa - 1013.25).abs() < 1e-6);

        capture.stop();
        assert!(!capture.is_streaming());
        assert!(!capture.is_data_stream_enabled());
        assert!(probe.is_closed());
        assert_eq!(probe.last_stream_request(), Some(false));

        // idempotent
        capture.stop();
    }

    #[test]
    fn test_consumer_waits_at_least_timeout() {
        let (device, _) = MockHidDevice::scripted(info(3), vec![MockRead::Timeout]);
        let backend = MockHidBackend::new().with_device(device);
        let capture = SensorCapture::open(fast_config(), &backend, None).unwrap();

        let timeout = Duration::from_millis(15);
        let start = Instant::now();
        assert!(capture.get_last_mag(timeout).is_none());
        assert!(start.elapsed() >= timeout);
    }

    #[test]
    fn test_thread_is_named_after_serial() {
        let (backend, _) = MockHidBackend::synthetic(info(4242), SyntheticReports::default(), None);
        let capture = SensorCapture::open(fast_config(), &backend, None).unwrap();
        let name = capture
            .worker
            .as_ref()
            .and_then(|w| w.thread().name().map(str::to_owned));
        assert_eq!(name.as_deref(), Some("zed-sensors-4242"));
    }
}
