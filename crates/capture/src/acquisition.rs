//! Acquisition loop
//!
//! Runs on a dedicated thread: read one report, decode, timestamp, publish.
//! Transport and protocol failures are logged, counted and skipped; they
//! never leave this thread.
//!
//! State machine: `Idle -> Streaming -> Stopped`.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use clock_sync::ClockSynchronizer;
use contracts::{CaptureConfig, ContractError, HidDevice, SensorKind, SyncSnapshot};
use report_codec::{
    CodecError, DecodedReport, ReportDecoder, ping_request, stream_status_request,
};
use tracing::{debug, info, instrument, trace, warn};

use crate::metrics::CaptureMetrics;
use crate::store::ChannelStore;

/// Acquisition thread state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AcquisitionState {
    Idle = 0,
    Streaming = 1,
    Stopped = 2,
}

impl AcquisitionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Streaming,
            2 => Self::Stopped,
            _ => Self::Idle,
        }
    }
}

/// State shared between the acquisition thread and its owner
#[derive(Debug)]
pub struct SharedState {
    stop: AtomicBool,
    state: AtomicU8,
    snapshot: Mutex<SyncSnapshot>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            stop: AtomicBool::new(false),
            state: AtomicU8::new(AcquisitionState::Idle as u8),
            snapshot: Mutex::new(SyncSnapshot::default()),
        }
    }
}

impl SharedState {
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> AcquisitionState {
        AcquisitionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: AcquisitionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn sync_snapshot(&self) -> SyncSnapshot {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store_snapshot(&self, snapshot: SyncSnapshot) {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }
}

/// Result of one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Report processed; number of samples published
    Published(usize),
    /// Report accepted but the clock is not anchored yet
    Anchoring,
    /// Nothing arrived within the read bound
    Timeout,
    /// Short read or wrong report id
    ProtocolError,
    /// Transport failure
    TransportError,
}

/// Acquisition loop bound to one open device
pub struct Acquisition {
    device: Box<dyn HidDevice>,
    decoder: ReportDecoder,
    sync: ClockSynchronizer,
    store: Arc<ChannelStore>,
    metrics: Arc<CaptureMetrics>,
    shared: Arc<SharedState>,
    serial_number: u32,
    read_timeout: Duration,
    ping_interval: u32,
    verbose: bool,
    since_ping: u32,
}

impl Acquisition {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: Box<dyn HidDevice>,
        decoder: ReportDecoder,
        sync: ClockSynchronizer,
        store: Arc<ChannelStore>,
        metrics: Arc<CaptureMetrics>,
        shared: Arc<SharedState>,
        serial_number: u32,
        config: &CaptureConfig,
    ) -> Self {
        Self {
            device,
            decoder,
            sync,
            store,
            metrics,
            shared,
            serial_number,
            read_timeout: config.read_timeout(),
            ping_interval: config.ping_interval.max(1),
            verbose: config.verbose,
            since_ping: 0,
        }
    }

    /// Thread body; returns once a stop is requested
    #[instrument(name = "acquisition_run", skip(self), fields(serial_number = self.serial_number))]
    pub fn run(mut self) {
        self.shared.set_state(AcquisitionState::Streaming);
        info!("acquisition loop started");

        while !self.shared.stop_requested() {
            self.step();
        }

        self.shutdown();
    }

    /// One iteration: keep-alive, read, decode, publish
    pub fn step(&mut self) -> CycleOutcome {
        if self.since_ping >= self.ping_interval {
            self.send_ping();
            self.since_ping = 0;
        }
        self.since_ping += 1;

        let bytes = match self.device.read_report(self.read_timeout) {
            Ok(bytes) => bytes,
            Err(ContractError::Timeout { waited_ms }) => {
                self.metrics.record_timeout();
                trace!(waited_ms, "no sensor report within read bound");
                self.reassert_blocking();
                return CycleOutcome::Timeout;
            }
            Err(err) => {
                self.metrics.record_transport_error();
                self.log_recoverable(&err.to_string(), "sensor report read failed");
                self.reassert_blocking();
                return CycleOutcome::TransportError;
            }
        };
        self.metrics.record_report();

        match self.decoder.decode(&bytes) {
            Ok(decoded) => self.handle(decoded),
            Err(err) => {
                match err {
                    CodecError::TooShort { .. } => self.metrics.record_short_read(),
                    CodecError::UnexpectedReportId { .. } => self.metrics.record_decode_error(),
                }
                self.log_recoverable(&err.to_string(), "sensor data type mismatch");
                self.reassert_blocking();
                CycleOutcome::ProtocolError
            }
        }
    }

    fn handle(&mut self, decoded: DecodedReport) -> CycleOutcome {
        let stamped = self
            .sync
            .process(decoded.tick_ns, decoded.imu_valid(), decoded.sync);

        let snapshot = self.sync.snapshot();
        self.metrics
            .update_sync(snapshot.sync_events, u64::from(snapshot.adjustments));
        self.shared.store_snapshot(snapshot);

        let Some(timestamp_ns) = stamped else {
            return CycleOutcome::Anchoring;
        };

        let mut published = 0;
        if let Some(mut imu) = decoded.imu {
            imu.timestamp_ns = timestamp_ns;
            self.store.imu.publish(imu);
            self.metrics.record_publish(SensorKind::Imu);
            published += 1;
        }
        if let Some(mut mag) = decoded.mag {
            mag.timestamp_ns = timestamp_ns;
            self.store.mag.publish(mag);
            self.metrics.record_publish(SensorKind::Magnetometer);
            published += 1;
        }
        if let Some(mut env) = decoded.env {
            env.timestamp_ns = timestamp_ns;
            self.store.env.publish(env);
            self.metrics.record_publish(SensorKind::Environment);
            published += 1;
        }
        // board temperature is sampled together with the environmental block
        if let Some(mut cam_temp) = decoded.cam_temp.filter(|_| decoded.env_marker.is_new()) {
            cam_temp.timestamp_ns = timestamp_ns;
            self.store.cam_temp.publish(cam_temp);
            self.metrics.record_publish(SensorKind::CameraTemperature);
            published += 1;
        }

        trace!(timestamp_ns, published, "sensor report processed");
        CycleOutcome::Published(published)
    }

    fn send_ping(&mut self) {
        match self.device.send_feature_report(&ping_request()) {
            Ok(()) => {
                self.metrics.record_ping(true);
                trace!("keep-alive ping sent");
            }
            Err(err) => {
                self.metrics.record_ping(false);
                self.log_recoverable(&err.to_string(), "keep-alive ping failed");
            }
        }
    }

    fn reassert_blocking(&mut self) {
        if let Err(err) = self.device.set_nonblocking(false) {
            debug!(error = %err, "failed to re-assert blocking reads");
        }
    }

    fn log_recoverable(&self, error: &str, message: &str) {
        if self.verbose {
            warn!(serial_number = self.serial_number, error, "{message}");
        } else {
            debug!(serial_number = self.serial_number, error, "{message}");
        }
    }

    fn shutdown(&mut self) {
        if let Err(err) = self.device.send_feature_report(&stream_status_request(false)) {
            warn!(error = %err, "failed to disable sensor data stream");
        }
        self.device.close();
        self.shared.set_state(AcquisitionState::Stopped);

        let snapshot = self.metrics.snapshot();
        info!(
            reports = snapshot.reports_read,
            failed_reads = snapshot.failed_reads(),
            pings = snapshot.pings_sent,
            "acquisition loop stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockHidDevice, MockProbe, MockRead, SyntheticReports};
    use clock_sync::ManualHostClock;
    use contracts::{DeviceInfo, FirmwareVersion, PID_MCU_ZED_2I};
    use report_codec::RawReport;

    fn info() -> DeviceInfo {
        DeviceInfo {
            serial_number: 1010,
            product_id: PID_MCU_ZED_2I,
            firmware: FirmwareVersion::new(4, 0),
        }
    }

    fn acquisition(
        script: Vec<MockRead>,
        config: &CaptureConfig,
    ) -> (Acquisition, Arc<MockProbe>) {
        let (device, handle) = MockHidDevice::scripted(info(), script);
        let clock = Arc::new(ManualHostClock::new(1_000_000_000));
        let acq = Acquisition::new(
            Box::new(device),
            ReportDecoder::for_firmware(info().firmware),
            ClockSynchronizer::with_clock(&config.clock, None, clock),
            Arc::new(ChannelStore::new()),
            Arc::new(CaptureMetrics::new()),
            Arc::new(SharedState::default()),
            info().serial_number,
            config,
        );
        (acq, handle)
    }

    fn report(n: u64) -> RawReport {
        SyntheticReports::default().report(n)
    }

    #[test]
    fn test_first_report_only_anchors() {
        let script = vec![MockRead::report(report(0)), MockRead::report(report(1))];
        let (mut acq, _) = acquisition(script, &CaptureConfig::default());

        assert_eq!(acq.step(), CycleOutcome::Anchoring);
        assert!(acq.store.imu.take(Duration::ZERO).is_none());

        assert!(matches!(acq.step(), CycleOutcome::Published(n) if n >= 1));
        let imu = acq.store.imu.take(Duration::ZERO).unwrap();
        assert_eq!(imu.timestamp_ns, 1_000_000_000 + 1_250_000);
    }

    #[test]
    fn test_corrupted_id_is_skipped() {
        let mut corrupted = report(1).encode().to_vec();
        corrupted[0] = 0x05;
        let script = vec![
            MockRead::report(report(0)),
            MockRead::Data(corrupted.into()),
            MockRead::report(report(2)),
        ];
        let (mut acq, handle) = acquisition(script, &CaptureConfig::default());

        acq.step();
        assert_eq!(acq.step(), CycleOutcome::ProtocolError);
        assert!(acq.store.imu.take(Duration::ZERO).is_none());
        assert_eq!(handle.blocking_resets(), 1);

        assert!(matches!(acq.step(), CycleOutcome::Published(_)));
        assert!(acq.store.imu.take(Duration::ZERO).is_some());

        let metrics = acq.metrics.snapshot();
        assert_eq!(metrics.decode_errors, 1);
        assert_eq!(metrics.imu_published, 1);
    }

    #[test]
    fn test_short_read_is_skipped() {
        let short = report(1).encode().slice(..30);
        let script = vec![MockRead::report(report(0)), MockRead::Data(short)];
        let (mut acq, _) = acquisition(script, &CaptureConfig::default());

        acq.step();
        assert_eq!(acq.step(), CycleOutcome::ProtocolError);
        assert_eq!(acq.metrics.snapshot().short_reads, 1);
    }

    #[test]
    fn test_board_temperature_requires_fresh_environment() {
        let stale_env = RawReport {
            env_valid: 1,
            temp_cam_left: 3000,
            temp_cam_right: 3000,
            ..report(1)
        };
        let fresh_env = RawReport {
            env_valid: 2,
            temp_cam_left: 3000,
            temp_cam_right: 3000,
            ..report(2)
        };
        let script = vec![
            MockRead::report(report(0)),
            MockRead::report(stale_env),
            MockRead::report(fresh_env),
        ];
        let (mut acq, _) = acquisition(script, &CaptureConfig::default());

        acq.step();
        acq.step();
        assert!(acq.store.cam_temp.take(Duration::ZERO).is_none());
        assert!(acq.store.env.take(Duration::ZERO).is_none());

        acq.step();
        assert!(acq.store.env.take(Duration::ZERO).is_some());
        let cam = acq.store.cam_temp.take(Duration::ZERO).unwrap();
        assert!((cam.left_c - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_imu_publishes_other_channels_only() {
        let no_imu = RawReport {
            imu_not_valid: 1,
            mag_valid: 2,
            ..report(1)
        };
        let script = vec![MockRead::report(report(0)), MockRead::report(no_imu)];
        let (mut acq, _) = acquisition(script, &CaptureConfig::default());

        acq.step();
        acq.step();
        assert!(acq.store.imu.take(Duration::ZERO).is_none());
        assert!(acq.store.mag.take(Duration::ZERO).is_some());
    }

    #[test]
    fn test_motion_flags_reach_consumer() {
        let falling = RawReport {
            camera_falling: 1,
            camera_falling_count: 3,
            ..report(1)
        };
        let script = vec![MockRead::report(report(0)), MockRead::report(falling)];
        let (mut acq, _) = acquisition(script, &CaptureConfig::default());

        acq.step();
        acq.step();
        let imu = acq.store.imu.take(Duration::ZERO).unwrap();
        assert!(imu.motion.falling);
        assert_eq!(imu.motion.falling_count, 3);
        assert!(!imu.motion.moving);
    }

    #[test]
    fn test_ping_cadence() {
        let config = CaptureConfig {
            ping_interval: 4,
            read_timeout_ms: 1,
            ..Default::default()
        };
        // nothing but timeouts: pings must keep going
        let (mut acq, handle) = acquisition(vec![MockRead::Timeout; 13], &config);
        for _ in 0..13 {
            assert_eq!(acq.step(), CycleOutcome::Timeout);
        }
        // pings before iterations 5, 9 and 13
        assert_eq!(handle.pings(), 3);
        assert_eq!(acq.metrics.snapshot().pings_sent, 3);
        assert_eq!(acq.metrics.snapshot().timeouts, 13);
    }

    #[test]
    fn test_transport_error_is_recovered() {
        let script = vec![
            MockRead::report(report(0)),
            MockRead::Error("cable glitch".into()),
            MockRead::report(report(2)),
        ];
        let (mut acq, _) = acquisition(script, &CaptureConfig::default());
        acq.step();
        assert_eq!(acq.step(), CycleOutcome::TransportError);
        assert!(matches!(acq.step(), CycleOutcome::Published(_)));
    }

    #[test]
    fn test_run_stops_and_disables_stream() {
        let config = CaptureConfig {
            read_timeout_ms: 5,
            ..Default::default()
        };
        let (acq, handle) = acquisition(Vec::new(), &config);
        let shared = acq.shared.clone();

        let worker = std::thread::spawn(move || acq.run());
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(shared.state(), AcquisitionState::Streaming);

        shared.request_stop();
        worker.join().unwrap();

        assert_eq!(shared.state(), AcquisitionState::Stopped);
        assert!(handle.is_closed());
        assert_eq!(handle.last_stream_request(), Some(false));
    }
}
