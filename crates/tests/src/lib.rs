//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - Contract defaults and serialization
//! - Decoder + clock synchronizer on synthetic report streams
//! - Full capture sessions against the synthetic and replay devices

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{CaptureConfig, CaptureMetricsSnapshot, SensorKind, SyncSnapshot};

    #[test]
    fn test_default_config_survives_loader() {
        let toml = ConfigLoader::to_toml(&CaptureConfig::default()).unwrap();
        let loaded = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        assert_eq!(loaded, CaptureConfig::default());
    }

    #[test]
    fn test_snapshots_serialize() {
        let json = serde_json::to_value(SyncSnapshot::default()).unwrap();
        assert_eq!(json["scale"], 1.0);
        assert_eq!(json["anchored"], false);
        assert!(json["last_timestamp_ns"].is_null());

        let metrics = CaptureMetricsSnapshot {
            env_published: 3,
            ..Default::default()
        };
        assert_eq!(metrics.published(SensorKind::Environment), 3);
        let json = serde_json::to_value(metrics).unwrap();
        assert_eq!(json["env_published"], 3);
    }
}

#[cfg(test)]
mod pipeline_tests {
    use std::sync::Arc;

    use capture::SyntheticReports;
    use clock_sync::{ClockSynchronizer, HostClock, ManualHostClock};
    use contracts::{ClockSyncConfig, FirmwareVersion, VideoClock};
    use report_codec::ReportDecoder;

    const ORIGIN: u64 = 1_700_000_000_000_000_000;
    const PERIOD_NS: u64 = 1_250_000;

    /// Decode `reports` synthetic reports with host time running `host_rate`
    /// times the MCU rate; returns the last timestamp and its ground truth.
    fn drive(
        sync: &mut ClockSynchronizer,
        clock: &ManualHostClock,
        host_rate: f64,
        reports: u64,
    ) -> (u64, u64) {
        let generator = SyntheticReports::default();
        let decoder = ReportDecoder::for_firmware(FirmwareVersion::new(4, 0));
        let mut last = (0, 0);

        for n in 0..reports {
            let host_elapsed = (n as f64 * PERIOD_NS as f64 * host_rate) as u64;
            clock.set(host_elapsed);

            let decoded = decoder.decode(&generator.bytes(n)).unwrap();
            assert_eq!(decoded.tick_ns, n * PERIOD_NS);
            if let Some(ts) = sync.process(decoded.tick_ns, decoded.imu_valid(), decoded.sync) {
                last = (ts, ORIGIN + host_elapsed);
            }
        }
        last
    }

    #[test]
    fn test_decoded_stream_drift_converges() {
        for &k in &[0.9_f64, 1.1] {
            let clock = Arc::new(ManualHostClock::new(ORIGIN));
            let mut sync =
                ClockSynchronizer::with_clock(&ClockSyncConfig::default(), None, clock.clone());

            // 27 reports per sync pulse, 50 pulses per adjustment
            let (ts, truth) = drive(&mut sync, &clock, k, 27 * 50 * 6);

            assert!(sync.snapshot().adjustments >= 5);
            assert!((sync.scale() - k).abs() < 0.01, "k={k}: {}", sync.scale());
            // error left over from the unadjusted first window, well below
            // the ~10% drift it would have accumulated uncorrected
            let drift_uncorrected = (truth - ORIGIN) as f64 * (k - 1.0).abs();
            let error = (ts as f64 - truth as f64).abs();
            assert!(error < drift_uncorrected / 2.0, "k={k}: error {error}");
        }
    }

    #[test]
    fn test_decoded_stream_drift_converges_under_video_sync() {
        for &k in &[0.9_f64, 1.1] {
            let clock = Arc::new(ManualHostClock::new(ORIGIN));
            let video: Arc<dyn VideoClock> = {
                let clock = clock.clone();
                Arc::new(move || clock.system_ns())
            };
            let mut sync =
                ClockSynchronizer::with_clock(&ClockSyncConfig::default(), Some(video), clock.clone());

            let (ts, truth) = drive(&mut sync, &clock, k, 27 * 50 * 6);

            assert!((sync.scale() - k).abs() < 0.01, "k={k}: {}", sync.scale());
            assert!(ts.abs_diff(truth) < 2_000_000, "k={k}: {ts} vs {truth}");
        }
    }

    #[test]
    fn test_decoded_stream_video_offset() {
        let clock = Arc::new(ManualHostClock::new(ORIGIN));
        let lag: i64 = 7_500_000;
        let video: Arc<dyn VideoClock> = {
            let clock = clock.clone();
            Arc::new(move || clock.system_ns() - lag as u64)
        };
        let mut sync =
            ClockSynchronizer::with_clock(&ClockSyncConfig::default(), Some(video), clock.clone());

        // anchor + 3 sync pulses at 27-report spacing
        drive(&mut sync, &clock, 1.0, 27 * 3 + 1);

        let snapshot = sync.snapshot();
        assert_eq!(snapshot.sync_events, 3);
        assert_eq!(sync.video_offset_ns(), lag);
    }

    #[test]
    fn test_corrupted_reports_do_not_reach_synchronizer() {
        let generator = SyntheticReports {
            corrupt_every: 5,
            ..Default::default()
        };
        let decoder = ReportDecoder::for_firmware(FirmwareVersion::new(4, 0));

        let failures = (0..50)
            .filter(|&n| decoder.decode(&generator.bytes(n)).is_err())
            .count();
        assert_eq!(failures, 9);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::thread;
    use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

    use capture::{
        write_dump, MockHidBackend, MockHidDevice, ReplayHidBackend, SensorCapture,
        SyntheticReports,
    };
    use config_loader::ConfigLoader;
    use contracts::{
        CaptureConfig, DeviceInfo, FirmwareVersion, SensorKind, PID_MCU_ZED_2, PID_MCU_ZED_2I,
    };
    use observability::SampleRateAggregator;

    fn info(serial_number: u32, firmware: FirmwareVersion) -> DeviceInfo {
        DeviceInfo {
            serial_number,
            product_id: PID_MCU_ZED_2I,
            firmware,
        }
    }

    fn fast_config() -> CaptureConfig {
        CaptureConfig {
            read_timeout_ms: 20,
            ..Default::default()
        }
    }

    fn now_ns() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos() as u64
    }

    /// End-to-end: synthetic 800 Hz device -> acquisition thread -> consumer
    #[test]
    fn test_e2e_synthetic_session() {
        let (backend, probe) = MockHidBackend::synthetic(
            info(2001, FirmwareVersion::new(4, 0)),
            SyntheticReports::default(),
            Some(800.0),
        );
        let mut capture = SensorCapture::open(fast_config(), &backend, None).unwrap();

        let mut rates = SampleRateAggregator::new();
        let mut imu_timestamps = Vec::new();
        let started = Instant::now();
        while started.elapsed() < Duration::from_millis(700) {
            if let Some(imu) = capture.get_last_imu(Duration::from_millis(20)) {
                rates.update(SensorKind::Imu, imu.timestamp_ns);
                imu_timestamps.push(imu.timestamp_ns);
            }
            if let Some(env) = capture.get_last_env(Duration::ZERO) {
                rates.update(SensorKind::Environment, env.timestamp_ns);
            }
            if let Some(temp) = capture.get_last_cam_temp(Duration::ZERO) {
                rates.update(SensorKind::CameraTemperature, temp.timestamp_ns);
                assert!((temp.left_c - 32.10).abs() < 1e-9);
            }
        }
        capture.stop();

        // consumer sees strictly newer samples, on the host wall clock
        assert!(imu_timestamps.len() > 10, "{}", imu_timestamps.len());
        assert!(imu_timestamps.windows(2).all(|w| w[1] > w[0]));
        let last = *imu_timestamps.last().unwrap();
        assert!(now_ns().abs_diff(last) < 2_000_000_000);

        assert!(rates.count(SensorKind::Environment) > 0);
        assert!(rates.count(SensorKind::CameraTemperature) > 0);

        let metrics = capture.metrics();
        assert!(metrics.reports_read > 200, "{metrics:?}");
        assert_eq!(metrics.decode_errors, 0);
        assert!(metrics.pings_sent >= 1);
        assert_eq!(probe.pings() as u64, metrics.pings_sent);
        assert!(capture.sync_snapshot().sync_events > 0);

        assert_eq!(probe.last_stream_request(), Some(false));
        assert!(probe.is_closed());
    }

    /// End-to-end: recorded dump with corrupted reports -> replay -> counters
    #[test]
    fn test_e2e_replay_with_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.bin");
        let generator = SyntheticReports {
            corrupt_every: 10,
            ..Default::default()
        };
        write_dump(&path, (0..200).map(|n| generator.bytes(n))).unwrap();

        let device = info(3003, FirmwareVersion::new(4, 0));
        let backend = ReplayHidBackend::from_file(&path, device).unwrap();
        let mut capture = SensorCapture::open(fast_config(), &backend, None).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while capture.metrics().reports_read < 200 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        capture.stop();

        let metrics = capture.metrics();
        assert_eq!(metrics.reports_read, 200);
        assert_eq!(metrics.decode_errors, 19);
        // first valid report anchors the clock
        assert_eq!(metrics.imu_published, 200 - 19 - 1);
        assert!(metrics.timeouts > 0);

        // the last published sample is still waiting for its consumer
        let imu = capture.get_last_imu(Duration::ZERO).unwrap();
        assert!(imu.timestamp_ns > 0);
        assert!(capture.get_last_imu(Duration::ZERO).is_none());
    }

    /// Legacy firmware selects the legacy pressure/humidity scaling
    #[test]
    fn test_e2e_legacy_firmware_scaling() {
        let generator = SyntheticReports::default();
        let records = (0..40).map(|n| generator.bytes(n)).collect();
        let backend =
            ReplayHidBackend::from_records(info(4004, FirmwareVersion::new(3, 8)), records);
        let mut capture = SensorCapture::open(fast_config(), &backend, None).unwrap();

        let env = capture.get_last_env(Duration::from_secs(2)).unwrap();
        assert!((env.pressure_hpa - 101_325.0).abs() < 1e-6);
        assert!((env.humidity_pct - 4_520.0 / 1024.0).abs() < 1e-9);
        capture.stop();
    }

    /// Config file selects one of two attached devices by serial number
    #[test]
    fn test_e2e_config_selects_device() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zed.toml");
        std::fs::write(&path, "serial_number = 2\nread_timeout_ms = 20\n").unwrap();
        let config = ConfigLoader::load_from_path(&path).unwrap();

        let first = DeviceInfo {
            serial_number: 1,
            product_id: PID_MCU_ZED_2,
            firmware: FirmwareVersion::new(3, 9),
        };
        let second = DeviceInfo {
            serial_number: 2,
            ..first.clone()
        };
        let (dev1, probe1) = MockHidDevice::synthetic(first, SyntheticReports::default(), None);
        let (dev2, probe2) = MockHidDevice::synthetic(second, SyntheticReports::default(), None);
        let backend = MockHidBackend::new().with_device(dev1).with_device(dev2);

        let mut capture = SensorCapture::open(config, &backend, None).unwrap();
        assert_eq!(capture.serial_number(), 2);
        assert!(capture.get_last_imu(Duration::from_secs(1)).is_some());

        // the selected device is now busy
        let again = SensorCapture::open(
            CaptureConfig {
                serial_number: Some(2),
                ..fast_config()
            },
            &backend,
            None,
        );
        assert!(again.is_err());

        capture.stop();
        assert!(probe2.is_closed());
        assert_eq!(probe1.reads(), 0);
    }
}
