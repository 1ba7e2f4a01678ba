//! Device sources and configuration resolution shared by the commands.

use std::path::Path;

use anyhow::{Context, Result};
use capture::{MockHidBackend, ReplayHidBackend, SyntheticReports, REPORT_RATE_HZ};
use contracts::{
    CaptureConfig, DeviceInfo, FirmwareVersion, HidBackend, PID_MCU_ZED_2, PID_MCU_ZED_2I,
    PID_MCU_ZED_MINI,
};
use tracing::info;

use crate::cli::{ModelArg, SourceArgs};
use crate::error::CliError;

/// Load the config file if one is given, defaults otherwise
pub fn load_config(path: Option<&Path>) -> Result<CaptureConfig> {
    let Some(path) = path else {
        info!("No configuration file given, using defaults");
        return Ok(CaptureConfig::default());
    };
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()).into());
    }
    config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Parse `major.minor`
pub fn parse_firmware(value: &str) -> crate::error::Result<FirmwareVersion> {
    let invalid = || CliError::invalid_argument("--firmware", format!("expected major.minor, got '{value}'"));
    let (major, minor) = value.trim_start_matches('v').split_once('.').ok_or_else(invalid)?;
    let major = major.parse::<u8>().map_err(|_| invalid())?;
    let minor = minor.parse::<u8>().map_err(|_| invalid())?;
    Ok(FirmwareVersion::new(major, minor))
}

impl ModelArg {
    pub fn product_id(self) -> u16 {
        match self {
            Self::ZedMini => PID_MCU_ZED_MINI,
            Self::Zed2 => PID_MCU_ZED_2,
            Self::Zed2i => PID_MCU_ZED_2I,
        }
    }
}

impl SourceArgs {
    pub fn device_info(&self) -> crate::error::Result<DeviceInfo> {
        Ok(DeviceInfo {
            serial_number: self.device_serial,
            product_id: self.model.product_id(),
            firmware: parse_firmware(&self.firmware)?,
        })
    }

    fn rate(&self) -> Option<f64> {
        (self.replay_rate > 0.0).then_some(self.replay_rate)
    }

    /// Backend serving the replay dump or a synthetic 800 Hz device
    pub fn backend(&self) -> Result<Box<dyn HidBackend>> {
        let info = self.device_info()?;

        match &self.replay {
            Some(path) => {
                let mut backend = ReplayHidBackend::from_file(path, info)
                    .with_context(|| format!("Failed to load replay {}", path.display()))?
                    .looping(self.replay_loop);
                if let Some(rate) = self.rate() {
                    backend = backend.with_rate(rate);
                }
                info!(
                    path = %path.display(),
                    records = backend.len(),
                    looping = self.replay_loop,
                    "Running in REPLAY mode"
                );
                Ok(Box::new(backend))
            }
            None => {
                let (backend, _probe) = MockHidBackend::synthetic(
                    info,
                    SyntheticReports::default(),
                    Some(REPORT_RATE_HZ),
                );
                info!("Running against the synthetic device (no hardware required)");
                Ok(Box::new(backend))
            }
        }
    }
}
