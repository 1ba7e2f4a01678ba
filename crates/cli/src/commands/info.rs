//! `info` command implementation.

use anyhow::{Context, Result};
use capture::SensorCapture;
use config_loader::ConfigLoader;
use contracts::{CaptureConfig, DeviceInfo};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::session;

/// Effective configuration and attached devices, for JSON output
#[derive(Serialize)]
struct DriverInfo {
    version: &'static str,
    config: CaptureConfig,
    devices: Vec<DeviceEntry>,
}

#[derive(Serialize)]
struct DeviceEntry {
    serial_number: u32,
    model: String,
    product_id: String,
    firmware: String,
    environment_sensors: bool,
    selected: bool,
}

impl DeviceEntry {
    fn new(device: &DeviceInfo, config: &CaptureConfig, first: bool) -> Self {
        let selected = match config.serial_number {
            Some(sn) => sn == device.serial_number,
            None => first,
        };
        Self {
            serial_number: device.serial_number,
            model: device.model().to_string(),
            product_id: format!("{:#06x}", device.product_id),
            firmware: device.firmware.to_string(),
            environment_sensors: device.model().has_environment_sensors(),
            selected,
        }
    }
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let config = session::load_config(args.config.as_deref())?;
    let backend = args.source.backend()?;
    let devices = SensorCapture::enumerate_devices(backend.as_ref())
        .context("Failed to enumerate devices")?;
    info!(devices = devices.len(), "Devices enumerated");

    let info = DriverInfo {
        version: env!("CARGO_PKG_VERSION"),
        devices: devices
            .iter()
            .enumerate()
            .map(|(i, d)| DeviceEntry::new(d, &config, i == 0))
            .collect(),
        config,
    };

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize driver info")?;
        println!("{}", json);
    } else {
        print_driver_info(&info)?;
    }

    Ok(())
}

fn print_driver_info(info: &DriverInfo) -> Result<()> {
    println!("==================== ZED Sensors {} ====================\n", info.version);

    println!("Devices ({})", info.devices.len());
    if info.devices.is_empty() {
        println!("   `- none attached");
    }
    for (i, device) in info.devices.iter().enumerate() {
        let prefix = if i + 1 == info.devices.len() { "`-" } else { "|-" };
        println!(
            "   {} {} sn={} pid={} fw={}{}{}",
            prefix,
            device.model,
            device.serial_number,
            device.product_id,
            device.firmware,
            if device.environment_sensors { " [mag+env]" } else { "" },
            if device.selected { " (selected)" } else { "" },
        );
    }

    println!("\nEffective configuration\n");
    let toml = ConfigLoader::to_toml(&info.config).context("Failed to render configuration")?;
    for line in toml.lines() {
        println!("   {}", line);
    }
    println!();
    Ok(())
}
