//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::{ConfigIssue, ConfigLoader};
use contracts::CaptureConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    issues: Vec<ConfigIssue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<CaptureConfig>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();
    let invalid = |error: String| ValidationResult {
        valid: false,
        config_path: config_path.clone(),
        error: Some(error),
        issues: Vec::new(),
        warnings: Vec::new(),
        config: None,
    };

    if !args.config.exists() {
        return invalid(format!("File not found: {}", args.config.display()));
    }

    // parse first so every failed rule is reported, not just the first
    let config = match ConfigLoader::parse_unchecked(&args.config) {
        Ok(config) => config,
        Err(e) => return invalid(e.to_string()),
    };
    let issues = ConfigLoader::issues(&config);

    ValidationResult {
        valid: issues.is_empty(),
        config_path: config_path.clone(),
        error: None,
        warnings: collect_warnings(&config),
        config: issues.is_empty().then_some(config),
        issues,
    }
}

/// Non-fatal configuration issues
fn collect_warnings(config: &CaptureConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    // pings are meant to go out about once per second at the 800 Hz report rate
    let ping_period_ms = u64::from(config.ping_interval) * 1_000 / 800;
    if ping_period_ms > 2_000 {
        warnings.push(format!(
            "ping_interval {} means one keep-alive every {ping_period_ms}ms while streaming",
            config.ping_interval
        ));
    }

    if config.clock.scale_max - config.clock.scale_min > 0.5 {
        warnings.push(format!(
            "clock scale bounds [{}, {}] admit large drift corrections",
            config.clock.scale_min, config.clock.scale_max
        ));
    }

    if config.video_sync {
        warnings.push(
            "video_sync needs a video clock from the host application; `zed-sensors run` refuses it"
                .to_string(),
        );
    }

    if config.video_sync && config.clock.offset_window == 1 {
        warnings.push("clock.offset_window = 1 applies every single offset measurement".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("OK  Configuration is valid: {}", result.config_path);

        if let Some(ref config) = result.config {
            let serial = config
                .serial_number
                .map_or_else(|| "first available".to_string(), |s| s.to_string());
            println!("\n  Serial: {}", serial);
            println!("  Read timeout: {} ms", config.read_timeout_ms);
            println!("  Ping interval: {} iterations", config.ping_interval);
            println!("  Video sync: {}", config.video_sync);
        }
    } else {
        println!("ERR Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
        for issue in &result.issues {
            println!("  - {}: {}", issue.field, issue.message);
        }
    }

    if !result.warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &result.warnings {
            println!("  - {}", warning);
        }
    }
}
