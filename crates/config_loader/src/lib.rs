//! # Config Loader
//!
//! Loading and validation of the capture configuration.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Run the field rules and report failures with dotted paths
//! - Produce a ready-to-use `CaptureConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("capture.toml")).unwrap();
//! println!("read timeout: {:?}", config.read_timeout());
//! ```

mod parser;
mod rules;

pub use contracts::CaptureConfig;
pub use parser::ConfigFormat;
pub use rules::ConfigIssue;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file, format taken from the extension
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<CaptureConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from a string
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<CaptureConfig, ContractError> {
        let config = parser::parse(content, format)?;
        rules::validate(&config)?;
        Ok(config)
    }

    /// Parse without validating, for tools that report every issue at once
    pub fn parse_unchecked(path: &Path) -> Result<CaptureConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        parser::parse(&content, format)
    }

    /// Every failed rule of `config`
    pub fn issues(config: &CaptureConfig) -> Vec<ConfigIssue> {
        rules::issues(config)
    }

    pub fn validate(config: &CaptureConfig) -> Result<(), ContractError> {
        rules::validate(config)
    }

    pub fn to_toml(config: &CaptureConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    pub fn to_json(config: &CaptureConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }

    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const CAPTURE_TOML: &str = r#"
serial_number = 28470615
verbose = true
read_timeout_ms = 200
ping_interval = 400
video_sync = true

[clock]
queue_capacity = 50
steady_first_index = 5
warmup_adjustments = 1
scale_min = 0.8
scale_max = 1.2
offset_window = 3
"#;

    #[test]
    fn test_load_from_str_toml() {
        let config = ConfigLoader::load_from_str(CAPTURE_TOML, ConfigFormat::Toml).unwrap();
        assert_eq!(config.serial_number, Some(28470615));
        assert!(config.verbose);
        assert!(config.video_sync);
        assert_eq!(config.read_timeout_ms, 200);
    }

    #[test]
    fn test_round_trip_toml() {
        let config = ConfigLoader::load_from_str(CAPTURE_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&config).unwrap();
        let again = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(config, again);
    }

    #[test]
    fn test_toml_to_json() {
        let config = ConfigLoader::load_from_str(CAPTURE_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&config).unwrap();
        let again = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(config, again);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = "[clock]\nscale_min = 1.5\n";
        let err = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, ContractError::ConfigValidation { .. }));
        assert!(err.to_string().contains("'clock'"), "got: {err}");
    }

    #[test]
    fn test_load_from_path_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("capture.toml");
        fs::write(&toml_path, CAPTURE_TOML).unwrap();
        assert!(ConfigLoader::load_from_path(&toml_path).is_ok());

        let json_path = dir.path().join("capture.json");
        fs::write(&json_path, r#"{ "ping_interval": 100 }"#).unwrap();
        let config = ConfigLoader::load_from_path(&json_path).unwrap();
        assert_eq!(config.ping_interval, 100);

        let yaml_path = dir.path().join("capture.yaml");
        fs::write(&yaml_path, "ping_interval: 100").unwrap();
        let err = ConfigLoader::load_from_path(&yaml_path).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn test_parse_unchecked_keeps_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "read_timeout_ms = 0\nping_interval = 0\n").unwrap();

        assert!(ConfigLoader::load_from_path(&path).is_err());
        let config = ConfigLoader::parse_unchecked(&path).unwrap();
        assert_eq!(ConfigLoader::issues(&config).len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::load_from_path(Path::new("/nonexistent/capture.toml")).unwrap_err();
        assert!(matches!(err, ContractError::Io(_)));
    }
}
