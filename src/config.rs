//! Configuration management for the detection pipeline

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub detection: DetectionConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
    pub output: OutputConfig,
}

/// Tunable parameters of every detector
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub flow_imbalance: FlowImbalanceConfig,
    pub structuring: StructuringConfig,
    pub layering: LayeringConfig,
    pub community: CommunityConfig,
}

/// Flow imbalance detection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlowImbalanceConfig {
    /// Net outflow beyond which an account is flagged
    pub threshold: f64,
}

impl Default for FlowImbalanceConfig {
    fn default() -> Self {
        Self {
            threshold: 100_000.0,
        }
    }
}

/// Structuring ("smurfing") detection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StructuringConfig {
    /// Window length measured from the first transfer of a burst
    pub window_minutes: i64,
    /// Largest amount still counted as a small transfer
    pub unit_limit: f64,
    /// Burst size that triggers a finding
    pub min_count: usize,
}

impl Default for StructuringConfig {
    fn default() -> Self {
        Self {
            window_minutes: 6000,
            unit_limit: 20_000.0,
            min_count: 5,
        }
    }
}

/// Layering chain detection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayeringConfig {
    /// Chain length (in transactions) that triggers a finding
    pub max_depth: usize,
    /// Largest amount change allowed between consecutive hops
    pub amount_delta: f64,
    /// Largest delay allowed between consecutive hops
    pub time_window_minutes: i64,
}

impl Default for LayeringConfig {
    fn default() -> Self {
        Self {
            max_depth: 4,
            amount_delta: 5000.0,
            time_window_minutes: 2880,
        }
    }
}

/// Dense community (k-core) detection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommunityConfig {
    /// Core order `k`
    pub min_degree: usize,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self { min_degree: 2 }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Wall-clock budget per detector in milliseconds (0 = unlimited)
    pub detector_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Report output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving result and timing reports
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

impl AppConfig {
    /// Load configuration from a specific path, with `AML__*` environment overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::build(path.as_ref(), true)
    }

    /// Like [`AppConfig::load_from_path`] but falls back to defaults when the file is absent
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::build(path.as_ref(), false)
    }

    fn build(path: &Path, required: bool) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path).required(required))
            .add_source(
                Environment::with_prefix("AML")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.detection.flow_imbalance.threshold, 100_000.0);
        assert_eq!(config.detection.structuring.window_minutes, 6000);
        assert_eq!(config.detection.structuring.unit_limit, 20_000.0);
        assert_eq!(config.detection.structuring.min_count, 5);
        assert_eq!(config.detection.layering.max_depth, 4);
        assert_eq!(config.detection.layering.amount_delta, 5000.0);
        assert_eq!(config.detection.layering.time_window_minutes, 2880);
        assert_eq!(config.detection.community.min_degree, 2);
        assert_eq!(config.pipeline.detector_timeout_ms, 0);
        assert_eq!(config.output.dir, PathBuf::from("."));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[detection.layering]\nmax_depth = 6\n\n[logging]\nformat = \"json\"").unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();

        assert_eq!(config.detection.layering.max_depth, 6);
        assert_eq!(config.detection.layering.amount_delta, 5000.0);
        assert_eq!(config.detection.structuring.min_count, 5);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_environment_overrides() {
        std::env::set_var("AML__DETECTION__FLOW_IMBALANCE__THRESHOLD", "250000.5");
        std::env::set_var("AML__PIPELINE__DETECTOR_TIMEOUT_MS", "1500");

        let config = AppConfig::load_or_default("does/not/exist.toml");

        std::env::remove_var("AML__DETECTION__FLOW_IMBALANCE__THRESHOLD");
        std::env::remove_var("AML__PIPELINE__DETECTOR_TIMEOUT_MS");

        let config = config.unwrap();
        assert_eq!(config.detection.flow_imbalance.threshold, 250_000.5);
        assert_eq!(config.pipeline.detector_timeout_ms, 1500);
        assert_eq!(config.detection.layering.max_depth, 4);
    }

    #[test]
    fn test_missing_file() {
        let path = Path::new("does/not/exist.toml");
        assert!(AppConfig::load_from_path(path).is_err());

        let config = AppConfig::load_or_default(path).unwrap();
        assert_eq!(config.detection.community.min_degree, 2);
    }
}
