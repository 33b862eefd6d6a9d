//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the participant runtime."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;
use url::Url;

use crate::logging::LogFormat;

fn default_ven_name() -> String {
    "ven123".to_owned()
}

fn default_vtn_url() -> String {
    "http://127.0.0.1:8081/OpenADR2/Simple/2.0b".to_owned()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_idle_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_sampling_scale() -> f64 {
    100.0
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_reports() -> Vec<ReportConfig> {
    vec![
        ReportConfig::new("CurrentReport", "Device001", "current", "A"),
        ReportConfig::new("CurrentReport", "Device002", "current", "A"),
        ReportConfig::new("VoltageReport", "Device001", "voltage", "V"),
        ReportConfig::new("VoltageReport", "Device002", "voltage", "V"),
    ]
}

/// Primary configuration object for the participant runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenConfig {
    #[serde(default)]
    pub ven: VenIdentity,
    #[serde(default)]
    pub vtn: VtnConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub decisions: DecisionConfig,
    #[serde(default = "default_reports")]
    pub reports: Vec<ReportConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where a [`VenConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedVenConfig {
    pub config: VenConfig,
    pub source: PathBuf,
}

impl VenConfig {
    pub const ENV_CONFIG_PATH: &str = "R_VEN_CONFIG";

    /// Load configuration from disk, respecting the `R_VEN_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedVenConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedVenConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedVenConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<VenConfig>()
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Parsed coordinator endpoint.
    pub fn vtn_url(&self) -> Result<Url> {
        Url::parse(&self.vtn.url).with_context(|| format!("invalid vtn url '{}'", self.vtn.url))
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.ven.ven_name.trim().is_empty() {
            return Err(anyhow!("ven.ven_name must not be empty"));
        }
        self.vtn_url()?;
        let mut seen = HashSet::new();
        for report in &self.reports {
            report.validate()?;
            let key = (
                report.report_id.as_str(),
                report.resource_id.as_str(),
                report.measurement.as_str(),
            );
            if !seen.insert(key) {
                return Err(anyhow!(
                    "duplicate report entry {}/{}/{}",
                    report.report_id,
                    report.resource_id,
                    report.measurement
                ));
            }
        }
        Ok(())
    }
}

impl Default for VenConfig {
    fn default() -> Self {
        Self {
            ven: VenIdentity::default(),
            vtn: VtnConfig::default(),
            lifecycle: LifecycleConfig::default(),
            decisions: DecisionConfig::default(),
            reports: default_reports(),
            logging: LoggingConfig::default(),
        }
    }
}

impl std::str::FromStr for VenConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: VenConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Identity the participant registers with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenIdentity {
    #[serde(default = "default_ven_name")]
    pub ven_name: String,
    /// Pre-assigned identifier; the coordinator-issued one wins after registration.
    #[serde(default)]
    pub ven_id: Option<String>,
}

impl Default for VenIdentity {
    fn default() -> Self {
        Self {
            ven_name: default_ven_name(),
            ven_id: Some(default_ven_name()),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VtnConfig {
    #[serde(default = "default_vtn_url")]
    pub url: String,
    #[serde(default = "default_request_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub request_timeout: Duration,
}

impl Default for VtnConfig {
    fn default() -> Self {
        Self {
            url: default_vtn_url(),
            request_timeout: default_request_timeout(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Pause inserted before each lifecycle step after registration.
    #[serde(default = "default_idle_delay")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub idle_delay: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            idle_delay: default_idle_delay(),
        }
    }
}

/// Decision applied by the built-in handler to every event.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DecisionPolicy {
    #[default]
    #[serde(rename = "optIn")]
    OptIn,
    #[serde(rename = "optOut")]
    OptOut,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DecisionConfig {
    #[serde(default)]
    pub default_opt: DecisionPolicy,
}

/// Telemetry report offered to the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportConfig {
    pub report_id: String,
    pub resource_id: String,
    pub measurement: String,
    pub unit: String,
    /// Upper bound of the simulated reading.
    #[serde(default = "default_sampling_scale")]
    pub scale: f64,
}

impl ReportConfig {
    pub fn new(
        report_id: impl Into<String>,
        resource_id: impl Into<String>,
        measurement: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            report_id: report_id.into(),
            resource_id: resource_id.into(),
            measurement: measurement.into(),
            unit: unit.into(),
            scale: default_sampling_scale(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.report_id.trim().is_empty() || self.resource_id.trim().is_empty() {
            return Err(anyhow!("report entries require report_id and resource_id"));
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(anyhow!(
                "report {}/{} has non-positive scale {}",
                self.report_id,
                self.resource_id,
                self.scale
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_reference_defaults() {
        let config: VenConfig = "".parse().expect("defaults are valid");
        assert_eq!(config.ven.ven_name, "ven123");
        assert_eq!(config.lifecycle.idle_delay, Duration::from_secs(60));
        assert_eq!(config.decisions.default_opt, DecisionPolicy::OptIn);
        assert_eq!(config.reports.len(), 4);
        assert_eq!(config.reports[2].measurement, "voltage");
        assert_eq!(config.reports[2].unit, "V");
    }

    #[test]
    fn durations_and_policy_parse_from_toml() {
        let raw = r#"
            [ven]
            ven_name = "site-7"

            [vtn]
            url = "https://vtn.example.invalid/OpenADR2/Simple/2.0b"
            request_timeout = 5

            [lifecycle]
            idle_delay = 2

            [decisions]
            default_opt = "optOut"

            [[reports]]
            report_id = "PowerReport"
            resource_id = "Meter01"
            measurement = "real_power"
            unit = "W"
            scale = 5000.0
        "#;
        let config: VenConfig = raw.parse().expect("valid config");
        assert_eq!(config.ven.ven_name, "site-7");
        assert!(config.ven.ven_id.is_none());
        assert_eq!(config.vtn.request_timeout, Duration::from_secs(5));
        assert_eq!(config.lifecycle.idle_delay, Duration::from_secs(2));
        assert_eq!(config.decisions.default_opt, DecisionPolicy::OptOut);
        assert_eq!(config.reports.len(), 1);
        assert_eq!(config.reports[0].scale, 5000.0);
    }

    #[test]
    fn duplicate_reports_are_rejected() {
        let mut config = VenConfig::default();
        config.reports.push(config.reports[0].clone());
        let err = config.validate().expect_err("duplicate report");
        assert!(err.to_string().contains("duplicate report entry"));
    }

    #[test]
    fn malformed_vtn_url_is_rejected() {
        let mut config = VenConfig::default();
        config.vtn.url = "not a url".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn blank_ven_name_is_rejected() {
        let mut config = VenConfig::default();
        config.ven.ven_name = "  ".into();
        assert!(config.validate().is_err());
    }
}
