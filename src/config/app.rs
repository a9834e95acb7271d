//! Application configuration structures.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::drain::DEFAULT_DRAIN_INTERVAL;
use crate::probe::DEFAULT_TCP_PORT;
use crate::prober::{
    DEFAULT_INTERVAL, DEFAULT_RETIRE_TIMEOUT, DEFAULT_TIMEOUT, MIN_INTERVAL, ProberSettings,
};
use crate::target::{Target, parse_targets};

use super::validation::{ConfigError, expand_target_entry};

fn default_tcp_port() -> u16 {
    DEFAULT_TCP_PORT
}

// =============================================================================
// Monitor Configuration
// =============================================================================

/// Probe and drain timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Time between probes of one target (default: 1s, minimum: 100ms).
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Per-probe timeout (default: 1s).
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Time between drain/render cycles (default: 1s).
    #[serde(with = "humantime_serde")]
    pub drain_interval: Duration,

    /// Wait for a stopped prober before restarting its target (default: 2s).
    #[serde(with = "humantime_serde")]
    pub retire_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            drain_interval: DEFAULT_DRAIN_INTERVAL,
            retire_timeout: DEFAULT_RETIRE_TIMEOUT,
        }
    }
}

// =============================================================================
// Probe Configuration
// =============================================================================

/// Measurement transport.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProbeConfig {
    /// ICMP echo (needs raw-socket privileges).
    #[default]
    Icmp,
    /// TCP connect to `port`.
    Tcp {
        #[serde(default = "default_tcp_port")]
        port: u16,
    },
}

// =============================================================================
// Export Configuration
// =============================================================================

/// Export settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory for timestamped exports (default: current directory).
    pub dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub probe: ProbeConfig,

    /// Targets probed from startup. Each entry may hold several
    /// comma-separated hosts and `${VAR:-default}` references.
    #[serde(default)]
    pub targets: Vec<String>,

    #[serde(default)]
    pub export: ExportConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if a value is out of range and
    /// `ConfigError::UnsetVariable` if a target entry cannot be expanded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.interval < MIN_INTERVAL {
            return Err(ConfigError::Invalid(format!(
                "monitor interval must be at least {}",
                humantime::format_duration(MIN_INTERVAL)
            )));
        }

        if self.monitor.timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "monitor timeout must be positive".to_string(),
            ));
        }

        if self.monitor.drain_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "monitor drain_interval must be positive".to_string(),
            ));
        }

        if let ProbeConfig::Tcp { port: 0 } = self.probe {
            return Err(ConfigError::Invalid(
                "tcp probe port must be non-zero".to_string(),
            ));
        }

        self.targets()?;
        Ok(())
    }

    /// Configured targets after env expansion, trimming and de-duplication.
    pub fn targets(&self) -> Result<Vec<Target>, ConfigError> {
        let expanded = self
            .targets
            .iter()
            .map(|entry| expand_target_entry(entry))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(parse_targets(&expanded.join("\n")))
    }

    /// Prober timing derived from the monitor section.
    pub fn prober_settings(&self) -> ProberSettings {
        ProberSettings::default()
            .with_interval(self.monitor.interval)
            .with_timeout(self.monitor.timeout)
            .with_retire_timeout(self.monitor.retire_timeout)
    }
}
