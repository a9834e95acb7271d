//! Configuration module for the pingwatch monitor.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Monitor timing (probe interval, probe timeout, drain cadence)
//! - Probe transport (ICMP or TCP connect)
//! - Initial target list, with `${VAR}` and `${VAR:-default}` expansion
//! - Export directory

mod app;
mod validation;

pub use app::{AppConfig, ExportConfig, MonitorConfig, ProbeConfig};
pub use validation::{ConfigError, expand_target_entry, parse_duration};
