//! Config value parsing shared by the YAML loader and the CLI.

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

/// Why a configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),

    /// A target entry names a variable that is unset or empty and has no
    /// `:-default`.
    #[error("target entry `{entry}` references unset variable `{var}`")]
    UnsetVariable { var: String, entry: String },
}

/// Parse a probe interval or timeout.
///
/// Accepts humantime forms (`500ms`, `2s`, `1m30s`) and a bare number, read
/// as seconds. Zero is rejected.
///
/// ```
/// use std::time::Duration;
/// use pingwatch::config::parse_duration;
///
/// assert_eq!(parse_duration("750ms"), Ok(Duration::from_millis(750)));
/// assert_eq!(parse_duration("2"), Ok(Duration::from_secs(2)));
/// assert!(parse_duration("0s").is_err());
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("duration is empty".to_string());
    }

    let duration = match s.parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(_) => humantime::parse_duration(s).map_err(|e| format!("`{s}`: {e}"))?,
    };
    if duration.is_zero() {
        return Err(format!("`{s}`: duration must be positive"));
    }
    Ok(duration)
}

fn env_reference() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env reference pattern is valid")
    })
}

/// Substitute `${VAR}` and `${VAR:-default}` in one configured target entry.
///
/// An empty variable counts as unset. A reference with no default that
/// cannot be resolved is an error rather than a silently dropped host.
pub fn expand_target_entry(entry: &str) -> Result<String, ConfigError> {
    let mut expanded = String::with_capacity(entry.len());
    let mut copied = 0;

    for caps in env_reference().captures_iter(entry) {
        let Some(reference) = caps.get(0) else {
            continue;
        };
        expanded.push_str(&entry[copied..reference.start()]);

        let var = &caps[1];
        let value = std::env::var(var).ok().filter(|v| !v.is_empty());
        match (value, caps.get(2)) {
            (Some(value), _) => expanded.push_str(&value),
            (None, Some(default)) => expanded.push_str(default.as_str()),
            (None, None) => {
                return Err(ConfigError::UnsetVariable {
                    var: var.to_string(),
                    entry: entry.to_string(),
                });
            }
        }
        copied = reference.end();
    }

    expanded.push_str(&entry[copied..]);
    Ok(expanded)
}
