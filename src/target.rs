//! Monitored target identifiers and raw-text target parsing.

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

/// A host being monitored (hostname or address).
///
/// Always trimmed and non-empty. Used as the key in both the prober
/// registry and the series store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    /// Build a target from free-form text.
    ///
    /// Returns `None` when nothing is left after trimming.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Target {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Target {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Parse a comma- or newline-delimited list of targets.
///
/// Entries are trimmed, empty entries are dropped and repeated entries keep
/// only their first occurrence.
///
/// ```
/// use pingwatch::parse_targets;
///
/// let targets = parse_targets("a, b\nc ,, ");
/// let names: Vec<&str> = targets.iter().map(|t| t.as_str()).collect();
/// assert_eq!(names, ["a", "b", "c"]);
/// ```
pub fn parse_targets(raw: &str) -> Vec<Target> {
    let mut seen = HashSet::new();
    raw.split([',', '\n'])
        .filter_map(Target::parse)
        .filter(|t| seen.insert(t.clone()))
        .collect()
}
