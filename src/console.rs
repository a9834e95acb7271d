//! Line-oriented command input for the headless monitor.
//!
//! ```text
//! start 8.8.8.8, 1.1.1.1     start probing (a bare host list does the same)
//! stop 8.8.8.8               stop one or more targets
//! stop-all                   stop every target
//! status                     log running probers and series summaries
//! export [path]              write the series to a file
//! quit                       stop everything and exit
//! ```

use std::path::PathBuf;

use crate::target::{Target, parse_targets};

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start(Vec<Target>),
    Stop(Vec<Target>),
    StopAll,
    Status,
    Export(Option<PathBuf>),
    Quit,
}

impl ConsoleCommand {
    /// Parse one input line.
    ///
    /// Returns `None` for lines that carry nothing to do: blank lines and
    /// `start`/`stop` without any target. Text that does not begin with a
    /// known verb is read as a target list.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "start" => Self::Start(parse_targets(rest)),
            "stop" => Self::Stop(parse_targets(rest)),
            "stop-all" | "stopall" if rest.is_empty() => Self::StopAll,
            "status" if rest.is_empty() => Self::Status,
            "export" | "save" => {
                Self::Export((!rest.is_empty()).then(|| PathBuf::from(rest)))
            }
            "quit" | "exit" if rest.is_empty() => Self::Quit,
            _ => Self::Start(parse_targets(line)),
        };

        match &command {
            Self::Start(targets) | Self::Stop(targets) if targets.is_empty() => None,
            _ => Some(command),
        }
    }
}
