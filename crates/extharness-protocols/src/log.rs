//! Log records forwarded from a tester to the boundary.

use std::fmt;
use std::panic::Location;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a tester log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Verbose,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Verbose => "verbose",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// Where a log call was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLocation {
    pub function: String,
    pub file: String,
    pub line: u32,
}

impl LogLocation {
    pub fn new(function: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            function: function.into(),
            file: file.into(),
            line,
        }
    }

    /// Location of the caller, with no function name available.
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self::new("anonymous", location.file(), location.line())
    }
}

/// A single log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub location: LogLocation,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    pub fn new(level: LogLevel, location: LogLocation, message: impl Into<String>) -> Self {
        Self {
            level,
            location,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
