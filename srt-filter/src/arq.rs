//! Loss report policy (ARQ level)

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// When detected loss is surfaced to the engine for retransmission requests
///
/// Fixed once when a filter is built; the engine and the filter read the
/// same value for the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArqLevel {
    /// Loss is tracked but never reported
    Never,
    /// Loss is recorded and reported only when the engine polls for it
    OnRequest,
    /// Every newly detected loss is reported immediately
    Always,
}

impl ArqLevel {
    /// Token used in filter configuration strings
    pub fn as_str(self) -> &'static str {
        match self {
            ArqLevel::Never => "never",
            ArqLevel::OnRequest => "onreq",
            ArqLevel::Always => "always",
        }
    }
}

impl fmt::Display for ArqLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown ARQ level '{0}' (expected never, onreq or always)")]
pub struct ParseArqLevelError(pub String);

impl FromStr for ArqLevel {
    type Err = ParseArqLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "never" => Ok(ArqLevel::Never),
            "onreq" => Ok(ArqLevel::OnRequest),
            "always" => Ok(ArqLevel::Always),
            other => Err(ParseArqLevelError(other.to_string())),
        }
    }
}
