//! # Validation Mode
//!
//! The reporting policy applied when plugin validation fails. The mode never
//! decides *whether* a check runs, only what happens to its failure:
//!
//! | mode      | on failure                               |
//! |-----------|------------------------------------------|
//! | `error`   | the failure is returned to the caller    |
//! | `warning` | logged at WARN, validation returns `Ok`  |
//! | `info`    | logged at INFO, validation returns `Ok`  |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a validation failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Log the failure at informational severity and continue.
    Info,
    /// Log the failure at warning severity and continue.
    Warning,
    /// Return the failure to the caller.
    #[default]
    Error,
}

impl ValidationMode {
    /// All modes, in increasing order of strictness.
    pub const ALL: [ValidationMode; 3] = [Self::Info, Self::Warning, Self::Error];

    /// Lowercase name, as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unrecognised validation mode name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown validation mode '{0}' (expected one of: info, warning, error)")]
pub struct ParseModeError(pub String);

impl FromStr for ValidationMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}
