//! # Entry-Point References
//!
//! A plugin names its execution root as `<dotted-module-path>:<symbol>`.
//! The reference is split on the first `:`; everything after it is the
//! symbol, so a module path can never contain the delimiter. The symbol's
//! shape is not checked here, only its presence on the loaded module.

use std::fmt;
use std::str::FromStr;

use crate::error::PluginValidationError;

/// Delimiter between the module path and the symbol name.
pub const ENTRY_POINT_DELIMITER: char = ':';

/// A parsed `module:symbol` entry-point reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryPointRef {
    module: String,
    symbol: String,
}

impl EntryPointRef {
    /// Parse an entry-point reference.
    ///
    /// # Errors
    ///
    /// Returns [`PluginValidationError::InvalidEntryPoint`] when the value
    /// has no delimiter.
    pub fn parse(value: &str) -> Result<Self, PluginValidationError> {
        let (module, symbol) = value
            .split_once(ENTRY_POINT_DELIMITER)
            .ok_or_else(|| PluginValidationError::InvalidEntryPoint(value.to_string()))?;
        Ok(Self {
            module: module.to_string(),
            symbol: symbol.to_string(),
        })
    }

    /// The dotted module path.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// The symbol expected on the module.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl FromStr for EntryPointRef {
    type Err = PluginValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for EntryPointRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{ENTRY_POINT_DELIMITER}{}", self.module, self.symbol)
    }
}
