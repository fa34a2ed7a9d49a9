//! Filter configuration grammar
//!
//! A filter is configured with a single string: the filter type token
//! followed by comma separated `name:value` tunables, e.g.
//! `fec,cols:10,rows:5,arq:onreq`.
//!
//! Each tunable is split at its first `:`, so a value may itself contain
//! colons. Commas always separate tunables; there is no quoting.
//! The parser checks only the shape of the string. Whether a name or value
//! makes sense is decided by the filter variant selected by the type token.

use crate::filter::FilterError;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Configuration grammar errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Empty filter configuration")]
    Empty,

    #[error("Invalid filter type '{0}'")]
    InvalidType(String),

    #[error("Empty parameter entry at position {0}")]
    EmptyEntry(usize),

    #[error("Parameter '{0}' is not in name:value form")]
    MissingSeparator(String),

    #[error("Invalid parameter name '{0}'")]
    InvalidName(String),

    #[error("Parameter '{0}' has an empty value")]
    EmptyValue(String),

    #[error("Duplicate parameter '{0}'")]
    DuplicateParameter(String),
}

/// Parsed filter configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    filter_type: String,
    parameters: BTreeMap<String, String>,
}

fn is_identifier(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl FilterConfig {
    /// Build a configuration with no parameters
    pub fn new(filter_type: &str) -> Result<Self, ConfigError> {
        let filter_type = filter_type.trim();
        if !is_identifier(filter_type) {
            return Err(ConfigError::InvalidType(filter_type.to_string()));
        }
        Ok(FilterConfig {
            filter_type: filter_type.to_string(),
            parameters: BTreeMap::new(),
        })
    }

    /// Parse `type[,name:value]*`
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Err(ConfigError::Empty);
        }

        let mut entries = text.split(',');
        // split always yields at least one item
        let mut config = FilterConfig::new(entries.next().unwrap_or_default())?;

        for (position, entry) in entries.enumerate() {
            let entry = entry.trim();
            if entry.is_empty() {
                return Err(ConfigError::EmptyEntry(position + 1));
            }

            let (name, value) = entry
                .split_once(':')
                .ok_or_else(|| ConfigError::MissingSeparator(entry.to_string()))?;
            config.insert(name, value)?;
        }

        Ok(config)
    }

    /// Add one tunable, applying the same rules as [`parse`](Self::parse)
    pub fn insert(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        let name = name.trim();
        let value = value.trim();

        if !is_identifier(name) {
            return Err(ConfigError::InvalidName(name.to_string()));
        }
        if value.is_empty() {
            return Err(ConfigError::EmptyValue(name.to_string()));
        }
        if self.parameters.contains_key(name) {
            return Err(ConfigError::DuplicateParameter(name.to_string()));
        }

        self.parameters.insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// Filter type token
    pub fn filter_type(&self) -> &str {
        &self.filter_type
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// Parse a tunable into `T`, `Ok(None)` when it is absent
    pub fn parse_param<T>(&self, name: &str) -> Result<Option<T>, FilterError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(name) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|e| FilterError::InvalidParameter {
                    name: name.to_string(),
                    value: raw.to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    /// Like [`parse_param`](Self::parse_param) but the tunable must be present
    pub fn require_param<T>(&self, name: &str) -> Result<T, FilterError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.parse_param(name)?
            .ok_or_else(|| FilterError::MissingParameter {
                filter: self.filter_type.clone(),
                name: name.to_string(),
            })
    }

    /// Reject any tunable not listed in `known`
    pub fn check_known(&self, known: &[&str]) -> Result<(), FilterError> {
        match self.parameters.keys().find(|k| !known.contains(&k.as_str())) {
            Some(name) => Err(FilterError::UnknownParameter {
                filter: self.filter_type.clone(),
                name: name.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl FromStr for FilterConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterConfig::parse(s)
    }
}

/// Canonical form: type first, then tunables ordered by name
impl fmt::Display for FilterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.filter_type)?;
        for (name, value) in &self.parameters {
            write!(f, ",{}:{}", name, value)?;
        }
        Ok(())
    }
}
