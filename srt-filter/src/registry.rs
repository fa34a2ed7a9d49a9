//! Filter type registry
//!
//! Maps configuration type tokens to filter constructors. The engine looks
//! the token up here; an unknown token refuses the session outright.

use crate::builtin::{ArqFilter, FecFilter, NoOpFilter};
use crate::config::FilterConfig;
use crate::filter::{FilterConstructor, FilterError, SrtPacketFilter};
use crate::session::SessionParameters;
use std::collections::HashMap;
use tracing::debug;

pub struct FilterRegistry {
    constructors: HashMap<String, FilterConstructor>,
}

impl FilterRegistry {
    /// Registry with no filter types
    pub fn empty() -> Self {
        FilterRegistry {
            constructors: HashMap::new(),
        }
    }

    /// Registry with the built-in `noop`, `arq` and `fec` types
    pub fn builtin() -> Self {
        let mut registry = FilterRegistry::empty();
        for (name, constructor) in [
            (NoOpFilter::NAME, NoOpFilter::create as FilterConstructor),
            (ArqFilter::NAME, ArqFilter::create),
            (FecFilter::NAME, FecFilter::create),
        ] {
            registry.constructors.insert(name.to_string(), constructor);
        }
        registry
    }

    /// Add a filter type; names are never replaced
    pub fn register(&mut self, name: &str, constructor: FilterConstructor) -> Result<(), FilterError> {
        // validates the token with the same rules as the config grammar
        let name = FilterConfig::new(name)?.filter_type().to_string();
        if self.constructors.contains_key(&name) {
            return Err(FilterError::AlreadyRegistered(name));
        }
        self.constructors.insert(name, constructor);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered type tokens, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build the filter selected by `config`
    pub fn create(
        &self,
        params: &SessionParameters,
        config: &FilterConfig,
    ) -> Result<Box<dyn SrtPacketFilter>, FilterError> {
        let constructor = self
            .constructors
            .get(config.filter_type())
            .ok_or_else(|| FilterError::UnknownType(config.filter_type().to_string()))?;

        debug!("Creating '{}' filter for socket {}", config, params.socket_id());
        constructor(params, config)
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        FilterRegistry::builtin()
    }
}
