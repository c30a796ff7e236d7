//! Name → factory registries.
//!
//! Registries are ordinary values built at process start and passed to the
//! `set_type` style entry points; there is no global state.

use std::collections::BTreeMap;

use crate::error::SolverError;

/// Map from type name to factory.
#[derive(Debug, Clone)]
pub struct Registry<F> {
    kind: &'static str,
    entries: BTreeMap<String, F>,
}

impl<F> Registry<F> {
    /// Empty registry; `kind` names the registered family in errors.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, factory: F) -> &mut Self {
        self.entries.insert(name.into(), factory);
        self
    }

    /// Look up a factory.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::UnknownType`] for unregistered names.
    pub fn get(&self, name: &str) -> Result<&F, SolverError> {
        self.entries.get(name).ok_or_else(|| SolverError::UnknownType {
            kind: self.kind,
            name: name.to_string(),
        })
    }

    /// `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Family name given at construction.
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}
