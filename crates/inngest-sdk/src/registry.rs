//! The set of functions an app serves, keyed by function id.
//!
//! Populated at startup and read-only afterwards.

use crate::error::{Result, SdkError};
use crate::function::ServableFunction;
use std::collections::HashMap;

/// Registered functions, in registration order
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: Vec<ServableFunction>,
    index: HashMap<String, usize>,
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function; ids must be unique within the app
    pub fn register(&mut self, function: ServableFunction) -> Result<()> {
        let id = function.id().to_string();
        if self.index.contains_key(&id) {
            return Err(SdkError::config(format!(
                "duplicate function id '{id}'"
            )));
        }
        self.index.insert(id, self.functions.len());
        self.functions.push(function);
        Ok(())
    }

    /// Look up a function by its bare id
    pub fn get(&self, id: &str) -> Option<&ServableFunction> {
        self.index.get(id).map(|&i| &self.functions[i])
    }

    /// Resolve an orchestrator-supplied id, stripping the app prefix from a
    /// composite id when present
    pub fn resolve(&self, fn_id: &str, app_id: &str) -> Option<&ServableFunction> {
        fn_id
            .strip_prefix(&format!("{app_id}-"))
            .and_then(|bare| self.get(bare))
            .or_else(|| self.get(fn_id))
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Iterate functions in registration order
    pub fn iter(&self) -> impl Iterator<Item = &ServableFunction> {
        self.functions.iter()
    }
}
