//! Registry of named endpoints.

use super::Endpoint;
use crate::errors::TestflowError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Endpoints available to a test run, by name.
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    endpoints: RwLock<HashMap<String, Arc<Endpoint>>>,
}

impl EndpointRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an endpoint, replacing one with the same name.
    pub fn register(&self, endpoint: Endpoint) -> Arc<Endpoint> {
        let endpoint = Arc::new(endpoint);
        self.endpoints
            .write()
            .insert(endpoint.name().to_string(), Arc::clone(&endpoint));
        endpoint
    }

    /// Gets an endpoint.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEndpoint` if no endpoint has the name.
    pub fn get(&self, name: &str) -> Result<Arc<Endpoint>, TestflowError> {
        self.endpoints
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| TestflowError::UnknownEndpoint {
                name: name.to_string(),
            })
    }

    /// Checks if an endpoint is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.endpoints.read().contains_key(name)
    }

    /// Returns all endpoint names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.endpoints.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the number of endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.read().len()
    }

    /// Returns true if no endpoint is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.read().is_empty()
    }
}
