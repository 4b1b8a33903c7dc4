//! Verifier registry.
//!
//! Provides a `VerifierRegistry` trait for looking callbacks up by key and an
//! in-memory implementation for registering them at startup.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::auth::verifier::VerifyFunction;
use crate::types::VerifierKey;

/// Boxed future returned by a registry lookup.
pub type RegistryFuture<'a> =
    Pin<Box<dyn Future<Output = Result<VerifyFunction, RegistryError>> + Send + 'a>>;

/// Source of verification callbacks referenced by route metadata.
pub trait VerifierRegistry: Send + Sync {
    /// Resolve `key` to its registered callback.
    fn resolve<'a>(&'a self, key: &'a VerifierKey) -> RegistryFuture<'a>;
}

/// Errors raised while resolving a verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Nothing is registered under this key.
    NotFound(VerifierKey),
    /// The backing store failed.
    Internal(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(key) => write!(f, "Verifier not found: {}", key),
            Self::Internal(msg) => write!(f, "Verifier registry error: {}", msg),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Registry holding callbacks in memory.
#[derive(Clone, Default)]
pub struct InMemoryVerifierRegistry {
    verifiers: HashMap<VerifierKey, VerifyFunction>,
}

impl InMemoryVerifierRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            verifiers: HashMap::new(),
        }
    }

    /// Register a callback under `key`, replacing any previous one.
    pub fn register(mut self, key: impl Into<VerifierKey>, verifier: VerifyFunction) -> Self {
        self.verifiers.insert(key.into(), verifier);
        self
    }

    pub fn get(&self, key: &str) -> Option<&VerifyFunction> {
        self.verifiers.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.verifiers.contains_key(key)
    }

    /// List all registered keys.
    pub fn list_keys(&self) -> Vec<VerifierKey> {
        let mut keys: Vec<_> = self.verifiers.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.verifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verifiers.is_empty()
    }
}

impl VerifierRegistry for InMemoryVerifierRegistry {
    fn resolve<'a>(&'a self, key: &'a VerifierKey) -> RegistryFuture<'a> {
        Box::pin(async move {
            self.verifiers
                .get(key.as_str())
                .cloned()
                .ok_or_else(|| RegistryError::NotFound(key.clone()))
        })
    }
}

impl fmt::Debug for InMemoryVerifierRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryVerifierRegistry")
            .field("keys", &self.list_keys())
            .finish()
    }
}
