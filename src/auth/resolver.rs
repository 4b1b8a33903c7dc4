//! Strategy resolution.
//!
//! Given a route's `AuthenticationMetadata`, pick the factory for its
//! strategy, resolve the named verifier through the registry and build the
//! strategy that will authenticate the request.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::auth::factory::StrategyFactories;
use crate::auth::metadata::AuthenticationMetadata;
use crate::auth::registry::{RegistryError, VerifierRegistry};
use crate::auth::strategy::{Strategy, StrategyError};

/// Builds the strategy protecting a route.
#[derive(Clone)]
pub struct StrategyResolver {
    factories: StrategyFactories,
    verifiers: Arc<dyn VerifierRegistry>,
}

impl StrategyResolver {
    pub fn new(factories: StrategyFactories, verifiers: Arc<dyn VerifierRegistry>) -> Self {
        Self {
            factories,
            verifiers,
        }
    }

    /// Resolve the strategy for `metadata`.
    ///
    /// Returns `Ok(None)` for unprotected routes. The verifier named by the
    /// metadata is looked up before the strategy name is checked, and the
    /// factory receives the options exactly as configured.
    pub async fn resolve(
        &self,
        metadata: Option<&AuthenticationMetadata>,
    ) -> Result<Option<Arc<dyn Strategy>>, ResolveError> {
        let Some(metadata) = metadata else {
            return Ok(None);
        };

        let verifier = match &metadata.verifier {
            Some(key) => Some(self.verifiers.resolve(key).await?),
            None => None,
        };

        let name = metadata
            .strategy_name()
            .map_err(|_| ResolveError::UnsupportedStrategy(metadata.strategy.clone()))?;

        debug!(
            "Resolving strategy {} (verifier: {})",
            name,
            metadata.verifier.as_ref().map_or("default", |k| k.as_str())
        );

        let strategy = self.factories.get(name).create(&metadata.options, verifier)?;
        Ok(Some(strategy))
    }
}

impl fmt::Debug for StrategyResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyResolver")
            .field("factories", &self.factories)
            .finish_non_exhaustive()
    }
}

/// Errors returned by `StrategyResolver::resolve`.
#[derive(Debug)]
pub enum ResolveError {
    /// The metadata names no supported mechanism.
    UnsupportedStrategy(String),
    /// The named verifier could not be resolved.
    Verifier(RegistryError),
    /// The factory refused to build the strategy.
    Strategy(StrategyError),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedStrategy(name) => write!(f, "The strategy {} is not available.", name),
            Self::Verifier(e) => write!(f, "{}", e),
            Self::Strategy(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::UnsupportedStrategy(_) => None,
            Self::Verifier(e) => Some(e),
            Self::Strategy(e) => Some(e),
        }
    }
}

impl From<RegistryError> for ResolveError {
    fn from(e: RegistryError) -> Self {
        Self::Verifier(e)
    }
}

impl From<StrategyError> for ResolveError {
    fn from(e: StrategyError) -> Self {
        Self::Strategy(e)
    }
}
