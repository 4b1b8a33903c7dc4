//! Strategy factories and the per-mechanism factory table.
//!
//! Every mechanism has exactly one factory in a `StrategyFactories` table.
//! The resolver looks the factory up by `StrategyName` and hands it the
//! route's raw options together with the verifier it resolved.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::auth::oauth2::azure_ad::AzureAdStrategyFactory;
use crate::auth::oauth2::discovery::DiscoveryCache;
use crate::auth::oauth2::google::GoogleAuthStrategyFactory;
use crate::auth::oauth2::instagram::InstagramAuthStrategyFactory;
use crate::auth::oauth2::keycloak::KeycloakStrategyFactory;
use crate::auth::oauth2::{ReqwestTokenExchange, TokenExchange};
use crate::auth::strategies::{
    BearerStrategyFactory, LocalPasswordStrategyFactory, ResourceOwnerPasswordStrategyFactory,
};
use crate::auth::strategy::{Strategy, StrategyError};
use crate::auth::strategy_name::StrategyName;
use crate::auth::verifier::VerifyFunction;

/// Builds a configured strategy for one mechanism.
pub trait StrategyFactory: Send + Sync {
    /// Create a strategy from the route's options.
    ///
    /// `verifier` is the callback resolved from the route's metadata, if it
    /// named one.
    fn create(
        &self,
        options: &Value,
        verifier: Option<VerifyFunction>,
    ) -> Result<Arc<dyn Strategy>, StrategyError>;
}

/// Adapts a closure into a `StrategyFactory`.
pub struct FnFactory<F>(pub F);

impl<F> StrategyFactory for FnFactory<F>
where
    F: Fn(&Value, Option<VerifyFunction>) -> Result<Arc<dyn Strategy>, StrategyError>
        + Send
        + Sync,
{
    fn create(
        &self,
        options: &Value,
        verifier: Option<VerifyFunction>,
    ) -> Result<Arc<dyn Strategy>, StrategyError> {
        (self.0)(options, verifier)
    }
}

/// One factory per supported mechanism.
#[derive(Clone)]
pub struct StrategyFactories {
    local: Arc<dyn StrategyFactory>,
    bearer: Arc<dyn StrategyFactory>,
    resource_owner: Arc<dyn StrategyFactory>,
    google: Arc<dyn StrategyFactory>,
    azure_ad: Arc<dyn StrategyFactory>,
    keycloak: Arc<dyn StrategyFactory>,
    instagram: Arc<dyn StrategyFactory>,
}

impl StrategyFactories {
    /// Built-in factories talking to real providers, without default verifiers.
    pub fn builtin() -> Self {
        BuiltinFactories::new().into_factories()
    }

    /// Factory responsible for `name`.
    pub fn get(&self, name: StrategyName) -> &Arc<dyn StrategyFactory> {
        match name {
            StrategyName::Local => &self.local,
            StrategyName::Bearer => &self.bearer,
            StrategyName::Oauth2ResourceOwnerGrant => &self.resource_owner,
            StrategyName::GoogleOauth2 => &self.google,
            StrategyName::AzureAd => &self.azure_ad,
            StrategyName::Keycloak => &self.keycloak,
            StrategyName::InstagramOauth2 => &self.instagram,
        }
    }

    /// Replace the factory responsible for `name`.
    pub fn with(self, name: StrategyName, factory: impl StrategyFactory + 'static) -> Self {
        self.with_shared(name, Arc::new(factory))
    }

    pub fn with_shared(mut self, name: StrategyName, factory: Arc<dyn StrategyFactory>) -> Self {
        let slot = match name {
            StrategyName::Local => &mut self.local,
            StrategyName::Bearer => &mut self.bearer,
            StrategyName::Oauth2ResourceOwnerGrant => &mut self.resource_owner,
            StrategyName::GoogleOauth2 => &mut self.google,
            StrategyName::AzureAd => &mut self.azure_ad,
            StrategyName::Keycloak => &mut self.keycloak,
            StrategyName::InstagramOauth2 => &mut self.instagram,
        };
        *slot = factory;
        self
    }
}

impl Default for StrategyFactories {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for StrategyFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyFactories").finish_non_exhaustive()
    }
}

/// Builder for the built-in factory table.
///
/// Shares one `TokenExchange` and one `DiscoveryCache` between the
/// redirect-flow providers.
pub struct BuiltinFactories {
    exchange: Arc<dyn TokenExchange>,
    discovery: Arc<DiscoveryCache>,
    default_verifiers: HashMap<StrategyName, VerifyFunction>,
}

impl BuiltinFactories {
    pub fn new() -> Self {
        Self {
            exchange: Arc::new(ReqwestTokenExchange::new()),
            discovery: Arc::new(DiscoveryCache::default()),
            default_verifiers: HashMap::new(),
        }
    }

    pub fn with_exchange(mut self, exchange: Arc<dyn TokenExchange>) -> Self {
        self.exchange = exchange;
        self
    }

    pub fn with_discovery(mut self, discovery: Arc<DiscoveryCache>) -> Self {
        self.discovery = discovery;
        self
    }

    /// Verifier used for its mechanism when metadata names none.
    pub fn with_default_verifier(mut self, verifier: VerifyFunction) -> Self {
        self.default_verifiers.insert(verifier.kind(), verifier);
        self
    }

    pub fn into_factories(mut self) -> StrategyFactories {
        let mut take = |name| self.default_verifiers.remove(&name);

        let mut local = LocalPasswordStrategyFactory::new();
        if let Some(v) = take(StrategyName::Local) {
            local = local.with_default_verifier(v);
        }
        let mut bearer = BearerStrategyFactory::new();
        if let Some(v) = take(StrategyName::Bearer) {
            bearer = bearer.with_default_verifier(v);
        }
        let mut resource_owner = ResourceOwnerPasswordStrategyFactory::new();
        if let Some(v) = take(StrategyName::Oauth2ResourceOwnerGrant) {
            resource_owner = resource_owner.with_default_verifier(v);
        }
        let mut google = GoogleAuthStrategyFactory::new(self.exchange.clone());
        if let Some(v) = take(StrategyName::GoogleOauth2) {
            google = google.with_default_verifier(v);
        }
        let mut azure_ad = AzureAdStrategyFactory::new(self.exchange.clone(), self.discovery.clone());
        if let Some(v) = take(StrategyName::AzureAd) {
            azure_ad = azure_ad.with_default_verifier(v);
        }
        let mut keycloak = KeycloakStrategyFactory::new(self.exchange.clone());
        if let Some(v) = take(StrategyName::Keycloak) {
            keycloak = keycloak.with_default_verifier(v);
        }
        let mut instagram = InstagramAuthStrategyFactory::new(self.exchange.clone());
        if let Some(v) = take(StrategyName::InstagramOauth2) {
            instagram = instagram.with_default_verifier(v);
        }

        StrategyFactories {
            local: Arc::new(local),
            bearer: Arc::new(bearer),
            resource_owner: Arc::new(resource_owner),
            google: Arc::new(google),
            azure_ad: Arc::new(azure_ad),
            keycloak: Arc::new(keycloak),
            instagram: Arc::new(instagram),
        }
    }
}

impl Default for BuiltinFactories {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::request::AuthRequest;
    use crate::auth::strategy::{AuthOutcome, StrategyFuture};
    use http::Method;
    use serde_json::json;

    struct Fixed(StrategyName);

    impl Strategy for Fixed {
        fn name(&self) -> StrategyName {
            self.0
        }

        fn authenticate<'a>(&'a self, _request: &'a AuthRequest) -> StrategyFuture<'a> {
            Box::pin(async move { Ok(AuthOutcome::Pass) })
        }
    }

    #[test]
    fn test_builtin_factory_builds_its_own_mechanism() {
        let factories = BuiltinFactories::new()
            .with_default_verifier(VerifyFunction::reject_all(StrategyName::Local))
            .with_default_verifier(VerifyFunction::reject_all(StrategyName::Bearer))
            .into_factories();

        let local = factories
            .get(StrategyName::Local)
            .create(&Value::Null, None)
            .unwrap();
        assert_eq!(local.name(), StrategyName::Local);

        let bearer = factories
            .get(StrategyName::Bearer)
            .create(&json!({"realm": "api"}), None)
            .unwrap();
        assert_eq!(bearer.name(), StrategyName::Bearer);
    }

    #[test]
    fn test_missing_default_verifier() {
        let factories = StrategyFactories::builtin();
        let err = factories
            .get(StrategyName::Oauth2ResourceOwnerGrant)
            .create(&Value::Null, None)
            .err()
            .unwrap();

        assert!(matches!(
            err,
            StrategyError::MissingVerifier(StrategyName::Oauth2ResourceOwnerGrant)
        ));
    }

    #[tokio::test]
    async fn test_with_replaces_one_slot() {
        let factories = StrategyFactories::builtin().with(
            StrategyName::Keycloak,
            FnFactory(|_: &Value, _: Option<VerifyFunction>| {
                Ok(Arc::new(Fixed(StrategyName::Keycloak)) as Arc<dyn Strategy>)
            }),
        );

        let strategy = factories
            .get(StrategyName::Keycloak)
            .create(&Value::Null, None)
            .unwrap();
        let outcome = strategy
            .authenticate(&AuthRequest::new(Method::GET, "/"))
            .await
            .unwrap();
        assert_eq!(outcome, AuthOutcome::Pass);

        // other slots keep the built-in factory
        assert!(factories
            .get(StrategyName::Local)
            .create(&Value::Null, None)
            .is_err());
    }
}
