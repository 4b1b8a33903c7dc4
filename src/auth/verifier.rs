//! Verification callbacks.
//!
//! A strategy extracts credentials from the request and hands them to a
//! `VerifyFunction`, which decides who (if anyone) they belong to. Each
//! mechanism has its own credential shape, so the callback type is a closed
//! enum with one variant per mechanism.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::auth::principal::Principal;
use crate::auth::request::AuthRequest;
use crate::auth::strategy_name::StrategyName;

/// Outcome of a verification callback.
///
/// `Ok(None)` rejects the credentials without it being an error.
pub type VerifyResult = Result<Option<Principal>, VerifyError>;

/// Boxed future returned by every verification callback.
pub type VerifyFuture = Pin<Box<dyn Future<Output = VerifyResult> + Send>>;

pub type LocalPasswordFn = Arc<dyn Fn(LocalCredentials) -> VerifyFuture + Send + Sync>;
pub type BearerFn = Arc<dyn Fn(BearerCredentials) -> VerifyFuture + Send + Sync>;
pub type ResourceOwnerPasswordFn =
    Arc<dyn Fn(ResourceOwnerCredentials) -> VerifyFuture + Send + Sync>;
pub type OAuth2ProfileFn = Arc<dyn Fn(OAuth2Credentials) -> VerifyFuture + Send + Sync>;

/// Username/password pair submitted to a local login.
#[derive(Debug, Clone)]
pub struct LocalCredentials {
    pub username: String,
    pub password: String,
    /// Present only when the strategy is configured with `passReqToCallback`
    pub request: Option<AuthRequest>,
}

/// Bearer token taken from the header, body or query string.
#[derive(Debug, Clone)]
pub struct BearerCredentials {
    pub token: String,
    pub request: Option<AuthRequest>,
}

/// Client and user credentials of an OAuth2 resource-owner password grant.
#[derive(Debug, Clone)]
pub struct ResourceOwnerCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub request: Option<AuthRequest>,
}

/// Tokens and profile obtained at the end of an authorization-code flow.
#[derive(Debug, Clone)]
pub struct OAuth2Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    /// Raw userinfo document returned by the provider
    pub profile: Value,
    pub request: Option<AuthRequest>,
}

/// Error raised by a verification callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyError(pub String);

impl VerifyError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Verification failed: {}", self.0)
    }
}

impl std::error::Error for VerifyError {}

/// A verification callback for one specific mechanism.
#[derive(Clone)]
pub enum VerifyFunction {
    LocalPassword(LocalPasswordFn),
    Bearer(BearerFn),
    ResourceOwnerPassword(ResourceOwnerPasswordFn),
    GoogleAuth(OAuth2ProfileFn),
    AzureAdAuth(OAuth2ProfileFn),
    KeycloakAuth(OAuth2ProfileFn),
    InstagramAuth(OAuth2ProfileFn),
}

impl VerifyFunction {
    pub fn local<F, Fut>(f: F) -> Self
    where
        F: Fn(LocalCredentials) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = VerifyResult> + Send + 'static,
    {
        Self::LocalPassword(Arc::new(move |c: LocalCredentials| -> VerifyFuture {
            Box::pin(f(c))
        }))
    }

    pub fn bearer<F, Fut>(f: F) -> Self
    where
        F: Fn(BearerCredentials) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = VerifyResult> + Send + 'static,
    {
        Self::Bearer(Arc::new(move |c: BearerCredentials| -> VerifyFuture {
            Box::pin(f(c))
        }))
    }

    pub fn resource_owner<F, Fut>(f: F) -> Self
    where
        F: Fn(ResourceOwnerCredentials) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = VerifyResult> + Send + 'static,
    {
        Self::ResourceOwnerPassword(Arc::new(
            move |c: ResourceOwnerCredentials| -> VerifyFuture { Box::pin(f(c)) },
        ))
    }

    /// Build a profile callback for one of the redirect-flow mechanisms.
    ///
    /// Returns `None` if `name` does not run an authorization-code flow.
    pub fn oauth2<F, Fut>(name: StrategyName, f: F) -> Option<Self>
    where
        F: Fn(OAuth2Credentials) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = VerifyResult> + Send + 'static,
    {
        let f = oauth2_fn(f);
        match name {
            StrategyName::GoogleOauth2 => Some(Self::GoogleAuth(f)),
            StrategyName::AzureAd => Some(Self::AzureAdAuth(f)),
            StrategyName::Keycloak => Some(Self::KeycloakAuth(f)),
            StrategyName::InstagramOauth2 => Some(Self::InstagramAuth(f)),
            StrategyName::Local | StrategyName::Bearer | StrategyName::Oauth2ResourceOwnerGrant => {
                None
            }
        }
    }

    /// A callback of the right shape for `name` that rejects every credential.
    pub fn reject_all(name: StrategyName) -> Self {
        async fn reject() -> VerifyResult {
            Ok(None)
        }
        match name {
            StrategyName::Local => Self::local(|_| reject()),
            StrategyName::Bearer => Self::bearer(|_| reject()),
            StrategyName::Oauth2ResourceOwnerGrant => Self::resource_owner(|_| reject()),
            StrategyName::GoogleOauth2 => Self::GoogleAuth(oauth2_fn(|_| reject())),
            StrategyName::AzureAd => Self::AzureAdAuth(oauth2_fn(|_| reject())),
            StrategyName::Keycloak => Self::KeycloakAuth(oauth2_fn(|_| reject())),
            StrategyName::InstagramOauth2 => Self::InstagramAuth(oauth2_fn(|_| reject())),
        }
    }

    /// Mechanism this callback was written for.
    pub fn kind(&self) -> StrategyName {
        match self {
            Self::LocalPassword(_) => StrategyName::Local,
            Self::Bearer(_) => StrategyName::Bearer,
            Self::ResourceOwnerPassword(_) => StrategyName::Oauth2ResourceOwnerGrant,
            Self::GoogleAuth(_) => StrategyName::GoogleOauth2,
            Self::AzureAdAuth(_) => StrategyName::AzureAd,
            Self::KeycloakAuth(_) => StrategyName::Keycloak,
            Self::InstagramAuth(_) => StrategyName::InstagramOauth2,
        }
    }

    /// Whether both values wrap the very same callback.
    pub fn same_callback(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::LocalPassword(a), Self::LocalPassword(b)) => Arc::ptr_eq(a, b),
            (Self::Bearer(a), Self::Bearer(b)) => Arc::ptr_eq(a, b),
            (Self::ResourceOwnerPassword(a), Self::ResourceOwnerPassword(b)) => Arc::ptr_eq(a, b),
            (Self::GoogleAuth(a), Self::GoogleAuth(b))
            | (Self::AzureAdAuth(a), Self::AzureAdAuth(b))
            | (Self::KeycloakAuth(a), Self::KeycloakAuth(b))
            | (Self::InstagramAuth(a), Self::InstagramAuth(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Profile callback of a redirect-flow variant, whichever provider it targets.
    pub(crate) fn as_oauth2(&self) -> Option<&OAuth2ProfileFn> {
        match self {
            Self::GoogleAuth(f) | Self::AzureAdAuth(f) | Self::KeycloakAuth(f) | Self::InstagramAuth(f) => {
                Some(f)
            }
            _ => None,
        }
    }
}

fn oauth2_fn<F, Fut>(f: F) -> OAuth2ProfileFn
where
    F: Fn(OAuth2Credentials) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = VerifyResult> + Send + 'static,
{
    Arc::new(move |c: OAuth2Credentials| -> VerifyFuture { Box::pin(f(c)) })
}

impl fmt::Debug for VerifyFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VerifyFunction").field(&self.kind()).finish()
    }
}
