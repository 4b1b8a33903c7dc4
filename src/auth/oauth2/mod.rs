//! OAuth2 authorization-code flow shared by the redirect-based providers.
//!
//! A request without a `code` is redirected to the provider's authorization
//! endpoint. The callback request carrying the `code` is exchanged for
//! tokens through a `TokenExchange`, the profile is fetched, and the
//! verifier decides who the user is.
//!
//! ## Pending authorization
//!
//! The redirect returns a `PendingAuthorization` (the `state` value and the
//! PKCE code verifier). The caller persists it (cookie, session store) and
//! attaches it to the callback request with `AuthRequest::with_pending`.

pub mod azure_ad;
pub mod discovery;
pub mod google;
pub mod instagram;
pub mod keycloak;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::auth::oauth2::discovery::DiscoveryCache;
use crate::auth::request::AuthRequest;
use crate::auth::strategy::{AuthOutcome, Strategy, StrategyError, StrategyFuture};
use crate::auth::strategy_name::StrategyName;
use crate::auth::verifier::{OAuth2Credentials, OAuth2ProfileFn};

/// State produced when redirecting to the provider and checked on callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub state: Option<String>,
    pub code_verifier: Option<String>,
}

/// How the access token is presented to the userinfo endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UserinfoAuth {
    /// `Authorization: Bearer <token>`
    #[default]
    Header,
    /// `?access_token=<token>`
    Query,
}

/// Provider endpoints of an authorization-code flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuth2Endpoints {
    pub authorization_url: String,
    pub token_url: String,
    pub userinfo_url: Option<String>,
    pub userinfo_auth: UserinfoAuth,
}

/// Where a strategy gets its endpoints from.
#[derive(Clone)]
pub enum EndpointSource {
    Static(OAuth2Endpoints),
    /// Read from an OpenID discovery document at authentication time.
    Discovered {
        metadata_url: String,
        cache: Arc<DiscoveryCache>,
    },
}

impl EndpointSource {
    async fn endpoints(&self) -> Result<OAuth2Endpoints, StrategyError> {
        match self {
            Self::Static(endpoints) => Ok(endpoints.clone()),
            Self::Discovered {
                metadata_url,
                cache,
            } => {
                let metadata = cache.get(metadata_url).await?;
                Ok(OAuth2Endpoints {
                    authorization_url: metadata.authorization_endpoint,
                    token_url: metadata.token_endpoint,
                    userinfo_url: metadata.userinfo_endpoint,
                    userinfo_auth: UserinfoAuth::Header,
                })
            }
        }
    }
}

/// Client registration used for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Generate and check a `state` parameter
    pub state: bool,
    /// Use PKCE with an S256 code challenge
    pub pkce: bool,
    /// Extra authorization parameters (e.g. `response_mode`)
    pub extra_params: Vec<(String, String)>,
    pub pass_req_to_callback: bool,
    /// Skip the userinfo request and hand the verifier an empty profile
    pub skip_user_profile: bool,
}

/// Parameters of a token request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub code: String,
    pub redirect_uri: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub code_verifier: Option<String>,
}

/// Token endpoint response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Boxed future returned by `TokenExchange` methods.
pub type ExchangeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StrategyError>> + Send + 'a>>;

/// Network side of the authorization-code flow.
pub trait TokenExchange: Send + Sync {
    /// Trade an authorization code for tokens.
    fn exchange<'a>(
        &'a self,
        endpoints: &'a OAuth2Endpoints,
        request: TokenRequest,
    ) -> ExchangeFuture<'a, TokenSet>;

    /// Fetch the user profile with an access token.
    fn fetch_profile<'a>(
        &'a self,
        endpoints: &'a OAuth2Endpoints,
        access_token: &'a str,
    ) -> ExchangeFuture<'a, Value>;
}

/// `TokenExchange` that talks to the provider over HTTP.
pub struct ReqwestTokenExchange {
    client: reqwest::Client,
}

impl ReqwestTokenExchange {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self { client }
    }
}

impl Default for ReqwestTokenExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenExchange for ReqwestTokenExchange {
    fn exchange<'a>(
        &'a self,
        endpoints: &'a OAuth2Endpoints,
        request: TokenRequest,
    ) -> ExchangeFuture<'a, TokenSet> {
        Box::pin(async move {
            let mut form = vec![
                ("grant_type", "authorization_code".to_string()),
                ("code", request.code),
                ("redirect_uri", request.redirect_uri),
                ("client_id", request.client_id),
            ];
            if let Some(secret) = request.client_secret {
                form.push(("client_secret", secret));
            }
            if let Some(verifier) = request.code_verifier {
                form.push(("code_verifier", verifier));
            }

            let response = self
                .client
                .post(&endpoints.token_url)
                .header(http::header::ACCEPT, "application/json")
                .form(&form)
                .send()
                .await
                .map_err(|e| StrategyError::Exchange(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(StrategyError::Exchange(format!(
                    "HTTP {} from token endpoint: {}",
                    status, body
                )));
            }

            response
                .json::<TokenSet>()
                .await
                .map_err(|e| StrategyError::Exchange(format!("Invalid token response: {}", e)))
        })
    }

    fn fetch_profile<'a>(
        &'a self,
        endpoints: &'a OAuth2Endpoints,
        access_token: &'a str,
    ) -> ExchangeFuture<'a, Value> {
        Box::pin(async move {
            let Some(userinfo_url) = &endpoints.userinfo_url else {
                return Ok(Value::Null);
            };

            let request = match endpoints.userinfo_auth {
                UserinfoAuth::Header => self.client.get(userinfo_url).bearer_auth(access_token),
                UserinfoAuth::Query => self
                    .client
                    .get(userinfo_url)
                    .query(&[("access_token", access_token)]),
            };

            let response = request
                .send()
                .await
                .map_err(|e| StrategyError::Exchange(format!("Failed to fetch profile: {}", e)))?;

            if !response.status().is_success() {
                return Err(StrategyError::Exchange(format!(
                    "HTTP {} from userinfo endpoint",
                    response.status()
                )));
            }

            response
                .json::<Value>()
                .await
                .map_err(|e| StrategyError::Exchange(format!("Invalid profile response: {}", e)))
        })
    }
}

/// Strategy running the authorization-code flow for one provider.
pub struct AuthorizationCodeStrategy {
    name: StrategyName,
    endpoints: EndpointSource,
    client: ClientSettings,
    exchange: Arc<dyn TokenExchange>,
    verify: OAuth2ProfileFn,
}

impl AuthorizationCodeStrategy {
    pub fn new(
        name: StrategyName,
        endpoints: EndpointSource,
        client: ClientSettings,
        exchange: Arc<dyn TokenExchange>,
        verify: OAuth2ProfileFn,
    ) -> Self {
        Self {
            name,
            endpoints,
            client,
            exchange,
            verify,
        }
    }

    pub fn client(&self) -> &ClientSettings {
        &self.client
    }

    /// Build the authorization redirect and the state it depends on.
    fn authorization_redirect(
        &self,
        endpoints: &OAuth2Endpoints,
    ) -> Result<AuthOutcome, StrategyError> {
        let mut url = Url::parse(&endpoints.authorization_url).map_err(|e| {
            StrategyError::invalid_options(self.name, format!("invalid authorization URL: {}", e))
        })?;

        let mut pending = PendingAuthorization::default();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.client.client_id)
                .append_pair("redirect_uri", &self.client.redirect_uri);
            if !self.client.scopes.is_empty() {
                query.append_pair("scope", &self.client.scopes.join(" "));
            }
            for (k, v) in &self.client.extra_params {
                query.append_pair(k, v);
            }
            if self.client.state {
                let state = random_token();
                query.append_pair("state", &state);
                pending.state = Some(state);
            }
            if self.client.pkce {
                let verifier = format!("{}{}", random_token(), random_token());
                query
                    .append_pair("code_challenge", &pkce_challenge(&verifier))
                    .append_pair("code_challenge_method", "S256");
                pending.code_verifier = Some(verifier);
            }
        }

        let pending = (pending != PendingAuthorization::default()).then_some(pending);
        Ok(AuthOutcome::Redirect {
            location: url.into(),
            pending,
        })
    }

    /// Check the `state` echoed by the provider against the pending one.
    fn state_mismatch(&self, request: &AuthRequest) -> Option<AuthOutcome> {
        if !self.client.state {
            return None;
        }
        let expected = request.pending().and_then(|p| p.state.as_deref());
        let Some(expected) = expected else {
            return Some(AuthOutcome::fail(
                StatusCode::FORBIDDEN,
                "Unable to verify authorization request state.",
            ));
        };
        if request.param("state") != Some(expected) {
            return Some(AuthOutcome::fail(
                StatusCode::FORBIDDEN,
                "Invalid authorization request state.",
            ));
        }
        None
    }
}

impl Strategy for AuthorizationCodeStrategy {
    fn name(&self) -> StrategyName {
        self.name
    }

    fn authenticate<'a>(&'a self, request: &'a AuthRequest) -> StrategyFuture<'a> {
        Box::pin(async move {
            if let Some(error) = request.param("error") {
                let message = request
                    .param("error_description")
                    .unwrap_or(error)
                    .to_string();
                debug!("{} authorization denied: {}", self.name, message);
                return Ok(AuthOutcome::fail(StatusCode::UNAUTHORIZED, message));
            }

            let endpoints = self.endpoints.endpoints().await?;

            let Some(code) = request.param("code") else {
                return self.authorization_redirect(&endpoints);
            };

            if let Some(outcome) = self.state_mismatch(request) {
                return Ok(outcome);
            }

            let tokens = self
                .exchange
                .exchange(
                    &endpoints,
                    TokenRequest {
                        code: code.to_string(),
                        redirect_uri: self.client.redirect_uri.clone(),
                        client_id: self.client.client_id.clone(),
                        client_secret: self.client.client_secret.clone(),
                        code_verifier: request.pending().and_then(|p| p.code_verifier.clone()),
                    },
                )
                .await?;

            let profile = if self.client.skip_user_profile {
                Value::Null
            } else {
                self.exchange
                    .fetch_profile(&endpoints, &tokens.access_token)
                    .await?
            };

            let credentials = OAuth2Credentials {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                id_token: tokens.id_token,
                profile,
                request: self.client.pass_req_to_callback.then(|| request.clone()),
            };

            match (self.verify)(credentials).await? {
                Some(principal) => Ok(AuthOutcome::success(principal)),
                None => {
                    debug!("{} profile rejected by verifier", self.name);
                    Ok(AuthOutcome::fail(StatusCode::UNAUTHORIZED, "Unauthorized"))
                }
            }
        })
    }
}

/// URL-safe random token.
fn random_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// S256 PKCE challenge for `verifier`.
pub fn pkce_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}


#[cfg(test)]
mod tests {
    use super::test_support::FakeExchange;
    use super::*;
    use crate::auth::principal::Principal;
    use crate::auth::verifier::VerifyFunction;
    use http::Method;
    use serde_json::json;

    fn endpoints() -> OAuth2Endpoints {
        OAuth2Endpoints {
            authorization_url: "https://idp.example.com/authorize".to_string(),
            token_url: "https://idp.example.com/token".to_string(),
            userinfo_url: Some("https://idp.example.com/userinfo".to_string()),
            userinfo_auth: UserinfoAuth::Header,
        }
    }

    fn client(state: bool, pkce: bool) -> ClientSettings {
        ClientSettings {
            client_id: "client-1".to_string(),
            client_secret: Some("secret".to_string()),
            redirect_uri: "https://app.example.com/callback".to_string(),
            scopes: vec!["openid".to_string(), "email".to_string()],
            state,
            pkce,
            extra_params: vec![("prompt".to_string(), "consent".to_string())],
            pass_req_to_callback: false,
            skip_user_profile: false,
        }
    }

    fn profile_verifier() -> OAuth2ProfileFn {
        let v = VerifyFunction::oauth2(StrategyName::GoogleOauth2, |creds| async move {
            let sub = creds.profile["sub"].as_str().map(str::to_string);
            Ok(sub.map(|s| {
                Principal::new(s, StrategyName::GoogleOauth2)
                    .with_claim("access_token", json!(creds.access_token))
            }))
        })
        .unwrap();
        v.as_oauth2().unwrap().clone()
    }

    fn strategy(client: ClientSettings, exchange: Arc<FakeExchange>) -> AuthorizationCodeStrategy {
        AuthorizationCodeStrategy::new(
            StrategyName::GoogleOauth2,
            EndpointSource::Static(endpoints()),
            client,
            exchange,
            profile_verifier(),
        )
    }

    #[tokio::test]
    async fn test_redirect_carries_client_parameters() {
        let s = strategy(client(true, true), Arc::new(FakeExchange::default()));
        let req = AuthRequest::new(Method::GET, "/auth/google");

        let AuthOutcome::Redirect { location, pending } = s.authenticate(&req).await.unwrap() else {
            panic!("expected redirect");
        };
        let url = Url::parse(&location).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("idp.example.com"));
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], "client-1");
        assert_eq!(params["redirect_uri"], "https://app.example.com/callback");
        assert_eq!(params["scope"], "openid email");
        assert_eq!(params["prompt"], "consent");
        assert_eq!(params["code_challenge_method"], "S256");

        let pending = pending.unwrap();
        assert_eq!(params.get("state"), pending.state.as_ref());
        assert_eq!(
            params["code_challenge"],
            pkce_challenge(pending.code_verifier.as_deref().unwrap())
        );
    }

    #[tokio::test]
    async fn test_redirect_without_state_has_no_pending() {
        let s = strategy(client(false, false), Arc::new(FakeExchange::default()));
        let outcome = s
            .authenticate(&AuthRequest::new(Method::GET, "/auth/google"))
            .await
            .unwrap();

        assert!(matches!(outcome, AuthOutcome::Redirect { pending: None, .. }));
    }

    #[tokio::test]
    async fn test_callback_exchanges_code() {
        let exchange = Arc::new(FakeExchange::with_profile(json!({"sub": "g-123"})));
        let s = strategy(client(true, true), exchange.clone());
        let pending = PendingAuthorization {
            state: Some("st".to_string()),
            code_verifier: Some("verifier".to_string()),
        };
        let req = AuthRequest::new(Method::GET, "/auth/google/callback")
            .with_query("code", "abc")
            .with_query("state", "st")
            .with_pending(pending);

        let outcome = s.authenticate(&req).await.unwrap();
        let principal = outcome.principal().unwrap();
        assert_eq!(principal.subject().as_str(), "g-123");
        assert_eq!(principal.claim("access_token"), Some(&json!("access-abc")));

        let requests = exchange.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].code_verifier.as_deref(), Some("verifier"));
        assert_eq!(requests[0].client_secret.as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn test_state_mismatch_forbidden() {
        let exchange = Arc::new(FakeExchange::with_profile(json!({"sub": "g-123"})));
        let s = strategy(client(true, false), exchange.clone());
        let req = AuthRequest::new(Method::GET, "/auth/google/callback")
            .with_query("code", "abc")
            .with_query("state", "forged")
            .with_pending(PendingAuthorization {
                state: Some("st".to_string()),
                code_verifier: None,
            });

        let outcome = s.authenticate(&req).await.unwrap();
        assert_eq!(
            outcome,
            AuthOutcome::fail(StatusCode::FORBIDDEN, "Invalid authorization request state.")
        );
        assert!(exchange.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_pending_state_forbidden() {
        let s = strategy(client(true, false), Arc::new(FakeExchange::default()));
        let req = AuthRequest::new(Method::GET, "/cb").with_query("code", "abc");

        let outcome = s.authenticate(&req).await.unwrap();
        assert_eq!(
            outcome,
            AuthOutcome::fail(
                StatusCode::FORBIDDEN,
                "Unable to verify authorization request state."
            )
        );
    }

    #[tokio::test]
    async fn test_provider_error_fails() {
        let s = strategy(client(false, false), Arc::new(FakeExchange::default()));
        let req = AuthRequest::new(Method::GET, "/cb")
            .with_query("error", "access_denied")
            .with_query("error_description", "The user denied access");

        let outcome = s.authenticate(&req).await.unwrap();
        assert_eq!(
            outcome,
            AuthOutcome::fail(StatusCode::UNAUTHORIZED, "The user denied access")
        );
    }

    #[tokio::test]
    async fn test_exchange_error_propagates() {
        let exchange = Arc::new(FakeExchange {
            fail: true,
            ..Default::default()
        });
        let s = strategy(client(false, false), exchange);
        let req = AuthRequest::new(Method::GET, "/cb").with_query("code", "abc");

        let err = s.authenticate(&req).await.unwrap_err();
        assert!(matches!(err, StrategyError::Exchange(_)));
    }

    #[tokio::test]
    async fn test_rejected_profile_fails() {
        let exchange = Arc::new(FakeExchange::with_profile(json!({"name": "no sub"})));
        let s = strategy(client(false, false), exchange);
        let req = AuthRequest::new(Method::GET, "/cb").with_query("code", "abc");

        let outcome = s.authenticate(&req).await.unwrap();
        assert!(matches!(
            outcome,
            AuthOutcome::Fail {
                status: StatusCode::UNAUTHORIZED,
                ..
            }
        ));
    }

    #[test]
    fn test_pkce_challenge_known_value() {
        assert_eq!(
            pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r7wW1gXk7dFXk"),
            "s03b9ae9usFFtVTHuCOmYeVkFKelsHxg1dLtkTr-B6Y"
        );
    }
}
