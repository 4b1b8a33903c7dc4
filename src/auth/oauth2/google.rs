//! Google OAuth 2.0 sign-in.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::factory::StrategyFactory;
use crate::auth::oauth2::{
    AuthorizationCodeStrategy, ClientSettings, EndpointSource, OAuth2Endpoints, TokenExchange,
    UserinfoAuth,
};
use crate::auth::strategies::{parse_options, scope_list, select_verifier};
use crate::auth::strategy::{Strategy, StrategyError};
use crate::auth::strategy_name::StrategyName;
use crate::auth::verifier::VerifyFunction;

pub const AUTHORIZATION_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleOptions {
    #[serde(rename = "clientID")]
    pub client_id: String,
    pub client_secret: String,
    #[serde(rename = "callbackURL")]
    pub callback_url: String,
    #[serde(default, deserialize_with = "scope_list::deserialize")]
    pub scope: Vec<String>,
    #[serde(default = "default_true")]
    pub state: bool,
    #[serde(default)]
    pub pkce: bool,
    /// `offline` to receive a refresh token
    #[serde(default)]
    pub access_type: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    /// Restrict sign-in to one Google Workspace domain
    #[serde(default)]
    pub hosted_domain: Option<String>,
    #[serde(default)]
    pub pass_req_to_callback: bool,
    #[serde(default)]
    pub skip_user_profile: bool,
}

fn default_true() -> bool {
    true
}

impl GoogleOptions {
    fn into_client(self) -> ClientSettings {
        let scopes = if self.scope.is_empty() {
            vec!["openid".to_string(), "profile".to_string(), "email".to_string()]
        } else {
            self.scope
        };
        let extra_params = [
            ("access_type", self.access_type),
            ("prompt", self.prompt),
            ("hd", self.hosted_domain),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
        .collect();

        ClientSettings {
            client_id: self.client_id,
            client_secret: Some(self.client_secret),
            redirect_uri: self.callback_url,
            scopes,
            state: self.state,
            pkce: self.pkce,
            extra_params,
            pass_req_to_callback: self.pass_req_to_callback,
            skip_user_profile: self.skip_user_profile,
        }
    }
}

pub fn endpoints() -> OAuth2Endpoints {
    OAuth2Endpoints {
        authorization_url: AUTHORIZATION_URL.to_string(),
        token_url: TOKEN_URL.to_string(),
        userinfo_url: Some(USERINFO_URL.to_string()),
        userinfo_auth: UserinfoAuth::Header,
    }
}

/// Builds Google authorization-code strategies.
#[derive(Clone)]
pub struct GoogleAuthStrategyFactory {
    exchange: Arc<dyn TokenExchange>,
    default_verifier: Option<VerifyFunction>,
}

impl GoogleAuthStrategyFactory {
    pub fn new(exchange: Arc<dyn TokenExchange>) -> Self {
        Self {
            exchange,
            default_verifier: None,
        }
    }

    pub fn with_default_verifier(mut self, verifier: VerifyFunction) -> Self {
        self.default_verifier = Some(verifier);
        self
    }
}

impl StrategyFactory for GoogleAuthStrategyFactory {
    fn create(
        &self,
        options: &Value,
        verifier: Option<VerifyFunction>,
    ) -> Result<Arc<dyn Strategy>, StrategyError> {
        let name = StrategyName::GoogleOauth2;
        let options: GoogleOptions = parse_options(name, options)?;
        let verify = select_verifier(name, verifier, self.default_verifier.as_ref(), |v| match v {
            VerifyFunction::GoogleAuth(f) => Some(f),
            _ => None,
        })?;

        Ok(Arc::new(AuthorizationCodeStrategy::new(
            name,
            EndpointSource::Static(endpoints()),
            options.into_client(),
            self.exchange.clone(),
            verify,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::oauth2::test_support::FakeExchange;
    use crate::auth::request::AuthRequest;
    use crate::auth::strategy::AuthOutcome;
    use http::Method;
    use serde_json::json;

    fn options() -> Value {
        json!({
            "clientID": "google-client",
            "clientSecret": "google-secret",
            "callbackURL": "https://app.example.com/auth/google/callback",
            "accessType": "offline",
            "hostedDomain": "example.com"
        })
    }

    #[test]
    fn test_options_into_client_defaults_scope() {
        let options: GoogleOptions = parse_options(StrategyName::GoogleOauth2, &options()).unwrap();
        let client = options.into_client();

        assert_eq!(client.scopes, vec!["openid", "profile", "email"]);
        assert!(client.state);
        assert!(!client.pkce);
        assert_eq!(
            client.extra_params,
            vec![
                ("access_type".to_string(), "offline".to_string()),
                ("hd".to_string(), "example.com".to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_client_id_is_invalid() {
        let factory = GoogleAuthStrategyFactory::new(Arc::new(FakeExchange::default()));
        let err = factory
            .create(
                &json!({"clientSecret": "x", "callbackURL": "https://a"}),
                Some(VerifyFunction::reject_all(StrategyName::GoogleOauth2)),
            )
            .err()
            .unwrap();

        assert!(matches!(
            err,
            StrategyError::InvalidOptions {
                strategy: StrategyName::GoogleOauth2,
                ..
            }
        ));
    }

    #[test]
    fn test_keycloak_verifier_is_mismatch() {
        let factory = GoogleAuthStrategyFactory::new(Arc::new(FakeExchange::default()));
        let err = factory
            .create(&options(), Some(VerifyFunction::reject_all(StrategyName::Keycloak)))
            .err()
            .unwrap();

        assert!(matches!(
            err,
            StrategyError::VerifierMismatch {
                expected: StrategyName::GoogleOauth2,
                found: StrategyName::Keycloak,
            }
        ));
    }

    #[tokio::test]
    async fn test_redirects_to_google() {
        let factory = GoogleAuthStrategyFactory::new(Arc::new(FakeExchange::default()))
            .with_default_verifier(VerifyFunction::reject_all(StrategyName::GoogleOauth2));
        let strategy = factory.create(&options(), None).unwrap();

        let outcome = strategy
            .authenticate(&AuthRequest::new(Method::GET, "/auth/google"))
            .await
            .unwrap();
        let AuthOutcome::Redirect { location, pending } = outcome else {
            panic!("expected redirect");
        };
        assert!(location.starts_with(AUTHORIZATION_URL));
        assert!(location.contains("client_id=google-client"));
        assert!(location.contains("hd=example.com"));
        assert!(pending.unwrap().state.is_some());
    }
}
