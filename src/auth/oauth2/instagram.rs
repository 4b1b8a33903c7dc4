//! Instagram OAuth 2.0 sign-in.

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

pub const AUTHORIZATION_URL: &str = "https://api.instagram.com/oauth/authorize";
pub const TOKEN_URL: &str = "https://api.instagram.com/oauth/access_token";
pub const PROFILE_URL: &str = "https://graph.instagram.com/me?fields=id,username,account_type";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstagramOptions {
    #[serde(rename = "clientID")]
    pub client_id: String,
    pub client_secret: String,
    #[serde(rename = "callbackURL")]
    pub callback_url: String,
    #[serde(default, deserialize_with = "scope_list::deserialize")]
    pub scope: Vec<String>,
    #[serde(default)]
    pub state: bool,
    #[serde(default)]
    pub pass_req_to_callback: bool,
    #[serde(default)]
    pub skip_user_profile: bool,
}

pub fn endpoints() -> OAuth2Endpoints {
    OAuth2Endpoints {
        authorization_url: AUTHORIZATION_URL.to_string(),
        token_url: TOKEN_URL.to_string(),
        userinfo_url: Some(PROFILE_URL.to_string()),
        // graph.instagram.com only reads the token from the query string
        userinfo_auth: UserinfoAuth::Query,
    }
}

#[derive(Clone)]
pub struct InstagramAuthStrategyFactory {
    exchange: Arc<dyn TokenExchange>,
    default_verifier: Option<VerifyFunction>,
}

impl InstagramAuthStrategyFactory {
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

impl StrategyFactory for InstagramAuthStrategyFactory {
    fn create(
        &self,
        options: &Value,
        verifier: Option<VerifyFunction>,
    ) -> Result<Arc<dyn Strategy>, StrategyError> {
        let name = StrategyName::InstagramOauth2;
        let options: InstagramOptions = parse_options(name, options)?;
        let verify = select_verifier(name, verifier, self.default_verifier.as_ref(), |v| match v {
            VerifyFunction::InstagramAuth(f) => Some(f),
            _ => None,
        })?;

        let scopes = if options.scope.is_empty() {
            vec!["user_profile".to_string()]
        } else {
            options.scope
        };
        let client = ClientSettings {
            client_id: options.client_id,
            client_secret: Some(options.client_secret),
            redirect_uri: options.callback_url,
            scopes,
            state: options.state,
            pkce: false,
            extra_params: Vec::new(),
            pass_req_to_callback: options.pass_req_to_callback,
            skip_user_profile: options.skip_user_profile,
        };

        Ok(Arc::new(AuthorizationCodeStrategy::new(
            name,
            EndpointSource::Static(endpoints()),
            client,
            self.exchange.clone(),
            verify,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::oauth2::test_support::FakeExchange;
    use crate::auth::principal::Principal;
    use crate::auth::request::AuthRequest;
    use crate::auth::strategy::AuthOutcome;
    use http::Method;
    use serde_json::json;

    fn factory(profile: Value) -> InstagramAuthStrategyFactory {
        InstagramAuthStrategyFactory::new(Arc::new(FakeExchange::with_profile(profile)))
    }

    fn options() -> Value {
        json!({
            "clientID": "ig-client",
            "clientSecret": "ig-secret",
            "callbackURL": "https://app.example.com/auth/instagram/callback"
        })
    }

    #[tokio::test]
    async fn test_redirect_uses_default_scope() {
        let strategy = factory(Value::Null)
            .create(&options(), Some(VerifyFunction::reject_all(StrategyName::InstagramOauth2)))
            .unwrap();

        let outcome = strategy
            .authenticate(&AuthRequest::new(Method::GET, "/auth/instagram"))
            .await
            .unwrap();
        let AuthOutcome::Redirect { location, pending } = outcome else {
            panic!("expected redirect");
        };
        assert!(location.starts_with(AUTHORIZATION_URL));
        assert!(location.contains("scope=user_profile"));
        assert!(pending.is_none());
    }

    #[tokio::test]
    async fn test_callback_passes_profile() {
        let verifier = VerifyFunction::oauth2(StrategyName::InstagramOauth2, |creds| async move {
            let id = creds.profile["id"].as_str().unwrap_or_default().to_string();
            let username = creds.profile["username"].as_str().map(str::to_string);
            let mut principal = Principal::new(id, StrategyName::InstagramOauth2);
            if let Some(username) = username {
                principal = principal.with_display_name(username);
            }
            Ok(Some(principal))
        })
        .unwrap();
        let strategy = factory(json!({"id": "1789", "username": "ig_user"}))
            .create(&options(), Some(verifier))
            .unwrap();

        let req = AuthRequest::new(Method::GET, "/auth/instagram/callback").with_query("code", "c0de");
        let outcome = strategy.authenticate(&req).await.unwrap();
        let principal = outcome.principal().unwrap();

        assert_eq!(principal.subject().as_str(), "1789");
        assert_eq!(principal.display(), "ig_user");
        assert_eq!(principal.provider(), StrategyName::InstagramOauth2);
    }
}
