//! Keycloak OpenID Connect sign-in.
//!
//! Endpoints are derived from the server URL and realm:
//! `<host>/realms/<realm>/protocol/openid-connect/{auth,token,userinfo}`.

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

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeycloakOptions {
    /// Keycloak server URL, e.g. `https://sso.example.com`
    #[serde(alias = "authServerURL")]
    pub host: String,
    pub realm: String,
    #[serde(rename = "clientID")]
    pub client_id: String,
    /// Required unless `publicClient` is set
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(rename = "callbackURL")]
    pub callback_url: String,
    #[serde(default)]
    pub public_client: bool,
    #[serde(default, deserialize_with = "scope_list::deserialize")]
    pub scope: Vec<String>,
    #[serde(default = "default_true")]
    pub state: bool,
    /// Defaults to on for public clients
    #[serde(default)]
    pub pkce: Option<bool>,
    #[serde(default)]
    pub pass_req_to_callback: bool,
}

fn default_true() -> bool {
    true
}

impl KeycloakOptions {
    pub fn endpoints(&self) -> OAuth2Endpoints {
        let base = format!(
            "{}/realms/{}/protocol/openid-connect",
            self.host.trim_end_matches('/'),
            self.realm
        );
        OAuth2Endpoints {
            authorization_url: format!("{}/auth", base),
            token_url: format!("{}/token", base),
            userinfo_url: Some(format!("{}/userinfo", base)),
            userinfo_auth: UserinfoAuth::Header,
        }
    }
}

#[derive(Clone)]
pub struct KeycloakStrategyFactory {
    exchange: Arc<dyn TokenExchange>,
    default_verifier: Option<VerifyFunction>,
}

impl KeycloakStrategyFactory {
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

impl StrategyFactory for KeycloakStrategyFactory {
    fn create(
        &self,
        options: &Value,
        verifier: Option<VerifyFunction>,
    ) -> Result<Arc<dyn Strategy>, StrategyError> {
        let name = StrategyName::Keycloak;
        let options: KeycloakOptions = parse_options(name, options)?;
        if !options.public_client && options.client_secret.is_none() {
            return Err(StrategyError::invalid_options(
                name,
                "clientSecret is required for confidential clients",
            ));
        }
        let verify = select_verifier(name, verifier, self.default_verifier.as_ref(), |v| match v {
            VerifyFunction::KeycloakAuth(f) => Some(f),
            _ => None,
        })?;

        let endpoints = options.endpoints();
        let scopes = if options.scope.is_empty() {
            vec!["openid".to_string()]
        } else {
            options.scope
        };
        let client = ClientSettings {
            client_id: options.client_id,
            client_secret: options.client_secret,
            redirect_uri: options.callback_url,
            scopes,
            state: options.state,
            pkce: options.pkce.unwrap_or(options.public_client),
            extra_params: Vec::new(),
            pass_req_to_callback: options.pass_req_to_callback,
            skip_user_profile: false,
        };

        Ok(Arc::new(AuthorizationCodeStrategy::new(
            name,
            EndpointSource::Static(endpoints),
            client,
            self.exchange.clone(),
            verify,
        )))
    }
}
