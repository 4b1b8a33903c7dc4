//! Azure AD (Microsoft identity platform) OpenID Connect sign-in.
//!
//! Endpoints come from the tenant's discovery document named by
//! `identityMetadata`, e.g.
//! `https://login.microsoftonline.com/<tenant>/v2.0/.well-known/openid-configuration`.
//! Only the authorization-code response type is supported.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::auth::factory::StrategyFactory;
use crate::auth::oauth2::discovery::DiscoveryCache;
use crate::auth::oauth2::{AuthorizationCodeStrategy, ClientSettings, EndpointSource, TokenExchange};
use crate::auth::strategies::{parse_options, scope_list, select_verifier};
use crate::auth::strategy::{Strategy, StrategyError};
use crate::auth::strategy_name::StrategyName;
use crate::auth::verifier::VerifyFunction;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    #[default]
    Query,
    FormPost,
}

impl ResponseMode {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::FormPost => "form_post",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureAdOptions {
    pub identity_metadata: String,
    #[serde(rename = "clientID")]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub redirect_url: String,
    #[serde(default = "default_response_type")]
    pub response_type: String,
    #[serde(default)]
    pub response_mode: ResponseMode,
    #[serde(default, deserialize_with = "scope_list::deserialize")]
    pub scope: Vec<String>,
    #[serde(default)]
    pub pkce: bool,
    #[serde(default)]
    pub pass_req_to_callback: bool,
    #[serde(default)]
    pub allow_http_for_redirect_url: bool,
}

fn default_response_type() -> String {
    "code".to_string()
}

impl AzureAdOptions {
    fn validate(&self) -> Result<(), String> {
        if self.response_type != "code" {
            return Err(format!("unsupported responseType '{}'", self.response_type));
        }

        let metadata = Url::parse(&self.identity_metadata)
            .map_err(|e| format!("invalid identityMetadata: {}", e))?;
        if metadata.scheme() != "https" {
            return Err("identityMetadata must use https".to_string());
        }

        let redirect =
            Url::parse(&self.redirect_url).map_err(|e| format!("invalid redirectUrl: {}", e))?;
        match redirect.scheme() {
            "https" => Ok(()),
            "http" if self.allow_http_for_redirect_url => Ok(()),
            "http" => Err("redirectUrl must use https unless allowHttpForRedirectUrl is set".to_string()),
            other => Err(format!("unsupported redirectUrl scheme '{}'", other)),
        }
    }
}

#[derive(Clone)]
pub struct AzureAdStrategyFactory {
    exchange: Arc<dyn TokenExchange>,
    discovery: Arc<DiscoveryCache>,
    default_verifier: Option<VerifyFunction>,
}

impl AzureAdStrategyFactory {
    pub fn new(exchange: Arc<dyn TokenExchange>, discovery: Arc<DiscoveryCache>) -> Self {
        Self {
            exchange,
            discovery,
            default_verifier: None,
        }
    }

    pub fn with_default_verifier(mut self, verifier: VerifyFunction) -> Self {
        self.default_verifier = Some(verifier);
        self
    }
}

impl StrategyFactory for AzureAdStrategyFactory {
    fn create(
        &self,
        options: &Value,
        verifier: Option<VerifyFunction>,
    ) -> Result<Arc<dyn Strategy>, StrategyError> {
        let name = StrategyName::AzureAd;
        let options: AzureAdOptions = parse_options(name, options)?;
        options
            .validate()
            .map_err(|e| StrategyError::invalid_options(name, e))?;
        let verify = select_verifier(name, verifier, self.default_verifier.as_ref(), |v| match v {
            VerifyFunction::AzureAdAuth(f) => Some(f),
            _ => None,
        })?;

        let scopes = if options.scope.is_empty() {
            vec!["openid".to_string(), "profile".to_string()]
        } else {
            options.scope
        };
        let client = ClientSettings {
            client_id: options.client_id,
            client_secret: options.client_secret,
            redirect_uri: options.redirect_url,
            scopes,
            state: true,
            pkce: options.pkce,
            extra_params: vec![(
                "response_mode".to_string(),
                options.response_mode.as_str().to_string(),
            )],
            pass_req_to_callback: options.pass_req_to_callback,
            skip_user_profile: false,
        };

        Ok(Arc::new(AuthorizationCodeStrategy::new(
            name,
            EndpointSource::Discovered {
                metadata_url: options.identity_metadata,
                cache: self.discovery.clone(),
            },
            client,
            self.exchange.clone(),
            verify,
        )))
    }
}
