//! OAuth2 resource-owner password grant.
//!
//! The client authenticates with `client_id`/`client_secret` (body fields or
//! HTTP Basic) and submits the end user's `username`/`password` in the body.

use std::sync::Arc;

use base64::Engine;
use http::{StatusCode, header};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::auth::factory::StrategyFactory;
use crate::auth::request::AuthRequest;
use crate::auth::strategies::{parse_options, select_verifier};
use crate::auth::strategy::{AuthOutcome, Strategy, StrategyError, StrategyFuture};
use crate::auth::strategy_name::StrategyName;
use crate::auth::verifier::{ResourceOwnerCredentials, ResourceOwnerPasswordFn, VerifyFunction};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceOwnerOptions {
    #[serde(default)]
    pub pass_req_to_callback: bool,
}

pub struct ResourceOwnerPasswordStrategy {
    options: ResourceOwnerOptions,
    verify: ResourceOwnerPasswordFn,
}

impl ResourceOwnerPasswordStrategy {
    pub fn new(options: ResourceOwnerOptions, verify: ResourceOwnerPasswordFn) -> Self {
        Self { options, verify }
    }

    /// Client credentials from the body, falling back to HTTP Basic.
    fn client_credentials(request: &AuthRequest) -> Option<(String, String)> {
        if let (Some(id), Some(secret)) = (
            request.body_field("client_id").filter(|s| !s.is_empty()),
            request.body_field("client_secret").filter(|s| !s.is_empty()),
        ) {
            return Some((id.to_string(), secret.to_string()));
        }

        let encoded = request
            .header(header::AUTHORIZATION)?
            .strip_prefix("Basic ")?
            .trim();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (id, secret) = decoded.split_once(':')?;
        Some((id.to_string(), secret.to_string()))
    }
}

impl Strategy for ResourceOwnerPasswordStrategy {
    fn name(&self) -> StrategyName {
        StrategyName::Oauth2ResourceOwnerGrant
    }

    fn authenticate<'a>(&'a self, request: &'a AuthRequest) -> StrategyFuture<'a> {
        Box::pin(async move {
            let Some((client_id, client_secret)) = Self::client_credentials(request) else {
                return Ok(AuthOutcome::fail(
                    StatusCode::BAD_REQUEST,
                    "Missing client credentials",
                ));
            };
            let (Some(username), Some(password)) = (
                request.body_field("username").filter(|s| !s.is_empty()),
                request.body_field("password").filter(|s| !s.is_empty()),
            ) else {
                return Ok(AuthOutcome::fail(StatusCode::BAD_REQUEST, "Missing credentials"));
            };

            let credentials = ResourceOwnerCredentials {
                client_id,
                client_secret,
                username: username.to_string(),
                password: password.to_string(),
                request: self.options.pass_req_to_callback.then(|| request.clone()),
            };

            match (self.verify)(credentials).await? {
                Some(principal) => Ok(AuthOutcome::success(principal)),
                None => {
                    debug!("Resource owner credentials rejected for user {}", username);
                    Ok(AuthOutcome::fail(StatusCode::UNAUTHORIZED, "Invalid credentials"))
                }
            }
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourceOwnerPasswordStrategyFactory {
    default_verifier: Option<VerifyFunction>,
}

impl ResourceOwnerPasswordStrategyFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_verifier(mut self, verifier: VerifyFunction) -> Self {
        self.default_verifier = Some(verifier);
        self
    }
}

impl StrategyFactory for ResourceOwnerPasswordStrategyFactory {
    fn create(
        &self,
        options: &Value,
        verifier: Option<VerifyFunction>,
    ) -> Result<Arc<dyn Strategy>, StrategyError> {
        let name = StrategyName::Oauth2ResourceOwnerGrant;
        let options: ResourceOwnerOptions = parse_options(name, options)?;
        let verify = select_verifier(name, verifier, self.default_verifier.as_ref(), |v| match v {
            VerifyFunction::ResourceOwnerPassword(f) => Some(f),
            _ => None,
        })?;
        Ok(Arc::new(ResourceOwnerPasswordStrategy::new(options, verify)))
    }
}
