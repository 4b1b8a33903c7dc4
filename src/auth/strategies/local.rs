//! Username and password login.

use std::sync::Arc;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::auth::factory::StrategyFactory;
use crate::auth::request::AuthRequest;
use crate::auth::strategies::{parse_options, select_verifier};
use crate::auth::strategy::{AuthOutcome, Strategy, StrategyError, StrategyFuture};
use crate::auth::strategy_name::StrategyName;
use crate::auth::verifier::{LocalCredentials, LocalPasswordFn, VerifyFunction};

/// Options of the local password strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalOptions {
    /// Request field holding the username
    #[serde(default = "default_username_field")]
    pub username_field: String,
    /// Request field holding the password
    #[serde(default = "default_password_field")]
    pub password_field: String,
    /// Hand the request to the verifier as well
    #[serde(default)]
    pub pass_req_to_callback: bool,
    /// Message used when credentials are missing
    #[serde(default)]
    pub bad_request_message: Option<String>,
    /// Accepted for compatibility; sessions are managed by the caller
    #[serde(default)]
    pub session: Option<bool>,
}

fn default_username_field() -> String {
    "username".to_string()
}

fn default_password_field() -> String {
    "password".to_string()
}

impl Default for LocalOptions {
    fn default() -> Self {
        Self {
            username_field: default_username_field(),
            password_field: default_password_field(),
            pass_req_to_callback: false,
            bad_request_message: None,
            session: None,
        }
    }
}

/// Verifies a username/password pair read from the body or query string.
pub struct LocalPasswordStrategy {
    options: LocalOptions,
    verify: LocalPasswordFn,
}

impl LocalPasswordStrategy {
    pub fn new(options: LocalOptions, verify: LocalPasswordFn) -> Self {
        Self { options, verify }
    }

    pub fn options(&self) -> &LocalOptions {
        &self.options
    }
}

impl Strategy for LocalPasswordStrategy {
    fn name(&self) -> StrategyName {
        StrategyName::Local
    }

    fn authenticate<'a>(&'a self, request: &'a AuthRequest) -> StrategyFuture<'a> {
        Box::pin(async move {
            // Empty values count as missing.
            let username = request
                .param(&self.options.username_field)
                .filter(|s| !s.is_empty());
            let password = request
                .param(&self.options.password_field)
                .filter(|s| !s.is_empty());

            let (Some(username), Some(password)) = (username, password) else {
                let message = self
                    .options
                    .bad_request_message
                    .clone()
                    .unwrap_or_else(|| "Missing credentials".to_string());
                return Ok(AuthOutcome::fail(StatusCode::BAD_REQUEST, message));
            };

            let credentials = LocalCredentials {
                username: username.to_string(),
                password: password.to_string(),
                request: self.options.pass_req_to_callback.then(|| request.clone()),
            };

            match (self.verify)(credentials).await? {
                Some(principal) => Ok(AuthOutcome::success(principal)),
                None => {
                    debug!("Local credentials rejected for user {}", username);
                    Ok(AuthOutcome::fail(StatusCode::UNAUTHORIZED, "Invalid credentials"))
                }
            }
        })
    }
}

/// Builds `LocalPasswordStrategy` instances.
#[derive(Debug, Clone, Default)]
pub struct LocalPasswordStrategyFactory {
    default_verifier: Option<VerifyFunction>,
}

impl LocalPasswordStrategyFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifier used when metadata does not name one.
    pub fn with_default_verifier(mut self, verifier: VerifyFunction) -> Self {
        self.default_verifier = Some(verifier);
        self
    }
}

impl StrategyFactory for LocalPasswordStrategyFactory {
    fn create(
        &self,
        options: &Value,
        verifier: Option<VerifyFunction>,
    ) -> Result<Arc<dyn Strategy>, StrategyError> {
        let options: LocalOptions = parse_options(StrategyName::Local, options)?;
        let verify = select_verifier(
            StrategyName::Local,
            verifier,
            self.default_verifier.as_ref(),
            |v| match v {
                VerifyFunction::LocalPassword(f) => Some(f),
                _ => None,
            },
        )?;
        Ok(Arc::new(LocalPasswordStrategy::new(options, verify)))
    }
}
