//! Bearer token authentication (RFC 6750).

use std::sync::Arc;

use http::{StatusCode, header};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::auth::factory::StrategyFactory;
use crate::auth::request::AuthRequest;
use crate::auth::strategies::{parse_options, scope_list, select_verifier};
use crate::auth::strategy::{AuthOutcome, Strategy, StrategyError, StrategyFuture};
use crate::auth::strategy_name::StrategyName;
use crate::auth::verifier::{BearerCredentials, BearerFn, VerifyFunction};

/// Options of the bearer strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BearerOptions {
    /// Realm advertised in the `WWW-Authenticate` challenge
    #[serde(default = "default_realm")]
    pub realm: String,
    /// Scopes advertised in the challenge
    #[serde(default, deserialize_with = "scope_list::deserialize")]
    pub scope: Vec<String>,
    #[serde(default)]
    pub pass_req_to_callback: bool,
}

fn default_realm() -> String {
    "Users".to_string()
}

impl Default for BearerOptions {
    fn default() -> Self {
        Self {
            realm: default_realm(),
            scope: Vec::new(),
            pass_req_to_callback: false,
        }
    }
}

/// Where a token was found, or why none could be read.
enum TokenLookup<'a> {
    Found(&'a str),
    Missing,
    Malformed,
}

/// Verifies a bearer token read from the `Authorization` header, the
/// `access_token` body field or the `access_token` query parameter.
pub struct BearerStrategy {
    options: BearerOptions,
    verify: BearerFn,
}

impl BearerStrategy {
    pub fn new(options: BearerOptions, verify: BearerFn) -> Self {
        Self { options, verify }
    }

    /// Build the `WWW-Authenticate` value, optionally with an error code.
    fn challenge(&self, error: Option<&str>) -> String {
        let mut challenge = format!("Bearer realm=\"{}\"", self.options.realm);
        if !self.options.scope.is_empty() {
            challenge.push_str(&format!(", scope=\"{}\"", self.options.scope.join(" ")));
        }
        if let Some(error) = error {
            challenge.push_str(&format!(", error=\"{}\"", error));
        }
        challenge
    }

    fn find_token<'r>(request: &'r AuthRequest) -> TokenLookup<'r> {
        let mut found = Vec::with_capacity(1);

        if let Some(auth) = request.header(header::AUTHORIZATION) {
            let mut parts = auth.split_whitespace();
            match (parts.next(), parts.next(), parts.next()) {
                (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => {
                    found.push(token)
                }
                (Some(scheme), _, _) if scheme.eq_ignore_ascii_case("bearer") => {
                    return TokenLookup::Malformed;
                }
                // Other schemes are left to other strategies.
                _ => {}
            }
        }
        if let Some(token) = request.body_field("access_token").filter(|t| !t.is_empty()) {
            found.push(token);
        }
        if let Some(token) = request.query("access_token").filter(|t| !t.is_empty()) {
            found.push(token);
        }

        match found.as_slice() {
            [] => TokenLookup::Missing,
            [token] => TokenLookup::Found(*token),
            _ => TokenLookup::Malformed,
        }
    }
}

impl Strategy for BearerStrategy {
    fn name(&self) -> StrategyName {
        StrategyName::Bearer
    }

    fn authenticate<'a>(&'a self, request: &'a AuthRequest) -> StrategyFuture<'a> {
        Box::pin(async move {
            let token = match Self::find_token(request) {
                TokenLookup::Found(token) => token,
                TokenLookup::Missing => {
                    return Ok(AuthOutcome::challenge(
                        StatusCode::UNAUTHORIZED,
                        self.challenge(None),
                    ));
                }
                TokenLookup::Malformed => {
                    return Ok(AuthOutcome::challenge(
                        StatusCode::BAD_REQUEST,
                        self.challenge(Some("invalid_request")),
                    ));
                }
            };

            let credentials = BearerCredentials {
                token: token.to_string(),
                request: self.options.pass_req_to_callback.then(|| request.clone()),
            };

            match (self.verify)(credentials).await? {
                Some(principal) => Ok(AuthOutcome::success(principal)),
                None => {
                    debug!("Bearer token rejected");
                    Ok(AuthOutcome::challenge(
                        StatusCode::UNAUTHORIZED,
                        self.challenge(Some("invalid_token")),
                    ))
                }
            }
        })
    }
}

/// Builds `BearerStrategy` instances.
#[derive(Debug, Clone, Default)]
pub struct BearerStrategyFactory {
    default_verifier: Option<VerifyFunction>,
}

impl BearerStrategyFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_verifier(mut self, verifier: VerifyFunction) -> Self {
        self.default_verifier = Some(verifier);
        self
    }
}

impl StrategyFactory for BearerStrategyFactory {
    fn create(
        &self,
        options: &Value,
        verifier: Option<VerifyFunction>,
    ) -> Result<Arc<dyn Strategy>, StrategyError> {
        let options: BearerOptions = parse_options(StrategyName::Bearer, options)?;
        let verify = select_verifier(
            StrategyName::Bearer,
            verifier,
            self.default_verifier.as_ref(),
            |v| match v {
                VerifyFunction::Bearer(f) => Some(f),
                _ => None,
            },
        )?;
        Ok(Arc::new(BearerStrategy::new(options, verify)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::principal::Principal;
    use http::Method;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn token_is(expected: &'static str) -> VerifyFunction {
        VerifyFunction::bearer(move |creds| async move {
            if creds.token == expected {
                Ok(Some(
                    Principal::new("svc", StrategyName::Bearer).with_scopes(["read"]),
                ))
            } else {
                Ok(None)
            }
        })
    }

    fn build(options: Value) -> Arc<dyn Strategy> {
        BearerStrategyFactory::new()
            .create(&options, Some(token_is("t0k3n")))
            .unwrap()
    }

    #[tokio::test]
    async fn test_header_token_success() {
        let strategy = build(json!({}));
        let req = AuthRequest::new(Method::GET, "/api")
            .with_header(header::AUTHORIZATION, "Bearer t0k3n");

        let outcome = strategy.authenticate(&req).await.unwrap();
        assert_eq!(outcome.principal().unwrap().subject().as_str(), "svc");
    }

    #[tokio::test]
    async fn test_query_token_success() {
        let strategy = build(json!({}));
        let req = AuthRequest::new(Method::GET, "/api").with_query("access_token", "t0k3n");

        assert!(strategy.authenticate(&req).await.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_missing_token_challenge() {
        let strategy = build(json!({"realm": "api", "scope": "read write"}));
        let req = AuthRequest::new(Method::GET, "/api");

        let outcome = strategy.authenticate(&req).await.unwrap();
        assert_eq!(
            outcome,
            AuthOutcome::challenge(
                StatusCode::UNAUTHORIZED,
                "Bearer realm=\"api\", scope=\"read write\""
            )
        );
    }

    #[tokio::test]
    async fn test_empty_token_is_missing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let verifier = VerifyFunction::bearer(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            async { Ok(None) }
        });
        let strategy = BearerStrategyFactory::new()
            .create(&json!({}), Some(verifier))
            .unwrap();

        let in_query = AuthRequest::new(Method::GET, "/api").with_query("access_token", "");
        let in_body = AuthRequest::new(Method::POST, "/api").with_body_field("access_token", "");

        for req in [in_query, in_body] {
            let outcome = strategy.authenticate(&req).await.unwrap();
            assert_eq!(
                outcome,
                AuthOutcome::challenge(StatusCode::UNAUTHORIZED, "Bearer realm=\"Users\"")
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_query_token_beside_header_token() {
        let strategy = build(json!({}));
        let req = AuthRequest::new(Method::GET, "/api")
            .with_header(header::AUTHORIZATION, "Bearer t0k3n")
            .with_query("access_token", "");

        assert!(strategy.authenticate(&req).await.unwrap().is_success());
    }

    #[test]
    fn test_unknown_option_ignored() {
        let options: BearerOptions =
            parse_options(StrategyName::Bearer, &json!({"realm": "api", "session": false}))
                .unwrap();
        assert_eq!(options.realm, "api");
    }

    #[tokio::test]
    async fn test_invalid_token_challenge() {
        let strategy = build(json!({}));
        let req = AuthRequest::new(Method::GET, "/api")
            .with_header(header::AUTHORIZATION, "Bearer wrong");

        let outcome = strategy.authenticate(&req).await.unwrap();
        assert_eq!(
            outcome,
            AuthOutcome::challenge(
                StatusCode::UNAUTHORIZED,
                "Bearer realm=\"Users\", error=\"invalid_token\""
            )
        );
    }

    #[tokio::test]
    async fn test_token_in_two_places_is_bad_request() {
        let strategy = build(json!({}));
        let req = AuthRequest::new(Method::GET, "/api")
            .with_header(header::AUTHORIZATION, "Bearer t0k3n")
            .with_query("access_token", "t0k3n");

        let outcome = strategy.authenticate(&req).await.unwrap();
        assert!(matches!(
            outcome,
            AuthOutcome::Fail {
                status: StatusCode::BAD_REQUEST,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_malformed_header_is_bad_request() {
        let strategy = build(json!({}));
        let req = AuthRequest::new(Method::GET, "/api")
            .with_header(header::AUTHORIZATION, "Bearer a b");

        let outcome = strategy.authenticate(&req).await.unwrap();
        assert_eq!(
            outcome,
            AuthOutcome::challenge(
                StatusCode::BAD_REQUEST,
                "Bearer realm=\"Users\", error=\"invalid_request\""
            )
        );
    }

    #[tokio::test]
    async fn test_other_scheme_ignored() {
        let strategy = build(json!({}));
        let req = AuthRequest::new(Method::GET, "/api")
            .with_header(header::AUTHORIZATION, "Basic dXNlcjpwdw==");

        let outcome = strategy.authenticate(&req).await.unwrap();
        assert!(matches!(
            outcome,
            AuthOutcome::Fail {
                status: StatusCode::UNAUTHORIZED,
                ..
            }
        ));
    }

    #[test]
    fn test_local_verifier_rejected() {
        let err = BearerStrategyFactory::new()
            .create(&json!({}), Some(VerifyFunction::reject_all(StrategyName::Local)))
            .err()
            .unwrap();
        assert!(matches!(err, StrategyError::VerifierMismatch { .. }));
    }
}
