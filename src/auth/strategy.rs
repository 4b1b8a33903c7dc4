//! Strategy trait and the outcomes a strategy can produce.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use http::StatusCode;
use serde_json::Value;

use crate::auth::oauth2::PendingAuthorization;
use crate::auth::oauth2::discovery::DiscoveryError;
use crate::auth::principal::Principal;
use crate::auth::request::AuthRequest;
use crate::auth::strategy_name::StrategyName;
use crate::auth::verifier::VerifyError;

/// Boxed future returned by `Strategy::authenticate`.
pub type StrategyFuture<'a> =
    Pin<Box<dyn Future<Output = Result<AuthOutcome, StrategyError>> + Send + 'a>>;

/// A constructed authentication mechanism.
///
/// Strategies are built per authentication attempt by a factory and are
/// not expected to keep state between calls.
pub trait Strategy: Send + Sync {
    /// Mechanism implemented by this strategy.
    fn name(&self) -> StrategyName;

    /// Inspect `request` and decide what happens to it.
    fn authenticate<'a>(&'a self, request: &'a AuthRequest) -> StrategyFuture<'a>;
}

/// Result of running a strategy against a request.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    /// Credentials verified.
    Success {
        principal: Principal,
        info: Option<Value>,
    },
    /// Credentials missing or rejected.
    Fail {
        status: StatusCode,
        /// Value for the `WWW-Authenticate` header, if any
        challenge: Option<String>,
        message: Option<String>,
    },
    /// The client must be sent elsewhere (OAuth2 authorization endpoint).
    Redirect {
        location: String,
        /// State the caller must persist and hand back on the callback request
        pending: Option<PendingAuthorization>,
    },
    /// The strategy declined to handle the request.
    Pass,
}

impl AuthOutcome {
    pub fn success(principal: Principal) -> Self {
        Self::Success {
            principal,
            info: None,
        }
    }

    pub fn fail(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Fail {
            status,
            challenge: None,
            message: Some(message.into()),
        }
    }

    pub fn challenge(status: StatusCode, challenge: impl Into<String>) -> Self {
        Self::Fail {
            status,
            challenge: Some(challenge.into()),
            message: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Self::Success { principal, .. } => Some(principal),
            _ => None,
        }
    }
}

/// Errors raised while building or running a strategy.
#[derive(Debug, Clone)]
pub enum StrategyError {
    /// Options do not have the shape this strategy expects.
    InvalidOptions {
        strategy: StrategyName,
        message: String,
    },
    /// No verifier was passed and the factory has no default.
    MissingVerifier(StrategyName),
    /// The verifier was written for another mechanism.
    VerifierMismatch {
        expected: StrategyName,
        found: StrategyName,
    },
    /// The verification callback failed.
    Verify(VerifyError),
    /// The authorization code could not be exchanged.
    Exchange(String),
    /// Provider metadata could not be discovered.
    Discovery(DiscoveryError),
}

impl StrategyError {
    pub fn invalid_options(strategy: StrategyName, message: impl fmt::Display) -> Self {
        Self::InvalidOptions {
            strategy,
            message: message.to_string(),
        }
    }
}

impl fmt::Display for StrategyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOptions { strategy, message } => {
                write!(f, "Invalid options for strategy {}: {}", strategy, message)
            }
            Self::MissingVerifier(name) => {
                write!(f, "No verifier configured for strategy {}", name)
            }
            Self::VerifierMismatch { expected, found } => write!(
                f,
                "Verifier for strategy {} cannot be used with strategy {}",
                found, expected
            ),
            Self::Verify(e) => write!(f, "{}", e),
            Self::Exchange(msg) => write!(f, "Failed to obtain access token: {}", msg),
            Self::Discovery(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for StrategyError {}

impl From<VerifyError> for StrategyError {
    fn from(err: VerifyError) -> Self {
        Self::Verify(err)
    }
}

impl From<DiscoveryError> for StrategyError {
    fn from(err: DiscoveryError) -> Self {
        Self::Discovery(err)
    }
}
