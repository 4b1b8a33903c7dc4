//! Built-in credential strategies: local password, bearer token and the
//! OAuth2 resource-owner password grant.
//!
//! The redirect-based OAuth2 providers live in `auth::oauth2`.

mod bearer;
mod local;
mod resource_owner;

pub use bearer::{BearerOptions, BearerStrategy, BearerStrategyFactory};
pub use local::{LocalOptions, LocalPasswordStrategy, LocalPasswordStrategyFactory};
pub use resource_owner::{
    ResourceOwnerOptions, ResourceOwnerPasswordStrategy, ResourceOwnerPasswordStrategyFactory,
};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::auth::strategy::StrategyError;
use crate::auth::strategy_name::StrategyName;
use crate::auth::verifier::VerifyFunction;

/// Deserialize the typed options of `strategy`.
///
/// A null value is read as an empty object so strategies whose options are
/// all optional can be configured without an `options` key.
pub(crate) fn parse_options<T: DeserializeOwned>(
    strategy: StrategyName,
    options: &Value,
) -> Result<T, StrategyError> {
    let value = match options {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(value).map_err(|e| StrategyError::invalid_options(strategy, e))
}

/// Pick the verifier a strategy will use.
///
/// The one resolved from metadata wins over the factory default. `extract`
/// returns the callback only if it was written for `strategy`.
pub(crate) fn select_verifier<T>(
    strategy: StrategyName,
    passed: Option<VerifyFunction>,
    default: Option<&VerifyFunction>,
    extract: impl FnOnce(VerifyFunction) -> Option<T>,
) -> Result<T, StrategyError> {
    let verifier = passed
        .or_else(|| default.cloned())
        .ok_or(StrategyError::MissingVerifier(strategy))?;

    let found = verifier.kind();
    extract(verifier).ok_or(StrategyError::VerifierMismatch {
        expected: strategy,
        found,
    })
}

/// Accept either a single space/comma separated string or a list.
pub(crate) mod scope_list {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        One(String),
        Many(Vec<String>),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let scopes = match Raw::deserialize(d)? {
            Raw::One(s) => s
                .split(|c: char| c == ' ' || c == ',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Raw::Many(v) => v,
        };
        Ok(scopes)
    }
}
