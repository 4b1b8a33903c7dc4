//! Per-route authentication metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::strategy_name::{StrategyName, UnknownStrategy};
use crate::types::VerifierKey;

/// Declares which strategy protects a route, with what options, and
/// optionally which registered verifier to hand it.
///
/// `strategy` is kept as written so an unsupported name can be reported
/// back verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationMetadata {
    pub strategy: String,
    #[serde(default = "empty_options")]
    pub options: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier: Option<VerifierKey>,
}

fn empty_options() -> Value {
    Value::Object(Default::default())
}

impl AuthenticationMetadata {
    pub fn new(strategy: impl Into<String>, options: Value) -> Self {
        Self {
            strategy: strategy.into(),
            options,
            verifier: None,
        }
    }

    /// Metadata for a known mechanism.
    pub fn for_strategy(strategy: StrategyName, options: Value) -> Self {
        Self::new(strategy.as_str(), options)
    }

    pub fn with_verifier(mut self, key: impl Into<VerifierKey>) -> Self {
        self.verifier = Some(key.into());
        self
    }

    pub fn strategy_name(&self) -> Result<StrategyName, UnknownStrategy> {
        self.strategy.parse()
    }
}
