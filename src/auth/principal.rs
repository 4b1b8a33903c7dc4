//! Authenticated identity produced by a verifier.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::strategy_name::StrategyName;
use crate::types::Subject;

/// Identity returned by a verification callback.
///
/// Strategies hand this to the surrounding middleware, which stores it in
/// the request extensions. It is immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable subject identifier
    subject: Subject,
    /// Mechanism that authenticated this principal
    provider: StrategyName,
    /// Optional email for display
    email: Option<String>,
    /// Optional display name
    display_name: Option<String>,
    /// Granted scopes (bearer tokens, OAuth2 grants)
    #[serde(default)]
    scopes: Vec<String>,
    /// When the verifier accepted the credentials
    authenticated_at: DateTime<Utc>,
    /// Extra claims the verifier wants to carry along
    #[serde(default)]
    claims: BTreeMap<String, Value>,
}

impl Principal {
    /// Create a new principal authenticated now.
    pub fn new(subject: impl Into<Subject>, provider: StrategyName) -> Self {
        Self {
            subject: subject.into(),
            provider,
            email: None,
            display_name: None,
            scopes: Vec::new(),
            authenticated_at: Utc::now(),
            claims: BTreeMap::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_claim(mut self, name: impl Into<String>, value: Value) -> Self {
        self.claims.insert(name.into(), value);
        self
    }

    /// Get the subject.
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Get the mechanism that authenticated this principal.
    pub fn provider(&self) -> StrategyName {
        self.provider
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Check whether every scope in `required` was granted.
    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|s| self.scopes.contains(s))
    }

    pub fn authenticated_at(&self) -> DateTime<Utc> {
        self.authenticated_at
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// Get a display-friendly name for this principal.
    pub fn display(&self) -> String {
        if let Some(name) = &self.display_name {
            name.clone()
        } else if let Some(email) = &self.email {
            email.clone()
        } else {
            self.subject.to_string()
        }
    }
}
