//! Authentication strategy resolution.
//!
//! Each protected route carries `AuthenticationMetadata` naming the strategy
//! that guards it. At request time the `StrategyResolver` turns that
//! metadata into a ready-to-run strategy:
//!
//! - **local**: username and password from the body or query string
//! - **bearer**: RFC 6750 bearer tokens
//! - **oauth2-resource-owner-password-grant**: client and user credentials
//! - **google-oauth2**, **azure-ad**, **keycloak**, **instagram-oauth2**:
//!   authorization-code redirects
//!
//! ## Verifiers
//!
//! Strategies only extract credentials. Deciding who the user is belongs to
//! a caller-supplied `VerifyFunction`, either registered under a key in a
//! `VerifierRegistry` and named by the metadata, or configured as a factory
//! default.
//!
//! ## Usage
//!
//! ```ignore
//! let registry = InMemoryVerifierRegistry::new()
//!     .register("apiTokens", VerifyFunction::bearer(|creds| async move {
//!         Ok(lookup(&creds.token).await)
//!     }));
//! let resolver = StrategyResolver::new(StrategyFactories::builtin(), Arc::new(registry));
//!
//! let meta = AuthenticationMetadata::new("bearer", json!({})).with_verifier("apiTokens");
//! let strategy = resolver.resolve(Some(&meta)).await?;
//! ```

pub mod factory;
pub mod metadata;
pub mod middleware;
pub mod oauth2;
mod principal;
pub mod registry;
mod request;
pub mod resolver;
pub mod strategies;
pub mod strategy;
mod strategy_name;
pub mod verifier;

pub use factory::{BuiltinFactories, FnFactory, StrategyFactories, StrategyFactory};
pub use metadata::AuthenticationMetadata;
pub use middleware::{AuthState, authenticate, protect};
pub use oauth2::PendingAuthorization;
pub use principal::Principal;
pub use registry::{InMemoryVerifierRegistry, RegistryError, VerifierRegistry};
pub use request::AuthRequest;
pub use resolver::{ResolveError, StrategyResolver};
pub use strategy::{AuthOutcome, Strategy, StrategyError};
pub use strategy_name::{StrategyName, UnknownStrategy};
pub use verifier::{VerifyError, VerifyFunction};
