//! Per-route authentication strategy resolution for axum services.

pub mod auth;
pub mod config;
mod types;

pub use auth::{
    AuthOutcome, AuthRequest, AuthState, AuthenticationMetadata, BuiltinFactories, FnFactory,
    InMemoryVerifierRegistry, PendingAuthorization, Principal, RegistryError, ResolveError,
    Strategy, StrategyError, StrategyFactories, StrategyFactory, StrategyName, StrategyResolver,
    UnknownStrategy, VerifierRegistry, VerifyError, VerifyFunction,
};
pub use config::{AuthJsonConfig, load_routes, resolve_auth_json_path};
pub use types::{RouteKey, Subject, VerifierKey};
