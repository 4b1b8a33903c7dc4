//! axum middleware authenticating requests against per-route metadata.
//!
//! ## Usage
//!
//! ```ignore
//! let state = AuthState::new(resolver, routes);
//! let app = protect(Router::new().route("/me", get(me)), state);
//!
//! async fn me(Extension(principal): Extension<Principal>) -> String {
//!     principal.display()
//! }
//! ```
//!
//! Routes are looked up by `"<METHOD> <path>"` first, then by the bare path.
//! Routes without metadata are passed through untouched.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use http::{HeaderValue, Method, StatusCode, header};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::auth::metadata::AuthenticationMetadata;
use crate::auth::oauth2::PendingAuthorization;
use crate::auth::request::AuthRequest;
use crate::auth::resolver::StrategyResolver;
use crate::auth::strategy::AuthOutcome;
use crate::types::RouteKey;

/// Largest request body read for credential extraction.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared state of the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    resolver: Arc<StrategyResolver>,
    routes: Arc<HashMap<RouteKey, AuthenticationMetadata>>,
}

impl AuthState {
    pub fn new(
        resolver: StrategyResolver,
        routes: impl IntoIterator<Item = (RouteKey, AuthenticationMetadata)>,
    ) -> Self {
        Self {
            resolver: Arc::new(resolver),
            routes: Arc::new(routes.into_iter().collect()),
        }
    }

    /// Metadata protecting `method path`, if any.
    pub fn metadata_for(&self, method: &Method, path: &str) -> Option<&AuthenticationMetadata> {
        let key = format!("{} {}", method, path);
        self.routes
            .get(key.as_str())
            .or_else(|| self.routes.get(path))
    }
}

/// Wrap `router` with request tracing and authentication.
pub fn protect<S>(router: Router<S>, state: AuthState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn_with_state(state, authenticate)),
    )
}

/// Middleware function: resolve the route's strategy and run it.
///
/// On success the `Principal` is inserted into the request extensions. A
/// `PendingAuthorization` found in the request extensions is handed to the
/// strategy; one produced by a redirect is inserted into the response
/// extensions for an outer layer to persist.
pub async fn authenticate(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    let Some(metadata) = state.metadata_for(request.method(), request.uri().path()) else {
        return next.run(request).await;
    };

    let strategy = match state.resolver.resolve(Some(metadata)).await {
        Ok(Some(strategy)) => strategy,
        Ok(None) => return next.run(request).await,
        Err(e) => {
            warn!("Failed to resolve strategy for {}: {}", request.uri().path(), e);
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let (mut parts, body) = request.into_parts();
    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let (body, bytes) = if content_type.as_deref().is_some_and(has_credential_body) {
        match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
            Ok(bytes) => (Body::from(bytes.clone()), bytes),
            Err(e) => {
                debug!("Failed to read request body: {}", e);
                return (StatusCode::BAD_REQUEST, "Failed to read request body").into_response();
            }
        }
    } else {
        (body, Bytes::new())
    };

    let mut auth_request = AuthRequest::from_uri(parts.method.clone(), &parts.uri)
        .with_headers(parts.headers.clone())
        .with_body(content_type.as_deref(), &bytes);
    if let Some(pending) = parts.extensions.get::<PendingAuthorization>() {
        auth_request = auth_request.with_pending(pending.clone());
    }

    let outcome = match strategy.authenticate(&auth_request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("{} authentication error on {}: {}", strategy.name(), parts.uri.path(), e);
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    match outcome {
        AuthOutcome::Success { principal, .. } => {
            debug!("Authenticated {} via {}", principal.display(), strategy.name());
            parts.extensions.insert(principal);
            next.run(Request::from_parts(parts, body)).await
        }
        AuthOutcome::Pass => next.run(Request::from_parts(parts, body)).await,
        AuthOutcome::Fail {
            status,
            challenge,
            message,
        } => fail_response(status, challenge, message),
        AuthOutcome::Redirect { location, pending } => redirect_response(&location, pending),
    }
}

fn has_credential_body(content_type: &str) -> bool {
    content_type.starts_with("application/x-www-form-urlencoded")
        || content_type.starts_with("application/json")
}

fn fail_response(status: StatusCode, challenge: Option<String>, message: Option<String>) -> Response {
    let body = message
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_default();
    let mut response = (status, body).into_response();
    if let Some(challenge) = challenge {
        match HeaderValue::from_str(&challenge) {
            Ok(value) => {
                response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
            }
            Err(e) => warn!("Dropping invalid challenge header: {}", e),
        }
    }
    response
}

fn redirect_response(location: &str, pending: Option<PendingAuthorization>) -> Response {
    let Ok(value) = HeaderValue::from_str(location) else {
        warn!("Invalid redirect location: {}", location);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let mut response = StatusCode::FOUND.into_response();
    response.headers_mut().insert(header::LOCATION, value);
    if let Some(pending) = pending {
        response.extensions_mut().insert(pending);
    }
    response
}
