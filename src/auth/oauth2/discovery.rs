//! OpenID Connect discovery document fetching and caching.
//!
//! Providers such as Azure AD publish their endpoints at a
//! `.well-known/openid-configuration` URL. Documents are cached per URL and
//! refreshed after a TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Default cache TTL in seconds (1 hour).
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;

/// Maximum stale cache age in seconds (24 hours).
pub const MAX_STALE_CACHE_SECONDS: u64 = 86400;

/// The subset of an OpenID provider metadata document the strategies use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    #[serde(default)]
    pub issuer: Option<String>,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub jwks_uri: Option<String>,
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
}

#[derive(Clone)]
struct CachedDocument {
    metadata: ProviderMetadata,
    fetched_at: Instant,
}

/// Thread-safe discovery cache shared by every strategy built from one factory set.
pub struct DiscoveryCache {
    cache_ttl: Duration,
    /// Whether to serve a stale document when a refresh fails
    allow_stale: bool,
    documents: Arc<RwLock<HashMap<String, CachedDocument>>>,
    client: reqwest::Client,
}

impl DiscoveryCache {
    pub fn new(cache_ttl_seconds: u64, allow_stale: bool) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self {
            cache_ttl: Duration::from_secs(cache_ttl_seconds),
            allow_stale,
            documents: Arc::new(RwLock::new(HashMap::new())),
            client,
        }
    }

    /// Get the provider metadata published at `url`.
    ///
    /// Fetches when nothing is cached or the cached copy is older than the TTL.
    pub async fn get(&self, url: &str) -> Result<ProviderMetadata, DiscoveryError> {
        let cached = self.documents.read().await.get(url).cloned();

        if let Some(doc) = &cached
            && doc.fetched_at.elapsed() <= self.cache_ttl
        {
            return Ok(doc.metadata.clone());
        }

        match self.fetch(url).await {
            Ok(metadata) => {
                self.insert(url, metadata.clone()).await;
                Ok(metadata)
            }
            Err(e) => {
                if self.allow_stale
                    && let Some(doc) = cached
                    && doc.fetched_at.elapsed() < Duration::from_secs(MAX_STALE_CACHE_SECONDS)
                {
                    warn!("Discovery fetch failed, using stale document: {}", e);
                    return Ok(doc.metadata);
                }
                Err(e)
            }
        }
    }

    /// Store a document for `url` as if it had just been fetched.
    pub async fn insert(&self, url: &str, metadata: ProviderMetadata) {
        let mut documents = self.documents.write().await;
        documents.insert(
            url.to_string(),
            CachedDocument {
                metadata,
                fetched_at: Instant::now(),
            },
        );
    }

    async fn fetch(&self, url: &str) -> Result<ProviderMetadata, DiscoveryError> {
        debug!("Fetching OpenID configuration from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DiscoveryError::FetchError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DiscoveryError::FetchError(format!(
                "HTTP {} from discovery endpoint",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| DiscoveryError::ParseError(e.to_string()))
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Clear the cache (useful for testing).
    pub async fn clear(&self) {
        self.documents.write().await.clear();
    }
}

impl Default for DiscoveryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL_SECONDS, true)
    }
}

/// Errors that can occur when working with the discovery cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// Failed to fetch the document.
    FetchError(String),
    /// Failed to parse the document.
    ParseError(String),
}

impl std::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FetchError(msg) => write!(f, "Failed to fetch OpenID configuration: {}", msg),
            Self::ParseError(msg) => write!(f, "Failed to parse OpenID configuration: {}", msg),
        }
    }
}

impl std::error::Error for DiscoveryError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> ProviderMetadata {
        ProviderMetadata {
            issuer: Some("https://login.example.com/tenant/v2.0".to_string()),
            authorization_endpoint: "https://login.example.com/authorize".to_string(),
            token_endpoint: "https://login.example.com/token".to_string(),
            userinfo_endpoint: None,
            jwks_uri: None,
            end_session_endpoint: None,
        }
    }

    #[test]
    fn test_discovery_error_display() {
        let err = DiscoveryError::FetchError("timeout".to_string());
        assert_eq!(err.to_string(), "Failed to fetch OpenID configuration: timeout");

        let err = DiscoveryError::ParseError("bad json".to_string());
        assert_eq!(err.to_string(), "Failed to parse OpenID configuration: bad json");
    }

    #[test]
    fn test_metadata_deserialization() {
        let json = r#"{
            "issuer": "https://login.example.com/tenant/v2.0",
            "authorization_endpoint": "https://login.example.com/authorize",
            "token_endpoint": "https://login.example.com/token",
            "userinfo_endpoint": "https://graph.example.com/oidc/userinfo",
            "response_types_supported": ["code", "id_token"]
        }"#;

        let parsed: ProviderMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.token_endpoint, "https://login.example.com/token");
        assert_eq!(
            parsed.userinfo_endpoint.as_deref(),
            Some("https://graph.example.com/oidc/userinfo")
        );
        assert!(parsed.jwks_uri.is_none());
    }

    #[tokio::test]
    async fn test_inserted_document_served_from_cache() {
        let cache = DiscoveryCache::default();
        let url = "https://login.example.com/.well-known/openid-configuration";
        assert!(cache.is_empty().await);

        cache.insert(url, metadata()).await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get(url).await.unwrap(), metadata());

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    /// Nothing listens on port 1, so fetches fail fast.
    const UNREACHABLE: &str = "http://127.0.0.1:1/.well-known/openid-configuration";

    #[tokio::test]
    async fn test_expired_document_served_stale_when_refresh_fails() {
        let cache = DiscoveryCache::new(0, true);
        cache.insert(UNREACHABLE, metadata()).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(cache.get(UNREACHABLE).await.unwrap(), metadata());
    }

    #[tokio::test]
    async fn test_expired_document_not_served_without_stale() {
        let cache = DiscoveryCache::new(0, false);
        cache.insert(UNREACHABLE, metadata()).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        let err = cache.get(UNREACHABLE).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::FetchError(_)));
        // a failed refresh leaves the old entry in place
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_uncached_fetch_failure_is_error() {
        let cache = DiscoveryCache::default();
        let err = cache.get(UNREACHABLE).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::FetchError(_)));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_expired_document_refreshed() {
        let mut served = metadata();
        served.token_endpoint = "https://login.example.com/token/v2".to_string();
        let body = serde_json::to_value(&served).unwrap();

        let app = axum::Router::new().route(
            "/.well-known/openid-configuration",
            axum::routing::get(move || {
                let body = body.clone();
                async move { axum::Json(body) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let url = format!("http://{}/.well-known/openid-configuration", addr);

        // fresh copy is served without a fetch
        let cache = DiscoveryCache::new(3600, false);
        cache.insert(&url, metadata()).await;
        assert_eq!(cache.get(&url).await.unwrap(), metadata());

        // expired copy is replaced by the fetched one
        let cache = DiscoveryCache::new(0, false);
        cache.insert(&url, metadata()).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.get(&url).await.unwrap(), served);
    }
}
