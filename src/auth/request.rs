//! Transport-neutral view of an inbound request.
//!
//! Strategies read credentials from this instead of a framework request so
//! they can be exercised without a running server.

use std::collections::HashMap;

use http::{HeaderMap, Method, header};
use serde_json::Value;

use crate::auth::oauth2::PendingAuthorization;

/// Request data available to a strategy.
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    query: HashMap<String, String>,
    body: HashMap<String, String>,
    pending: Option<PendingAuthorization>,
}

impl AuthRequest {
    /// Create a request for the given method and path with no credentials.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Default::default()
        }
    }

    /// Parse `uri` into path and query parameters.
    pub fn from_uri(method: Method, uri: &http::Uri) -> Self {
        let mut req = Self::new(method, uri.path());
        if let Some(q) = uri.query() {
            req.query = url::form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect();
        }
        req
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_header(mut self, name: header::HeaderName, value: &str) -> Self {
        if let Ok(v) = header::HeaderValue::from_str(value) {
            self.headers.insert(name, v);
        }
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_body_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.body.insert(name.into(), value.into());
        self
    }

    /// Attach the authorization state persisted when the redirect was issued.
    pub fn with_pending(mut self, pending: PendingAuthorization) -> Self {
        self.pending = Some(pending);
        self
    }

    /// Decode a form-urlencoded or JSON body into flat fields.
    ///
    /// Non-string JSON scalars are stringified; nested values are ignored.
    pub fn with_body(mut self, content_type: Option<&str>, bytes: &[u8]) -> Self {
        let content_type = content_type.unwrap_or_default();
        if content_type.starts_with("application/x-www-form-urlencoded") {
            self.body
                .extend(url::form_urlencoded::parse(bytes).into_owned());
        } else if content_type.starts_with("application/json") {
            if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(bytes) {
                for (k, v) in map {
                    let v = match v {
                        Value::String(s) => s,
                        Value::Number(n) => n.to_string(),
                        Value::Bool(b) => b.to_string(),
                        _ => continue,
                    };
                    self.body.insert(k, v);
                }
            }
        }
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn body_field(&self, name: &str) -> Option<&str> {
        self.body.get(name).map(String::as_str)
    }

    /// Look a field up in the body, then the query string.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.body_field(name).or_else(|| self.query(name))
    }

    pub fn pending(&self) -> Option<&PendingAuthorization> {
        self.pending.as_ref()
    }
}
