//! NewType wrappers for strong typing across the resolver.
//!
//! These keep semantically different strings apart (a verifier key is not
//! a subject, a route key is not a client id).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(
    /// Identifier of a verification callback in the verifier registry.
    ///
    /// Metadata names a verifier by key (e.g. "myBearerVerifier"); the
    /// resolver looks the key up before dispatching to a factory.
    VerifierKey
);

newtype_string!(
    /// Subject of an authenticated principal.
    ///
    /// A username for local logins, the `sub`/`id` of an OAuth2 profile,
    /// or whatever the verifier chooses to return.
    Subject
);

newtype_string!(
    /// Key identifying a protected route in the route configuration.
    ///
    /// Either `"<METHOD> <path>"` (e.g. "POST /login") or a bare path that
    /// matches every method.
    RouteKey
);
