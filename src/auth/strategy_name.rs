//! Closed enumeration of supported authentication mechanisms.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Name of an authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StrategyName {
    Local,
    Bearer,
    Oauth2ResourceOwnerGrant,
    GoogleOauth2,
    AzureAd,
    Keycloak,
    InstagramOauth2,
}

impl StrategyName {
    /// Every supported mechanism, in dispatch order.
    pub const ALL: [StrategyName; 7] = [
        StrategyName::Local,
        StrategyName::Bearer,
        StrategyName::Oauth2ResourceOwnerGrant,
        StrategyName::GoogleOauth2,
        StrategyName::AzureAd,
        StrategyName::Keycloak,
        StrategyName::InstagramOauth2,
    ];

    /// Canonical name used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Bearer => "bearer",
            Self::Oauth2ResourceOwnerGrant => "oauth2-resource-owner-password-grant",
            Self::GoogleOauth2 => "google-oauth2",
            Self::AzureAd => "azure-ad",
            Self::Keycloak => "keycloak",
            Self::InstagramOauth2 => "instagram-oauth2",
        }
    }

    /// Display name used by older route configurations.
    fn legacy_name(&self) -> &'static str {
        match self {
            Self::Local => "Local",
            Self::Bearer => "Bearer",
            Self::Oauth2ResourceOwnerGrant => "OAuth2 resource owner grant",
            Self::GoogleOauth2 => "Google Oauth 2",
            Self::AzureAd => "Azure AD",
            Self::Keycloak => "keycloak",
            Self::InstagramOauth2 => "Instagram Oauth 2",
        }
    }
}

impl fmt::Display for StrategyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a name matches no supported mechanism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStrategy(pub String);

impl fmt::Display for UnknownStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown strategy: {}", self.0)
    }
}

impl std::error::Error for UnknownStrategy {}

impl FromStr for StrategyName {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s || name.legacy_name() == s)
            .ok_or_else(|| UnknownStrategy(s.to_string()))
    }
}

impl Serialize for StrategyName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StrategyName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_names_roundtrip() {
        for name in StrategyName::ALL {
            assert_eq!(name.as_str().parse::<StrategyName>(), Ok(name));
            assert_eq!(name.to_string(), name.as_str());
        }
    }

    #[test]
    fn test_legacy_names_parse() {
        assert_eq!("Local".parse(), Ok(StrategyName::Local));
        assert_eq!(
            "OAuth2 resource owner grant".parse(),
            Ok(StrategyName::Oauth2ResourceOwnerGrant)
        );
        assert_eq!("Google Oauth 2".parse(), Ok(StrategyName::GoogleOauth2));
        assert_eq!("Azure AD".parse(), Ok(StrategyName::AzureAd));
        assert_eq!("Instagram Oauth 2".parse(), Ok(StrategyName::InstagramOauth2));
    }

    #[test]
    fn test_unknown_name() {
        let err = "unknown-mechanism".parse::<StrategyName>().unwrap_err();
        assert_eq!(err, UnknownStrategy("unknown-mechanism".to_string()));
        assert_eq!(err.to_string(), "Unknown strategy: unknown-mechanism");
    }

    #[test]
    fn test_serde_uses_canonical_name() {
        let json = serde_json::to_string(&StrategyName::AzureAd).unwrap();
        assert_eq!(json, "\"azure-ad\"");
        let parsed: StrategyName = serde_json::from_str("\"Azure AD\"").unwrap();
        assert_eq!(parsed, StrategyName::AzureAd);
    }
}
