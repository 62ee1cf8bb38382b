//! Runtime configuration for sync-capable hosts.
//!
//! A `SyncProfile` carries the cloud endpoint, API token, and account id
//! a host needs to construct the remote store and run sync passes. Values
//! come from the environment (or a `.env` file loaded by the host) and
//! are validated once, up front.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

/// Environment variable holding the cloud API base URL
pub const ENV_API_URL: &str = "GYMBOOK_API_URL";
/// Environment variable holding the API bearer token
pub const ENV_API_TOKEN: &str = "GYMBOOK_API_TOKEN";
/// Environment variable holding the account id that namespaces cloud data
pub const ENV_ACCOUNT_ID: &str = "GYMBOOK_ACCOUNT_ID";

/// Raw, possibly incomplete sync configuration
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SyncProfile {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
}

impl std::fmt::Debug for SyncProfile {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncProfile")
            .field("api_url", &self.api_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("account_id", &self.account_id)
            .finish()
    }
}

impl SyncProfile {
    /// Read the profile from the process environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var(ENV_API_URL).ok(),
            api_token: std::env::var(ENV_API_TOKEN).ok(),
            account_id: std::env::var(ENV_ACCOUNT_ID).ok(),
        }
    }

    /// Normalized account id, if one is configured
    #[must_use]
    pub fn account_id(&self) -> Option<String> {
        normalize_text_option(self.account_id.clone())
    }

    /// Validate and normalize every field, failing on the first missing
    /// or malformed value
    pub fn resolve(&self) -> Result<ResolvedProfile> {
        let api_url = normalize_text_option(self.api_url.clone())
            .ok_or_else(|| Error::InvalidInput(format!("{ENV_API_URL} is not set")))?;
        if !is_http_url(&api_url) {
            return Err(Error::InvalidInput(format!(
                "{ENV_API_URL} must include http:// or https://"
            )));
        }

        let api_token = normalize_text_option(self.api_token.clone())
            .ok_or_else(|| Error::InvalidInput(format!("{ENV_API_TOKEN} is not set")))?;
        let account_id = self
            .account_id()
            .ok_or_else(|| Error::InvalidInput(format!("{ENV_ACCOUNT_ID} is not set")))?;

        Ok(ResolvedProfile {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_token,
            account_id,
        })
    }
}

/// Fully validated sync configuration
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedProfile {
    pub api_url: String,
    pub api_token: String,
    pub account_id: String,
}

impl std::fmt::Debug for ResolvedProfile {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ResolvedProfile")
            .field("api_url", &self.api_url)
            .field("api_token", &"[REDACTED]")
            .field("account_id", &self.account_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_profile() -> SyncProfile {
        SyncProfile {
            api_url: Some("https://api.example.com/".to_string()),
            api_token: Some("hunter2".to_string()),
            account_id: Some("acct-1".to_string()),
        }
    }

    #[test]
    fn resolve_normalizes_a_complete_profile() {
        let resolved = complete_profile().resolve().unwrap();
        assert_eq!(resolved.api_url, "https://api.example.com");
        assert_eq!(resolved.account_id, "acct-1");
    }

    #[test]
    fn resolve_rejects_missing_or_malformed_fields() {
        let mut missing_url = complete_profile();
        missing_url.api_url = None;
        assert!(missing_url.resolve().is_err());

        let mut bad_url = complete_profile();
        bad_url.api_url = Some("api.example.com".to_string());
        assert!(bad_url.resolve().is_err());

        let mut blank_account = complete_profile();
        blank_account.account_id = Some("   ".to_string());
        assert!(blank_account.resolve().is_err());
    }

    #[test]
    fn debug_redacts_the_token() {
        let debug = format!("{:?}", complete_profile());
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }
}
