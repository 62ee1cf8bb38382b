//! HTTP-backed remote store client.
//!
//! Talks to the cloud document API: one collection per record type under
//! the account's namespace, JSON documents keyed by record id.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::models::SyncRecord;
use crate::util::{compact_text, is_http_url, normalize_text_option};

use super::remote::{RemoteError, RemoteResult, RemoteStore};
use super::REMOTE_BATCH_LIMIT;

/// Remote store backed by the cloud document API
#[derive(Clone)]
pub struct HttpRemoteStore {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemoteStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemoteStore")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl HttpRemoteStore {
    /// Build a client for the given API endpoint and bearer token
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> crate::error::Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;

        let token = normalize_text_option(Some(token.into())).ok_or_else(|| {
            crate::error::Error::InvalidInput("API token must not be empty".to_string())
        })?;

        Ok(Self {
            base_url,
            token,
            client: reqwest::Client::builder().build().map_err(|e| {
                crate::error::Error::InvalidInput(format!("HTTP client setup failed: {e}"))
            })?,
        })
    }

    fn collection_url(&self, account_id: &str, collection: &str) -> String {
        format!("{}/v1/accounts/{account_id}/{collection}", self.base_url)
    }

    async fn fetch<T: SyncRecord>(
        &self,
        account_id: &str,
        since: Option<i64>,
    ) -> RemoteResult<Vec<T>> {
        let mut request = self
            .client
            .get(self.collection_url(account_id, T::COLLECTION))
            .bearer_auth(&self.token)
            .header("Accept", "application/json");
        if let Some(since) = since {
            request = request.query(&[("updatedAfter", since)]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }

        let payload = response.json::<ListResponse<T>>().await?;
        Ok(payload.documents)
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    documents: Vec<T>,
}

impl RemoteStore for HttpRemoteStore {
    async fn list_all<T: SyncRecord>(&self, account_id: &str) -> RemoteResult<Vec<T>> {
        self.fetch(account_id, None).await
    }

    async fn list_updated_after<T: SyncRecord>(
        &self,
        account_id: &str,
        since: i64,
    ) -> RemoteResult<Vec<T>> {
        if since <= 0 {
            return self.list_all(account_id).await;
        }
        self.fetch(account_id, Some(since)).await
    }

    async fn upsert_many<T: SyncRecord>(
        &self,
        account_id: &str,
        items: &[T],
    ) -> RemoteResult<()> {
        let url = format!(
            "{}:batchUpsert",
            self.collection_url(account_id, T::COLLECTION)
        );

        for chunk in items.chunks(REMOTE_BATCH_LIMIT) {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.token)
                .json(&json!({ "documents": chunk, "merge": true }))
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(RemoteError::Api(parse_api_error(status, &body)));
            }
        }

        Ok(())
    }

    async fn delete_by_ids<T: SyncRecord>(
        &self,
        account_id: &str,
        ids: &[String],
    ) -> RemoteResult<()> {
        for id in ids {
            let response = self
                .client
                .delete(format!(
                    "{}/{id}",
                    self.collection_url(account_id, T::COLLECTION)
                ))
                .bearer_auth(&self.token)
                .send()
                .await?;

            // Already-gone documents count as deleted
            if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(RemoteError::Api(parse_api_error(status, &body)));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> crate::error::Result<String> {
    let base_url = normalize_text_option(Some(raw)).ok_or_else(|| {
        crate::error::Error::InvalidInput("API base URL must not be empty".to_string())
    })?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(crate::error::Error::InvalidInput(
            "API base URL must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Member;

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url(String::new()).is_err());
        assert!(normalize_base_url("api.example.com".to_string()).is_err());
        assert_eq!(
            normalize_base_url("https://api.example.com/".to_string()).unwrap(),
            "https://api.example.com"
        );
    }

    #[test]
    fn collection_urls_are_account_scoped() {
        let store = HttpRemoteStore::new("https://api.example.com", "token").unwrap();
        assert_eq!(
            store.collection_url("acct-1", Member::COLLECTION),
            "https://api.example.com/v1/accounts/acct-1/members"
        );
    }

    #[test]
    fn new_rejects_blank_token() {
        assert!(HttpRemoteStore::new("https://api.example.com", "  ").is_err());
    }

    #[test]
    fn debug_redacts_token() {
        let store = HttpRemoteStore::new("https://api.example.com", "secret").unwrap();
        let debug = format!("{store:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn parse_api_error_prefers_structured_message() {
        assert_eq!(
            parse_api_error(
                StatusCode::FORBIDDEN,
                r#"{"message": "account suspended"}"#
            ),
            "account suspended (403)"
        );
        assert_eq!(
            parse_api_error(StatusCode::INTERNAL_SERVER_ERROR, ""),
            "HTTP 500"
        );
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, "upstream timeout"),
            "upstream timeout (502)"
        );
    }

    #[test]
    fn list_response_defaults_to_empty_documents() {
        let payload: ListResponse<Member> = serde_json::from_str("{}").unwrap();
        assert!(payload.documents.is_empty());
    }
}
