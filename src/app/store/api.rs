//! HTTP client for the collection store API

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, Response};
use serde_json::Value;
use url::Url;

use super::{CollectionPayload, CollectionRef, CollectionStore};
use crate::app::client::{parse_url, HttpHandler};
use crate::constants::store::{API_PREFIX, AUTH_SCHEME};
use crate::errors::{FetchError, StoreError, StoreResult};

/// Longest error body echoed back in [`StoreError::Api`]
const MAX_ERROR_MESSAGE: usize = 300;

/// Collection store reached over its HTTP API
#[derive(Debug, Clone)]
pub struct ApiCollectionStore {
    http: Arc<HttpHandler>,
    api_base: Url,
    api_key: Option<String>,
}

impl ApiCollectionStore {
    /// Creates a store client for the API hosted at `host`
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if `host` is not a valid base URL
    pub fn new(http: Arc<HttpHandler>, host: &str, api_key: Option<String>) -> StoreResult<Self> {
        let host = if host.ends_with('/') {
            host.to_string()
        } else {
            format!("{host}/")
        };
        let api_base = parse_url(&host)?
            .join(API_PREFIX)
            .map_err(|e| FetchError::InvalidUrl {
                url: host.clone(),
                error: e.to_string(),
            })?;

        tracing::debug!("Collection store API at {}", api_base);

        Ok(Self {
            http,
            api_base,
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    /// Base URL every endpoint is resolved against
    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    fn endpoint(&self, path: &str) -> StoreResult<Url> {
        self.api_base.join(path).map_err(|e| {
            StoreError::Transport(FetchError::InvalidUrl {
                url: format!("{}{}", self.api_base, path),
                error: e.to_string(),
            })
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(AUTHORIZATION, format!("{AUTH_SCHEME} {key}")),
            None => request,
        }
    }

    async fn decode(response: Response) -> StoreResult<Value> {
        let status = response.status();
        let body = response.bytes().await.map_err(FetchError::Http)?;

        if !status.is_success() {
            return Err(StoreError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        if body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Pull a readable message out of an error body
fn error_message(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        if let Some(message) = value.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    match text.char_indices().nth(MAX_ERROR_MESSAGE) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[async_trait]
impl CollectionStore for ApiCollectionStore {
    async fn get_collection_by_foreign_id(
        &self,
        foreign_id: &str,
    ) -> StoreResult<Option<CollectionRef>> {
        let mut url = self.endpoint("collections")?;
        url.query_pairs_mut()
            .append_pair("filter:foreign_id", foreign_id)
            .append_pair("limit", "1");

        let response = self
            .http
            .execute(|client| self.authorize(client.get(url.as_str())))
            .await?;
        let body = Self::decode(response).await?;

        body.get("results")
            .and_then(Value::as_array)
            .and_then(|results| results.first())
            .map(CollectionRef::from_json)
            .transpose()
    }

    async fn create_collection(&self, payload: &CollectionPayload) -> StoreResult<CollectionRef> {
        let url = self.endpoint("collections")?;
        let response = self
            .http
            .execute(|client| self.authorize(client.post(url.as_str()).json(payload)))
            .await?;
        CollectionRef::from_json(&Self::decode(response).await?)
    }

    async fn update_collection(
        &self,
        collection_id: &str,
        payload: &CollectionPayload,
    ) -> StoreResult<CollectionRef> {
        let url = self.endpoint(&format!("collections/{collection_id}"))?;
        let response = self
            .http
            .execute(|client| self.authorize(client.put(url.as_str()).json(payload)))
            .await?;
        CollectionRef::from_json(&Self::decode(response).await?)
    }

    async fn write_entities(&self, collection_id: &str, entities: &[Value]) -> StoreResult<usize> {
        if entities.is_empty() {
            return Ok(0);
        }
        let url = self.endpoint(&format!("collections/{collection_id}/_bulk"))?;
        let response = self
            .http
            .execute(|client| self.authorize(client.post(url.as_str()).json(entities)))
            .await?;
        Self::decode(response).await?;
        Ok(entities.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::client::ClientConfig;

    fn handler() -> Arc<HttpHandler> {
        Arc::new(HttpHandler::from_config(&ClientConfig::default()).unwrap())
    }

    #[test]
    fn test_api_base_normalization() {
        let with_slash = ApiCollectionStore::new(handler(), "https://store.example/", None).unwrap();
        let without = ApiCollectionStore::new(handler(), "https://store.example", None).unwrap();
        assert_eq!(with_slash.api_base().as_str(), "https://store.example/api/2/");
        assert_eq!(with_slash.api_base(), without.api_base());
    }

    #[test]
    fn test_invalid_host() {
        let err = ApiCollectionStore::new(handler(), "not a host", None).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Transport(FetchError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_empty_api_key_is_dropped() {
        let store =
            ApiCollectionStore::new(handler(), "https://store.example", Some(String::new()))
                .unwrap();
        assert!(store.api_key.is_none());
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(br#"{"message": "Denied"}"#), "Denied");
        assert_eq!(error_message(b"  plain failure "), "plain failure");
        let long = "x".repeat(MAX_ERROR_MESSAGE + 10);
        assert!(error_message(long.as_bytes()).ends_with("..."));
    }
}
