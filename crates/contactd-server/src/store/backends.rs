// SPDX-License-Identifier: Apache-2.0

use crate::{ContactStoreBackend, StoreError};
use async_trait::async_trait;
use contactd_model::{ContactDocument, ContactId};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::net::IpAddr;
use std::time::Duration;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_backoff_ms: 120,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryRow {
    id: String,
    doc: ContactDocument,
}

#[derive(Debug, Deserialize)]
struct InsertReply {
    id: String,
}

/// REST gateway to a remote document store. One bucket per service; the
/// document key is the path segment, the body is the document.
pub struct HttpStoreBackend {
    base_url: String,
    bucket: String,
    auth_bearer: Option<String>,
    retry: RetryPolicy,
    allow_private_hosts: bool,
}

impl HttpStoreBackend {
    #[must_use]
    pub fn new(
        base_url: String,
        bucket: String,
        auth_bearer: Option<String>,
        retry: RetryPolicy,
        allow_private_hosts: bool,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket,
            auth_bearer,
            retry,
            allow_private_hosts,
        }
    }

    fn document_url(&self, id: &ContactId) -> String {
        format!("{}/{}/{}", self.base_url, self.bucket, id)
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.base_url, self.bucket)
    }

    fn query_url(&self) -> String {
        format!("{}/{}/_query", self.base_url, self.bucket)
    }

    fn client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    }

    fn validate_url(&self, url: &str) -> Result<(), StoreError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| StoreError::query_failed(format!("invalid store url: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| StoreError::query_failed("store url missing host".to_string()))?
            .to_ascii_lowercase();
        if !self.allow_private_hosts && (host == "localhost" || host.ends_with(".localhost")) {
            return Err(StoreError::query_failed("blocked store host: localhost".to_string()));
        }
        if let Ok(ip) = host.parse::<IpAddr>() {
            let private = match ip {
                IpAddr::V4(v4) => {
                    v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_broadcast()
                }
                IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified() || v6.is_unique_local(),
            };
            if private && !self.allow_private_hosts {
                return Err(StoreError::query_failed("blocked private store host".to_string()));
            }
        }
        Ok(())
    }

    fn auth_headers(&self) -> Result<HeaderMap, StoreError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.auth_bearer {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| StoreError::query_failed(format!("invalid auth header: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn map_status(status: StatusCode, url: &str) -> StoreError {
        if status == StatusCode::CONFLICT {
            StoreError::conflict(format!("store reported conflict url={url}"))
        } else if status.is_server_error() {
            StoreError::unavailable(format!("store failed status={status} url={url}"))
        } else {
            StoreError::query_failed(format!("store rejected request status={status} url={url}"))
        }
    }

    /// Bounded linear-backoff retry for idempotent requests. Inserts with a
    /// store-assigned id are never retried; a duplicate write would mint a
    /// second identity.
    #[instrument(name = "store_http_send_with_retry", skip(self, build))]
    async fn send_with_retry(
        &self,
        url: &str,
        build: impl Fn(&reqwest::Client) -> reqwest::RequestBuilder + Send + Sync,
    ) -> Result<reqwest::Response, StoreError> {
        self.validate_url(url)?;
        let client = self.client();
        let headers = self.auth_headers()?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match build(&client).headers(headers.clone()).send().await {
                Ok(resp) if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND => {
                    return Ok(resp);
                }
                Ok(resp) => {
                    if attempt >= self.retry.max_attempts || !resp.status().is_server_error() {
                        return Err(Self::map_status(resp.status(), url));
                    }
                }
                Err(e) => {
                    if attempt >= self.retry.max_attempts {
                        return Err(StoreError::unavailable(format!(
                            "store request failed url={url}: {e}"
                        )));
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(
                self.retry.base_backoff_ms.saturating_mul(attempt as u64),
            ))
            .await;
        }
    }
}

#[async_trait]
impl ContactStoreBackend for HttpStoreBackend {
    fn backend_tag(&self) -> &'static str {
        "http"
    }

    async fn query_by_type(
        &self,
        doc_type: &str,
    ) -> Result<Vec<(ContactId, ContactDocument)>, StoreError> {
        let url = self.query_url();
        let selector = json!({"type": doc_type});
        let resp = self
            .send_with_retry(&url, |client| client.post(&url).json(&selector))
            .await?;
        let rows: Vec<QueryRow> = resp
            .json()
            .await
            .map_err(|e| StoreError::corrupt(format!("query reply parse failed: {e}")))?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id = ContactId::parse(&row.id)
                .map_err(|e| StoreError::corrupt(format!("store returned bad id: {e}")))?;
            out.push((id, row.doc));
        }
        Ok(out)
    }

    async fn get(&self, id: &ContactId) -> Result<Option<ContactDocument>, StoreError> {
        let url = self.document_url(id);
        let resp = self
            .send_with_retry(&url, |client| client.get(&url))
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let doc: ContactDocument = resp
            .json()
            .await
            .map_err(|e| StoreError::corrupt(format!("document parse failed: {e}")))?;
        Ok(Some(doc))
    }

    async fn upsert(
        &self,
        id: Option<&ContactId>,
        doc: &ContactDocument,
    ) -> Result<ContactId, StoreError> {
        match id {
            Some(id) => {
                let url = self.document_url(id);
                self.send_with_retry(&url, |client| client.put(&url).json(doc))
                    .await?;
                Ok(id.clone())
            }
            None => {
                // Single attempt: the store assigns the identity.
                let url = self.collection_url();
                self.validate_url(&url)?;
                let client = self.client();
                let headers = self.auth_headers()?;
                let resp = client
                    .post(&url)
                    .headers(headers)
                    .json(doc)
                    .send()
                    .await
                    .map_err(|e| {
                        StoreError::unavailable(format!("store insert failed url={url}: {e}"))
                    })?;
                if !resp.status().is_success() {
                    return Err(Self::map_status(resp.status(), &url));
                }
                let reply: InsertReply = resp
                    .json()
                    .await
                    .map_err(|e| StoreError::corrupt(format!("insert reply parse failed: {e}")))?;
                ContactId::parse(&reply.id)
                    .map_err(|e| StoreError::corrupt(format!("store assigned bad id: {e}")))
            }
        }
    }

    async fn delete(&self, id: &ContactId) -> Result<(), StoreError> {
        let url = self.document_url(id);
        // 404 is fine here; callers pre-check existence.
        self.send_with_retry(&url, |client| client.delete(&url))
            .await?;
        Ok(())
    }
}
