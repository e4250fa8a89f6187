//! HTTP client for the automation backend REST API.
//!
//! [`ApiClient::fetch`] classifies every failure into the fetch taxonomy of
//! [`MonitorError`]; [`ApiClient::fetch_safe`] sits on top of it and turns any
//! failure into `None` so callers can keep their previous data. Fetch-category
//! failures are logged at `warn`, anything else (a request that could not
//! even be built) at `error`.
//! Mutating calls go through [`ApiClient::post_action`], which reports failure
//! to the caller instead of swallowing it.

use std::time::Duration;

use monitor_core::models::ActionAck;
use monitor_core::{MonitorError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};
use url::Url;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Thin wrapper around [`reqwest::Client`] bound to one backend base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for `base_url` (e.g. `http://localhost:8000`).
    ///
    /// Fails with [`MonitorError::Config`] when the URL does not parse or the
    /// HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim_end_matches('/');
        Url::parse(trimmed)
            .map_err(|e| MonitorError::Config(format!("invalid api url {base_url:?}: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MonitorError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: trimmed.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the absolute URL for `path` with `query` appended in order.
    ///
    /// No `?` is emitted when `query` is empty.
    pub fn endpoint_url(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| MonitorError::Config(format!("invalid endpoint {path:?}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    /// URL of one resource under `collection`, with `id` percent-encoded as a
    /// single path segment.
    pub fn resource_url(&self, collection: &str, id: &str) -> Result<Url> {
        let mut url = self.endpoint_url(collection, &[])?;
        url.path_segments_mut()
            .map_err(|_| MonitorError::Config(format!("{collection:?} cannot take a path segment")))?
            .push(id);
        Ok(url)
    }

    /// GET `path` and decode the JSON body as `T`.
    pub async fn fetch<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.endpoint_url(path, query)?;
        self.get_json(url).await
    }

    /// Like [`fetch`](Self::fetch) but never fails: any error is logged and
    /// `None` is returned.
    pub async fn fetch_safe<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Option<T> {
        absorb(self.fetch(path, query).await, path)
    }

    /// Never-failing GET against a prebuilt URL.
    pub async fn fetch_safe_url<T: DeserializeOwned>(&self, url: Url) -> Option<T> {
        let path = url.path().to_string();
        absorb(self.get_json(url).await, &path)
    }

    /// POST `body` as JSON to `path`.
    ///
    /// Any failure (transport or non-2xx) comes back as
    /// [`MonitorError::Action`] and is also logged. An empty success body is
    /// acknowledged as `null`; a non-JSON success body as a JSON string.
    pub async fn post_action<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ActionAck> {
        let result = self.post_json(path, body).await;
        if let Err(e) = &result {
            warn!(error = %e, path, "action failed");
        }
        result
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ActionAck> {
        let url = self.endpoint_url(path, &[])?;
        let action_err = |message: String| MonitorError::Action {
            path: path.to_string(),
            message,
        };

        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| action_err(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| action_err(e.to_string()))?;
        if !status.is_success() {
            return Err(action_err(format!("HTTP {}: {}", status.as_u16(), text.trim())));
        }

        debug!(path, status = status.as_u16(), "action acknowledged");
        if text.trim().is_empty() {
            return Ok(ActionAck::default());
        }
        Ok(ActionAck(
            serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)),
        ))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let url_str = url.to_string();
        let network = |e: reqwest::Error| MonitorError::Network {
            url: url_str.clone(),
            message: e.to_string(),
        };

        let response = self.http.get(url.clone()).send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::Http {
                url: url_str.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(network)?;
        serde_json::from_slice(&body).map_err(|e| MonitorError::Parse {
            url: url_str.clone(),
            message: e.to_string(),
        })
    }
}

/// Collapse a fetch result to `Option`, logging the failure by category.
fn absorb<T>(result: Result<T>, path: &str) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) if e.is_fetch_failure() => {
            warn!(error = %e, path, "fetch failed; keeping previous data");
            None
        }
        Err(e) => {
            error!(error = %e, path, "request could not be issued");
            None
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
