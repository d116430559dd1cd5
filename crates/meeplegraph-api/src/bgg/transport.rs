//! Cache-aware HTTP transport.
#![allow(clippy::future_not_send)]

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use meeplegraph_db::ResponseCache;
use reqwest::Client;
use url::Url;

use super::error::{BggError, BggResult};

/// Header names that never take part in the request signature.
const CREDENTIAL_HEADERS: &[&str] = &["authorization"];

/// A GET request: URL plus order-insensitive query parameters and headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    url: Url,
    params: BTreeMap<String, String>,
    headers: BTreeMap<String, String>,
}

impl ApiRequest {
    /// Creates a request for `url` with no parameters.
    #[must_use]
    pub const fn new(url: Url) -> Self {
        Self {
            url,
            params: BTreeMap::new(),
            headers: BTreeMap::new(),
        }
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Request URL without query parameters.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Query parameters, sorted by key.
    #[must_use]
    pub const fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Headers, sorted by name.
    #[must_use]
    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Canonical signature used as the cache key.
    ///
    /// Method, URL, sorted parameters and sorted headers; credential
    /// headers are left out so cached entries do not depend on the token.
    #[must_use]
    pub fn signature(&self) -> RequestSignature {
        let query = self
            .params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let headers = self
            .headers
            .iter()
            .filter(|(k, _)| !CREDENTIAL_HEADERS.contains(&k.to_ascii_lowercase().as_str()))
            .map(|(k, v)| format!("{}:{v}", k.to_ascii_lowercase()))
            .collect::<Vec<_>>()
            .join(";");

        let mut signature = format!("GET {}", self.url);
        if !query.is_empty() {
            signature.push('?');
            signature.push_str(&query);
        }
        if !headers.is_empty() {
            signature.push(' ');
            signature.push_str(&headers);
        }
        RequestSignature(signature)
    }
}

/// Canonical identity of a request, used as the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestSignature(String);

impl RequestSignature {
    /// Signature as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
    /// Whether the response was served from the cache.
    pub from_cache: bool,
}

impl RawResponse {
    /// A live (non-cached) response.
    #[must_use]
    pub fn live(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
            from_cache: false,
        }
    }
}

/// Transport abstraction for the request controller.
///
/// Uses `trait_variant::make` to generate a `Send`-bound async trait.
#[allow(clippy::module_name_repetitions)]
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    /// Performs a GET request.
    ///
    /// # Errors
    ///
    /// Returns [`BggError::Network`] if the exchange could not complete.
    async fn get(&self, request: &ApiRequest) -> BggResult<RawResponse>;

    /// Returns `true` if a response for `signature` would be served from the cache.
    fn is_cached(&self, signature: &RequestSignature) -> bool;
}

/// `reqwest`-backed transport with an optional SQLite response cache.
#[derive(Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct HttpTransport {
    /// HTTP client (reqwest, gzip enabled).
    http_client: Client,
    /// Response cache shared by whoever holds the `Arc`.
    cache: Option<Arc<ResponseCache>>,
}

impl HttpTransport {
    /// Builds a transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the `reqwest::Client` cannot be built.
    pub fn new(
        user_agent: &str,
        timeout: Duration,
        cache: Option<Arc<ResponseCache>>,
    ) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http_client, cache })
    }

    /// The response cache, if one is attached.
    #[must_use]
    pub const fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    fn cached_response(&self, signature: &RequestSignature) -> Option<RawResponse> {
        let cache = self.cache.as_ref()?;
        match cache.get(signature.as_str()) {
            Ok(hit) => hit.map(|row| RawResponse {
                status: row.status,
                body: row.body,
                from_cache: true,
            }),
            Err(e) => {
                tracing::warn!(error = %e, %signature, "response cache read failed");
                None
            }
        }
    }

    fn store_response(&self, signature: &RequestSignature, response: &RawResponse) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        // 202 means "not ready yet" and must be asked again.
        let cacheable = (200..300).contains(&response.status)
            && response.status != 202
            && !response.body.is_empty();
        if !cacheable {
            return;
        }
        if let Err(e) = cache.store(signature.as_str(), response.status, &response.body) {
            tracing::warn!(error = %e, %signature, "response cache write failed");
        }
    }
}

impl LocalTransport for HttpTransport {
    async fn get(&self, request: &ApiRequest) -> BggResult<RawResponse> {
        let signature = request.signature();
        if let Some(hit) = self.cached_response(&signature) {
            tracing::debug!(%signature, "served from response cache");
            return Ok(hit);
        }

        let mut builder = self
            .http_client
            .get(request.url().clone())
            .query(request.params());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let url = request.url().as_str();
        let response = builder
            .send()
            .await
            .map_err(|e| BggError::network(url, e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| BggError::network(url, e))?;

        tracing::debug!(%url, status, body_len = body.len(), "HTTP response received");

        let raw = RawResponse::live(status, body.to_vec());
        self.store_response(&signature, &raw);
        Ok(raw)
    }

    fn is_cached(&self, signature: &RequestSignature) -> bool {
        let Some(cache) = self.cache.as_ref() else {
            return false;
        };
        cache.contains(signature.as_str()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, %signature, "response cache lookup failed");
            false
        })
    }
}
