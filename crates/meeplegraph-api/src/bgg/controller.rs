//! Request controller: throttling, retry and adaptive backoff.
#![allow(clippy::future_not_send)]

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::instrument;
use url::Url;

use super::backoff::BackoffState;
use super::config::{ClientConfig, secs};
use super::error::{ApiError, BggError, BggResult};
use super::params::Endpoint;
use super::transport::{ApiRequest, LocalTransport};
use super::xml::{Element, parse_document};

/// Issues every API request on behalf of the client.
///
/// The backoff state sits behind an async mutex that is held for the
/// whole of [`execute`](Self::execute), so concurrent callers are
/// serialized and observe a consistent backoff.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct RequestController<T> {
    /// Underlying transport.
    transport: T,
    /// API base URL, always ending in `/`.
    base_url: Url,
    /// Bearer token sent as `Authorization`.
    api_token: Option<String>,
    /// Attempts per logical request.
    max_retries: u32,
    /// Wait after HTTP 202.
    queued_retry_delay: Duration,
    /// Shared backoff and throttling state.
    state: Mutex<BackoffState>,
}

impl<T> RequestController<T> {
    /// Creates a controller; `config` must already be validated.
    pub(crate) fn new(
        transport: T,
        base_url: Url,
        api_token: Option<String>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            transport,
            base_url,
            api_token,
            max_retries: config.max_retries,
            queued_retry_delay: secs(config.queued_retry_delay),
            state: Mutex::new(BackoffState::new(config)),
        }
    }

    /// Underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// API base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Current backoff value.
    pub async fn current_backoff(&self) -> Duration {
        self.state.lock().await.current()
    }

    /// Instant of the last live request.
    pub async fn last_request(&self) -> Option<Instant> {
        self.state.lock().await.last_request()
    }

    /// Builds the request for `endpoint` with `query`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidData`] if the endpoint URL cannot be formed.
    pub fn build_request(
        &self,
        endpoint: Endpoint,
        query: &[(&str, String)],
    ) -> BggResult<ApiRequest> {
        let url = self
            .base_url
            .join(endpoint.path())
            .map_err(|e| ApiError::InvalidData {
                endpoint: endpoint.to_string(),
                message: format!("cannot build endpoint URL: {e}"),
            })?;
        let mut request = ApiRequest::new(url);
        for (key, value) in query {
            request = request.param(*key, value.clone());
        }
        if let Some(ref token) = self.api_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        Ok(request)
    }
}

impl<T: LocalTransport> RequestController<T> {
    /// Executes one logical request and returns the parsed XML root.
    ///
    /// The throttle runs once per call, before the first attempt, and
    /// cached responses skip it. HTTP 429 sleeps for the current
    /// backoff and grows it; HTTP 202 either fails with
    /// [`BggError::Queued`] or waits a fixed delay, depending on
    /// `accept_queued`. Both retry up to `max_retries` attempts.
    ///
    /// # Errors
    ///
    /// - [`BggError::Network`] from the transport.
    /// - [`BggError::Http`] for any other non-2xx status.
    /// - [`BggError::Queued`] on 202 when `accept_queued` is `false`.
    /// - [`ApiError::EmptyResponse`], [`ApiError::InvalidXml`] or
    ///   [`ApiError::RetriesExhausted`].
    #[instrument(skip_all, fields(endpoint = %endpoint, accept_queued = accept_queued))]
    pub async fn execute(
        &self,
        endpoint: Endpoint,
        query: &[(&str, String)],
        accept_queued: bool,
    ) -> BggResult<Element> {
        let request = self.build_request(endpoint, query)?;
        let signature = request.signature();
        let mut state = self.state.lock().await;

        if self.transport.is_cached(&signature) {
            tracing::debug!(%signature, "Cache hit, skipping throttle");
        } else {
            state.throttle().await;
        }

        for attempt in 1..=self.max_retries {
            let response = self.transport.get(&request).await?;

            match response.status {
                202 => {
                    if !accept_queued {
                        return Err(BggError::Queued {
                            endpoint: endpoint.to_string(),
                        });
                    }
                    tracing::warn!(
                        attempt,
                        max_retries = self.max_retries,
                        delay_secs = self.queued_retry_delay.as_secs_f64(),
                        "Request queued (202), retrying"
                    );
                    tokio::time::sleep(self.queued_retry_delay).await;
                    continue;
                }
                429 => {
                    let wait = state.on_rate_limited();
                    tracing::warn!(
                        attempt,
                        max_retries = self.max_retries,
                        wait_secs = wait.as_secs_f64(),
                        "Rate limited (429), backing off"
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }
                status if !(200..300).contains(&status) => {
                    return Err(BggError::Http {
                        status,
                        url: request.url().to_string(),
                    });
                }
                _ => {}
            }

            if response.body.is_empty() {
                return Err(ApiError::EmptyResponse {
                    endpoint: endpoint.to_string(),
                }
                .into());
            }

            let root = parse_document(&response.body).map_err(|source| ApiError::InvalidXml {
                endpoint: endpoint.to_string(),
                source,
            })?;

            let (before, after) = state.on_success();
            tracing::debug!(
                from_cache = response.from_cache,
                "Request successful, backoff {before:.2}s -> {after:.2}s"
            );
            return Ok(root);
        }

        Err(ApiError::RetriesExhausted {
            endpoint: endpoint.to_string(),
            attempts: self.max_retries,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::super::testing::ScriptedTransport;
    use super::*;

    fn controller(transport: ScriptedTransport) -> RequestController<ScriptedTransport> {
        controller_with(transport, &ClientConfig::default())
    }

    fn controller_with(
        transport: ScriptedTransport,
        config: &ClientConfig,
    ) -> RequestController<ScriptedTransport> {
        RequestController::new(
            transport,
            Url::parse("https://boardgamegeek.com/xmlapi2/").unwrap(),
            None,
            config,
        )
    }

    fn thing(id: u32) -> Vec<(&'static str, String)> {
        vec![("id", id.to_string())]
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_returns_parsed_root() {
        // Arrange
        let ctl = controller(ScriptedTransport::new().ok(r#"<items><item id="1"/></items>"#));

        // Act
        let root = ctl.execute(Endpoint::Thing, &thing(1), true).await.unwrap();

        // Assert
        assert_eq!(root.name(), "items");
        assert_eq!(root.children().count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_three_times_then_success() {
        // Arrange
        let transport = ScriptedTransport::new()
            .respond(429, "")
            .respond(429, "")
            .respond(429, "")
            .ok("<items/>");
        let ctl = controller(transport);
        let start = Instant::now();

        // Act
        let result = ctl.execute(Endpoint::Thing, &thing(1), true).await;

        // Assert: sleeps 2 + 4 + 8, then decays 16 * 0.95
        assert!(result.is_ok());
        assert_eq!(start.elapsed(), Duration::from_secs(14));
        let backoff = ctl.current_backoff().await.as_secs_f64();
        assert!((backoff - 15.2).abs() < 1e-6);
        assert_eq!(ctl.transport().request_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_rate_limit_is_not_throttled_again() {
        // Arrange: min interval becomes 4s once the backoff doubles
        let config = ClientConfig {
            rate_limit_qps: 1.0,
            ..ClientConfig::default()
        };
        let ctl = controller_with(ScriptedTransport::new().respond(429, "").ok("<items/>"), &config);
        let start = Instant::now();

        // Act
        ctl.execute(Endpoint::Thing, &thing(1), true).await.unwrap();

        // Assert: only the 2s backoff sleep; last live request stamped at the start
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert_eq!(ctl.last_request().await, Some(start));
        assert_eq!(ctl.transport().request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_decays_but_respects_floor() {
        // Arrange
        let ctl = controller(ScriptedTransport::new().ok("<items/>"));

        // Act
        ctl.execute(Endpoint::Thing, &thing(1), true).await.unwrap();

        // Assert
        assert_eq!(ctl.current_backoff().await, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_without_accept_fails_immediately() {
        // Arrange
        let ctl = controller(ScriptedTransport::new().respond(202, ""));
        let start = Instant::now();

        // Act
        let err = ctl
            .execute(Endpoint::Collection, &[("username", String::from("a"))], false)
            .await
            .unwrap_err();

        // Assert
        assert!(err.is_queued());
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(ctl.transport().request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_with_accept_waits_and_retries() {
        // Arrange
        let transport = ScriptedTransport::new()
            .respond(202, "")
            .respond(202, "")
            .ok("<items/>");
        let ctl = controller(transport);
        let start = Instant::now();

        // Act
        let result = ctl
            .execute(Endpoint::Collection, &[("username", String::from("a"))], true)
            .await;

        // Assert: two fixed 2s waits; backoff untouched by 202
        assert!(result.is_ok());
        assert_eq!(start.elapsed(), Duration::from_secs(4));
        assert_eq!(ctl.current_backoff().await, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted() {
        // Arrange
        let config = ClientConfig {
            max_retries: 3,
            ..ClientConfig::default()
        };
        let transport = ScriptedTransport::new()
            .respond(202, "")
            .respond(202, "")
            .respond(202, "");
        let ctl = controller_with(transport, &config);

        // Act
        let err = ctl
            .execute(Endpoint::Collection, &[], true)
            .await
            .unwrap_err();

        // Assert
        assert!(matches!(
            err,
            BggError::Api(ApiError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(ctl.transport().remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_is_http_error_without_retry() {
        // Arrange
        let ctl = controller(ScriptedTransport::new().respond(500, "oops").ok("<items/>"));

        // Act
        let err = ctl.execute(Endpoint::Thing, &thing(1), true).await.unwrap_err();

        // Assert
        assert!(matches!(err, BggError::Http { status: 500, .. }));
        assert_eq!(ctl.transport().request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_body_is_api_error() {
        // Arrange
        let ctl = controller(ScriptedTransport::new().ok(""));

        // Act
        let err = ctl.execute(Endpoint::Thing, &thing(1), true).await.unwrap_err();

        // Assert
        assert!(matches!(err, BggError::Api(ApiError::EmptyResponse { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_xml_is_api_error() {
        // Arrange
        let ctl = controller(ScriptedTransport::new().ok("Rate limit exceeded"));

        // Act
        let err = ctl.execute(Endpoint::Thing, &thing(1), true).await.unwrap_err();

        // Assert
        assert!(matches!(err, BggError::Api(ApiError::InvalidXml { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_error_propagates() {
        // Arrange: empty script makes the transport fail
        let ctl = controller(ScriptedTransport::new());

        // Act
        let err = ctl.execute(Endpoint::Thing, &thing(1), true).await.unwrap_err();

        // Assert
        assert!(err.is_network_error());
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_live_requests_are_spaced() {
        // Arrange
        let ctl = controller(ScriptedTransport::new().ok("<items/>").ok("<items/>"));
        let start = Instant::now();
        ctl.execute(Endpoint::Thing, &thing(1), true).await.unwrap();
        tokio::time::advance(Duration::from_millis(80)).await;

        // Act
        ctl.execute(Endpoint::Thing, &thing(2), true).await.unwrap();

        // Assert: 2.0s / 5 qps = 0.4s between requests
        assert_eq!(start.elapsed(), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_request_skips_throttle() {
        // Arrange
        let ctl = controller(ScriptedTransport::new().ok("<items/>"));
        let cached = ctl.build_request(Endpoint::Thing, &thing(2)).unwrap();
        ctl.transport().cache(cached.signature(), "<items/>");
        ctl.execute(Endpoint::Thing, &thing(1), true).await.unwrap();
        let last_live = ctl.last_request().await;
        let start = Instant::now();

        // Act
        ctl.execute(Endpoint::Thing, &thing(2), true).await.unwrap();

        // Assert
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(ctl.last_request().await, last_live);
    }

    #[test]
    fn test_build_request_adds_bearer_token() {
        // Arrange
        let ctl = RequestController::new(
            ScriptedTransport::new(),
            Url::parse("https://boardgamegeek.com/xmlapi2/").unwrap(),
            Some(String::from("tok")),
            &ClientConfig::default(),
        );

        // Act
        let request = ctl.build_request(Endpoint::User, &[("name", String::from("bob"))]).unwrap();

        // Assert
        assert_eq!(
            request.url().as_str(),
            "https://boardgamegeek.com/xmlapi2/user"
        );
        assert_eq!(
            request.headers().get("Authorization").map(String::as_str),
            Some("Bearer tok")
        );
    }
}
