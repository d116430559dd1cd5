//! `BggClient` - BoardGameGeek XML API2 client.
#![allow(clippy::future_not_send)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use meeplegraph_db::ResponseCache;
use tracing::instrument;
use url::Url;

use super::config::ClientConfig;
use super::controller::RequestController;
use super::error::{BggError, BggResult};
use super::game::Game;
use super::params::{Endpoint, PlaysQuery, search_query, thing_query, things_query};
use super::plays::Plays;
use super::transport::{ApiRequest, HttpTransport, LocalTransport};
use super::user::User;
use super::xml::Element;
use crate::snapshot::RankSnapshot;

/// Default XML API2 base URL.
const DEFAULT_BASE_URL: &str = "https://boardgamegeek.com/xmlapi2/";

/// Default location of the daily rank CSV files.
const DEFAULT_SNAPSHOT_URL: &str =
    "https://raw.githubusercontent.com/beefsack/bgg-ranking-historicals/master/";

/// Default User-Agent.
const DEFAULT_USER_AGENT: &str = concat!("meeplegraph/", env!("CARGO_PKG_VERSION"));

/// BoardGameGeek API client.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct BggClient<T = HttpTransport> {
    /// Request controller wrapping the transport.
    controller: RequestController<T>,
    /// Base URL of the rank snapshot CSV files.
    snapshot_url: Url,
}

/// Builder for `BggClient`.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct BggClientBuilder {
    base_url: Option<Url>,
    snapshot_url: Option<Url>,
    user_agent: Option<String>,
    config: ClientConfig,
    cache: Option<Arc<ResponseCache>>,
}

impl BggClientBuilder {
    /// Creates a new builder.
    fn new() -> Self {
        Self {
            base_url: None,
            snapshot_url: None,
            user_agent: None,
            config: ClientConfig::default(),
            cache: None,
        }
    }

    /// Overrides the API base URL (for wiremock in tests).
    #[must_use]
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Overrides the rank snapshot base URL.
    #[must_use]
    pub fn snapshot_url(mut self, url: Url) -> Self {
        self.snapshot_url = Some(url);
        self
    }

    /// Sets the User-Agent (default: `meeplegraph/<version>`).
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets the bearer token sent with every API request.
    #[must_use]
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.config.api_token = Some(token.into());
        self
    }

    /// Replaces all retry and backoff settings.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the attempt limit per request (default: 10).
    #[must_use]
    pub const fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Sets the backoff floor (default: 2s).
    #[must_use]
    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.config.initial_backoff = backoff.as_secs_f64();
        self
    }

    /// Sets the growth factor applied on HTTP 429 (default: 2.0).
    #[must_use]
    pub const fn backoff_factor(mut self, factor: f64) -> Self {
        self.config.backoff_factor = factor;
        self
    }

    /// Sets the decay applied on success (default: 0.95).
    #[must_use]
    pub const fn backoff_decay(mut self, decay: f64) -> Self {
        self.config.backoff_decay = decay;
        self
    }

    /// Sets the live request rate per backoff period (default: 5).
    #[must_use]
    pub const fn rate_limit_qps(mut self, qps: f64) -> Self {
        self.config.rate_limit_qps = qps;
        self
    }

    /// Sets the wait after HTTP 202 (default: 2s).
    #[must_use]
    pub fn queued_retry_delay(mut self, delay: Duration) -> Self {
        self.config.queued_retry_delay = delay.as_secs_f64();
        self
    }

    /// Attaches a response cache, shared with whoever else holds the `Arc`.
    #[must_use]
    pub fn cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Builds the client with the default HTTP transport.
    ///
    /// # Errors
    ///
    /// - A configuration value is out of range.
    /// - `reqwest::Client` build fails.
    pub fn build(self) -> Result<BggClient> {
        let user_agent = self
            .user_agent
            .clone()
            .unwrap_or_else(|| String::from(DEFAULT_USER_AGENT));
        let transport =
            HttpTransport::new(&user_agent, self.config.timeout(), self.cache.clone())?;
        self.build_with_transport(transport)
    }

    /// Builds the client around a custom transport.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration value or URL is invalid.
    pub fn build_with_transport<T>(self, transport: T) -> Result<BggClient<T>> {
        self.config.validate().context("invalid client configuration")?;

        let base_url = directory_url(self.base_url, DEFAULT_BASE_URL)
            .context("invalid API base URL")?;
        let snapshot_url = directory_url(self.snapshot_url, DEFAULT_SNAPSHOT_URL)
            .context("invalid snapshot URL")?;

        tracing::debug!(
            %base_url,
            authenticated = self.config.api_token.is_some(),
            cached = self.cache.is_some(),
            "BGG client configured"
        );

        Ok(BggClient {
            controller: RequestController::new(
                transport,
                base_url,
                self.config.api_token.clone(),
                &self.config,
            ),
            snapshot_url,
        })
    }
}

/// Uses `url` or parses `default`, making sure the path ends in `/` so
/// relative joins append instead of replacing the last segment.
fn directory_url(url: Option<Url>, default: &str) -> Result<Url> {
    let mut url = match url {
        Some(url) => url,
        None => Url::parse(default)?,
    };
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

impl BggClient {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> BggClientBuilder {
        BggClientBuilder::new()
    }
}

impl<T> BggClient<T> {
    /// Request controller, for inspecting backoff state.
    #[must_use]
    pub const fn controller(&self) -> &RequestController<T> {
        &self.controller
    }

    /// A game handle. No request is made until a field is read.
    #[must_use]
    pub fn get_game(&self, id: u32) -> Game<'_, T> {
        Game::new(self, id)
    }

    /// A user handle. No request is made until a field is read.
    #[must_use]
    pub fn get_user(&self, username: &str) -> User<'_, T> {
        User::new(self, username)
    }

    /// A lazy container of every play `username` logged.
    #[must_use]
    pub fn get_plays(&self, username: &str, query: PlaysQuery) -> Plays<'_, T> {
        Plays::new(self, username, query)
    }
}

impl<T: LocalTransport> BggClient<T> {
    /// Fetches the `thing` response for one game.
    pub(crate) async fn fetch_thing(&self, id: u32, ratings_page: Option<u32>) -> BggResult<Element> {
        self.controller
            .execute(Endpoint::Thing, &thing_query(id, ratings_page), true)
            .await
    }

    /// A game with its first `max_pages` ratings pages already fetched.
    ///
    /// # Errors
    ///
    /// Propagates request errors from any ratings page.
    #[instrument(skip(self))]
    pub async fn get_game_with_ratings(&self, id: u32, max_pages: u32) -> BggResult<Game<'_, T>> {
        let mut game = self.get_game(id);
        if max_pages > 0 {
            game.fetch_more_ratings(max_pages).await?;
        }
        Ok(game)
    }

    /// Fetches several games in one request.
    ///
    /// Duplicate ids are requested once. Items that cannot be matched to
    /// a game are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Propagates request errors.
    #[instrument(skip_all, fields(count = ids.len()))]
    pub async fn get_games(&self, ids: &[u32]) -> BggResult<Vec<Game<'_, T>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let unique: Vec<u32> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let root = self
            .controller
            .execute(Endpoint::Thing, &things_query(&unique), true)
            .await?;

        let mut games = Vec::new();
        for item in root.children_named("item") {
            let Some(id) = item.attr_parsed::<u32>("id") else {
                tracing::warn!(id = item.attr("id"), "Skipping batch item without a valid id");
                continue;
            };
            let game = self.get_game(id);
            match game.seed_from_thing(&root) {
                Ok(()) => games.push(game),
                Err(e) => tracing::warn!(id, error = %e, "Failed to seed game from batch response"),
            }
        }
        Ok(games)
    }

    /// Searches board games by name.
    ///
    /// # Errors
    ///
    /// Propagates request errors.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> BggResult<Vec<Game<'_, T>>> {
        let root = self
            .controller
            .execute(Endpoint::Search, &search_query(query), true)
            .await?;

        let games = root
            .children_named("item")
            .filter_map(|item| {
                let Some(id) = item.attr_parsed::<u32>("id") else {
                    tracing::warn!(id = item.attr("id"), "Skipping search item without a valid id");
                    return None;
                };
                let mut game = self.get_game(id);
                game.seed_from_search_item(item.clone());
                Some(game)
            })
            .collect();
        Ok(games)
    }

    /// Fetches the rank snapshot published for `date`.
    ///
    /// Goes through the transport (and its cache) but not the throttle.
    ///
    /// # Errors
    ///
    /// - [`BggError::Network`] if the download fails.
    /// - [`BggError::Http`] for a non-2xx status.
    #[instrument(skip(self))]
    pub async fn get_rank_snapshot(&self, date: NaiveDate) -> BggResult<RankSnapshot> {
        let file = format!("{}.csv", date.format("%Y-%m-%d"));
        let url = self
            .snapshot_url
            .join(&file)
            .map_err(|e| BggError::network(self.snapshot_url.as_str(), e))?;

        let response = self
            .controller
            .transport()
            .get(&ApiRequest::new(url.clone()))
            .await?;
        if !(200..300).contains(&response.status) {
            return Err(BggError::Http {
                status: response.status,
                url: url.to_string(),
            });
        }

        let text = String::from_utf8_lossy(&response.body);
        Ok(RankSnapshot::parse(&text))
    }
}
