//! Logged plays for a user.
#![allow(clippy::future_not_send)]

use std::fmt;

use chrono::NaiveDate;
use tokio::sync::OnceCell;

use super::client::BggClient;
use super::error::BggResult;
use super::params::{Endpoint, PLAYS_PAGE_SIZE, PlaysQuery, plays_query};
use super::transport::{HttpTransport, LocalTransport};
use super::xml::Element;

/// One logged play session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Play {
    /// Play id.
    pub id: u64,
    /// Date of the session.
    pub date: Option<NaiveDate>,
    /// Number of plays logged in this entry.
    pub quantity: u32,
    /// Duration in minutes (0 when not logged).
    pub length_minutes: u32,
    /// Session was not finished.
    pub incomplete: bool,
    /// Free-text location.
    pub location: Option<String>,
    /// Game played.
    pub game_id: Option<u32>,
    /// Name of the game played.
    pub game_name: Option<String>,
    /// Participants.
    pub players: Vec<PlayPlayer>,
}

/// A participant in a play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayPlayer {
    /// BGG username, when the player has an account.
    pub username: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Score as logged (free text on BGG).
    pub score: Option<String>,
    /// Whether this player won.
    pub win: bool,
}

/// Every play a user logged, fetched page by page on first access.
pub struct Plays<'c, T = HttpTransport> {
    username: String,
    query: PlaysQuery,
    client: &'c BggClient<T>,
    plays: OnceCell<Vec<Play>>,
}

impl<T> fmt::Debug for Plays<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plays")
            .field("username", &self.username)
            .field("query", &self.query)
            .field("loaded", &self.plays.initialized())
            .finish_non_exhaustive()
    }
}

impl<'c, T> Plays<'c, T> {
    pub(crate) fn new(client: &'c BggClient<T>, username: impl Into<String>, query: PlaysQuery) -> Self {
        Self {
            username: username.into(),
            query,
            client,
            plays: OnceCell::new(),
        }
    }

    /// Username whose plays are listed.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns `true` once every page has been fetched.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.plays.initialized()
    }
}

impl<T: LocalTransport> Plays<'_, T> {
    /// All plays, newest first.
    ///
    /// # Errors
    ///
    /// Propagates request errors from any page.
    pub async fn plays(&self) -> BggResult<&[Play]> {
        let plays = self.plays.get_or_try_init(|| self.fetch_all()).await?;
        Ok(plays.as_slice())
    }

    /// Number of plays.
    ///
    /// # Errors
    ///
    /// Same as [`plays`](Self::plays).
    pub async fn len(&self) -> BggResult<usize> {
        Ok(self.plays().await?.len())
    }

    /// Returns `true` if no plays are logged.
    ///
    /// # Errors
    ///
    /// Same as [`plays`](Self::plays).
    pub async fn is_empty(&self) -> BggResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Consumes the container, returning owned plays.
    ///
    /// # Errors
    ///
    /// Same as [`plays`](Self::plays).
    pub async fn into_plays(self) -> BggResult<Vec<Play>> {
        self.plays().await?;
        Ok(self.plays.into_inner().unwrap_or_default())
    }

    async fn fetch_all(&self) -> BggResult<Vec<Play>> {
        let mut plays = Vec::new();
        let mut seen: usize = 0;
        let mut page: u32 = 1;

        loop {
            tracing::debug!(username = %self.username, page, "Fetching plays page");
            let root = self
                .client
                .controller()
                .execute(
                    Endpoint::Plays,
                    &plays_query(&self.username, &self.query, page),
                    true,
                )
                .await?;

            let total: Option<usize> = root.attr_parsed("total");
            let on_page = root.children_named("play").count();
            if on_page == 0 {
                break;
            }
            seen = seen.saturating_add(on_page);
            plays.extend(root.children_named("play").filter_map(parse_play));

            if total.is_some_and(|t| seen >= t) || on_page < PLAYS_PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }

        tracing::debug!(username = %self.username, count = plays.len(), "Plays fetched");
        Ok(plays)
    }
}

fn parse_play(el: &Element) -> Option<Play> {
    let Some(id) = el.attr_parsed::<u64>("id") else {
        tracing::warn!(id = el.attr("id"), "Skipping play without a valid id");
        return None;
    };
    let item = el.child("item");
    let players = el
        .child("players")
        .map(|p| p.children_named("player").map(parse_player).collect())
        .unwrap_or_default();

    Some(Play {
        id,
        date: el
            .attr("date")
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
        quantity: el.attr_parsed("quantity").unwrap_or(1),
        length_minutes: el.attr_parsed("length").unwrap_or(0),
        incomplete: el.attr("incomplete") == Some("1"),
        location: non_empty(el.attr("location")),
        game_id: item.and_then(|i| i.attr_parsed("objectid")),
        game_name: item.and_then(|i| non_empty(i.attr("name"))),
        players,
    })
}

fn parse_player(el: &Element) -> PlayPlayer {
    PlayPlayer {
        username: non_empty(el.attr("username")),
        name: non_empty(el.attr("name")),
        score: non_empty(el.attr("score")),
        win: el.attr("win") == Some("1"),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}
