//! BGG users and their collections.
#![allow(clippy::future_not_send)]

use std::fmt;

use tokio::sync::OnceCell;

use super::client::BggClient;
use super::error::{ApiError, BggResult};
use super::extract;
use super::game::Game;
use super::lazy::LazySlot;
use super::params::{CollectionOptions, Endpoint, collection_query, user_query};
use super::transport::{HttpTransport, LocalTransport};
use super::xml::Element;

/// A BGG user profile, fetched on first field access.
pub struct User<'c, T = HttpTransport> {
    username: String,
    client: &'c BggClient<T>,
    data: LazySlot,
}

impl<T> fmt::Debug for User<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("username", &self.username)
            .field("loaded", &self.data.is_loaded())
            .finish_non_exhaustive()
    }
}

impl<'c, T> User<'c, T> {
    pub(crate) fn new(client: &'c BggClient<T>, username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            client,
            data: LazySlot::new(),
        }
    }

    /// Username as requested.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns `true` once the profile is present.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.data.is_loaded()
    }

    /// Owned games of this user. No request is made until first access.
    #[must_use]
    pub fn collection(&self) -> Collection<'c, T> {
        self.collection_with(CollectionOptions::default())
    }

    /// Collection with explicit filter and queue handling.
    #[must_use]
    pub fn collection_with(&self, options: CollectionOptions) -> Collection<'c, T> {
        Collection::new(self.client, self.username.clone(), options)
    }
}

impl<T: LocalTransport> User<'_, T> {
    /// Returns the `<user>` element, fetching it if needed.
    ///
    /// # Errors
    ///
    /// Propagates request errors; [`ApiError::MissingEntity`] if the
    /// response root is not a `user` element.
    pub async fn ensure_loaded(&self) -> BggResult<&Element> {
        self.data
            .get_or_load(|| async {
                tracing::debug!(username = %self.username, "Fetching user data");
                let root = self
                    .client
                    .controller()
                    .execute(Endpoint::User, &user_query(&self.username), true)
                    .await?;
                if root.name() == "user" {
                    Ok(root)
                } else {
                    Err(ApiError::MissingEntity {
                        kind: "user",
                        id: self.username.clone(),
                    }
                    .into())
                }
            })
            .await
    }

    /// Numeric user id; `None` if BGG reports none.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile cannot be loaded.
    pub async fn id(&self) -> BggResult<Option<u64>> {
        Ok(extract::user_id(self.ensure_loaded().await?))
    }

    /// Display name as BGG spells it.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile cannot be loaded.
    pub async fn name(&self) -> BggResult<String> {
        Ok(extract::user_name(self.ensure_loaded().await?, &self.username))
    }

    /// Year the account was registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile cannot be loaded.
    pub async fn year_registered(&self) -> BggResult<Option<i32>> {
        Ok(extract::year_registered(self.ensure_loaded().await?))
    }
}

/// A user's collection, fetched once on first access.
pub struct Collection<'c, T = HttpTransport> {
    username: String,
    options: CollectionOptions,
    client: &'c BggClient<T>,
    games: OnceCell<Vec<Game<'c, T>>>,
}

impl<T> fmt::Debug for Collection<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("username", &self.username)
            .field("options", &self.options)
            .field("loaded", &self.games.initialized())
            .finish_non_exhaustive()
    }
}

impl<'c, T> Collection<'c, T> {
    fn new(client: &'c BggClient<T>, username: String, options: CollectionOptions) -> Self {
        Self {
            username,
            options,
            client,
            games: OnceCell::new(),
        }
    }

    /// Owner's username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns `true` once the collection has been fetched.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.games.initialized()
    }
}

impl<'c, T: LocalTransport> Collection<'c, T> {
    /// Games in the collection, in response order.
    ///
    /// # Errors
    ///
    /// Propagates request errors, including [`BggError::Queued`] when
    /// queued responses are not accepted.
    ///
    /// [`BggError::Queued`]: super::error::BggError::Queued
    pub async fn games(&self) -> BggResult<&[Game<'c, T>]> {
        let games = self
            .games
            .get_or_try_init(|| self.fetch())
            .await?;
        Ok(games.as_slice())
    }

    /// Number of games.
    ///
    /// # Errors
    ///
    /// Same as [`games`](Self::games).
    pub async fn len(&self) -> BggResult<usize> {
        Ok(self.games().await?.len())
    }

    /// Returns `true` if the collection holds no games.
    ///
    /// # Errors
    ///
    /// Same as [`games`](Self::games).
    pub async fn is_empty(&self) -> BggResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Consumes the collection, returning owned games.
    ///
    /// # Errors
    ///
    /// Same as [`games`](Self::games).
    pub async fn into_games(self) -> BggResult<Vec<Game<'c, T>>> {
        self.games().await?;
        Ok(self.games.into_inner().unwrap_or_default())
    }

    async fn fetch(&self) -> BggResult<Vec<Game<'c, T>>> {
        tracing::debug!(username = %self.username, "Fetching collection");
        let root = self
            .client
            .controller()
            .execute(
                Endpoint::Collection,
                &collection_query(&self.username, &self.options),
                self.options.accept_queued,
            )
            .await?;

        let games = root
            .children_named("item")
            .filter_map(|item| {
                let Some(id) = item.attr_parsed::<u32>("objectid") else {
                    tracing::warn!(
                        username = %self.username,
                        objectid = item.attr("objectid"),
                        "Skipping collection item without a valid objectid"
                    );
                    return None;
                };
                let mut game = Game::new(self.client, id);
                game.seed_from_collection_item(item.clone());
                Some(game)
            })
            .collect();
        Ok(games)
    }
}
