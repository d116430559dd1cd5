//! Lazily loaded board game.
#![allow(clippy::future_not_send)]

use std::fmt;

use super::client::BggClient;
use super::error::{ApiError, BggResult};
use super::extract;
use super::lazy::LazySlot;
use super::ratings::Ratings;
use super::transport::{HttpTransport, LocalTransport};
use super::xml::Element;

/// Votes for one player count in the `suggested_numplayers` poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSuggestion {
    /// Player count as BGG spells it (`"4"`, `"4+"`, `"N/A"`).
    pub player_count: String,
    /// "Best" votes.
    pub best: u32,
    /// "Recommended" votes.
    pub recommended: u32,
    /// "Not Recommended" votes.
    pub not_recommended: u32,
}

/// A board game, fetched on first field access.
///
/// Batch, search and collection responses seed the data up front so no
/// per-game request is needed.
pub struct Game<'c, T = HttpTransport> {
    id: u32,
    client: &'c BggClient<T>,
    data: LazySlot,
    ratings: Ratings,
}

impl<T> fmt::Debug for Game<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Game")
            .field("id", &self.id)
            .field("loaded", &self.data.is_loaded())
            .field("ratings", &self.ratings)
            .finish_non_exhaustive()
    }
}

impl<'c, T> Game<'c, T> {
    /// Creates an unloaded game.
    pub(crate) fn new(client: &'c BggClient<T>, id: u32) -> Self {
        Self {
            id,
            client,
            data: LazySlot::new(),
            ratings: Ratings::default(),
        }
    }

    /// BGG id.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Returns `true` once the game's XML is present.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.data.is_loaded()
    }

    /// Raw XML item, if loaded.
    #[must_use]
    pub fn data(&self) -> Option<&Element> {
        self.data.get()
    }

    /// Ratings fetched so far.
    #[must_use]
    pub const fn ratings(&self) -> &Ratings {
        &self.ratings
    }

    /// Seeds from a `thing` response holding one or more items.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MissingEntity`] if the game is still unloaded
    /// and the response has no item with its id.
    pub(crate) fn seed_from_thing(&self, root: &Element) -> BggResult<()> {
        if self.data.is_loaded() {
            return Ok(());
        }
        self.data.seed(item_for(root, self.id)?);
        Ok(())
    }

    /// Seeds from a `collection` item, adopting its `objectid`.
    pub(crate) fn seed_from_collection_item(&mut self, item: Element) {
        self.adopt(item, "objectid");
    }

    /// Seeds from a `search` item, adopting its `id`.
    pub(crate) fn seed_from_search_item(&mut self, item: Element) {
        self.adopt(item, "id");
    }

    fn adopt(&mut self, item: Element, id_attr: &str) {
        if self.data.is_loaded() {
            return;
        }
        if let Some(id) = item.attr_parsed(id_attr) {
            self.id = id;
        }
        self.data.seed(item);
    }
}

impl<T: LocalTransport> Game<'_, T> {
    /// Returns the game's XML, fetching `thing?id=<id>&stats=1` if needed.
    ///
    /// # Errors
    ///
    /// Propagates request errors; [`ApiError::MissingEntity`] if the
    /// response has no matching item.
    pub async fn ensure_loaded(&self) -> BggResult<&Element> {
        self.data
            .get_or_load(|| async {
                tracing::debug!(game_id = self.id, "Fetching game data");
                let root = self.client.fetch_thing(self.id, None).await?;
                item_for(&root, self.id)
            })
            .await
    }

    /// Primary name, `"N/A"` if none.
    ///
    /// # Errors
    ///
    /// Returns an error if the game cannot be loaded.
    pub async fn name(&self) -> BggResult<String> {
        Ok(extract::game_name(self.ensure_loaded().await?))
    }

    /// Publication year.
    ///
    /// # Errors
    ///
    /// Returns an error if the game cannot be loaded.
    pub async fn year_published(&self) -> BggResult<Option<i32>> {
        Ok(extract::year_published(self.ensure_loaded().await?))
    }

    /// Average user rating.
    ///
    /// # Errors
    ///
    /// Returns an error if the game cannot be loaded.
    pub async fn average_rating(&self) -> BggResult<Option<f64>> {
        Ok(extract::average_rating(self.ensure_loaded().await?))
    }

    /// Number of users owning the game.
    ///
    /// # Errors
    ///
    /// Returns an error if the game cannot be loaded.
    pub async fn owned_by(&self) -> BggResult<Option<u32>> {
        Ok(extract::owned_by(self.ensure_loaded().await?))
    }

    /// Player-count poll results.
    ///
    /// # Errors
    ///
    /// Returns an error if the game cannot be loaded.
    pub async fn player_suggestions(&self) -> BggResult<Vec<PlayerSuggestion>> {
        Ok(extract::player_suggestions(self.ensure_loaded().await?))
    }

    /// Fetches up to `num_pages` more ratings pages.
    ///
    /// # Errors
    ///
    /// Propagates request errors. Pages fetched before the error are kept.
    pub async fn fetch_more_ratings(&mut self, num_pages: u32) -> BggResult<()> {
        self.ratings
            .fetch_more(self.client, self.id, &self.data, num_pages)
            .await
    }
}

/// Clones the item with `id` out of a `thing` response.
pub(crate) fn item_for(root: &Element, id: u32) -> BggResult<Element> {
    let id = id.to_string();
    root.find_descendant("item", "id", &id)
        .cloned()
        .ok_or_else(|| ApiError::MissingEntity { kind: "game", id }.into())
}
