//! Paginated rating comments for one game.
#![allow(clippy::future_not_send)]

use super::client::BggClient;
use super::error::BggResult;
use super::game::item_for;
use super::lazy::LazySlot;
use super::params::RATINGS_PAGE_SIZE;
use super::transport::LocalTransport;
use super::xml::Element;

/// One user's rating.
#[derive(Debug, Clone, PartialEq)]
pub struct Rating {
    /// Rater's username (`"N/A"` if absent).
    pub username: String,
    /// Numeric rating, 1-10.
    pub rating: f64,
    /// Comment text (may be empty).
    pub comment: String,
}

/// Ratings accumulated page by page.
///
/// Totals are unknown until the first page arrives; `len` reports the
/// game's total rating count from then on, not the number held.
#[derive(Debug, Clone, Default)]
pub struct Ratings {
    ratings: Vec<Rating>,
    pages_fetched: u32,
    total_pages: Option<u32>,
    total_ratings: Option<u32>,
}

impl Ratings {
    /// Ratings held so far, in page order.
    pub fn iter(&self) -> std::slice::Iter<'_, Rating> {
        self.ratings.iter()
    }

    /// Ratings held so far.
    #[must_use]
    pub fn as_slice(&self) -> &[Rating] {
        &self.ratings
    }

    /// Total rating count once known, otherwise the number held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.total_ratings
            .and_then(|total| usize::try_from(total).ok())
            .unwrap_or(self.ratings.len())
    }

    /// Returns `true` if [`len`](Self::len) is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of ratings actually held.
    #[must_use]
    pub fn fetched(&self) -> usize {
        self.ratings.len()
    }

    /// Last page fetched (0 before the first).
    #[must_use]
    pub const fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Page count, once known.
    #[must_use]
    pub const fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    /// Rating count reported by BGG, once known.
    #[must_use]
    pub const fn total_ratings(&self) -> Option<u32> {
        self.total_ratings
    }

    /// `false` while the totals are unknown.
    #[must_use]
    pub fn all_fetched(&self) -> bool {
        self.total_pages
            .is_some_and(|total| self.pages_fetched >= total)
    }

    pub(crate) async fn fetch_more<T: LocalTransport>(
        &mut self,
        client: &BggClient<T>,
        game_id: u32,
        slot: &LazySlot,
        num_pages: u32,
    ) -> BggResult<()> {
        if self.all_fetched() {
            tracing::debug!(game_id, "All ratings already fetched");
            return Ok(());
        }

        let start = self.pages_fetched.saturating_add(1);
        let mut end = start.saturating_add(num_pages);
        if let Some(total) = self.total_pages {
            end = end.min(total.saturating_add(1));
        }

        for page in start..end {
            if self.all_fetched() {
                break;
            }
            tracing::debug!(game_id, page, "Fetching ratings page");
            let root = client.fetch_thing(game_id, Some(page)).await?;
            if !slot.is_loaded() {
                slot.seed(item_for(&root, game_id)?);
            }
            if !self.absorb_page(game_id, page, &root) {
                break;
            }
        }
        Ok(())
    }

    /// Adds the ratings on one `thing` page.
    ///
    /// Returns `false` when the page has no `comments` element, which ends
    /// pagination with zero totals.
    pub(crate) fn absorb_page(&mut self, game_id: u32, page: u32, root: &Element) -> bool {
        let comments = root
            .find_descendant("item", "id", &game_id.to_string())
            .and_then(|item| item.child("comments"));
        let Some(comments) = comments else {
            self.total_pages = Some(0);
            self.total_ratings = Some(0);
            return false;
        };

        if self.total_pages.is_none() {
            let total: u32 = comments.attr_parsed("totalitems").unwrap_or(0);
            let page_size: u32 = comments
                .attr_parsed("pagesize")
                .unwrap_or(RATINGS_PAGE_SIZE);
            self.total_ratings = Some(total);
            self.total_pages = Some(if page_size == 0 {
                0
            } else {
                total.div_ceil(page_size)
            });
        }

        self.ratings.extend(
            comments
                .children_named("comment")
                .filter_map(|comment| parse_rating(game_id, comment)),
        );
        self.pages_fetched = page;
        true
    }
}

impl<'a> IntoIterator for &'a Ratings {
    type Item = &'a Rating;
    type IntoIter = std::slice::Iter<'a, Rating>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn parse_rating(game_id: u32, comment: &Element) -> Option<Rating> {
    let raw = comment.attr("rating").filter(|r| !r.is_empty())?;
    let Ok(rating) = raw.trim().parse::<f64>() else {
        tracing::warn!(game_id, rating = raw, "Could not parse rating, skipping");
        return None;
    };
    Some(Rating {
        username: comment.attr("username").unwrap_or("N/A").to_owned(),
        rating,
        comment: comment.attr("value").unwrap_or_default().to_owned(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::float_cmp)]

    use std::fmt::Write as _;

    use super::super::client::BggClient;
    use super::super::testing::ScriptedTransport;
    use super::super::xml::parse_document;
    use super::*;

    const PAGE_1: &str = include_str!("../../../../fixtures/bgg/ratings_13_page1.xml");
    const PAGE_2: &str = include_str!("../../../../fixtures/bgg/ratings_13_page2.xml");
    const PAGE_3: &str = include_str!("../../../../fixtures/bgg/ratings_13_page3.xml");

    fn client(transport: ScriptedTransport) -> BggClient<ScriptedTransport> {
        BggClient::builder().build_with_transport(transport).unwrap()
    }

    fn ratings_page(page: u32, total: u32, count: u32) -> String {
        let mut xml = format!(
            r#"<items><item type="boardgame" id="13"><name type="primary" value="CATAN"/><comments page="{page}" totalitems="{total}">"#
        );
        for i in 0..count {
            write!(xml, r#"<comment username="user{page}_{i}" rating="7" value=""/>"#).unwrap();
        }
        xml.push_str("</comments></item></items>");
        xml
    }

    #[test]
    fn test_absorb_page_computes_totals() {
        // Arrange
        let mut ratings = Ratings::default();
        let root = parse_document(PAGE_1.as_bytes()).unwrap();

        // Act
        let more = ratings.absorb_page(13, 1, &root);

        // Assert
        assert!(more);
        assert_eq!(ratings.total_ratings(), Some(250));
        assert_eq!(ratings.total_pages(), Some(3));
        assert_eq!(ratings.pages_fetched(), 1);
        assert_eq!(ratings.len(), 250);
        assert_eq!(ratings.fetched(), 3);
        assert!(!ratings.all_fetched());
    }

    #[test]
    fn test_absorb_page_skips_bad_ratings() {
        // Arrange
        let mut ratings = Ratings::default();
        let root = parse_document(
            br#"<items><item id="13"><comments page="1" totalitems="4">
                <comment username="a" rating="7" value="fine"/>
                <comment username="b" rating="" value="no score"/>
                <comment username="c" rating="N/A" value="comment only"/>
                <comment rating="9.5"/>
            </comments></item></items>"#,
        )
        .unwrap();

        // Act
        ratings.absorb_page(13, 1, &root);

        // Assert
        let held: Vec<_> = ratings.iter().collect();
        assert_eq!(held.len(), 2);
        assert_eq!(held[0].username, "a");
        assert_eq!(held[0].comment, "fine");
        assert_eq!(held[1].username, "N/A");
        assert_eq!(held[1].rating, 9.5);
        assert_eq!(held[1].comment, "");
        assert_eq!(ratings.total_pages(), Some(1));
        assert!(ratings.all_fetched());
    }

    #[test]
    fn test_absorb_page_without_comments_ends_with_zero() {
        // Arrange
        let mut ratings = Ratings::default();
        let root = parse_document(br#"<items><item id="13"/></items>"#).unwrap();

        // Act
        let more = ratings.absorb_page(13, 1, &root);

        // Assert
        assert!(!more);
        assert_eq!(ratings.total_ratings(), Some(0));
        assert_eq!(ratings.pages_fetched(), 0);
        assert!(ratings.all_fetched());
        assert!(ratings.is_empty());
    }

    #[test]
    fn test_zero_page_size_means_zero_pages() {
        // Arrange
        let mut ratings = Ratings::default();
        let root = parse_document(
            br#"<items><item id="13"><comments totalitems="10" pagesize="0"/></item></items>"#,
        )
        .unwrap();

        // Act
        ratings.absorb_page(13, 1, &root);

        // Assert
        assert_eq!(ratings.total_pages(), Some(0));
        assert!(ratings.all_fetched());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_is_bounded_by_total_pages() {
        // Arrange: 250 ratings at 100 per page, caller asks for 10 pages
        let transport = ScriptedTransport::new().ok(PAGE_1).ok(PAGE_2).ok(PAGE_3);
        let client = client(transport);
        let mut game = client.get_game(13);

        // Act
        game.fetch_more_ratings(10).await.unwrap();

        // Assert
        let transport = client.controller().transport();
        assert_eq!(transport.request_count(), 3);
        assert_eq!(transport.param(0, "page").as_deref(), Some("1"));
        assert_eq!(transport.param(2, "page").as_deref(), Some("3"));
        assert_eq!(transport.param(0, "ratingcomments").as_deref(), Some("1"));
        assert!(game.ratings().all_fetched());
        assert_eq!(game.ratings().pages_fetched(), 3);
        assert_eq!(game.ratings().fetched(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_page_at_a_time_until_all_fetched() {
        // Arrange: 250 ratings at 100 per page
        let transport = ScriptedTransport::new()
            .ok(&ratings_page(1, 250, 100))
            .ok(&ratings_page(2, 250, 100))
            .ok(&ratings_page(3, 250, 50));
        let client = client(transport);
        let mut game = client.get_game(13);
        let mut progress = Vec::new();

        // Act
        for _ in 0..3 {
            game.fetch_more_ratings(1).await.unwrap();
            progress.push((game.ratings().fetched(), game.ratings().all_fetched()));
        }

        // Assert
        assert_eq!(progress, vec![(100, false), (200, false), (250, true)]);
        assert_eq!(game.ratings().total_pages(), Some(3));
        assert_eq!(client.controller().transport().request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_after_all_fetched_is_noop() {
        // Arrange
        let transport = ScriptedTransport::new().ok(PAGE_1).ok(PAGE_2).ok(PAGE_3);
        let client = client(transport);
        let mut game = client.get_game(13);
        game.fetch_more_ratings(3).await.unwrap();

        // Act
        game.fetch_more_ratings(5).await.unwrap();

        // Assert
        assert_eq!(client.controller().transport().request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_resumes_from_last_page() {
        // Arrange
        let transport = ScriptedTransport::new().ok(PAGE_1).ok(PAGE_2);
        let client = client(transport);
        let mut game = client.get_game(13);
        game.fetch_more_ratings(1).await.unwrap();

        // Act
        game.fetch_more_ratings(1).await.unwrap();

        // Assert
        assert_eq!(
            client.controller().transport().param(1, "page").as_deref(),
            Some("2")
        );
        assert_eq!(game.ratings().pages_fetched(), 2);
        assert!(!game.ratings().all_fetched());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ratings_page_seeds_game() {
        // Arrange
        let client = client(ScriptedTransport::new().ok(PAGE_1));
        let mut game = client.get_game(13);

        // Act
        game.fetch_more_ratings(1).await.unwrap();
        let name = game.name().await.unwrap();

        // Assert
        assert!(game.is_loaded());
        assert_eq!(name, "CATAN");
        assert_eq!(client.controller().transport().request_count(), 1);
    }
}
