//! BoardGameGeek XML API2 endpoints and request parameter types.

use std::fmt;

use chrono::NaiveDate;

/// XML API2 endpoint, relative to the API base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `thing`: games, with optional statistics and ratings pages.
    Thing,
    /// `user`: public profile.
    User,
    /// `collection`: a user's collection (may answer 202).
    Collection,
    /// `search`: name search.
    Search,
    /// `plays`: logged plays, paginated.
    Plays,
}

impl Endpoint {
    /// Path segment appended to the base URL.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Thing => "thing",
            Self::User => "user",
            Self::Collection => "collection",
            Self::Search => "search",
            Self::Plays => "plays",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Ratings requested per `thing` page (the API maximum).
pub const RATINGS_PAGE_SIZE: u32 = 100;

/// Plays returned per `plays` page.
pub const PLAYS_PAGE_SIZE: usize = 100;

/// Query parameters, in the order they were added.
pub type Query = Vec<(&'static str, String)>;

/// Options for a collection request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionOptions {
    /// `own` filter; `None` omits the parameter and returns every status.
    pub own: Option<bool>,
    /// Whether to wait out HTTP 202 instead of failing with `Queued`.
    pub accept_queued: bool,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            own: Some(true),
            accept_queued: true,
        }
    }
}

/// Filters for a plays request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaysQuery {
    /// Earliest play date (inclusive).
    pub min_date: Option<NaiveDate>,
    /// Latest play date (inclusive).
    pub max_date: Option<NaiveDate>,
    /// Item subtype (`boardgame`, `boardgameexpansion`, ...).
    pub subtype: Option<String>,
}

/// `thing` query for one game, with statistics and optional ratings page.
pub(crate) fn thing_query(id: u32, ratings_page: Option<u32>) -> Query {
    let mut query: Query = vec![("id", id.to_string()), ("stats", String::from("1"))];
    if let Some(page) = ratings_page {
        query.push(("ratingcomments", String::from("1")));
        query.push(("page", page.to_string()));
        query.push(("pagesize", RATINGS_PAGE_SIZE.to_string()));
    }
    query
}

/// `thing` query for several games at once.
pub(crate) fn things_query(ids: &[u32]) -> Query {
    let ids = ids
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    vec![("id", ids), ("stats", String::from("1"))]
}

/// `user` query.
pub(crate) fn user_query(name: &str) -> Query {
    vec![("name", name.to_owned())]
}

/// `collection` query.
pub(crate) fn collection_query(username: &str, options: &CollectionOptions) -> Query {
    let mut query: Query = vec![
        ("username", username.to_owned()),
        ("stats", String::from("1")),
        ("brief", String::from("0")),
    ];
    if let Some(own) = options.own {
        query.push(("own", String::from(if own { "1" } else { "0" })));
    }
    query
}

/// `search` query restricted to board games.
pub(crate) fn search_query(query: &str) -> Query {
    vec![
        ("query", query.to_owned()),
        ("type", String::from("boardgame")),
    ]
}

/// `plays` query for one page.
pub(crate) fn plays_query(username: &str, filters: &PlaysQuery, page: u32) -> Query {
    let mut query: Query = vec![
        ("username", username.to_owned()),
        ("page", page.to_string()),
    ];
    if let Some(date) = filters.min_date {
        query.push(("mindate", date.format("%Y-%m-%d").to_string()));
    }
    if let Some(date) = filters.max_date {
        query.push(("maxdate", date.format("%Y-%m-%d").to_string()));
    }
    if let Some(ref subtype) = filters.subtype {
        query.push(("subtype", subtype.clone()));
    }
    query
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn value<'a>(query: &'a Query, key: &str) -> Option<&'a str> {
        query
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_thing_query_with_ratings_page() {
        // Arrange & Act
        let query = thing_query(174_430, Some(3));

        // Assert
        assert_eq!(value(&query, "id"), Some("174430"));
        assert_eq!(value(&query, "stats"), Some("1"));
        assert_eq!(value(&query, "ratingcomments"), Some("1"));
        assert_eq!(value(&query, "page"), Some("3"));
        assert_eq!(value(&query, "pagesize"), Some("100"));
    }

    #[test]
    fn test_thing_query_without_ratings() {
        // Arrange & Act
        let query = thing_query(13, None);

        // Assert
        assert_eq!(value(&query, "ratingcomments"), None);
        assert_eq!(value(&query, "page"), None);
    }

    #[test]
    fn test_things_query_joins_ids() {
        // Arrange & Act
        let query = things_query(&[1, 2, 3]);

        // Assert
        assert_eq!(value(&query, "id"), Some("1,2,3"));
    }

    #[test]
    fn test_collection_query_default_owns() {
        // Arrange & Act
        let query = collection_query("alice", &CollectionOptions::default());

        // Assert
        assert_eq!(value(&query, "username"), Some("alice"));
        assert_eq!(value(&query, "brief"), Some("0"));
        assert_eq!(value(&query, "own"), Some("1"));
    }

    #[test]
    fn test_collection_query_without_own_filter() {
        // Arrange
        let options = CollectionOptions {
            own: None,
            accept_queued: false,
        };

        // Act
        let query = collection_query("alice", &options);

        // Assert
        assert_eq!(value(&query, "own"), None);
    }

    #[test]
    fn test_plays_query_formats_dates() {
        // Arrange
        let filters = PlaysQuery {
            min_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            max_date: NaiveDate::from_ymd_opt(2024, 12, 31),
            subtype: Some(String::from("boardgame")),
        };

        // Act
        let query = plays_query("alice", &filters, 2);

        // Assert
        assert_eq!(value(&query, "page"), Some("2"));
        assert_eq!(value(&query, "mindate"), Some("2024-01-01"));
        assert_eq!(value(&query, "maxdate"), Some("2024-12-31"));
        assert_eq!(value(&query, "subtype"), Some("boardgame"));
    }

    #[test]
    fn test_search_query_restricts_type() {
        // Arrange & Act
        let query = search_query("catan");

        // Assert
        assert_eq!(value(&query, "query"), Some("catan"));
        assert_eq!(value(&query, "type"), Some("boardgame"));
    }
}
