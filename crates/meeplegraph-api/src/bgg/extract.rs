//! Field extraction from the XML shapes BGG returns.
//!
//! The same game appears as a `thing` item or a `collection` item with
//! different layouts. Each field is read by an ordered list of probes;
//! the first probe whose shape is present decides the value.

use super::game::PlayerSuggestion;
use super::xml::Element;

/// Fallback when no name shape matches.
pub const UNKNOWN_NAME: &str = "N/A";

/// Outcome of one probe.
enum Probe<T> {
    /// Shape absent; try the next probe.
    Miss,
    /// Shape present; its value (possibly unusable) is final.
    Hit(Option<T>),
}

type Prober<T> = fn(&Element) -> Probe<T>;

fn first_hit<T>(el: &Element, probes: &[Prober<T>]) -> Option<T> {
    probes.iter().find_map(|probe| match probe(el) {
        Probe::Miss => None,
        Probe::Hit(value) => Some(value),
    })?
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

// --- name ---

fn name_primary_value(el: &Element) -> Probe<String> {
    non_empty(
        el.child_with_attr("name", "type", "primary")
            .and_then(|n| n.attr("value")),
    )
    .map_or(Probe::Miss, |v| Probe::Hit(Some(v.to_owned())))
}

fn name_text(el: &Element) -> Probe<String> {
    el.child("name")
        .and_then(Element::text)
        .map_or(Probe::Miss, |v| Probe::Hit(Some(v.to_owned())))
}

fn name_value(el: &Element) -> Probe<String> {
    non_empty(el.child("name").and_then(|n| n.attr("value")))
        .map_or(Probe::Miss, |v| Probe::Hit(Some(v.to_owned())))
}

/// Game name: primary name value, then name text, then any name value.
#[must_use]
pub fn game_name(el: &Element) -> String {
    first_hit(el, &[name_primary_value, name_text, name_value])
        .unwrap_or_else(|| String::from(UNKNOWN_NAME))
}

// --- year ---

fn year_value(el: &Element) -> Probe<i32> {
    non_empty(el.child("yearpublished").and_then(|y| y.attr("value")))
        .map_or(Probe::Miss, |v| Probe::Hit(v.trim().parse().ok()))
}

fn year_text(el: &Element) -> Probe<i32> {
    el.child("yearpublished")
        .and_then(Element::text)
        .filter(|t| t.bytes().all(|b| b.is_ascii_digit()))
        .map_or(Probe::Miss, |t| Probe::Hit(t.parse().ok()))
}

/// Publication year: `yearpublished/@value`, then all-digit text.
#[must_use]
pub fn year_published(el: &Element) -> Option<i32> {
    first_hit(el, &[year_value, year_text])
}

// --- average rating ---

fn average_thing(el: &Element) -> Probe<f64> {
    el.find("statistics/ratings/average")
        .map_or(Probe::Miss, |a| Probe::Hit(a.attr_parsed("value")))
}

fn average_collection(el: &Element) -> Probe<f64> {
    el.find("stats/rating/average")
        .map_or(Probe::Miss, |a| Probe::Hit(a.attr_parsed("value")))
}

/// Average user rating from either the thing or the collection layout.
///
/// When the thing layout is present but unparsable the result is `None`;
/// the collection layout is not consulted.
#[must_use]
pub fn average_rating(el: &Element) -> Option<f64> {
    first_hit(el, &[average_thing, average_collection])
}

// --- owned-by count ---

fn owned_thing(el: &Element) -> Probe<u32> {
    el.find("statistics/ratings").map_or(Probe::Miss, |r| {
        let value = if r.attr("owned").is_some() {
            r.attr_parsed("owned")
        } else if r.attr("usersrated").is_some() {
            r.attr_parsed("usersrated")
        } else if let Some(owned) = r.child("owned") {
            owned.attr_parsed("value")
        } else {
            r.child("usersrated").and_then(|u| u.attr_parsed("value"))
        };
        Probe::Hit(value)
    })
}

fn owned_collection(el: &Element) -> Probe<u32> {
    el.child("stats").map_or(Probe::Miss, |s| {
        let key = if s.attr("owned").is_some() { "owned" } else { "numowned" };
        Probe::Hit(s.attr_parsed(key))
    })
}

/// Number of users owning the game.
#[must_use]
pub fn owned_by(el: &Element) -> Option<u32> {
    first_hit(el, &[owned_thing, owned_collection])
}

// --- player-count poll ---

/// Name of the recommended-player-count poll.
const PLAYER_POLL: &str = "suggested_numplayers";

fn votes(results: &Element, choice: &str) -> u32 {
    results
        .child_with_attr("result", "value", choice)
        .and_then(|r| r.attr_parsed("numvotes"))
        .unwrap_or(0)
}

/// Per-player-count votes from the `suggested_numplayers` poll.
///
/// Missing or non-numeric vote counts read as zero.
#[must_use]
pub fn player_suggestions(el: &Element) -> Vec<PlayerSuggestion> {
    let Some(poll) = el.child_with_attr("poll", "name", PLAYER_POLL) else {
        return Vec::new();
    };
    poll.children_named("results")
        .map(|results| PlayerSuggestion {
            player_count: results
                .attr("numplayers")
                .unwrap_or(UNKNOWN_NAME)
                .to_owned(),
            best: votes(results, "Best"),
            recommended: votes(results, "Recommended"),
            not_recommended: votes(results, "Not Recommended"),
        })
        .collect()
}

// --- user ---

/// User id from `@id`; `None` for the empty id BGG returns for unknown users.
#[must_use]
pub fn user_id(el: &Element) -> Option<u64> {
    el.attr_parsed("id")
}

/// User name from `@name`, falling back to the requested username.
#[must_use]
pub fn user_name(el: &Element, requested: &str) -> String {
    non_empty(el.attr("name")).unwrap_or(requested).to_owned()
}

/// Registration year from `yearregistered/@value` when it is all digits.
#[must_use]
pub fn year_registered(el: &Element) -> Option<i32> {
    el.child("yearregistered")
        .and_then(|y| non_empty(y.attr("value")))
        .filter(|v| v.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|v| v.parse().ok())
}
