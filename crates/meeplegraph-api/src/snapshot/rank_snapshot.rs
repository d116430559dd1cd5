//! `RankSnapshot` - parsed rank CSV with id and rank lookups.

use std::collections::HashMap;

use csv::{ReaderBuilder, StringRecord, Trim};

/// One ranked game.
#[derive(Debug, Clone, PartialEq)]
pub struct RankEntry {
    /// BGG id.
    pub id: u32,
    /// Game name.
    pub name: String,
    /// Publication year (0 when unknown, negative before the common era).
    pub year: i32,
    /// Overall rank.
    pub rank: u32,
    /// Average rating.
    pub average: f64,
    /// Bayesian average ("geek rating").
    pub bayes_average: f64,
    /// Number of ratings.
    pub users_rated: u32,
    /// Game page path.
    pub url: String,
    /// Thumbnail URL.
    pub thumbnail: String,
}

impl RankEntry {
    /// Placeholder reported for ids not in the snapshot.
    fn unknown() -> Self {
        Self {
            id: 0,
            name: String::from("???"),
            year: 0,
            rank: 0,
            average: 0.0,
            bayes_average: 0.0,
            users_rated: 0,
            url: String::from("-"),
            thumbnail: String::from("-"),
        }
    }

    fn from_record(record: &StringRecord) -> Result<Self, String> {
        let field = |i: usize| record.get(i).ok_or_else(|| format!("missing column {i}"));

        Ok(Self {
            id: parse(field(0)?, "ID")?,
            name: field(1)?.to_owned(),
            year: parse(field(2)?, "Year")?,
            rank: parse(field(3)?, "Rank")?,
            average: parse(field(4)?, "Average")?,
            bayes_average: parse(field(5)?, "Bayes average")?,
            users_rated: parse(field(6)?, "Users rated")?,
            url: field(7)?.to_owned(),
            thumbnail: field(8)?.to_owned(),
        })
    }
}

fn parse<T: std::str::FromStr>(value: &str, column: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| format!("invalid {column} {value:?}: {e}"))
}

/// Rankings on one day.
#[derive(Debug, Clone, Default)]
pub struct RankSnapshot {
    header: Vec<String>,
    entries: Vec<RankEntry>,
    by_id: HashMap<u32, usize>,
    by_rank: HashMap<u32, u32>,
}

impl RankSnapshot {
    /// Parses CSV text. Malformed rows are skipped with a warning.
    #[must_use]
    pub fn parse(data: &str) -> Self {
        let mut snapshot = Self::default();
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(data.trim().as_bytes());

        match reader.headers() {
            Ok(header) => snapshot.header = header.iter().map(ToOwned::to_owned).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable snapshot header");
                return snapshot;
            }
        }

        for (index, result) in reader.records().enumerate() {
            let line = index.saturating_add(2);
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(line, error = %e, "Skipping malformed line");
                    continue;
                }
            };
            match RankEntry::from_record(&record) {
                Ok(entry) => snapshot.push(entry),
                Err(e) => {
                    tracing::warn!(line, record = ?record, error = %e, "Skipping malformed line");
                }
            }
        }

        tracing::debug!(entries = snapshot.entries.len(), "Rank snapshot parsed");
        snapshot
    }

    fn push(&mut self, entry: RankEntry) {
        self.by_id.insert(entry.id, self.entries.len());
        self.by_rank.insert(entry.rank, entry.id);
        self.entries.push(entry);
    }

    /// Header row as read.
    #[must_use]
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Entries in file order.
    #[must_use]
    pub fn entries(&self) -> &[RankEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entries were parsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All ids in file order.
    #[must_use]
    pub fn ids(&self) -> Vec<u32> {
        self.entries.iter().map(|e| e.id).collect()
    }

    /// Entry for `id`.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<&RankEntry> {
        self.by_id.get(&id).and_then(|&i| self.entries.get(i))
    }

    /// Game at `rank`.
    #[must_use]
    pub fn id_at_rank(&self, rank: u32) -> Option<u32> {
        self.by_rank.get(&rank).copied()
    }

    fn lookup<R>(&self, id: u32, field: impl FnOnce(&RankEntry) -> R) -> R {
        match self.get(id) {
            Some(entry) => field(entry),
            None => field(&RankEntry::unknown()),
        }
    }

    /// Name, `"???"` if unknown.
    #[must_use]
    pub fn name(&self, id: u32) -> String {
        self.lookup(id, |e| e.name.clone())
    }

    /// Year, 0 if unknown.
    #[must_use]
    pub fn year(&self, id: u32) -> i32 {
        self.lookup(id, |e| e.year)
    }

    /// Rank, 0 if unknown.
    #[must_use]
    pub fn rank(&self, id: u32) -> u32 {
        self.lookup(id, |e| e.rank)
    }

    /// Average rating, 0.0 if unknown.
    #[must_use]
    pub fn average_rating(&self, id: u32) -> f64 {
        self.lookup(id, |e| e.average)
    }

    /// Bayesian average, 0.0 if unknown.
    #[must_use]
    pub fn bayes_average_rating(&self, id: u32) -> f64 {
        self.lookup(id, |e| e.bayes_average)
    }

    /// Rating count, 0 if unknown.
    #[must_use]
    pub fn users_rated(&self, id: u32) -> u32 {
        self.lookup(id, |e| e.users_rated)
    }

    /// Game page path, `"-"` if unknown.
    #[must_use]
    pub fn url(&self, id: u32) -> String {
        self.lookup(id, |e| e.url.clone())
    }

    /// Thumbnail URL, `"-"` if unknown.
    #[must_use]
    pub fn thumbnail(&self, id: u32) -> String {
        self.lookup(id, |e| e.thumbnail.clone())
    }
}
