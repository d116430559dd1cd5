//! Daily BGG rank snapshots.
//!
//! CSV files with the columns
//! `ID,Name,Year,Rank,Average,Bayes average,Users rated,URL,Thumbnail`.

mod rank_snapshot;

pub use rank_snapshot::{RankEntry, RankSnapshot};
