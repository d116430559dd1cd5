//! BoardGameGeek XML API2 client module.
//!
//! Requests go through a single controller that throttles live calls,
//! retries on HTTP 202/429 with adaptive backoff and consults the
//! response cache. Games, users, collections and plays are lazy handles
//! that load their XML on first field access.

mod backoff;
mod client;
mod config;
mod controller;
mod error;
mod extract;
mod game;
mod lazy;
mod params;
mod plays;
mod ratings;
#[cfg(test)]
mod testing;
mod transport;
mod user;
pub mod xml;

pub use backoff::BackoffState;
#[allow(clippy::module_name_repetitions)]
pub use client::{BggClient, BggClientBuilder};
#[allow(clippy::module_name_repetitions)]
pub use config::ClientConfig;
pub use controller::RequestController;
#[allow(clippy::module_name_repetitions)]
pub use error::{ApiError, BggError, BggResult};
pub use game::{Game, PlayerSuggestion};
pub use lazy::LazySlot;
pub use params::{CollectionOptions, Endpoint, PlaysQuery};
pub use plays::{Play, PlayPlayer, Plays};
pub use ratings::{Rating, Ratings};
pub use transport::{ApiRequest, HttpTransport, LocalTransport, RawResponse, RequestSignature, Transport};
pub use user::{Collection, User};
