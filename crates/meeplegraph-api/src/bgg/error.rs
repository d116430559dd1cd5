//! Error taxonomy for BoardGameGeek requests.

use thiserror::Error;

use super::xml::XmlError;

/// Result alias used throughout the `bgg` module.
pub type BggResult<T> = std::result::Result<T, BggError>;

/// Top-level error returned by every request path.
#[derive(Debug, Error)]
#[allow(clippy::module_name_repetitions)]
pub enum BggError {
    /// Transport-level failure (DNS, connection, timeout, body read).
    #[error("network error at {url}: {source}")]
    Network {
        /// URL that was being requested.
        url: String,
        /// Underlying transport error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Non-success HTTP status that is not retried at this layer.
    #[error("HTTP {status} from {url}")]
    Http {
        /// Status code returned by the server.
        status: u16,
        /// URL that was requested.
        url: String,
    },

    /// The server accepted the request but is still preparing the data (HTTP 202).
    #[error("request to {endpoint} is queued by the server (HTTP 202)")]
    Queued {
        /// Endpoint that answered 202.
        endpoint: String,
    },

    /// Valid HTTP exchange with an unusable payload.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Payload-level failures.
#[derive(Debug, Error)]
#[allow(clippy::module_name_repetitions)]
pub enum ApiError {
    /// 2xx response with an empty body.
    #[error("BGG API returned an empty response from {endpoint}")]
    EmptyResponse {
        /// Endpoint that returned nothing.
        endpoint: String,
    },

    /// The body could not be parsed as XML.
    #[error("failed to parse XML response from {endpoint}: {source}")]
    InvalidXml {
        /// Endpoint whose body failed to parse.
        endpoint: String,
        /// Parser error.
        #[source]
        source: XmlError,
    },

    /// The response parsed but the expected entity is absent.
    #[error("{kind} {id} not found in response")]
    MissingEntity {
        /// Entity kind (`game`, `user`, ...).
        kind: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// Every attempt was answered with 202 or 429.
    #[error("failed to get a valid response from {endpoint} after {attempts} attempts")]
    RetriesExhausted {
        /// Endpoint that was requested.
        endpoint: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// A response field needed to continue could not be interpreted.
    #[error("invalid data from {endpoint}: {message}")]
    InvalidData {
        /// Endpoint that produced the data.
        endpoint: String,
        /// What was wrong.
        message: String,
    },
}

impl BggError {
    /// Wraps a transport error for `url`.
    pub fn network(
        url: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Network {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Returns `true` for the "still being prepared" signal.
    #[must_use]
    pub const fn is_queued(&self) -> bool {
        matches!(self, Self::Queued { .. })
    }

    /// Returns `true` for payload-level failures.
    #[must_use]
    pub const fn is_api_error(&self) -> bool {
        matches!(self, Self::Api(_))
    }

    /// Returns `true` for transport-level failures.
    #[must_use]
    pub const fn is_network_error(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}
