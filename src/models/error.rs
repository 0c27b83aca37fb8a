//! Error types for the proxy router.
//!
//! Handler failures never show up here: the router turns them into a generic
//! 500 response. These errors describe misuse of the router or response
//! builder that the caller has to deal with.

use std::fmt;

/// Custom error type for the router.
#[derive(Debug)]
pub enum RouterError {
    /// The response was already handed to the completion callback
    AlreadyFinalized,
    /// A route pattern was rejected by the path matcher
    InvalidPattern(String),
    /// The response body could not be serialized
    Serialization(String),
    /// Generic error for other cases
    GenericError(String),
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyFinalized => write!(f, "Response already finalized"),
            Self::InvalidPattern(msg) => write!(f, "Invalid route pattern: {msg}"),
            Self::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            Self::GenericError(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for RouterError {}

impl From<anyhow::Error> for RouterError {
    fn from(error: anyhow::Error) -> Self {
        Self::GenericError(format!("{error:#}"))
    }
}

impl From<serde_json::Error> for RouterError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<matchit::InsertError> for RouterError {
    fn from(error: matchit::InsertError) -> Self {
        Self::InvalidPattern(error.to_string())
    }
}
