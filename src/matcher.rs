//! Path-pattern matching.
//!
//! The router never interprets patterns itself. It asks a [`PathMatcher`]
//! whether a concrete path fits a pattern and, if so, which named parameters
//! it captured.

use crate::models::RouterError;
use crate::utils::decode_path_param;
use lambda_runtime::tracing::debug;
use std::collections::HashMap;

/// Named parameters captured from a path.
pub type PathParams = HashMap<String, String>;

/// Trait for path-pattern matching so the router can be tested with mocks.
pub trait PathMatcher: Send + Sync {
    /// Matches `path` against `pattern`.
    ///
    /// Returns `Ok(None)` when the path does not match.
    ///
    /// # Errors
    ///
    /// Returns `RouterError::InvalidPattern` if the pattern itself is malformed.
    fn matches(&self, pattern: &str, path: &str) -> Result<Option<PathParams>, RouterError>;
}

/// Default matcher backed by `matchit`.
///
/// Pattern syntax is `matchit`'s: `/users/{id}` for a named segment and
/// `/files/{*path}` for a catch-all. Captured values are percent-decoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct MatchitMatcher;

impl PathMatcher for MatchitMatcher {
    fn matches(&self, pattern: &str, path: &str) -> Result<Option<PathParams>, RouterError> {
        let mut router = matchit::Router::new();
        router.insert(pattern, ())?;

        let Ok(matched) = router.at(path) else {
            debug!(pattern = %pattern, path = %path, "Pattern did not match");
            return Ok(None);
        };

        let params = matched
            .params
            .iter()
            .map(|(name, value)| (name.to_string(), decode_path_param(value)))
            .collect();

        Ok(Some(params))
    }
}
