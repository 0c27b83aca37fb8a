//! Utility functions shared across the application.
//!
//! This module contains small string helpers used by both the request view
//! and the response builder.

use std::borrow::Cow;

/// Reduces a content-type header value to its lowercase media type.
///
/// Format: `Text/HTML; charset=utf-8` → `text/html`
///
/// # Arguments
///
/// * `content_type` - The raw content-type header value
#[must_use]
pub fn media_type_essence(content_type: &str) -> String {
    content_type
        .split_once(';')
        .map_or(content_type, |(essence, _)| essence)
        .trim()
        .to_ascii_lowercase()
}

/// Percent-decodes a path segment captured by the matcher.
///
/// # Returns
///
/// The decoded value, or the raw value if it does not decode to valid UTF-8.
#[must_use]
pub fn decode_path_param(raw: &str) -> String {
    urlencoding::decode(raw).map_or_else(|_| raw.to_string(), Cow::into_owned)
}
