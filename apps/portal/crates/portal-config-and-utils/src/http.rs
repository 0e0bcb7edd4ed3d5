//! Helpers for logging HTTP responses without leaking their content.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Summarize a response body as its length plus a digest.
///
/// Error bodies from the hosted API can echo tokens or user input back, so
/// they are never logged verbatim.
pub fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}
