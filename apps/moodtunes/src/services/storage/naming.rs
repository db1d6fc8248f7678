//! File naming for stored uploads.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Anything outside lowercase ASCII letters, digits and dots.
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^a-z0-9.]").unwrap();
}

/// Lowercases `name` and replaces every character outside `[a-z0-9.]` with `_`.
pub fn sanitize_filename(name: &str) -> String {
    UNSAFE_CHARS
        .replace_all(&name.to_lowercase(), "_")
        .into_owned()
}

/// Lowercased extension of `name` (without dot), if it has one.
pub fn extension_of(name: &str) -> Option<String> {
    std::path::Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .filter(|ext| !ext.is_empty())
}
