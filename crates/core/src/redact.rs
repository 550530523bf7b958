//! Credential scrubbing for anything that may end up in logs or chat.

use std::sync::LazyLock;

use regex::Regex;

/// Replacement text for scrubbed credentials.
pub const REDACTED: &str = "***";

/// Matches a `key=` query parameter value in a URL.
static KEY_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([?&]key=)[^&\s'\x22)]+").expect("static regex"));

/// Remove credentials from `text`.
///
/// Any `key=...` query parameter is masked, and so is every literal
/// occurrence of `key` when one is supplied.
pub fn redact_key(text: &str, key: Option<&str>) -> String {
    let masked = KEY_PARAM.replace_all(text, format!("${{1}}{REDACTED}"));
    match key {
        Some(k) if !k.is_empty() => masked.replace(k, REDACTED),
        _ => masked.into_owned(),
    }
}
