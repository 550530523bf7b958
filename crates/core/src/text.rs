//! Small text helpers for rendering remote strings in chat.

use std::sync::LazyLock;

use regex::Regex;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("static regex"));

static NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x?)([0-9a-fA-F]+);").expect("static regex"));

/// Strip HTML tags, keeping the inner text.
pub fn strip_html(text: &str) -> String {
    TAG.replace_all(text, "").into_owned()
}

/// Decode the HTML entities the remote API emits in names.
pub fn unescape_html(text: &str) -> String {
    let decoded = NUMERIC_ENTITY.replace_all(text, |caps: &regex::Captures<'_>| {
        let radix = if caps[1].is_empty() { 10 } else { 16 };
        u32::from_str_radix(&caps[2], radix)
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });
    decoded
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Event text as delivered to the member: tags and the trailing link removed.
pub fn clean_event_text(text: &str) -> String {
    unescape_html(&strip_html(text)).replace(" [View]", "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_view_link() {
        let raw = r##"<a href="profiles.php?XID=1">Bob</a> attacked you [<a href="#">View</a>]"##;
        assert_eq!(clean_event_text(raw), "Bob attacked you");
    }

    #[test]
    fn unescapes_named_and_numeric_entities() {
        assert_eq!(unescape_html("Tom &amp; Jerry&#39;s"), "Tom & Jerry's");
        assert_eq!(unescape_html("&#x41;&lt;b&gt;"), "A<b>");
    }

    #[test]
    fn leaves_unknown_entities() {
        assert_eq!(unescape_html("&nbsp;"), "&nbsp;");
    }
}
