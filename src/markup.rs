//! Markup removal for raw index pages.
//!
//! Record bodies arrive wrapped in presentation markup that must not end
//! up in the bibliography file. Stripping is a pure text transformation:
//! no entity escaping or unescaping is performed, and malformed markup is
//! removed best-effort.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

fn tag_re() -> &'static Regex {
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    // Opening, closing and self-closing tags alike.
    TAG_RE.get_or_init(|| Regex::new(r"</?[A-Za-z][^<>]*>").expect("valid tag pattern"))
}

/// Remove every markup tag from `raw`, leaving the surrounding text and
/// its line structure untouched.
///
/// Runs to a fixpoint so the result never contains a tag, even when
/// removal of an inner tag exposes a new one (`<<b>b>`), which also makes
/// the function idempotent.
pub fn strip_tags(raw: &str) -> String {
    let re = tag_re();
    let mut text = raw.to_string();
    loop {
        match re.replace_all(&text, "") {
            Cow::Borrowed(_) => return text,
            Cow::Owned(next) => text = next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_open_close_and_self_closing() {
        let raw = "a <b>bold</b> and a break<br/> here";
        assert_eq!(strip_tags(raw), "a bold and a break here");
    }

    #[test]
    fn test_keeps_text_and_lines() {
        let raw = "@article{x,\n  <em>title</em> = {T},\n}";
        assert_eq!(strip_tags(raw), "@article{x,\n  title = {T},\n}");
    }

    #[test]
    fn test_strips_nested_and_adjacent_in_one_pass() {
        assert_eq!(strip_tags("<<b>b>text"), "text");
        assert_eq!(strip_tags("<i><b>x</b></i>"), "x");
    }

    #[test]
    fn test_idempotent() {
        for raw in ["<a href=\"x\">y</a>", "<<b>b>t", "no tags", "a < b > c"] {
            let once = strip_tags(raw);
            assert_eq!(strip_tags(&once), once);
        }
    }

    #[test]
    fn test_entities_untouched() {
        assert_eq!(strip_tags("M&amp;M <b>x</b>"), "M&amp;M x");
    }

    #[test]
    fn test_malformed_best_effort() {
        // An unterminated tag has no closing '>' and stays as-is.
        assert_eq!(strip_tags("trailing <b"), "trailing <b");
    }
}
