//! Document preprocessing that never moves a byte.
//!
//! Both transforms are offset-transparent: stripping the metadata fence
//! reports the removed prefix length so it can be added back to offsets,
//! and URL blanking substitutes byte-for-byte so nothing after a URL
//! shifts.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

const FENCE: &str = "---";

/// Strips a leading `---`-fenced metadata block.
///
/// The fence must open at the very start of the document and close with a
/// line consisting of `---`. Returns the remaining body and the number of
/// bytes removed; a document without a complete fence comes back whole
/// with a removed length of zero.
pub fn strip_metadata_block(text: &str) -> (&str, usize) {
    let Some(rest) = text.strip_prefix(FENCE) else {
        return (text, 0);
    };
    let Some(after_open) = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n')) else {
        return (text, 0);
    };

    let mut removed = text.len() - after_open.len();
    for line in after_open.split_inclusive('\n') {
        removed += line.len();
        if line.trim_end_matches(['\r', '\n']) == FENCE {
            let body = text.get(removed..).unwrap_or("");
            return (body, removed);
        }
    }

    // Unterminated fence: treat the document as plain text.
    (text, 0)
}

fn url_regex() -> &'static Regex {
    static URL: OnceLock<Regex> = OnceLock::new();
    URL.get_or_init(|| {
        Regex::new(r#"(?i)\bhttps?://[^\s<>()\[\]"']+"#).unwrap_or_else(|err| {
            // A malformed literal pattern is a programming error.
            unreachable!("url pattern failed to compile: {err}")
        })
    })
}

/// Replaces URL-like substrings with whitespace of identical byte length,
/// so later offsets still index the same positions.
pub fn blank_urls(text: &str) -> Cow<'_, str> {
    let re = url_regex();
    if !re.is_match(text) {
        return Cow::Borrowed(text);
    }

    let mut blanked = String::with_capacity(text.len());
    let mut last = 0;
    for found in re.find_iter(text) {
        blanked.push_str(text.get(last..found.start()).unwrap_or(""));
        for _ in 0..found.len() {
            blanked.push(' ');
        }
        last = found.end();
    }
    blanked.push_str(text.get(last..).unwrap_or(""));

    Cow::Owned(blanked)
}
