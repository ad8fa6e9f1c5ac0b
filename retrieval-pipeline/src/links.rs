//! Wikilink extraction for exclusion-set construction.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

fn wikilink_regex() -> &'static Regex {
    static WIKILINK: OnceLock<Regex> = OnceLock::new();
    WIKILINK.get_or_init(|| {
        Regex::new(r"\[\[([^\]\[|#]+)(?:[|#][^\]\[]*)?\]\]").unwrap_or_else(|err| {
            unreachable!("wikilink pattern failed to compile: {err}")
        })
    })
}

/// Outgoing `[[wikilink]]` targets of a note, deduplicated and in sorted
/// order. Aliases (`[[target|alias]]`) and heading anchors
/// (`[[target#section]]`) resolve to the bare target.
pub fn extract_wikilinks(text: &str) -> Vec<String> {
    let mut targets = BTreeSet::new();
    for capture in wikilink_regex().captures_iter(text) {
        if let Some(target) = capture.get(1) {
            let target = target.as_str().trim();
            if !target.is_empty() {
                targets.insert(target.to_string());
            }
        }
    }
    targets.into_iter().collect()
}

/// Builds the exclusion set for a similarity query about `path`: the note
/// itself, plus (when `exclude_linked`) its outgoing-link targets as
/// `.md` paths.
pub fn exclusion_set(path: &str, note_text: &str, exclude_linked: bool) -> Vec<String> {
    let mut excluded = vec![path.to_string()];
    if exclude_linked {
        for target in extract_wikilinks(note_text) {
            let linked = if target.ends_with(".md") {
                target
            } else {
                format!("{target}.md")
            };
            if linked != path {
                excluded.push(linked);
            }
        }
    }
    excluded
}
