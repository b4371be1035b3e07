//! Parser for `## Related` sections
//!
//! The `## Related` section is the single designated location where the
//! engine reads and writes links. Link targets found here decide which note
//! pairs are already resolved and excluded from candidate generation.

use ahash::{AHashMap, AHashSet};
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::sync::OnceLock;

/// Heading that marks the designated link section
pub const RELATED_HEADING: &str = "## Related";

fn heading_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // [ \t]* rather than \s* so the match never swallows the newline:
    // the heading end offset doubles as the section body start
    RE.get_or_init(|| Regex::new(r"(?m)^## Related[ \t]*$").unwrap())
}

fn section_end_pattern() -> &'static Regex {
    // Section ends at the next heading of ##-level or higher
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^#{1,2} ").unwrap())
}

fn link_pattern() -> &'static Regex {
    // List entries in the form: - [Display Text](<Target%20Path.md>)
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"- \[.*?\]\(<(.+?)>\)").unwrap())
}

/// Extract the character range of the `## Related` section body, if present.
///
/// The range starts after the heading line and ends at the next heading of
/// equal-or-higher level, or end of file.
pub(crate) fn related_section_span(content: &str) -> Option<(usize, usize)> {
    let heading = heading_pattern().find(content)?;
    let start = heading.end();
    let end = section_end_pattern()
        .find(&content[start..])
        .map(|m| start + m.start())
        .unwrap_or(content.len());
    Some((start, end))
}

/// Extract linked note paths from a note's `## Related` section.
///
/// Only links inside the section are considered. Percent-encoded targets
/// are decoded; malformed entries are skipped, and a missing or corrupt
/// section yields an empty list rather than an error. Duplicates collapse.
pub fn parse_related_links(content: &str) -> Vec<String> {
    let Some((start, end)) = related_section_span(content) else {
        return Vec::new();
    };
    let section = &content[start..end];

    let mut seen = AHashSet::new();
    let mut links = Vec::new();
    for cap in link_pattern().captures_iter(section) {
        let raw = &cap[1];
        let decoded = percent_decode_str(raw)
            .decode_utf8()
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| raw.to_string());
        if seen.insert(decoded.clone()) {
            links.push(decoded);
        }
    }
    links
}

/// Identify bidirectionally linked note pairs from `## Related` sections.
///
/// A pair is included only when A's section links to B *and* B's section
/// links to A. Returned keys are canonically sorted `(a, b)` with `a < b`.
pub fn mutual_link_pairs<'a, I>(notes: I) -> AHashSet<(String, String)>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut link_map: AHashMap<String, AHashSet<String>> = AHashMap::new();
    for (path, content) in notes {
        let linked = parse_related_links(content);
        if !linked.is_empty() {
            link_map.insert(path.to_string(), linked.into_iter().collect());
        }
    }

    let mut pairs = AHashSet::new();
    for (source, targets) in &link_map {
        for target in targets {
            let reciprocal = link_map
                .get(target)
                .map(|back| back.contains(source))
                .unwrap_or(false);
            if reciprocal {
                let (a, b) = if source < target {
                    (source.clone(), target.clone())
                } else {
                    (target.clone(), source.clone())
                };
                pairs.insert((a, b));
            }
        }
    }
    pairs
}
