//! Markdown text preparation
//!
//! Strips formatting noise from note content so the similarity signals see
//! topical text rather than markup, and parses the `## Related` section
//! that records accepted links.

mod related;

pub use related::{mutual_link_pairs, parse_related_links, RELATED_HEADING};
pub(crate) use related::related_section_span;

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

struct StripPatterns {
    frontmatter: Regex,
    fenced_code: Regex,
    inline_code: Regex,
    embed_image: Regex,
    markdown_image: Regex,
    wikilink_aliased: Regex,
    wikilink: Regex,
    markdown_link: Regex,
    heading: Regex,
    bold_italic: Regex,
    underscore_emphasis: Regex,
    strikethrough: Regex,
    blockquote: Regex,
    unordered_list: Regex,
    ordered_list: Regex,
    horizontal_rule: Regex,
    html_tag: Regex,
    blank_runs: Regex,
}

fn patterns() -> &'static StripPatterns {
    static PATTERNS: OnceLock<StripPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| StripPatterns {
        frontmatter: Regex::new(r"(?s)\A---\n.*?\n---\n?").unwrap(),
        fenced_code: Regex::new(r"(?s)```[^\n]*\n.*?```").unwrap(),
        inline_code: Regex::new(r"`([^`]*)`").unwrap(),
        embed_image: Regex::new(r"!\[\[.*?\]\]").unwrap(),
        markdown_image: Regex::new(r"!\[.*?\]\(.*?\)").unwrap(),
        wikilink_aliased: Regex::new(r"\[\[[^|\]]*\|([^\]]*)\]\]").unwrap(),
        wikilink: Regex::new(r"\[\[([^\]]*)\]\]").unwrap(),
        markdown_link: Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap(),
        heading: Regex::new(r"(?m)^#{1,6}\s+").unwrap(),
        bold_italic: Regex::new(r"\*{1,3}(.*?)\*{1,3}").unwrap(),
        underscore_emphasis: Regex::new(r"_{1,3}(.*?)_{1,3}").unwrap(),
        strikethrough: Regex::new(r"~~(.*?)~~").unwrap(),
        blockquote: Regex::new(r"(?m)^>\s?").unwrap(),
        unordered_list: Regex::new(r"(?m)^(\s*)[-*+]\s+").unwrap(),
        ordered_list: Regex::new(r"(?m)^(\s*)\d+\.\s+").unwrap(),
        horizontal_rule: Regex::new(r"(?m)^[-*_]{3,}\s*$").unwrap(),
        html_tag: Regex::new(r"<[^>]+>").unwrap(),
        blank_runs: Regex::new(r"\n{3,}").unwrap(),
    })
}

/// Strip markdown formatting, returning plain text suitable for embedding.
///
/// Order matters: code blocks are removed before link patterns so link
/// syntax inside code never leaks through, and images are removed before
/// plain links so the `![...]` prefix is not left behind.
pub fn strip_markdown(text: &str) -> String {
    let p = patterns();
    let mut result = text.to_string();

    result = p.frontmatter.replace(&result, "").into_owned();
    result = p.fenced_code.replace_all(&result, "").into_owned();
    result = p.inline_code.replace_all(&result, "$1").into_owned();
    result = p.embed_image.replace_all(&result, "").into_owned();
    result = p.markdown_image.replace_all(&result, "").into_owned();
    result = p.wikilink_aliased.replace_all(&result, "$1").into_owned();
    result = p.wikilink.replace_all(&result, "$1").into_owned();
    result = p.markdown_link.replace_all(&result, "$1").into_owned();
    result = p.heading.replace_all(&result, "").into_owned();
    result = p.bold_italic.replace_all(&result, "$1").into_owned();
    result = p
        .underscore_emphasis
        .replace_all(&result, "$1")
        .into_owned();
    result = p.strikethrough.replace_all(&result, "$1").into_owned();
    result = p.blockquote.replace_all(&result, "").into_owned();
    result = p.unordered_list.replace_all(&result, "$1").into_owned();
    result = p.ordered_list.replace_all(&result, "$1").into_owned();
    result = p.horizontal_rule.replace_all(&result, "").into_owned();
    result = p.html_tag.replace_all(&result, "").into_owned();
    result = p.blank_runs.replace_all(&result, "\n\n").into_owned();

    result.trim().to_string()
}

/// Prepare note text for the similarity signals: strip markdown and prepend
/// the note title for a strong topical anchor.
pub fn prepare_for_embedding(title: &str, content: &str) -> String {
    let stripped = strip_markdown(content);
    if stripped.is_empty() {
        title.to_string()
    } else {
        format!("{}\n\n{}", title, stripped)
    }
}

/// Derive a note's display title from its relative path (the file stem).
pub fn note_title(relative_path: &str) -> String {
    Path::new(relative_path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| relative_path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_frontmatter() {
        let text = "---\ntags: [a, b]\n---\nBody text";
        assert_eq!(strip_markdown(text), "Body text");
    }

    #[test]
    fn test_strip_code_blocks() {
        let text = "Before\n```rust\nfn main() {}\n```\nAfter";
        let stripped = strip_markdown(text);
        assert!(!stripped.contains("fn main"));
        assert!(stripped.contains("Before"));
        assert!(stripped.contains("After"));
    }

    #[test]
    fn test_strip_inline_code_keeps_content() {
        assert_eq!(strip_markdown("run `cargo test` now"), "run cargo test now");
    }

    #[test]
    fn test_strip_links_keep_display_text() {
        assert_eq!(strip_markdown("see [the docs](https://x)"), "see the docs");
        assert_eq!(strip_markdown("see [[Page Name]]"), "see Page Name");
        assert_eq!(strip_markdown("see [[Page|alias]]"), "see alias");
    }

    #[test]
    fn test_strip_images_removed_entirely() {
        assert_eq!(strip_markdown("x ![alt](img.png) y"), "x  y");
        assert_eq!(strip_markdown("x ![[embed.png]] y"), "x  y");
    }

    #[test]
    fn test_strip_headings_and_emphasis() {
        let text = "# Title\n\nSome **bold** and _italic_ and ~~gone~~ text";
        assert_eq!(
            strip_markdown(text),
            "Title\n\nSome bold and italic and gone text"
        );
    }

    #[test]
    fn test_strip_list_markers() {
        let text = "- one\n- two\n1. three";
        assert_eq!(strip_markdown(text), "one\ntwo\nthree");
    }

    #[test]
    fn test_prepare_prepends_title() {
        let prepared = prepare_for_embedding("My Note", "# Heading\n\nbody");
        assert!(prepared.starts_with("My Note\n\n"));
        assert!(prepared.contains("body"));
    }

    #[test]
    fn test_prepare_empty_body_is_title_only() {
        assert_eq!(prepare_for_embedding("Just Title", ""), "Just Title");
    }

    #[test]
    fn test_note_title_from_path() {
        assert_eq!(note_title("sub/dir/My Note.md"), "My Note");
        assert_eq!(note_title("Top.md"), "Top");
    }
}
