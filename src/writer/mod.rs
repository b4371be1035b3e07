//! Link writer - applies accepted links to note files
//!
//! Strictly sequential state machine per document:
//! PREVIEW -> CONFIRMED -> WRITTEN (or the preview is dropped, ABORTED).
//! The only filesystem writes in the engine happen here, always as a
//! temp-file-then-atomic-rename so the original is never observed
//! half-written. Every apply appends one audit entry, no-ops included.
//!
//! A pair needs two independent WRITTEN outcomes, one per side. If the
//! process dies between them, re-running apply on the remaining side is
//! safe: the already-written side resolves to a distinguishable no-op.

use crate::error::{LinkerError, Result};
use crate::markdown::{note_title, parse_related_links, related_section_span, RELATED_HEADING};
use crate::storage::{AuditAction, Database};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Characters percent-encoded in link targets. Space and the link
/// delimiters must be escaped for the `- [title](<target>)` format to
/// stay parseable.
const TARGET_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'<')
    .add(b'>')
    .add(b'(')
    .add(b')')
    .add(b'%')
    .add(b'#')
    .add(b'?');

/// What the preview determined needs to happen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    /// The link is missing and will be inserted
    Insert,
    /// The link already exists; applying is an idempotent no-op
    NoOp,
}

/// Computed mutation for one document (PREVIEW state).
///
/// Dropping a preview without confirming aborts it; nothing is written.
#[derive(Debug, Clone)]
pub struct LinkPreview {
    /// Relative path of the note to mutate
    pub path: String,
    /// Relative path of the link target
    pub target: String,
    /// The exact list entry that will be (or already is) in the section
    pub link_line: String,
    pub action: PlannedAction,
    original: String,
    updated: String,
}

impl LinkPreview {
    /// The full content the file will have after apply
    pub fn updated_content(&self) -> &str {
        &self.updated
    }

    /// Explicit confirmation, one token per document. There is no way to
    /// approve both sides of a pair in one step.
    pub fn confirm(self) -> ConfirmedLink {
        ConfirmedLink { preview: self }
    }
}

/// A confirmed mutation, ready to apply (CONFIRMED state)
#[derive(Debug)]
pub struct ConfirmedLink {
    preview: LinkPreview,
}

/// Result of an apply (WRITTEN state)
#[derive(Debug, Clone)]
pub struct WriteReport {
    pub path: String,
    pub target: String,
    /// `LinkInserted` for a real write, `LinkNoop` when nothing changed
    pub action: AuditAction,
}

/// Applies link insertions to note files under a vault root
pub struct LinkWriter<'a> {
    vault_root: &'a Path,
    db: &'a Database,
}

impl<'a> LinkWriter<'a> {
    pub fn new(vault_root: &'a Path, db: &'a Database) -> Self {
        Self { vault_root, db }
    }

    /// Format the list entry recorded in the `## Related` section:
    /// display text is the target's title, the target path is
    /// percent-encoded.
    pub fn format_link_line(target: &str) -> String {
        let encoded = utf8_percent_encode(target, TARGET_ENCODE_SET);
        format!("- [{}](<{}>)", note_title(target), encoded)
    }

    /// Compute the exact mutation that would insert a link to `target`
    /// into `path`'s `## Related` section. Nothing is written.
    pub fn preview(&self, path: &str, target: &str) -> Result<LinkPreview> {
        let full_path = self.vault_root.join(path);
        let original = fs::read_to_string(&full_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LinkerError::NoteNotFound {
                    path: full_path.clone(),
                }
            } else {
                LinkerError::Io {
                    source: e,
                    context: format!("Failed to read note: {}", full_path.display()),
                }
            }
        })?;

        let link_line = Self::format_link_line(target);

        // Already linked (by decoded target, so encoding differences or a
        // hand-written entry still count) -> idempotent no-op
        if parse_related_links(&original).iter().any(|t| t == target) {
            return Ok(LinkPreview {
                path: path.to_string(),
                target: target.to_string(),
                link_line,
                action: PlannedAction::NoOp,
                updated: original.clone(),
                original,
            });
        }

        let updated = insert_link(&original, &link_line);

        // Structural invariant: everything outside the Related section
        // must be untouched. Checked on the computed text itself, not
        // trusted from the insertion logic.
        if !only_related_section_changed(&original, &updated) {
            return Err(LinkerError::SectionViolation {
                path: PathBuf::from(path),
            });
        }

        Ok(LinkPreview {
            path: path.to_string(),
            target: target.to_string(),
            link_line,
            action: PlannedAction::Insert,
            original,
            updated,
        })
    }

    /// Apply a confirmed mutation: write a temp file in the note's
    /// directory, fsync, atomically rename over the original, and append
    /// an audit entry. On any failure the original file is untouched and
    /// the error is scoped to this document only.
    pub fn apply(&self, confirmed: ConfirmedLink) -> Result<WriteReport> {
        let preview = confirmed.preview;
        let full_path = self.vault_root.join(&preview.path);
        let detail = serde_json::json!({
            "target": preview.target,
            "line": preview.link_line,
        })
        .to_string();

        if preview.action == PlannedAction::NoOp {
            self.db
                .append_audit(&preview.path, AuditAction::LinkNoop, &detail)?;
            tracing::debug!("Link already present in {}, no write", preview.path);
            return Ok(WriteReport {
                path: preview.path,
                target: preview.target,
                action: AuditAction::LinkNoop,
            });
        }

        // Guard against the file moving under us between preview and
        // apply. A file that already holds the updated content (an
        // interrupted earlier apply that completed the rename) is a no-op.
        let current = fs::read_to_string(&full_path).map_err(|e| LinkerError::Io {
            source: e,
            context: format!("Failed to re-read note: {}", full_path.display()),
        })?;
        if current == preview.updated {
            self.db
                .append_audit(&preview.path, AuditAction::LinkNoop, &detail)?;
            return Ok(WriteReport {
                path: preview.path,
                target: preview.target,
                action: AuditAction::LinkNoop,
            });
        }
        if current != preview.original {
            return Err(LinkerError::NoteChanged {
                path: PathBuf::from(&preview.path),
            });
        }

        self.write_atomic(&full_path, &preview.updated)?;
        self.db
            .append_audit(&preview.path, AuditAction::LinkInserted, &detail)?;

        tracing::info!("Inserted link to {} in {}", preview.target, preview.path);
        Ok(WriteReport {
            path: preview.path,
            target: preview.target,
            action: AuditAction::LinkInserted,
        })
    }

    /// Temp-file-then-rename write. The temp file lives in the same
    /// directory as the target so the rename never crosses filesystems.
    fn write_atomic(&self, path: &Path, content: &str) -> Result<()> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| LinkerError::Config(format!("Invalid note path: {:?}", path)))?;
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0);
        let temp_path = path.with_file_name(format!("{}.tmp.{}", file_name, nanos));

        let result = (|| -> Result<()> {
            let mut file = fs::File::create(&temp_path).map_err(|e| LinkerError::Io {
                source: e,
                context: format!("Failed to create temp file: {}", temp_path.display()),
            })?;
            file.write_all(content.as_bytes())
                .map_err(|e| LinkerError::Io {
                    source: e,
                    context: format!("Failed to write temp file: {}", temp_path.display()),
                })?;
            file.sync_all().map_err(|e| LinkerError::Io {
                source: e,
                context: format!("Failed to sync temp file: {}", temp_path.display()),
            })?;
            drop(file);

            fs::rename(&temp_path, path).map_err(|e| LinkerError::Io {
                source: e,
                context: format!(
                    "Failed to rename temp file over note: {} -> {}",
                    temp_path.display(),
                    path.display()
                ),
            })
        })();

        if result.is_err() {
            // The original is intact; only the temp file may be left over
            let _ = fs::remove_file(&temp_path);
        }
        result
    }
}

/// Insert `link_line` as the last item of the `## Related` section,
/// creating the section at end of file when absent. All existing content
/// is carried over verbatim.
fn insert_link(content: &str, link_line: &str) -> String {
    match related_section_span(content) {
        Some((start, end)) => {
            let body = &content[start..end];
            let insert_at = start + body.trim_end().len();
            // Blank line after the heading for a previously empty section
            let separator = if body.trim().is_empty() { "\n\n" } else { "\n" };

            let mut updated =
                String::with_capacity(content.len() + separator.len() + link_line.len());
            updated.push_str(&content[..insert_at]);
            updated.push_str(separator);
            updated.push_str(link_line);
            updated.push_str(&content[insert_at..]);
            updated
        }
        None => {
            let mut updated = String::with_capacity(
                content.len() + RELATED_HEADING.len() + link_line.len() + 5,
            );
            updated.push_str(content);
            if !content.is_empty() {
                if content.ends_with('\n') {
                    updated.push('\n');
                } else {
                    updated.push_str("\n\n");
                }
            }
            updated.push_str(RELATED_HEADING);
            updated.push_str("\n\n");
            updated.push_str(link_line);
            updated.push('\n');
            updated
        }
    }
}

/// True when `original` and `updated` agree on everything outside the
/// `## Related` section (heading included). Trailing whitespace at the
/// splice points is ignored; all other bytes must match.
fn only_related_section_changed(original: &str, updated: &str) -> bool {
    outside_related_section(original).trim_end() == outside_related_section(updated).trim_end()
}

/// Content with the whole `## Related` section (heading line + body)
/// removed
fn outside_related_section(content: &str) -> String {
    match related_section_span(content) {
        Some((body_start, end)) => {
            // Walk back from the body start to the beginning of the
            // heading line
            let heading_start = content[..body_start]
                .rfind('\n')
                .map(|pos| pos + 1)
                .unwrap_or(0);
            let mut outside = String::with_capacity(content.len());
            outside.push_str(&content[..heading_start]);
            outside.push_str(&content[end..]);
            outside
        }
        None => content.to_string(),
    }
}
