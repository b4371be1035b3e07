//! Vault scanner - enumerates markdown notes under a vault root
//!
//! This is the corpus collaborator: the rest of the engine never discovers
//! files itself, it only sees the notes returned here.

use crate::error::{LinkerError, Result};
use crate::vault::Note;
use std::fs;
use std::path::{Path, PathBuf};

/// Scan a vault directory for markdown notes.
///
/// Recursively finds `.md` files under `root`, skipping any directory whose
/// name appears in `excluded_dirs` (internal state directories such as
/// `.obsidian`). Files that cannot be read or are not valid UTF-8 are
/// skipped with a warning, never fatal to the scan.
///
/// Returns notes sorted by relative path.
pub fn scan_vault(root: &Path, excluded_dirs: &[String]) -> Result<Vec<Note>> {
    if !root.is_dir() {
        return Err(LinkerError::VaultNotFound {
            path: root.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    collect_markdown_files(root, root, excluded_dirs, &mut files)?;
    files.sort();

    let mut notes = Vec::with_capacity(files.len());
    for relative in files {
        let full_path = root.join(&relative);
        match fs::read_to_string(&full_path) {
            Ok(content) => {
                notes.push(Note::new(path_to_string(&relative), content));
            }
            Err(e) => {
                tracing::warn!(
                    "Skipping unreadable note {}: {}",
                    full_path.display(),
                    e
                );
            }
        }
    }

    tracing::info!("Scanned vault: {} notes in {}", notes.len(), root.display());
    Ok(notes)
}

fn collect_markdown_files(
    root: &Path,
    dir: &Path,
    excluded_dirs: &[String],
    out: &mut Vec<PathBuf>,
) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| LinkerError::Io {
        source: e,
        context: format!("Failed to read directory: {}", dir.display()),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| LinkerError::Io {
            source: e,
            context: format!("Failed to read directory entry in {}", dir.display()),
        })?;
        let path = entry.path();

        if path.is_dir() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if excluded_dirs.iter().any(|d| d.as_str() == name) {
                continue;
            }
            collect_markdown_files(root, &path, excluded_dirs, out)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("md") {
            if let Ok(relative) = path.strip_prefix(root) {
                out.push(relative.to_path_buf());
            }
        }
    }

    Ok(())
}

/// Convert a relative path to the canonical string form used as a note key.
/// Always uses forward slashes so keys are stable across platforms.
fn path_to_string(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
