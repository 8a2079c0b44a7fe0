//! Filesystem vault scanner.
//!
//! Walks `vault.root`, keeps markdown files matching the include globs and
//! not matching the excludes, and reads them into [`NoteDocument`]s in
//! sorted relative-path order.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use vaultqa_core::index::NoteDocument;
use walkdir::WalkDir;

use crate::config::VaultConfig;

/// Directories never indexed.
const DEFAULT_EXCLUDES: &[&str] = &[
    "**/.git/**",
    "**/target/**",
    "**/node_modules/**",
    "**/.obsidian/**",
    "**/.trash/**",
];

/// Result of one vault walk.
#[derive(Debug, Default)]
pub struct VaultScan {
    pub documents: Vec<NoteDocument>,
    /// Files or directories that were skipped or read lossily.
    pub warnings: Vec<String>,
    /// Matching files found, readable or not.
    pub candidates: usize,
}

pub fn scan_vault(config: &VaultConfig) -> Result<VaultScan> {
    let root = &config.root;
    if !root.exists() {
        bail!("Vault root does not exist: {}", root.display());
    }
    if !root.is_dir() {
        bail!("Vault root is not a directory: {}", root.display());
    }
    if let Err(e) = std::fs::read_dir(root) {
        bail!("Vault root is not readable: {}: {}", root.display(), e);
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&excludes)?;

    let mut scan = VaultScan::default();

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn(&mut scan, format!("skipped unreadable entry: {}", e));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        scan.candidates += 1;
        match read_note(path) {
            Ok((content, lossy)) => {
                if lossy {
                    warn(&mut scan, format!("{}: invalid UTF-8 replaced", rel_str));
                }
                scan.documents.push(NoteDocument::new(rel_str, content));
            }
            Err(e) => warn(&mut scan, format!("{}: skipped: {}", rel_str, e)),
        }
    }

    if scan.candidates > 0 && scan.documents.is_empty() {
        bail!(
            "None of the {} markdown files under {} could be read",
            scan.candidates,
            root.display()
        );
    }

    scan.documents.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(
        root = %root.display(),
        notes = scan.documents.len(),
        warnings = scan.warnings.len(),
        "vault scanned"
    );

    Ok(scan)
}

fn warn(scan: &mut VaultScan, message: String) {
    tracing::warn!("{}", message);
    scan.warnings.push(message);
}

/// Read a note, replacing invalid UTF-8. Returns the text and whether any
/// bytes were replaced.
fn read_note(path: &Path) -> std::io::Result<(String, bool)> {
    let bytes = std::fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok((text, false)),
        Err(e) => Ok((String::from_utf8_lossy(e.as_bytes()).into_owned(), true)),
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
