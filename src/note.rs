//! Per-note inspection: sections, line ranges, and aliases.
//!
//! Used by `vqa note <path>` to check how a note was split and which names
//! reach it.

use anyhow::{bail, Result};
use serde::Serialize;
use vaultqa_core::index::VaultIndex;

#[derive(Debug, Clone, Serialize)]
pub struct NoteReport {
    pub path: String,
    pub title: String,
    pub sections: Vec<SectionReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionReport {
    pub id: usize,
    pub title: String,
    pub level: u8,
    pub line_start: usize,
    pub line_end: usize,
    pub primary: bool,
    pub aliases: Vec<String>,
}

/// Look a note up by vault path, with or without `.md`, or by file stem.
pub fn describe_note(index: &VaultIndex, path: &str) -> Result<NoteReport> {
    let path = path.trim().trim_start_matches("./");
    let Some(note_idx) = index.resolve_note(path) else {
        bail!("note not found: {}", path);
    };
    let note = &index.notes()[note_idx];

    let sections = index
        .sections_for_paths(&[note.path.as_str()])
        .into_iter()
        .map(|s| SectionReport {
            id: s.id,
            title: s.title.clone(),
            level: s.level,
            line_start: s.line_start,
            line_end: s.line_end,
            primary: note.primary == Some(s.id),
            aliases: s.aliases.iter().cloned().collect(),
        })
        .collect();

    Ok(NoteReport {
        path: note.path.clone(),
        title: note.title.clone(),
        sections,
    })
}

pub fn run_note(index: &VaultIndex, path: &str) -> Result<()> {
    let note = describe_note(index, path)?;

    println!("--- Note ---");
    println!("path:     {}", note.path);
    println!("title:    {}", note.title);
    println!("sections: {}", note.sections.len());
    println!();

    for section in &note.sections {
        let marker = if section.primary { " (primary)" } else { "" };
        let hashes = "#".repeat(section.level as usize);
        let heading = if hashes.is_empty() {
            section.title.clone()
        } else {
            format!("{} {}", hashes, section.title)
        };
        println!("[{}] {}{}", section.id, heading, marker);
        println!("    lines:   {}-{}", section.line_start, section.line_end);
        if !section.aliases.is_empty() {
            println!("    aliases: {}", section.aliases.join(", "));
        }
    }

    Ok(())
}
