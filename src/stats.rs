//! Index summary printed by `vqa index`.
//!
//! Shows what was indexed: note, section and alias counts, the designated
//! notes, a per-folder breakdown, and every warning from the build.

use std::collections::BTreeMap;
use std::path::Path;
use vaultqa_core::index::VaultIndex;

use crate::state::RebuildReport;

/// Per top-level folder breakdown.
#[derive(Debug, Default, PartialEq, Eq)]
struct FolderStats {
    notes: usize,
    sections: usize,
}

fn folder_stats(index: &VaultIndex) -> BTreeMap<String, FolderStats> {
    let mut folders: BTreeMap<String, FolderStats> = BTreeMap::new();
    for note in index.notes() {
        let folder = match note.path.split_once('/') {
            Some((top, _)) => top.to_string(),
            None => ".".to_string(),
        };
        let entry = folders.entry(folder).or_default();
        entry.notes += 1;
        entry.sections += note.sections.len();
    }
    folders
}

pub fn run_index_report(root: &Path, report: &RebuildReport, index: &VaultIndex) {
    println!("vaultqa — Index Stats");
    println!("=====================");
    println!();
    println!("  Vault:       {}", root.display());
    println!("  Notes:       {}", report.notes);
    println!("  Sections:    {}", report.sections);
    println!("  Aliases:     {}", report.aliases);
    println!(
        "  Built:       {} ({} ms)",
        report.built_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.duration_ms
    );
    println!("  Fingerprint: {}", short_fingerprint(&report.fingerprint));
    println!();

    println!(
        "  Services index: {}",
        index.services_note().map_or("missing", |n| n.path.as_str())
    );
    match (index.count_note(), index.count_section()) {
        (Some(note), Some(section)) => println!(
            "  Count index:    {}#{} ({} categories)",
            note.path,
            section.title,
            index.count_categories().len()
        ),
        (Some(note), None) => println!("  Count index:    {} (no count section)", note.path),
        (None, _) => println!("  Count index:    missing"),
    }

    let folders = folder_stats(index);
    if !folders.is_empty() {
        println!();
        println!("  By folder:");
        println!("  {:<32} {:>6} {:>9}", "FOLDER", "NOTES", "SECTIONS");
        println!("  {}", "-".repeat(49));
        for (folder, s) in &folders {
            println!("  {:<32} {:>6} {:>9}", folder, s.notes, s.sections);
        }
    }

    if !report.warnings.is_empty() {
        println!();
        println!("  Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("    - {}", warning);
        }
    }

    println!();
}

fn short_fingerprint(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}
