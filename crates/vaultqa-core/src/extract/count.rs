//! Category counts from the count index note.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::{Confidence, ExtractedRecord, RecordFields, Section};
use crate::text::{clean_markup, has_letters};

/// Members listed in the wiki-link fallback record.
pub const MAX_MEMBERS: usize = 20;

static COLON_OR_DASH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*+]\s+)?(?P<cat>.+?)\s*(?::|\s[-–]\s)\s*(?P<n>\d+)\s*\.?$")
        .expect("valid count regex")
});
static PARENTHESIZED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*+]\s+)?(?P<cat>.+?)\s*\(\s*(?P<n>\d+)\s*\)\s*\.?$")
        .expect("valid count regex")
});
static WIKI_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[-*+]\s+\[\[(?P<target>[^\]|]+)(?:\|(?P<name>[^\]]+))?\]\]")
        .expect("valid wiki item regex")
});

fn strip_emphasis(line: &str) -> String {
    line.replace("**", "").replace("__", "").replace(['*', '`'], "")
}

fn table_pair(line: &str) -> Option<(String, u64)> {
    let trimmed = line.trim();
    if !trimmed.starts_with('|') {
        return None;
    }
    let cells: Vec<String> = trimmed
        .trim_matches('|')
        .split('|')
        .map(|c| strip_emphasis(c).trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if cells.len() != 2 {
        return None;
    }
    let count = cells[1].parse::<u64>().ok()?;
    let category = clean_markup(&cells[0]);
    has_letters(&category).then_some((category, count))
}

fn line_pair(line: &str) -> Option<(String, u64)> {
    if let Some(pair) = table_pair(line) {
        return Some(pair);
    }
    let plain = strip_emphasis(line.trim());
    let caps = COLON_OR_DASH
        .captures(&plain)
        .or_else(|| PARENTHESIZED.captures(&plain))?;
    let count = caps.name("n")?.as_str().parse::<u64>().ok()?;
    let category = clean_markup(caps.name("cat")?.as_str());
    has_letters(&category).then_some((category, count))
}

/// Category counts listed in a section, in source order.
///
/// Each `Category: N`, `Category - N`, `Category (N)` or `| Category | N |`
/// line yields one high-confidence record. When none exist but the section
/// lists wiki-links, one low-confidence record counts the links. A missing
/// section yields nothing.
pub fn build_brancher_count_snippets(section: Option<&Section>) -> Vec<ExtractedRecord> {
    let Some(section) = section else {
        return Vec::new();
    };

    let explicit: Vec<ExtractedRecord> = section
        .body_lines()
        .filter_map(|(line_no, line)| {
            let (category, count) = line_pair(line)?;
            Some(ExtractedRecord {
                fields: RecordFields::Count {
                    category,
                    count,
                    members: Vec::new(),
                },
                source: section.source_lines(line_no, line_no),
                confidence: Confidence::High,
            })
        })
        .collect();
    if !explicit.is_empty() {
        return explicit;
    }

    let members: Vec<String> = section
        .body_lines()
        .filter_map(|(_, line)| {
            let caps = WIKI_ITEM.captures(line)?;
            let name = caps.name("name").or_else(|| caps.name("target"))?;
            Some(name.as_str().trim().to_string())
        })
        .collect();
    if members.is_empty() {
        return Vec::new();
    }
    vec![ExtractedRecord {
        fields: RecordFields::Count {
            category: section.title.clone(),
            count: members.len() as u64,
            members: members.into_iter().take(MAX_MEMBERS).collect(),
        },
        source: section.source(),
        confidence: Confidence::Low,
    }]
}
