//! Ranked section search over the current index.
//!
//! Uses the same scoring as answer retrieval but ranks every section, so it
//! also works for queries the classifier would not treat as questions.

use serde::Serialize;
use vaultqa_core::index::VaultIndex;
use vaultqa_core::retrieve::{rank_sections, RetrievalParams};
use vaultqa_core::vocab::Lexicon;

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub score: f64,
    pub file_path: String,
    pub heading: String,
    pub line_start: usize,
    pub line_end: usize,
    pub snippet: String,
}

const SNIPPET_CHARS: usize = 120;

pub fn search_sections(
    index: &VaultIndex,
    query: &str,
    params: &RetrievalParams,
    lexicon: &Lexicon,
    limit: usize,
) -> Vec<SearchHit> {
    rank_sections(index.sections().iter(), query, index, params, lexicon, limit)
        .into_iter()
        .map(|c| SearchHit {
            score: c.score,
            file_path: c.section.file_path.clone(),
            heading: c.section.title.clone(),
            line_start: c.section.line_start,
            line_end: c.section.line_end,
            snippet: snippet(&c.section.body),
        })
        .collect()
}

/// First non-blank body line, shortened.
fn snippet(body: &str) -> String {
    let line = body.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    if line.chars().count() <= SNIPPET_CHARS {
        line.to_string()
    } else {
        let cut: String = line.chars().take(SNIPPET_CHARS).collect();
        format!("{}...", cut)
    }
}

pub fn run_search(
    index: &VaultIndex,
    query: &str,
    params: &RetrievalParams,
    lexicon: &Lexicon,
    limit: Option<usize>,
) {
    if query.trim().is_empty() {
        println!("No results.");
        return;
    }

    let hits = search_sections(index, query, params, lexicon, limit.unwrap_or(params.top_n));
    if hits.is_empty() {
        println!("No results.");
        return;
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.2}] {}#{} (lines {}-{})",
            i + 1,
            hit.score,
            hit.file_path,
            hit.heading,
            hit.line_start,
            hit.line_end
        );
        if !hit.snippet.is_empty() {
            println!("    {}", hit.snippet);
        }
    }
}
