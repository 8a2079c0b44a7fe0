//! Answer assembly: route a classified query through retrieval and the
//! extractors, and package the result for the formatter.
//!
//! The formatter only ever sees a [`FactSheet`]. Its output is checked by
//! [`verify_rendering`] and completed by [`ensure_sources`], so a reply
//! always carries citations and never numbers that are not in the facts.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use crate::classify::{classify, QueryClass, Route};
use crate::extract::{ExtractionInput, Extractor};
use crate::index::VaultIndex;
use crate::models::{ExtractedRecord, RecordFields, Section, SourceRef};
use crate::retrieve::{price_candidate_sections, rank_sections, retrieve, RetrievalParams};
use crate::text::normalize;
use crate::vocab::Lexicon;

/// Reply when the vault has nothing on the question.
pub const NOT_FOUND_REPLY: &str = "I can't find that in the vault.";

/// Reply to "who are you" questions.
pub const IDENTITY_REPLY: &str = "Jeg hedder Dory, jeg er din digitale praktikant.";

const SOURCES_HEADER: &str = "Sources:";

static LIST_ORDINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\d+[.)]\s").expect("valid ordinal regex"));

/// Extracted facts plus their citations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactSheet {
    pub query: String,
    pub route: Route,
    pub extractor: Extractor,
    pub records: Vec<ExtractedRecord>,
    /// Distinct record sources in record order.
    pub citations: Vec<SourceRef>,
}

/// What the pipeline produced for a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum Assembly {
    Identity,
    SmallTalk,
    NotFound,
    Facts(FactSheet),
}

impl Assembly {
    /// The fixed reply for outcomes that need no formatter.
    pub fn canned_reply(&self) -> Option<&'static str> {
        match self {
            Assembly::Identity => Some(IDENTITY_REPLY),
            Assembly::NotFound => Some(NOT_FOUND_REPLY),
            Assembly::SmallTalk | Assembly::Facts(_) => None,
        }
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            Assembly::Identity => "identity",
            Assembly::SmallTalk => "small-talk",
            Assembly::NotFound => "not-found",
            Assembly::Facts(_) => "facts",
        }
    }
}

impl FactSheet {
    fn new(query: &str, route: Route, extractor: Extractor, records: Vec<ExtractedRecord>) -> Self {
        let mut seen = BTreeSet::new();
        let citations = records
            .iter()
            .map(|r| r.source.clone())
            .filter(|s| seen.insert(s.clone()))
            .collect();
        Self {
            query: query.to_string(),
            route,
            extractor,
            records,
            citations,
        }
    }

    /// Citation strings, `path#heading (lines a-b)`.
    pub fn sources(&self) -> Vec<String> {
        self.citations.iter().map(ToString::to_string).collect()
    }

    /// Deterministic rendering of the facts followed by the sources block.
    pub fn render_plain(&self) -> String {
        let mut out = String::new();
        for record in &self.records {
            match &record.fields {
                RecordFields::SectionExcerpt { excerpt } => {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(&format!(
                        "{}#{}:\n{}\n",
                        record.source.file_path, record.source.heading, excerpt
                    ));
                }
                RecordFields::Count { members, .. } => {
                    out.push_str(&format!("- {}\n", record.summary()));
                    for member in members {
                        out.push_str(&format!("  - {}\n", member));
                    }
                }
                _ => out.push_str(&format!("- {}\n", record.summary())),
            }
        }
        format!("{}\n\n{}", out.trim_end(), citations_block(&self.citations))
    }

    /// Every number the facts, their citations, and the query contain.
    fn supported_numbers(&self) -> BTreeSet<String> {
        let mut texts = vec![self.query.clone()];
        for record in &self.records {
            texts.push(record.summary());
            match &record.fields {
                RecordFields::InclusionSnippet { excerpt, .. } => texts.push(excerpt.clone()),
                RecordFields::Count { members, count, .. } => {
                    texts.extend(members.iter().cloned());
                    texts.push(count.to_string());
                }
                _ => {}
            }
        }
        texts.extend(self.sources());
        texts.iter().flat_map(|t| Lexicon::numbers_in(t)).collect()
    }
}

/// `Sources:` followed by one `- citation` line per source.
pub fn citations_block(citations: &[SourceRef]) -> String {
    let mut out = String::from(SOURCES_HEADER);
    for citation in citations {
        out.push_str("\n- ");
        out.push_str(&citation.to_string());
    }
    out
}

/// Citation lines listed under a `Sources:` header in formatted text.
pub fn parse_sources(text: &str) -> Vec<String> {
    let mut sources = Vec::new();
    let mut capture = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with(SOURCES_HEADER) {
            capture = true;
            continue;
        }
        if !capture {
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }
        match trimmed.strip_prefix('-') {
            Some(source) => sources.push(source.trim().to_string()),
            None => break,
        }
    }
    sources
}

/// Make sure a formatted reply ends with the sources block.
///
/// A reply that already lists sources is returned unchanged. Otherwise any
/// dangling `Sources:` header is cut and the full block appended. Returns
/// the reply and the cited sources.
pub fn ensure_sources(response: &str, sheet: &FactSheet) -> (String, Vec<String>) {
    let listed = parse_sources(response);
    if !listed.is_empty() {
        return (response.to_string(), listed);
    }
    let base = response
        .split(SOURCES_HEADER)
        .next()
        .unwrap_or_default()
        .trim_end();
    if sheet.citations.is_empty() {
        return (base.to_string(), Vec::new());
    }
    let reply = format!("{}\n\n{}", base, citations_block(&sheet.citations));
    (reply.trim_start().to_string(), sheet.sources())
}

/// Reject formatter output that states numbers the facts do not contain.
///
/// List ordinals at the start of a line (`1.`, `2)`) are ignored. Returns
/// the unsupported numbers on failure.
pub fn verify_rendering(rendered: &str, sheet: &FactSheet) -> Result<(), Vec<String>> {
    let supported = sheet.supported_numbers();
    let body = LIST_ORDINAL.replace_all(rendered, "");
    let mut unsupported: Vec<String> = Lexicon::numbers_in(&body)
        .into_iter()
        .filter(|n| !supported.contains(n))
        .collect();
    unsupported.sort();
    unsupported.dedup();
    if unsupported.is_empty() {
        Ok(())
    } else {
        Err(unsupported)
    }
}

fn general_sections<'a>(
    query: &str,
    class: &QueryClass,
    index: &'a VaultIndex,
    params: &RetrievalParams,
    lexicon: &Lexicon,
    candidates: Vec<&'a Section>,
) -> Vec<&'a Section> {
    if !class.references_known_term {
        return candidates;
    }
    let mut paths: Vec<String> = index
        .alias_hits(&normalize(query))
        .iter()
        .flat_map(|h| h.sections.iter())
        .filter_map(|id| index.section(*id))
        .map(|s| s.file_path.clone())
        .collect();
    paths.sort();
    paths.dedup();
    let ranked = rank_sections(
        index.sections_for_paths(&paths),
        query,
        index,
        params,
        lexicon,
        params.top_n,
    );
    if ranked.is_empty() {
        candidates
    } else {
        ranked.into_iter().map(|c| c.section).collect()
    }
}

/// Run the pipeline for an already classified query.
pub fn assemble_classified(
    query: &str,
    class: &QueryClass,
    index: &VaultIndex,
    lexicon: &Lexicon,
    params: &RetrievalParams,
) -> Assembly {
    let route = class.route();
    match route {
        Route::Identity => return Assembly::Identity,
        Route::SmallTalk => return Assembly::SmallTalk,
        _ => {}
    }

    let candidates = retrieve(query, class, index, params, lexicon);
    if candidates.is_empty() {
        return Assembly::NotFound;
    }

    let (sections, filter_by_query) = match route {
        Route::Price => {
            let pool = price_candidate_sections(query, index, params, lexicon);
            (pool.sections, !pool.via_alias)
        }
        Route::General => {
            let sections = candidates.iter().map(|c| c.section).collect();
            (
                general_sections(query, class, index, params, lexicon, sections),
                false,
            )
        }
        _ => (Vec::new(), false),
    };

    let input = ExtractionInput {
        sections: &sections,
        query,
        filter_by_query,
        count_section: index.count_section(),
        max_excerpt_chars: params.max_excerpt_chars,
        inclusion_limit: params.inclusion_limit,
    };

    let Some(mut extractor) = Extractor::for_route(route) else {
        return Assembly::SmallTalk;
    };
    let mut records = extractor.run(&input, lexicon);
    while records.is_empty() {
        let Some(next) = extractor.fallback() else {
            break;
        };
        extractor = next;
        records = extractor.run(&input, lexicon);
    }

    if records.is_empty() {
        return Assembly::NotFound;
    }
    Assembly::Facts(FactSheet::new(query, route, extractor, records))
}

/// Classify a query and run the pipeline.
pub fn assemble(
    query: &str,
    index: &VaultIndex,
    lexicon: &Lexicon,
    params: &RetrievalParams,
) -> Assembly {
    let class = classify(query, index, lexicon);
    assemble_classified(query, &class, index, lexicon, params)
}
