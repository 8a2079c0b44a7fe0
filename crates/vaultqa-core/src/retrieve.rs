//! Section scoring and retrieval.
//!
//! Scores are lexical. For each section the retriever adds up weighted
//! matches of the query's content terms in the title, the file path, and
//! the body. It adds a bonus per alias of the section that occurs in the
//! query, and another when the reduced query appears verbatim in the body.
//! A query that *is* an alias pins its section with
//! [`RetrievalParams::exact_alias_score`]; every other score stays below it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::classify::QueryClass;
use crate::index::VaultIndex;
use crate::models::{Candidate, Section, SectionId};
use crate::text::{contains_phrase, normalize, stem, tokenize};
use crate::vocab::Lexicon;

/// Tunable retrieval and extraction limits.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalParams {
    /// Maximum candidates returned by [`retrieve`].
    pub top_n: usize,
    pub title_weight: f64,
    pub path_weight: f64,
    pub body_weight: f64,
    /// Added once per alias of the section found in the query.
    pub alias_weight: f64,
    /// Added when the reduced query occurs as a phrase in the body.
    pub phrase_bonus: f64,
    /// Score of a section whose alias equals the query.
    pub exact_alias_score: f64,
    /// Sections scored when no alias narrows a price query.
    pub price_pool: usize,
    /// Notes kept from the price pool, ranked by summed section score.
    pub price_top_paths: usize,
    /// Excerpt length for the general route.
    pub max_excerpt_chars: usize,
    /// Maximum inclusion snippets returned by the fallback extractor.
    pub inclusion_limit: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_n: 5,
            title_weight: 3.0,
            path_weight: 2.0,
            body_weight: 1.0,
            alias_weight: 20.0,
            phrase_bonus: 8.0,
            exact_alias_score: 1000.0,
            price_pool: 20,
            price_top_paths: 2,
            max_excerpt_chars: 1600,
            inclusion_limit: 4,
        }
    }
}

/// A content term of a query with its light stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTerm {
    pub token: String,
    pub stem: String,
}

impl QueryTerm {
    fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            stem: stem(token).to_string(),
        }
    }

    /// True if a normalized word matches this term: equal to the token or
    /// its stem, or starting with a stem of at least four characters.
    pub fn matches_word(&self, word: &str) -> bool {
        word == self.token
            || word == self.stem
            || (self.stem.chars().count() >= 4 && word.starts_with(self.stem.as_str()))
    }

    /// True if the token or its stem occurs anywhere in normalized text.
    pub fn occurs_in(&self, normalized_text: &str) -> bool {
        normalized_text.contains(self.token.as_str()) || normalized_text.contains(self.stem.as_str())
    }
}

/// Content terms of a query: normalized tokens minus stopwords and tokens
/// shorter than three characters (unless listed as short-keep), in order
/// of first appearance.
pub fn query_terms(query: &str, lexicon: &Lexicon) -> Vec<QueryTerm> {
    let mut seen = BTreeSet::new();
    let mut terms = Vec::new();
    for token in tokenize(query) {
        if lexicon.is_stopword(&token) {
            continue;
        }
        if token.chars().count() < 3 && !lexicon.is_short_keep(&token) {
            continue;
        }
        if seen.insert(token.clone()) {
            terms.push(QueryTerm::new(&token));
        }
    }
    terms
}

/// The query reduced to its content terms, space-joined.
pub fn reduced_query(query: &str, lexicon: &Lexicon) -> String {
    query_terms(query, lexicon)
        .into_iter()
        .map(|t| t.token)
        .collect::<Vec<_>>()
        .join(" ")
}

fn without_stopwords(normalized: &str, lexicon: &Lexicon) -> String {
    normalized
        .split(' ')
        .filter(|t| !t.is_empty() && !lexicon.is_stopword(t))
        .collect::<Vec<_>>()
        .join(" ")
}

fn count_matches(words: &[String], terms: &[QueryTerm]) -> usize {
    terms
        .iter()
        .map(|term| words.iter().filter(|w| term.matches_word(w)).count())
        .sum()
}

/// Precomputed per-query state shared across all scored sections.
struct QueryScorer<'q> {
    terms: Vec<QueryTerm>,
    reduced: String,
    hit_aliases: BTreeSet<&'q str>,
    exact: BTreeSet<SectionId>,
}

impl<'q> QueryScorer<'q> {
    fn new(query: &str, index: &'q VaultIndex, lexicon: &Lexicon) -> Self {
        let normalized = normalize(query);
        let hit_aliases = index
            .alias_hits(&normalized)
            .into_iter()
            .map(|h| h.alias)
            .collect();
        let mut exact = BTreeSet::new();
        for candidate in [normalized.clone(), without_stopwords(&normalized, lexicon)] {
            if let Some(ids) = index.aliases().exact(&candidate) {
                exact.extend(ids.iter().copied());
            }
        }
        Self {
            terms: query_terms(query, lexicon),
            reduced: reduced_query(query, lexicon),
            hit_aliases,
            exact,
        }
    }

    fn score(&self, section: &Section, index: &VaultIndex, params: &RetrievalParams) -> f64 {
        if self.exact.contains(&section.id) {
            return params.exact_alias_score;
        }
        let Some(terms) = index.terms(section.id) else {
            return 0.0;
        };
        let mut score = params.title_weight * count_matches(&terms.title, &self.terms) as f64
            + params.path_weight * count_matches(&terms.path, &self.terms) as f64
            + params.body_weight * count_matches(&terms.body, &self.terms) as f64;
        let alias_hits = section
            .aliases
            .iter()
            .filter(|a| self.hit_aliases.contains(a.as_str()))
            .count();
        score += params.alias_weight * alias_hits as f64;
        if !self.reduced.is_empty() && contains_phrase(&terms.body_text, &self.reduced) {
            score += params.phrase_bonus;
        }
        score.min(params.exact_alias_score - 1.0).max(0.0)
    }
}

/// Score the given sections against a query and return the best `limit`
/// with a positive score, highest first, ties in document order.
pub fn rank_sections<'a, I>(
    sections: I,
    query: &str,
    index: &'a VaultIndex,
    params: &RetrievalParams,
    lexicon: &Lexicon,
    limit: usize,
) -> Vec<Candidate<'a>>
where
    I: IntoIterator<Item = &'a Section>,
{
    let scorer = QueryScorer::new(query, index, lexicon);
    let mut scored: Vec<Candidate<'a>> = sections
        .into_iter()
        .map(|section| Candidate {
            section,
            score: scorer.score(section, index, params),
        })
        .filter(|c| c.score > 0.0)
        .collect();
    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.section.id.cmp(&b.section.id))
    });
    scored.truncate(limit);
    scored
}

/// Candidate sections for a classified query. Queries that are not
/// info-seeking never reach the index.
pub fn retrieve<'a>(
    query: &str,
    class: &QueryClass,
    index: &'a VaultIndex,
    params: &RetrievalParams,
    lexicon: &Lexicon,
) -> Vec<Candidate<'a>> {
    if !class.is_info_seeking {
        return Vec::new();
    }
    rank_sections(index.sections(), query, index, params, lexicon, params.top_n)
}

/// The section pool a price query is extracted from.
#[derive(Debug, Clone)]
pub struct PriceCandidates<'a> {
    pub sections: Vec<&'a Section>,
    /// True when the pool came from alias hits rather than scoring.
    pub via_alias: bool,
    /// Notes the pool was expanded from.
    pub paths: Vec<String>,
}

/// Notes ranked by the summed score of their candidate sections.
fn top_paths(candidates: &[Candidate<'_>], limit: usize) -> Vec<String> {
    let mut sums: BTreeMap<&str, f64> = BTreeMap::new();
    for c in candidates {
        *sums.entry(c.section.file_path.as_str()).or_default() += c.score;
    }
    let mut ranked: Vec<(&str, f64)> = sums.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(p, _)| p.to_string())
        .collect()
}

/// Select the sections to extract prices from.
///
/// If aliases occur in the query, the pool is every section of the notes
/// owning the hit sections. Otherwise the reduced query is scored over
/// the whole index and the best [`RetrievalParams::price_top_paths`] notes
/// are expanded to all their sections.
pub fn price_candidate_sections<'a>(
    query: &str,
    index: &'a VaultIndex,
    params: &RetrievalParams,
    lexicon: &Lexicon,
) -> PriceCandidates<'a> {
    let hits = index.alias_hits(&normalize(query));
    if !hits.is_empty() {
        let mut paths: Vec<String> = hits
            .iter()
            .flat_map(|h| h.sections.iter())
            .filter_map(|id| index.section(*id))
            .map(|s| s.file_path.clone())
            .collect();
        paths.sort();
        paths.dedup();
        return PriceCandidates {
            sections: index.sections_for_paths(&paths),
            via_alias: true,
            paths,
        };
    }

    let reduced = reduced_query(query, lexicon);
    let scoring_query = if reduced.is_empty() { query } else { &reduced };
    let scored = rank_sections(
        index.sections(),
        scoring_query,
        index,
        params,
        lexicon,
        params.price_pool,
    );
    let paths = top_paths(&scored, params.price_top_paths);
    let mut sections = index.sections_for_paths(&paths);
    if sections.is_empty() {
        sections = scored.iter().map(|c| c.section).collect();
    }
    PriceCandidates {
        sections,
        via_alias: false,
        paths,
    }
}
