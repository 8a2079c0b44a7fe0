//! Deterministic extractors.
//!
//! Each extractor reads raw section text and returns source-attributed
//! [`ExtractedRecord`]s, or nothing. None of them mutate their input, and
//! none of them produce text that is not in the vault.
//!
//! | Extractor | Records | Confidence |
//! |-----------|---------|------------|
//! | [`Extractor::PriceItems`] | `price-item` | high |
//! | [`Extractor::InclusionSnippets`] | `inclusion-snippet` | low |
//! | [`Extractor::CategoryCounts`] | `count` | high, or low for link lists |
//! | [`Extractor::SectionExcerpts`] | `section-excerpt` | high |

pub mod count;
pub mod excerpt;
pub mod inclusion;
pub mod price;

use serde::Serialize;

use crate::classify::Route;
use crate::models::{ExtractedRecord, Section};
use crate::vocab::Lexicon;

pub use count::build_brancher_count_snippets;
pub use excerpt::extract_section_excerpts;
pub use inclusion::extract_inclusion_snippets;
pub use price::{extract_price_items, filter_price_items};

/// The closed set of extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Extractor {
    PriceItems,
    InclusionSnippets,
    CategoryCounts,
    SectionExcerpts,
}

/// Inputs an extractor may read.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionInput<'a> {
    pub sections: &'a [&'a Section],
    pub query: &'a str,
    /// Apply query relevance to price items. Off when an alias already
    /// narrowed the sections to the right notes.
    pub filter_by_query: bool,
    pub count_section: Option<&'a Section>,
    pub max_excerpt_chars: usize,
    pub inclusion_limit: usize,
}

impl Extractor {
    /// Primary extractor for a route; `None` for routes without facts.
    pub fn for_route(route: Route) -> Option<Self> {
        match route {
            Route::Count => Some(Self::CategoryCounts),
            Route::Price => Some(Self::PriceItems),
            Route::General => Some(Self::SectionExcerpts),
            Route::Identity | Route::SmallTalk => None,
        }
    }

    /// Extractor to try when this one yields nothing.
    pub fn fallback(&self) -> Option<Self> {
        match self {
            Self::PriceItems => Some(Self::InclusionSnippets),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PriceItems => "price-items",
            Self::InclusionSnippets => "inclusion-snippets",
            Self::CategoryCounts => "category-counts",
            Self::SectionExcerpts => "section-excerpts",
        }
    }

    pub fn run(&self, input: &ExtractionInput<'_>, lexicon: &Lexicon) -> Vec<ExtractedRecord> {
        match self {
            Self::PriceItems => {
                let items = extract_price_items(input.sections, lexicon);
                let query = input.filter_by_query.then_some(input.query);
                filter_price_items(items, query, lexicon)
            }
            Self::InclusionSnippets => extract_inclusion_snippets(
                input.sections,
                input.query,
                lexicon,
                input.inclusion_limit,
            ),
            Self::CategoryCounts => build_brancher_count_snippets(input.count_section),
            Self::SectionExcerpts => extract_section_excerpts(input.sections, input.max_excerpt_chars),
        }
    }
}

impl std::fmt::Display for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_map_to_extractors() {
        assert_eq!(Extractor::for_route(Route::Price), Some(Extractor::PriceItems));
        assert_eq!(Extractor::for_route(Route::Identity), None);
        assert_eq!(
            Extractor::PriceItems.fallback(),
            Some(Extractor::InclusionSnippets)
        );
        assert_eq!(Extractor::SectionExcerpts.fallback(), None);
    }
}
