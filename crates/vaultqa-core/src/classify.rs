//! Lexical query classification.
//!
//! Classification is a pure function of the query text, the vocabulary,
//! and (for known terms and count categories) the index. It decides which
//! extractor route a query takes:
//!
//! | Route | Condition |
//! |-------|-----------|
//! | `identity` | an identity phrase ("who are you") |
//! | `small-talk` | not info-seeking: empty, meta-command, greetings only |
//! | `count` | count phrasing + a category + the count note exists |
//! | `price` | price vocabulary or a currency amount |
//! | `general` | everything else |

use serde::Serialize;

use crate::index::VaultIndex;
use crate::text::{contains_phrase, normalize};
use crate::vocab::Lexicon;

/// Labels attached to a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct QueryClass {
    pub is_identity: bool,
    pub is_info_seeking: bool,
    pub is_price_query: bool,
    pub is_count_query: bool,
    /// Some alias of the index occurs in the query.
    pub references_known_term: bool,
}

/// Extractor route chosen for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Route {
    Identity,
    SmallTalk,
    Count,
    Price,
    General,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Identity => "identity",
            Route::SmallTalk => "small-talk",
            Route::Count => "count",
            Route::Price => "price",
            Route::General => "general",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl QueryClass {
    pub fn route(&self) -> Route {
        if self.is_identity {
            Route::Identity
        } else if !self.is_info_seeking {
            Route::SmallTalk
        } else if self.is_count_query {
            Route::Count
        } else if self.is_price_query {
            Route::Price
        } else {
            Route::General
        }
    }
}

pub fn is_identity_question(query: &str, lexicon: &Lexicon) -> bool {
    lexicon.mentions_identity(&normalize(query))
}

/// Every token is a greeting or courtesy word.
pub fn is_small_talk(query: &str, lexicon: &Lexicon) -> bool {
    let normalized = normalize(query);
    !normalized.is_empty() && normalized.split(' ').all(|t| lexicon.is_small_talk_word(t))
}

/// True unless the query is an identity question, a meta-command, empty, or
/// small talk.
pub fn is_info_seeking(query: &str, lexicon: &Lexicon) -> bool {
    if normalize(query).is_empty() {
        return false;
    }
    !(is_identity_question(query, lexicon)
        || lexicon.is_meta_command(query)
        || is_small_talk(query, lexicon))
}

pub fn is_price_query(query: &str, lexicon: &Lexicon) -> bool {
    lexicon.mentions_price(&normalize(query))
        || lexicon.find_price(query).is_some_and(|m| m.has_currency)
}

/// Count phrasing plus a category the index can count.
pub fn is_count_query(query: &str, index: &VaultIndex, lexicon: &Lexicon) -> bool {
    if index.count_note().is_none() {
        return false;
    }
    let normalized = normalize(query);
    if !lexicon.mentions_count(&normalized) {
        return false;
    }
    lexicon.mentions_category(&normalized)
        || index
            .count_categories()
            .iter()
            .any(|c| contains_phrase(&normalized, c))
}

/// Classify a query.
pub fn classify(query: &str, index: &VaultIndex, lexicon: &Lexicon) -> QueryClass {
    let is_identity = is_identity_question(query, lexicon);
    let is_info_seeking = !is_identity && is_info_seeking(query, lexicon);
    QueryClass {
        is_identity,
        is_info_seeking,
        is_price_query: is_info_seeking && is_price_query(query, lexicon),
        is_count_query: is_info_seeking && is_count_query(query, index, lexicon),
        references_known_term: !index.alias_hits(&normalize(query)).is_empty(),
    }
}
