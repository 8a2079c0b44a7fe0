//! Localized vocabulary tables and their compiled form.
//!
//! [`Vocabulary`] is plain data: lists of terms per concern (price words,
//! currency markers, inclusion markers, count phrasing, ...). It
//! deserializes from the `[vocabulary]` configuration table, where every
//! list is optional and falls back to the built-in Danish + English terms.
//!
//! [`Lexicon`] is the compiled, immutable form used at query time. It
//! holds normalized term sets and the price regexes built from the
//! currency lists, so the matching code itself stays language-agnostic.

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::text::{contains_phrase, normalize};

/// Term lists per language concern.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Vocabulary {
    /// Words that mark a question about price or cost.
    pub price_terms: Vec<String>,
    /// Currency words accepted before or after an amount (`kr`, `dkk`).
    pub currency_terms: Vec<String>,
    /// Currency codes matched only as written (`NOK`), for codes that are
    /// also ordinary words in lower case.
    pub currency_codes: Vec<String>,
    /// Currency symbols accepted before or after an amount (`€`, `$`).
    pub currency_symbols: Vec<String>,
    /// Leading words of a per-unit price suffix (`pr`, `per`, `/`).
    pub per_unit_prefixes: Vec<String>,
    /// Markers for "included" / "free of charge" lines.
    pub inclusion_terms: Vec<String>,
    /// "How many" style phrasing.
    pub count_terms: Vec<String>,
    /// Enumerable category words (industries, branches, sectors).
    pub category_terms: Vec<String>,
    /// Phrases that ask who the assistant is.
    pub identity_patterns: Vec<String>,
    /// Greeting and courtesy words; a query made only of these is small talk.
    pub small_talk: Vec<String>,
    /// Prefixes that mark a meta-command rather than a question.
    pub meta_command_prefixes: Vec<String>,
    /// Words ignored when reducing a query to its content terms.
    pub stopwords: Vec<String>,
    /// Short terms (< 3 chars after normalization) that are still kept.
    pub short_keep: Vec<String>,
    /// Labels that never name a package on their own.
    pub label_stop: Vec<String>,
    /// Label prefixes that continue the previous line's label.
    pub continuation_prefixes: Vec<String>,
    /// Organization prefixes stripped from titles to form extra aliases.
    pub brand_prefixes: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            price_terms: strings(&[
                "pris", "priser", "prisen", "price", "prices", "pricing", "pakke", "pakker",
                "package", "packages", "abonnement", "abonnements", "gebyr", "fee", "fees",
                "cost", "costs", "koster", "hvad koster", "kontingent",
            ]),
            currency_terms: strings(&["dkk", "kr", "kroner", "eur", "euro", "usd", "sek"]),
            currency_codes: strings(&["NOK"]),
            currency_symbols: strings(&["€", "$", "£"]),
            per_unit_prefixes: strings(&["/", "pr", "pr.", "per"]),
            inclusion_terms: strings(&[
                "inkl", "inkl.", "inklusive", "inkluderet", "gratis", "medlemskab", "medlem",
                "uden ekstra", "included", "includes", "including", "free of charge",
                "at no extra cost",
            ]),
            count_terms: strings(&["how many", "hvor mange", "antal", "number of", "count"]),
            category_terms: strings(&[
                "branche", "brancher", "industri", "industrier", "industry", "industries",
                "sektor", "sektorer", "sector", "sectors",
            ]),
            identity_patterns: strings(&[
                "hvem er du", "hvad hedder du", "what's your name", "what is your name",
                "who are you",
            ]),
            small_talk: strings(&[
                "hi", "hello", "hey", "hej", "hejsa", "goddag", "godmorgen", "thanks",
                "thank", "you", "tak", "ok", "okay", "bye", "farvel", "cool", "super", "fint",
                "good", "morning", "great",
            ]),
            meta_command_prefixes: strings(&["!", "/"]),
            stopwords: strings(&[
                "hvad", "hvor", "hvem", "hvordan", "det", "for", "til", "et", "en", "den", "der",
                "som", "at", "og", "er", "jeg", "vi", "du", "med", "paa", "pa", "af", "om",
                "the", "what", "where", "how", "does", "do", "is", "are", "a", "an", "of", "it",
                "to", "for", "in", "on", "and", "about", "tell", "me", "please", "can", "you",
                "cost", "costs", "koster", "pris", "priser", "price", "prices", "pricing",
                "pakke", "pakker", "package", "packages", "abonnement", "abonnements",
            ]),
            short_keep: strings(&["gln", "gtin", "gdsn", "sscc", "ai"]),
            label_stop: strings(&[
                "pris", "price", "abonnement", "billedpakker", "certificering", "pakker",
                "pakken", "packages", "total",
            ]),
            continuation_prefixes: strings(&["inkl", "inklusive", "pr", "per", "/"]),
            brand_prefixes: strings(&["gs1", "gs1dk", "gs1 denmark"]),
        }
    }
}

/// Compiled vocabulary: normalized term sets plus price regexes.
#[derive(Debug, Clone)]
pub struct Lexicon {
    vocabulary: Vocabulary,
    price_terms: Vec<String>,
    inclusion_terms: Vec<String>,
    count_terms: Vec<String>,
    category_terms: Vec<String>,
    identity_patterns: Vec<String>,
    small_talk: BTreeSet<String>,
    stopwords: BTreeSet<String>,
    short_keep: BTreeSet<String>,
    label_stop: BTreeSet<String>,
    continuation_prefixes: Vec<String>,
    brand_prefixes: Vec<String>,
    currency_price: Regex,
    bare_price: Option<Regex>,
}

fn normalized(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| normalize(s))
        .filter(|s| !s.is_empty())
        .collect()
}

fn alternation(items: &[String]) -> String {
    let mut escaped: Vec<String> = items
        .iter()
        .map(|s| s.trim().trim_end_matches('.'))
        .filter(|s| !s.is_empty())
        .map(regex::escape)
        .collect();
    // Longest first so `kroner` wins over `kr`.
    escaped.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    escaped.dedup();
    escaped.join("|")
}

impl Lexicon {
    /// Compile a vocabulary. Fails if no currency marker is configured.
    pub fn new(vocabulary: Vocabulary) -> Result<Self> {
        if vocabulary.currency_terms.is_empty()
            && vocabulary.currency_codes.is_empty()
            && vocabulary.currency_symbols.is_empty()
        {
            bail!("vocabulary needs at least one currency term or symbol");
        }

        let terms = alternation(&vocabulary.currency_terms);
        let codes = alternation(&vocabulary.currency_codes);
        let symbols = alternation(&vocabulary.currency_symbols);
        let mut markers = Vec::new();
        if !terms.is_empty() {
            markers.push(format!(r"\b(?:{})\b\.?", terms));
        }
        if !codes.is_empty() {
            markers.push(format!(r"(?-i:\b(?:{})\b)", codes));
        }
        if !symbols.is_empty() {
            markers.push(format!("(?:{})", symbols));
        }
        let marker = markers.join("|");
        let amount = r"\d(?:[\d.,]*\d)?";
        let pattern = format!(
            r"(?i)(?:(?:{marker})\s*(?P<pre>{amount})|(?P<post>{amount})\s*(?:{marker}))"
        );
        let currency_price = Regex::new(&pattern).context("invalid currency price pattern")?;

        let price_words = alternation(&vocabulary.price_terms);
        let bare_price = if price_words.is_empty() {
            None
        } else {
            let pattern =
                format!(r"(?i)\b(?:{price_words})\b\s*[:=]?\s*(?P<amount>{amount})(?:[^\d.,]|$)");
            Some(Regex::new(&pattern).context("invalid bare price pattern")?)
        };

        Ok(Self {
            price_terms: normalized(&vocabulary.price_terms),
            inclusion_terms: normalized(&vocabulary.inclusion_terms),
            count_terms: normalized(&vocabulary.count_terms),
            category_terms: normalized(&vocabulary.category_terms),
            identity_patterns: normalized(&vocabulary.identity_patterns),
            small_talk: normalized(&vocabulary.small_talk).into_iter().collect(),
            stopwords: normalized(&vocabulary.stopwords).into_iter().collect(),
            short_keep: normalized(&vocabulary.short_keep).into_iter().collect(),
            label_stop: normalized(&vocabulary.label_stop).into_iter().collect(),
            continuation_prefixes: vocabulary
                .continuation_prefixes
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            brand_prefixes: normalized(&vocabulary.brand_prefixes),
            currency_price,
            bare_price,
            vocabulary,
        })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    fn any_phrase(terms: &[String], normalized_text: &str) -> bool {
        terms.iter().any(|t| contains_phrase(normalized_text, t))
    }

    pub fn mentions_price(&self, normalized_text: &str) -> bool {
        Self::any_phrase(&self.price_terms, normalized_text)
    }

    pub fn mentions_count(&self, normalized_text: &str) -> bool {
        Self::any_phrase(&self.count_terms, normalized_text)
    }

    pub fn mentions_category(&self, normalized_text: &str) -> bool {
        Self::any_phrase(&self.category_terms, normalized_text)
    }

    pub fn mentions_identity(&self, normalized_text: &str) -> bool {
        Self::any_phrase(&self.identity_patterns, normalized_text)
    }

    /// Inclusion markers match as substrings so `inkl` also covers
    /// `inklusive` and `inkl.`.
    pub fn mentions_inclusion(&self, normalized_text: &str) -> bool {
        self.inclusion_terms
            .iter()
            .any(|t| normalized_text.contains(t.as_str()))
    }

    pub fn is_small_talk_word(&self, token: &str) -> bool {
        self.small_talk.contains(token)
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    pub fn is_short_keep(&self, token: &str) -> bool {
        self.short_keep.contains(token)
    }

    /// True if the label is one of the stop labels, ignoring case and
    /// trailing punctuation.
    pub fn is_stop_label(&self, label: &str) -> bool {
        self.label_stop.contains(&normalize(label))
    }

    pub fn is_continuation(&self, label: &str) -> bool {
        let lowered = label.trim().to_lowercase();
        self.continuation_prefixes.iter().any(|p| {
            lowered.starts_with(p.as_str())
                && lowered[p.len()..]
                    .chars()
                    .next()
                    .map_or(true, |c| !c.is_alphanumeric())
        })
    }

    pub fn is_meta_command(&self, query: &str) -> bool {
        let trimmed = query.trim_start();
        self.vocabulary
            .meta_command_prefixes
            .iter()
            .any(|p| !p.is_empty() && trimmed.starts_with(p.as_str()))
    }

    pub fn brand_prefixes(&self) -> &[String] {
        &self.brand_prefixes
    }

    /// Locate the first price in a line. Amounts with a currency marker win
    /// over bare amounts after a price keyword.
    pub fn find_price(&self, line: &str) -> Option<PriceMatch> {
        if let Some(caps) = self.currency_price.captures(line) {
            let whole = caps.get(0)?;
            let amount = caps.name("pre").or_else(|| caps.name("post"))?;
            return Some(PriceMatch {
                start: whole.start(),
                end: whole.end(),
                text: whole.as_str().trim().to_string(),
                amount: amount.as_str().to_string(),
                has_currency: true,
            });
        }
        let caps = self.bare_price.as_ref()?.captures(line)?;
        let amount = caps.name("amount")?;
        Some(PriceMatch {
            start: amount.start(),
            end: amount.end(),
            text: amount.as_str().to_string(),
            amount: amount.as_str().to_string(),
            has_currency: false,
        })
    }

    /// All numeric amounts in a text, with separators stripped.
    pub fn numbers_in(text: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = String::new();
        let chars: Vec<char> = text.chars().collect();
        for (i, &c) in chars.iter().enumerate() {
            if c.is_ascii_digit() {
                current.push(c);
            } else if matches!(c, '.' | ',')
                && !current.is_empty()
                && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())
            {
                continue;
            } else if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
        out
    }
}

/// A price located inside a line of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceMatch {
    /// Byte offset where the whole match starts.
    pub start: usize,
    /// Byte offset where the whole match ends.
    pub end: usize,
    /// The matched price text, e.g. `500 kr`.
    pub text: String,
    /// The numeric part, e.g. `500`.
    pub amount: String,
    /// False for bare amounts found after a price keyword.
    pub has_currency: bool,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::new(Vocabulary::default()).expect("built-in vocabulary compiles")
    }
}
