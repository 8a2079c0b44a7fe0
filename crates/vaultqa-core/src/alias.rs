//! Alias generation and the alias map.
//!
//! An alias is a normalized alternate name for a section. Aliases come from
//! three places:
//!
//! - section titles ([`title_aliases`]), including camel-case splits,
//!   short prefixes and brand-stripped variants;
//! - note identity ([`note_aliases`]): the note title, its file stem and
//!   front-matter `aliases:`; registered on the note's primary section;
//! - the services index note ([`parse_index_note`]), whose entries map
//!   display names to target notes.
//!
//! Derived aliases shorter than [`MIN_ALIAS_CHARS`] or made only of
//! stopwords are dropped, so a generic word never pins a query to one note.
//! Services index names are always registered as written. A name made only
//! of stopwords matches a query only when it is the whole query.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use crate::models::SectionId;
use crate::text::{clean_markup, contains_phrase, normalize, split_camel, tokenize};
use crate::vocab::Lexicon;

/// Minimum length of a kept alias, in characters.
pub const MIN_ALIAS_CHARS: usize = 3;

static WIKI_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[([^\]|#]+)(?:#[^\]|]*)?(?:\|([^\]]+))?\]\]").expect("valid wikilink regex")
});
static MD_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]+)\]\(([^)#]+?\.md)(?:#[^)]*)?\)").expect("valid md link regex")
});
static BARE_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^|\[\]()]+?\.md)\b").expect("valid bare target regex"));
static LIST_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+").expect("valid bullet regex"));

/// Normalized alias → sections it names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasMap {
    entries: BTreeMap<String, BTreeSet<SectionId>>,
    /// Aliases matched only against the whole query.
    whole_query: BTreeSet<String>,
}

/// An alias found inside a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasHit<'a> {
    pub alias: &'a str,
    pub sections: &'a BTreeSet<SectionId>,
}

impl AliasMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an already-normalized alias. Returns false for an empty
    /// alias or a pair that was already present.
    pub fn insert(&mut self, alias: &str, section: SectionId) -> bool {
        if alias.is_empty() {
            return false;
        }
        self.whole_query.remove(alias);
        self.entries
            .entry(alias.to_string())
            .or_default()
            .insert(section)
    }

    /// Register an alias that only matches a query equal to it. An alias
    /// already registered with [`AliasMap::insert`] keeps phrase matching.
    pub fn insert_whole_query(&mut self, alias: &str, section: SectionId) -> bool {
        if alias.is_empty() {
            return false;
        }
        if !self.entries.contains_key(alias) {
            self.whole_query.insert(alias.to_string());
        }
        self.entries
            .entry(alias.to_string())
            .or_default()
            .insert(section)
    }

    pub fn get(&self, alias: &str) -> Option<&BTreeSet<SectionId>> {
        self.entries.get(alias)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<SectionId>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sections whose alias equals the normalized query exactly.
    pub fn exact(&self, normalized_query: &str) -> Option<&BTreeSet<SectionId>> {
        self.entries.get(normalized_query)
    }

    /// Aliases occurring as whole-token phrases in the normalized query.
    /// Whole-query aliases hit only on equality.
    ///
    /// Only maximal hits are returned: an alias that is itself part of a
    /// longer matching alias (`gs1 dk` inside `gs1 dk basis`) is dropped.
    pub fn matches_in(&self, normalized_query: &str) -> Vec<AliasHit<'_>> {
        let hits: Vec<AliasHit<'_>> = self
            .entries
            .iter()
            .filter(|(alias, _)| {
                if self.whole_query.contains(alias.as_str()) {
                    alias.as_str() == normalized_query
                } else {
                    contains_phrase(normalized_query, alias)
                }
            })
            .map(|(alias, sections)| AliasHit {
                alias: alias.as_str(),
                sections,
            })
            .collect();
        hits.iter()
            .filter(|hit| {
                !hits.iter().any(|other| {
                    other.alias.len() > hit.alias.len() && contains_phrase(other.alias, hit.alias)
                })
            })
            .cloned()
            .collect()
    }
}

/// True if a normalized alias is long enough and not made only of stopwords.
pub fn keep_alias(alias: &str, lexicon: &Lexicon) -> bool {
    if alias.chars().count() < MIN_ALIAS_CHARS {
        return false;
    }
    !alias.split(' ').all(|t| lexicon.is_stopword(t))
}

/// Merge a short alphabetic token with a following numeric token:
/// `gs 1 dk` becomes `gs1 dk`.
fn merge_letter_digit(tokens: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if let Some(last) = merged.last_mut() {
            let last_alpha = !last.is_empty()
                && last.chars().count() <= 3
                && last.chars().all(char::is_alphabetic);
            if last_alpha && token.chars().all(|c| c.is_ascii_digit()) {
                last.push_str(token);
                continue;
            }
        }
        merged.push(token.clone());
    }
    merged
}

fn add_variant(out: &mut BTreeSet<String>, tokens: &[String], lexicon: &Lexicon) {
    if tokens.is_empty() {
        return;
    }
    out.insert(tokens.join(" "));
    if tokens.len() >= 2 {
        out.insert(tokens[..2].join(" "));
    }
    if tokens.len() >= 3 {
        out.insert(tokens[..3].join(" "));
    }
    let joined = tokens.join(" ");
    for brand in lexicon.brand_prefixes() {
        if let Some(rest) = joined.strip_prefix(brand.as_str()) {
            let Some(rest) = rest.strip_prefix(' ') else {
                continue;
            };
            let rest_tokens: Vec<&str> = rest.split(' ').collect();
            out.insert(rest.to_string());
            if rest_tokens.len() >= 2 {
                out.insert(rest_tokens[..2].join(" "));
            }
        }
    }
}

/// Aliases derived from a section or note title.
///
/// ```
/// use vaultqa_core::alias::title_aliases;
/// use vaultqa_core::vocab::Lexicon;
///
/// let aliases = title_aliases("GS1DK Basis Pakke", &Lexicon::default());
/// assert!(aliases.contains("gs1dk basis pakke"));
/// assert!(aliases.contains("gs1 dk basis"));
/// assert!(aliases.contains("basis pakke"));
/// ```
pub fn title_aliases(title: &str, lexicon: &Lexicon) -> BTreeSet<String> {
    let mut raw = BTreeSet::new();
    for variant in [title.to_string(), split_camel(title)] {
        let tokens = tokenize(&variant);
        let merged = merge_letter_digit(&tokens);
        add_variant(&mut raw, &merged, lexicon);
        if merged != tokens {
            raw.insert(tokens.join(" "));
        }
    }
    raw.into_iter().filter(|a| keep_alias(a, lexicon)).collect()
}

/// Aliases naming a whole note: title, file stem, `-`/`_` variants of the
/// stem, and any front-matter aliases.
pub fn note_aliases(
    title: &str,
    file_path: &str,
    extra: &[String],
    lexicon: &Lexicon,
) -> BTreeSet<String> {
    let stem = file_stem(file_path);
    let mut out = title_aliases(title, lexicon);
    for variant in [
        stem.to_string(),
        stem.replace('-', " "),
        stem.replace('_', " "),
    ] {
        out.extend(title_aliases(&variant, lexicon));
    }
    for alias in extra {
        let normalized = normalize(alias);
        if keep_alias(&normalized, lexicon) {
            out.insert(normalized);
        }
    }
    out
}

/// File name without directories or the `.md` extension.
pub fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.strip_suffix(".md")
        .or_else(|| name.strip_suffix(".MD"))
        .unwrap_or(name)
}

/// One `name → target note` entry of the services index note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Display name as written in the note, markup removed.
    pub name: String,
    /// Link target: a note name or relative path, without `.md`.
    pub target: String,
    /// 1-based line the entry was read from.
    pub line: usize,
}

fn clean_target(raw: &str) -> String {
    let decoded = raw.trim().replace("%20", " ");
    let without_ext = decoded
        .strip_suffix(".md")
        .map(str::to_string)
        .unwrap_or(decoded);
    without_ext.trim_start_matches("./").trim().to_string()
}

fn push_entry(out: &mut Vec<IndexEntry>, name: &str, target: &str, line: usize) {
    let name = clean_markup(name);
    let target = clean_target(target);
    if name.is_empty() || target.is_empty() {
        return;
    }
    if out.iter().any(|e| e.name == name && e.target == target) {
        return;
    }
    out.push(IndexEntry { name, target, line });
}

/// The first link target in a fragment of text.
fn first_target(text: &str) -> Option<String> {
    if let Some(caps) = WIKI_TARGET.captures(text) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    if let Some(caps) = MD_TARGET.captures(text) {
        return caps.get(2).map(|m| m.as_str().to_string());
    }
    BARE_TARGET
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn parse_table_entry(line: &str, line_no: usize, out: &mut Vec<IndexEntry>) {
    let cells: Vec<&str> = line
        .trim()
        .trim_matches('|')
        .split('|')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();
    if cells.iter().all(|c| c.chars().all(|ch| matches!(ch, '-' | ':' | ' '))) {
        return;
    }
    let Some((target_idx, target)) = cells
        .iter()
        .enumerate()
        .find_map(|(i, c)| first_target(c).map(|t| (i, t)))
    else {
        return;
    };
    for (i, cell) in cells.iter().enumerate() {
        if i != target_idx && first_target(cell).is_none() && crate::text::has_letters(cell) {
            push_entry(out, cell, &target, line_no);
            break;
        }
    }
    link_entries(cells[target_idx], line_no, out);
}

/// Entries carried by the links themselves: `[[T]]`, `[[T|N]]`, `[N](T.md)`.
fn link_entries(text: &str, line_no: usize, out: &mut Vec<IndexEntry>) {
    for caps in WIKI_TARGET.captures_iter(text) {
        let Some(target) = caps.get(1) else { continue };
        let name = caps.get(2).unwrap_or(target);
        push_entry(out, name.as_str(), target.as_str(), line_no);
    }
    for caps in MD_TARGET.captures_iter(text) {
        if let (Some(name), Some(target)) = (caps.get(1), caps.get(2)) {
            push_entry(out, name.as_str(), target.as_str(), line_no);
        }
    }
}

/// Read the display-name → target entries of a services index note.
///
/// Accepted forms per line: `[[Target]]`, `[[Target|Name]]`,
/// `[Name](Target.md)`, `Name -> Target.md`, `Name → Target.md`,
/// `Name: [[Target]]`, and table rows `| Name | Target.md |`. Headings and
/// lines without a link target are ignored.
pub fn parse_index_note(content: &str) -> Vec<IndexEntry> {
    let mut out = Vec::new();
    for (i, raw) in content.lines().enumerate() {
        let line_no = i + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if trimmed.starts_with('|') {
            parse_table_entry(trimmed, line_no, &mut out);
            continue;
        }
        let body = LIST_BULLET.replace(trimmed, "");

        let arrow = body
            .split_once("->")
            .or_else(|| body.split_once('→'));
        if let Some((name, rest)) = arrow {
            if let Some(target) = first_target(rest) {
                push_entry(&mut out, name, &target, line_no);
                continue;
            }
        }

        if let Some((name, rest)) = body.split_once(':') {
            let name_has_link = WIKI_TARGET.is_match(name) || MD_TARGET.is_match(name);
            if !name_has_link {
                if let Some(target) = first_target(rest) {
                    push_entry(&mut out, name, &target, line_no);
                }
            }
        }
        link_entries(&body, line_no, &mut out);
    }
    out
}
