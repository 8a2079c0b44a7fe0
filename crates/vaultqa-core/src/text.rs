//! Text normalization shared by indexing, classification, and retrieval.
//!
//! Every comparison between query text and vault text goes through
//! [`normalize`]: lower-cased, diacritics folded, punctuation replaced by
//! single spaces. Both sides are normalized the same way, so matching stays
//! symmetric.

use regex::Regex;
use std::sync::LazyLock;

static MD_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").expect("valid link regex"));
static WIKI_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[([^\]|]+)(?:\|([^\]]+))?\]\]").expect("valid wikilink regex")
});

/// Fold one lower-case character to its ASCII-ish base form.
fn fold_char(c: char, out: &mut String) {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' => out.push('a'),
        'æ' => out.push_str("ae"),
        'ç' | 'č' => out.push('c'),
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' => out.push('e'),
        'ì' | 'í' | 'î' | 'ï' => out.push('i'),
        'ñ' | 'ń' => out.push('n'),
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' => out.push('o'),
        'ù' | 'ú' | 'û' | 'ü' | 'ū' => out.push('u'),
        'ý' | 'ÿ' => out.push('y'),
        'ß' => out.push_str("ss"),
        'š' | 'ś' => out.push('s'),
        'ž' | 'ź' | 'ż' => out.push('z'),
        'ł' => out.push('l'),
        _ => out.push(c),
    }
}

/// Lower-case, fold diacritics, and collapse everything that is not a
/// letter or digit into single spaces.
///
/// ```
/// use vaultqa_core::text::normalize;
/// assert_eq!(normalize("  Prisér & Pakker!  "), "priser pakker");
/// ```
pub fn normalize(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            fold_char(c, &mut folded);
        } else {
            folded.push(' ');
        }
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized whitespace-separated tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Insert spaces at lower→upper case and letter↔digit transitions.
///
/// `"GS1DKServices"` becomes `"GS 1 DKServices"`; `"BasisPakke"` becomes
/// `"Basis Pakke"`.
pub fn split_camel(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut prev: Option<char> = None;
    for c in text.chars() {
        if let Some(p) = prev {
            let boundary = (p.is_lowercase() && c.is_uppercase())
                || (p.is_ascii_digit() && c.is_alphabetic())
                || (p.is_alphabetic() && c.is_ascii_digit());
            if boundary {
                out.push(' ');
            }
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

/// Strip a common inflection suffix so `pakker` also matches `pakke`.
pub fn stem(token: &str) -> &str {
    let len = token.chars().count();
    if len > 3 && token.ends_with('s') {
        return &token[..token.len() - 1];
    }
    if len > 4 && token.ends_with("er") {
        return &token[..token.len() - 2];
    }
    if len > 4 && token.ends_with('e') {
        return &token[..token.len() - 1];
    }
    token
}

/// True if `needle` occurs in `haystack` as a whole-token phrase. Both
/// arguments must already be normalized.
pub fn contains_phrase(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let padded = format!(" {} ", haystack);
    padded.contains(&format!(" {} ", needle))
}

/// Remove inline markdown markup (links, wiki-links, emphasis) and
/// surrounding list punctuation, collapsing whitespace.
pub fn clean_markup(text: &str) -> String {
    let text = MD_LINK.replace_all(text, "$1");
    let text = WIKI_LINK.replace_all(&text, |caps: &regex::Captures<'_>| {
        caps.get(2)
            .or_else(|| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    });
    let text = text.replace("**", "").replace(['*', '`'], "");
    let trimmed = text
        .trim()
        .trim_matches(|c: char| matches!(c, '-' | ':' | '•' | '\t' | ' ' | '+'));
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True if the text contains at least one alphabetic character.
pub fn has_letters(text: &str) -> bool {
    text.chars().any(char::is_alphabetic)
}

/// Truncate to at most `max_chars` characters, appending an ellipsis line.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}\n...", cut.trim_end())
}
