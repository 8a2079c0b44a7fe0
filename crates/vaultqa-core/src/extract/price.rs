//! Package/price pairs from section text.
//!
//! Works line by line. Table rows take their label from the non-price
//! cells. Plain lines take it from the text around the price, or from the
//! lines just above when the price line carries no usable label:
//!
//! ```text
//! ## Basis                    ─┐
//! Årligt abonnement            │ label: "Årligt abonnement"
//! 500 kr / år                 ─┘ price: "500 kr / år"
//! ```

use std::collections::BTreeSet;

use crate::models::{Confidence, ExtractedRecord, RecordFields, Section};
use crate::parse::parse_heading;
use crate::retrieve::query_terms;
use crate::text::{clean_markup, has_letters, normalize};
use crate::vocab::{Lexicon, PriceMatch};

/// Lines walked upwards when collecting a label.
pub const MAX_LABEL_LINES: usize = 4;

/// Cells of a markdown table row, or `None` for non-rows and separators.
pub fn parse_table_row(line: &str) -> Option<Vec<String>> {
    let trimmed = line.trim();
    if !trimmed.contains('|') || trimmed.is_empty() {
        return None;
    }
    if trimmed.chars().all(|c| matches!(c, '|' | '-' | ':' | ' ')) {
        return None;
    }
    let cells: Vec<String> = trimmed
        .trim_matches('|')
        .split('|')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    (!cells.is_empty()).then_some(cells)
}

fn is_per_unit(word: &str, lexicon: &Lexicon) -> bool {
    let lowered = word.to_lowercase();
    lexicon.vocabulary().per_unit_prefixes.iter().any(|p| {
        let p = p.to_lowercase();
        if p.chars().all(|c| !c.is_alphanumeric()) {
            lowered.starts_with(&p)
        } else {
            lowered.trim_end_matches('.') == p.trim_end_matches('.')
        }
    })
}

/// The price text of a match plus a per-unit suffix (`/ år`, `pr. md`).
fn price_with_suffix(line: &str, m: &PriceMatch, lexicon: &Lexicon) -> (String, usize) {
    let rest = &line[m.end..];
    let mut words = rest.split_whitespace();
    let Some(first) = words.next() else {
        return (m.text.clone(), m.end);
    };
    if !is_per_unit(first, lexicon) {
        return (m.text.clone(), m.end);
    }
    let bare_prefix = first.chars().all(|c| !c.is_alphanumeric())
        || lexicon
            .vocabulary()
            .per_unit_prefixes
            .iter()
            .any(|p| p.trim_end_matches('.').eq_ignore_ascii_case(first.trim_end_matches('.')));
    let mut suffix = vec![first];
    if bare_prefix {
        if let Some(second) = words.next() {
            suffix.push(second);
        }
    }
    let suffix_text = suffix.join(" ");
    let suffix_text = suffix_text.trim_end_matches([',', ';', ')']);
    let consumed = rest
        .find(suffix.last().copied().unwrap_or(""))
        .map(|pos| m.end + pos + suffix.last().map_or(0, |w| w.len()))
        .unwrap_or(m.end);
    (format!("{} {}", m.text, suffix_text), consumed.min(line.len()))
}

/// Remove the price (and its suffix) from a line and return what is left
/// as a label, or an empty string if nothing usable remains.
fn name_from_line(line: &str, m: &PriceMatch, price_end: usize, lexicon: &Lexicon) -> String {
    let mut remaining = String::with_capacity(line.len());
    remaining.push_str(&line[..m.start]);
    remaining.push(' ');
    remaining.push_str(&line[price_end..]);
    usable_label(&clean_markup(&remaining), lexicon)
}

fn usable_label(label: &str, lexicon: &Lexicon) -> String {
    let label = label
        .trim_matches(|c: char| matches!(c, '-' | ':' | '•' | '\t' | ' ' | '=' | '–' | '|'))
        .to_string();
    if label.chars().count() <= 2 || !has_letters(&label) || lexicon.is_stop_label(&label) {
        return String::new();
    }
    if is_per_unit(label.split_whitespace().next().unwrap_or(""), lexicon)
        && label.split_whitespace().count() <= 2
    {
        return String::new();
    }
    label
}

/// Walk upwards from `idx` collecting up to [`MAX_LABEL_LINES`] label
/// lines. Blank lines end the walk once text was collected; headings and
/// stop labels are skipped; a line carrying its own price ends the walk.
/// Returns the label and the index of its first line.
fn collect_label(
    lines: &[(usize, &str)],
    idx: usize,
    lexicon: &Lexicon,
) -> Option<(String, usize)> {
    let mut collected: Vec<String> = Vec::new();
    let mut first = idx;
    let mut j = idx;
    while j > 0 && collected.len() < MAX_LABEL_LINES {
        j -= 1;
        let raw = lines[j].1.trim();
        if raw.is_empty() {
            if !collected.is_empty() {
                break;
            }
            continue;
        }
        if parse_heading(raw).is_some() {
            continue;
        }
        if lexicon.find_price(raw).is_some() {
            break;
        }
        if parse_table_row(raw).is_some() && raw.starts_with('|') {
            continue;
        }
        let candidate = clean_markup(raw);
        if candidate.is_empty() || lexicon.is_stop_label(&candidate) {
            continue;
        }
        collected.insert(0, candidate);
        first = j;
    }
    let label = collected.join(" ");
    (!label.is_empty()).then_some((label, first))
}

fn record(
    section: &Section,
    role: Option<String>,
    package: String,
    price: String,
    line_start: usize,
    line_end: usize,
) -> ExtractedRecord {
    ExtractedRecord {
        fields: RecordFields::PriceItem {
            role,
            package,
            price,
        },
        source: section.source_lines(line_start, line_end),
        confidence: Confidence::High,
    }
}

fn fallback_label(section: &Section) -> String {
    if section.is_preamble() {
        crate::alias::file_stem(&section.file_path).to_string()
    } else {
        section.title.clone()
    }
}

fn table_item(
    section: &Section,
    lines: &[(usize, &str)],
    idx: usize,
    cells: &[String],
    lexicon: &Lexicon,
) -> Option<ExtractedRecord> {
    let (price_idx, m) = cells
        .iter()
        .enumerate()
        .find_map(|(i, c)| lexicon.find_price(c).map(|m| (i, m)))?;
    let (price, _) = price_with_suffix(&cells[price_idx], &m, lexicon);
    let labels: Vec<String> = cells
        .iter()
        .enumerate()
        .filter(|(i, c)| *i != price_idx && lexicon.find_price(c).is_none())
        .map(|(_, c)| usable_label(&clean_markup(c), lexicon))
        .filter(|l| !l.is_empty())
        .collect();
    let line_no = lines[idx].0;
    let (role, package, start) = match labels.as_slice() {
        [role, package, ..] => (Some(role.clone()), package.clone(), line_no),
        [package] => (None, package.clone(), line_no),
        [] => match collect_label(lines, idx, lexicon) {
            Some((label, first)) => (None, label, lines[first].0),
            None => (None, fallback_label(section), line_no),
        },
    };
    Some(record(section, role, package, price, start, line_no))
}

fn plain_item(
    section: &Section,
    lines: &[(usize, &str)],
    idx: usize,
    lexicon: &Lexicon,
) -> Option<ExtractedRecord> {
    let (line_no, line) = lines[idx];
    let m = lexicon.find_price(line)?;
    let (price, price_end) = price_with_suffix(line, &m, lexicon);
    let mut label = name_from_line(line, &m, price_end, lexicon);
    let mut start = line_no;

    if label.is_empty() {
        if let Some((collected, first)) = collect_label(lines, idx, lexicon) {
            label = collected;
            start = lines[first].0;
        }
    } else if lexicon.is_continuation(&label) {
        if let Some((collected, first)) = collect_label(lines, idx, lexicon) {
            if collected != label {
                label = collected;
                start = lines[first].0;
            }
        }
    }
    if label.is_empty() {
        label = fallback_label(section);
    }
    Some(record(section, None, label, price, start, line_no))
}

/// Extract price items from sections.
///
/// Exact duplicates are removed and the result is ordered by file and line.
pub fn extract_price_items(sections: &[&Section], lexicon: &Lexicon) -> Vec<ExtractedRecord> {
    let mut items = Vec::new();
    for section in sections {
        let lines: Vec<(usize, &str)> = section.body_lines().collect();
        let mut in_fence = false;
        for idx in 0..lines.len() {
            let line = lines[idx].1;
            let trimmed = line.trim_start();
            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }
            let item = match parse_table_row(line) {
                Some(cells) if trimmed.starts_with('|') => {
                    table_item(section, &lines, idx, &cells, lexicon)
                }
                _ => plain_item(section, &lines, idx, lexicon),
            };
            items.extend(item);
        }
    }

    let mut seen = BTreeSet::new();
    items.retain(|r| seen.insert((r.source.clone(), r.fields.clone())));
    items.sort_by(|a, b| {
        a.source
            .file_path
            .cmp(&b.source.file_path)
            .then(a.source.line_start.cmp(&b.source.line_start))
            .then(a.source.line_end.cmp(&b.source.line_end))
    });
    items
}

/// Dates, version strings, and bare years that look like amounts.
pub fn is_spurious_amount(amount: &str, has_currency: bool) -> bool {
    let groups: Vec<&str> = amount.split(['.', ',']).collect();
    if groups.len() >= 3 {
        let middle = &groups[1..groups.len() - 1];
        if middle.iter().any(|g| g.len() != 3) {
            return true;
        }
    }
    if !has_currency && groups.len() == 1 && amount.len() == 4 {
        if let Ok(year) = amount.parse::<u32>() {
            return (1900..=2100).contains(&year);
        }
    }
    false
}

fn label_of(record: &ExtractedRecord) -> Option<(String, String, String)> {
    match &record.fields {
        RecordFields::PriceItem {
            role,
            package,
            price,
        } => Some((
            role.as_deref().map(normalize).unwrap_or_default(),
            normalize(package),
            price.clone(),
        )),
        _ => None,
    }
}

/// Post-process extracted price items.
///
/// Drops spurious amounts and repeated (role, package) pairs within a
/// section (first in document order wins). Sections sharing a heading stay
/// distinct. With `query` given, keeps only
/// items whose label mentions one of the query's content terms; a query
/// without content terms keeps everything.
pub fn filter_price_items(
    records: Vec<ExtractedRecord>,
    query: Option<&str>,
    lexicon: &Lexicon,
) -> Vec<ExtractedRecord> {
    let terms = query.map(|q| query_terms(q, lexicon)).unwrap_or_default();
    let mut seen = BTreeSet::new();
    records
        .into_iter()
        .filter(|r| {
            let Some((role, package, price)) = label_of(r) else {
                return false;
            };
            let (amount, has_currency) = match lexicon.find_price(&price) {
                Some(m) => (m.amount, m.has_currency),
                None => (
                    price.split_whitespace().next().unwrap_or_default().to_string(),
                    false,
                ),
            };
            if is_spurious_amount(&amount, has_currency) {
                return false;
            }
            let key = (r.source.section, role.clone(), package.clone());
            if !seen.insert(key) {
                return false;
            }
            if terms.is_empty() {
                return true;
            }
            let label = format!("{role} {package}");
            terms.iter().any(|t| t.occurs_in(&label))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::split_sections;

    fn sections(content: &str) -> Vec<Section> {
        split_sections("services/Basis.md", content, 0)
    }

    fn items(content: &str) -> Vec<(Option<String>, String, String)> {
        let sections = sections(content);
        let refs: Vec<&Section> = sections.iter().collect();
        extract_price_items(&refs, &Lexicon::default())
            .into_iter()
            .map(|r| match r.fields {
                RecordFields::PriceItem {
                    role,
                    package,
                    price,
                } => (role, package, price),
                _ => unreachable!(),
            })
            .collect()
    }

    #[test]
    fn test_label_on_same_line() {
        assert_eq!(
            items("# Pakker\nBasic package: 500 kr\n"),
            vec![(None, "Basic package".to_string(), "500 kr".to_string())]
        );
    }

    #[test]
    fn test_per_unit_suffix_kept() {
        assert_eq!(
            items("# P\n- **Basis**: 1.250 kr / år\n- Premium 900 DKK pr. md.\n"),
            vec![
                (None, "Basis".to_string(), "1.250 kr / år".to_string()),
                (None, "Premium".to_string(), "900 DKK pr. md.".to_string()),
            ]
        );
    }

    #[test]
    fn test_label_collected_from_lines_above() {
        let got = items("# Basis\nÅrligt abonnement\n\n500 kr / år\n");
        assert_eq!(got, vec![(None, "Årligt abonnement".to_string(), "500 kr / år".to_string())]);
    }

    #[test]
    fn test_stop_label_triggers_collection() {
        let got = items("## Medlemskab\nStandard\nPris: 300 kr\n");
        assert_eq!(got, vec![(None, "Standard".to_string(), "300 kr".to_string())]);
    }

    #[test]
    fn test_continuation_label_replaced() {
        let got = items("## X\nPremium support\ninkl. moms 400 kr\n");
        assert_eq!(got, vec![(None, "Premium support".to_string(), "400 kr".to_string())]);
    }

    #[test]
    fn test_section_title_is_last_resort() {
        let got = items("## Gold\n\n800 kr\n");
        assert_eq!(got, vec![(None, "Gold".to_string(), "800 kr".to_string())]);
    }

    #[test]
    fn test_table_rows_role_and_package() {
        let content = "\
## Priser
| Rolle | Pakke | Pris |
|-------|-------|------|
| Leverandør | Basis | 500 kr |
| Premium | 900 kr |
";
        assert_eq!(
            items(content),
            vec![
                (Some("Leverandør".to_string()), "Basis".to_string(), "500 kr".to_string()),
                (None, "Premium".to_string(), "900 kr".to_string()),
            ]
        );
    }

    #[test]
    fn test_source_covers_label_and_price_lines() {
        let sections = sections("# Basis\nÅrligt abonnement\n500 kr\n");
        let refs: Vec<&Section> = sections.iter().collect();
        let records = extract_price_items(&refs, &Lexicon::default());
        assert_eq!(records[0].source.line_start, 2);
        assert_eq!(records[0].source.line_end, 3);
        assert_eq!(records[0].confidence, Confidence::High);
    }

    #[test]
    fn test_spurious_amounts() {
        assert!(is_spurious_amount("12.03.2024", false));
        assert!(is_spurious_amount("1.2.3", true));
        assert!(is_spurious_amount("2024", false));
        assert!(!is_spurious_amount("2024", true));
        assert!(!is_spurious_amount("1.250.000", true));
        assert!(!is_spurious_amount("1.250,00", true));
    }

    #[test]
    fn test_filter_relevance_and_dedupe() {
        let lex = Lexicon::default();
        let sections = sections("# P\nBasis: 500 kr\nBasis: 550 kr\nPremium: 900 kr\nPrice: 2024\n");
        let refs: Vec<&Section> = sections.iter().collect();
        let records = extract_price_items(&refs, &lex);
        assert_eq!(records.len(), 4);

        let kept = filter_price_items(records.clone(), None, &lex);
        let labels: Vec<String> = kept.iter().map(|r| r.summary()).collect();
        assert_eq!(labels, vec!["Basis: 500 kr", "Premium: 900 kr"]);

        let kept = filter_price_items(records, Some("Hvad koster premium?"), &lex);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].summary(), "Premium: 900 kr");
    }

    #[test]
    fn test_same_heading_twice_keeps_both_sections() {
        let lex = Lexicon::default();
        let sections = sections("# Basis
## Priser
Basis: 500 kr
## Priser
Basis: 650 kr
");
        let refs: Vec<&Section> = sections.iter().collect();
        let kept = filter_price_items(extract_price_items(&refs, &lex), None, &lex);
        let lines: Vec<(usize, String)> = kept
            .iter()
            .map(|r| (r.source.line_start, r.summary()))
            .collect();
        assert_eq!(
            lines,
            vec![(3, "Basis: 500 kr".to_string()), (5, "Basis: 650 kr".to_string())]
        );
    }

    #[test]
    fn test_repeated_row_in_one_section_is_extracted_once_per_line() {
        let sections = sections("# P
Basis: 500 kr
Basis: 500 kr
");
        let refs: Vec<&Section> = sections.iter().collect();
        let records = extract_price_items(&refs, &Lexicon::default());
        assert_eq!(records.len(), 2);
        let kept = filter_price_items(records, None, &Lexicon::default());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].source.line_start, 2);
    }
}
