//! "Included" / "free of charge" lines, used when a price query finds no
//! explicit prices.

use crate::models::{Confidence, ExtractedRecord, RecordFields, Section};
use crate::retrieve::query_terms;
use crate::text::{clean_markup, normalize};
use crate::vocab::Lexicon;

/// Lines carrying an inclusion marker and one of the query's content terms.
///
/// When the query has no content terms every marker line qualifies. Each
/// record cites the marker line; its excerpt adds one line of context on
/// either side. Stops after `limit` records.
pub fn extract_inclusion_snippets(
    sections: &[&Section],
    query: &str,
    lexicon: &Lexicon,
    limit: usize,
) -> Vec<ExtractedRecord> {
    let terms = query_terms(query, lexicon);
    let mut out = Vec::new();
    if limit == 0 {
        return out;
    }
    for section in sections {
        let lines: Vec<(usize, &str)> = section.body_lines().collect();
        for (idx, (line_no, line)) in lines.iter().enumerate() {
            let normalized = normalize(line);
            if !lexicon.mentions_inclusion(&normalized) {
                continue;
            }
            if !terms.is_empty() && !terms.iter().any(|t| t.occurs_in(&normalized)) {
                continue;
            }
            let from = idx.saturating_sub(1);
            let to = (idx + 1).min(lines.len() - 1);
            let excerpt = lines[from..=to]
                .iter()
                .map(|(_, l)| *l)
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string();
            out.push(ExtractedRecord {
                fields: RecordFields::InclusionSnippet {
                    line: clean_markup(line),
                    excerpt,
                },
                source: section.source_lines(*line_no, *line_no),
                confidence: Confidence::Low,
            });
            if out.len() >= limit {
                return out;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::split_sections;

    #[test]
    fn test_marker_and_term_required() {
        let sections = split_sections(
            "a.md",
            "# Setup\nIntro\nSetup included\nSupport costs extra\nTraining inkl. materialer\n",
            0,
        );
        let refs: Vec<&Section> = sections.iter().collect();
        let records = extract_inclusion_snippets(&refs, "What does setup cost?", &Lexicon::default(), 4);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source.line_start, 3);
        assert_eq!(records[0].source.line_end, 3);
        assert_eq!(records[0].confidence, Confidence::Low);
        match &records[0].fields {
            RecordFields::InclusionSnippet { line, excerpt } => {
                assert_eq!(line, "Setup included");
                assert_eq!(excerpt, "Intro\nSetup included\nSupport costs extra");
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_no_terms_accepts_all_marker_lines_up_to_limit() {
        let sections = split_sections("a.md", "# A\nx included\ny gratis\nz inklusive\n", 0);
        let refs: Vec<&Section> = sections.iter().collect();
        let records = extract_inclusion_snippets(&refs, "what does it cost", &Lexicon::default(), 2);
        assert_eq!(records.len(), 2);
    }
}
