//! Verbatim section excerpts for general questions.

use crate::models::{Confidence, ExtractedRecord, RecordFields, Section};
use crate::text::truncate_chars;

/// One excerpt per section with a non-blank body, truncated to
/// `max_chars` characters.
pub fn extract_section_excerpts(sections: &[&Section], max_chars: usize) -> Vec<ExtractedRecord> {
    sections
        .iter()
        .filter(|s| !s.body.trim().is_empty())
        .map(|s| ExtractedRecord {
            fields: RecordFields::SectionExcerpt {
                excerpt: truncate_chars(s.body.trim(), max_chars),
            },
            source: s.source(),
            confidence: Confidence::High,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::split_sections;

    #[test]
    fn test_excerpts_skip_empty_and_truncate() {
        let sections = split_sections("a.md", "# Empty\n# Long\nabcdefghij\n", 0);
        let refs: Vec<&Section> = sections.iter().collect();
        let records = extract_section_excerpts(&refs, 4);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].summary(), "abcd\n...");
        assert_eq!(records[0].source.heading, "Long");
    }
}
