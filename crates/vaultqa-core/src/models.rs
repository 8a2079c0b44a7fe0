//! Core data models shared by the index, retriever, extractors, and
//! assembler.
//!
//! Sections are produced once per index build and never mutated afterwards.
//! Extracted records are immutable facts that always carry the exact
//! source location they were read from.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Position of a section in the index, in document order.
pub type SectionId = usize;

/// Title used for the implicit section holding text before the first heading.
pub const PREAMBLE_TITLE: &str = "(top)";

/// A heading-delimited unit of a markdown note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub id: SectionId,
    /// Heading text, or [`PREAMBLE_TITLE`] for the implicit preamble section.
    pub title: String,
    /// Heading level `1..=6`; `0` for the preamble section.
    pub level: u8,
    /// Raw text below the heading line.
    pub body: String,
    /// Vault-relative path with `/` separators.
    pub file_path: String,
    /// First line of the section (the heading line), 1-based.
    pub line_start: usize,
    /// Last line of the section, inclusive.
    pub line_end: usize,
    /// Normalized alternate names registered for this section.
    pub aliases: BTreeSet<String>,
}

impl Section {
    pub fn is_preamble(&self) -> bool {
        self.level == 0
    }

    /// Line number of the first body line.
    pub fn body_line_start(&self) -> usize {
        if self.is_preamble() {
            self.line_start
        } else {
            self.line_start + 1
        }
    }

    /// Body lines paired with their absolute 1-based line numbers.
    pub fn body_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        let start = self.body_line_start();
        self.body.lines().enumerate().map(move |(i, l)| (start + i, l))
    }

    pub fn source(&self) -> SourceRef {
        SourceRef {
            section: self.id,
            file_path: self.file_path.clone(),
            heading: self.title.clone(),
            line_start: self.line_start,
            line_end: self.line_end,
        }
    }

    /// Source reference narrowed to a line range inside this section.
    pub fn source_lines(&self, line_start: usize, line_end: usize) -> SourceRef {
        SourceRef {
            line_start,
            line_end,
            ..self.source()
        }
    }
}

/// A file + heading + line range citation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SourceRef {
    pub section: SectionId,
    pub file_path: String,
    pub heading: String,
    pub line_start: usize,
    pub line_end: usize,
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{} (lines {}-{})",
            self.file_path, self.heading, self.line_start, self.line_end
        )
    }
}

/// A scored section returned by retrieval.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Candidate<'a> {
    pub section: &'a Section,
    pub score: f64,
}

/// Whether a record came from an explicit pattern or a fallback heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Low,
}

/// Kind of an [`ExtractedRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordKind {
    PriceItem,
    InclusionSnippet,
    Count,
    SectionExcerpt,
}

/// Kind-specific payload of an extracted record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RecordFields {
    PriceItem {
        #[serde(skip_serializing_if = "Option::is_none")]
        role: Option<String>,
        package: String,
        price: String,
    },
    InclusionSnippet {
        line: String,
        excerpt: String,
    },
    Count {
        category: String,
        count: u64,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        members: Vec<String>,
    },
    SectionExcerpt {
        excerpt: String,
    },
}

/// A structured, source-attributed fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedRecord {
    pub fields: RecordFields,
    pub source: SourceRef,
    pub confidence: Confidence,
}

impl ExtractedRecord {
    pub fn kind(&self) -> RecordKind {
        match self.fields {
            RecordFields::PriceItem { .. } => RecordKind::PriceItem,
            RecordFields::InclusionSnippet { .. } => RecordKind::InclusionSnippet,
            RecordFields::Count { .. } => RecordKind::Count,
            RecordFields::SectionExcerpt { .. } => RecordKind::SectionExcerpt,
        }
    }

    /// One-line human rendering of the fact, without the citation.
    pub fn summary(&self) -> String {
        match &self.fields {
            RecordFields::PriceItem {
                role: Some(role),
                package,
                price,
            } => format!("{} / {}: {}", role, package, price),
            RecordFields::PriceItem {
                role: None,
                package,
                price,
            } => format!("{}: {}", package, price),
            RecordFields::InclusionSnippet { line, .. } => line.clone(),
            RecordFields::Count {
                category, count, ..
            } => format!("{}: {}", category, count),
            RecordFields::SectionExcerpt { excerpt } => excerpt.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(level: u8) -> Section {
        Section {
            id: 0,
            title: "Prices".to_string(),
            level,
            body: "first\nsecond".to_string(),
            file_path: "notes/a.md".to_string(),
            line_start: 4,
            line_end: 6,
            aliases: BTreeSet::new(),
        }
    }

    #[test]
    fn test_body_lines_skip_heading() {
        let s = section(2);
        let lines: Vec<_> = s.body_lines().collect();
        assert_eq!(lines, vec![(5, "first"), (6, "second")]);
    }

    #[test]
    fn test_preamble_body_starts_at_section_start() {
        let s = section(0);
        assert_eq!(s.body_lines().next(), Some((4, "first")));
    }

    #[test]
    fn test_source_display() {
        let s = section(2);
        assert_eq!(s.source().to_string(), "notes/a.md#Prices (lines 4-6)");
        assert_eq!(
            s.source_lines(5, 5).to_string(),
            "notes/a.md#Prices (lines 5-5)"
        );
    }

    #[test]
    fn test_record_serializes_kind_tag() {
        let record = ExtractedRecord {
            fields: RecordFields::Count {
                category: "Retail".to_string(),
                count: 12,
                members: Vec::new(),
            },
            source: section(2).source(),
            confidence: Confidence::High,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["fields"]["kind"], "count");
        assert_eq!(json["fields"]["count"], 12);
        assert_eq!(json["confidence"], "high");
        assert_eq!(record.kind(), RecordKind::Count);
        assert_eq!(record.summary(), "Retail: 12");
    }
}
