//! The in-memory section index over a vault.
//!
//! [`VaultIndex::build`] turns a set of [`NoteDocument`]s into sections,
//! per-section term caches, and the alias map. The result is immutable; a
//! rebuild produces a fresh index that replaces the old one wholesale.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::alias::{file_stem, note_aliases, parse_index_note, title_aliases, AliasHit, AliasMap};
use crate::extract::count::build_brancher_count_snippets;
use crate::models::{Confidence, RecordFields, Section, SectionId};
use crate::parse::{front_matter, split_sections};
use crate::text::{normalize, split_camel, tokenize};
use crate::vocab::Lexicon;

/// A markdown note as read from the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDocument {
    /// Vault-relative path with `/` separators.
    pub path: String,
    pub content: String,
}

impl NoteDocument {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Which notes play a special role in the index.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct IndexOptions {
    /// File name of the note mapping service names to service notes.
    pub services_index_note: Option<String>,
    /// File name of the note holding category counts.
    pub count_index_note: Option<String>,
    /// Title of the section inside the count note that lists categories.
    pub count_section: String,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            services_index_note: Some("GS1DK Services Index.md".to_string()),
            count_index_note: Some("GS1DK Brancher Index.md".to_string()),
            count_section: "Pages".to_string(),
        }
    }
}

/// Per-note metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteMeta {
    pub path: String,
    pub title: String,
    /// Section ids of this note, in document order.
    pub sections: Vec<SectionId>,
    /// First heading section, or the preamble for a note without headings.
    pub primary: Option<SectionId>,
}

/// Normalized tokens cached per section for scoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionTerms {
    pub title: Vec<String>,
    pub path: Vec<String>,
    pub body: Vec<String>,
    /// The whole body normalized, for phrase checks.
    pub body_text: String,
}

impl SectionTerms {
    fn new(section: &Section) -> Self {
        let mut title = tokenize(&section.title);
        for t in tokenize(&split_camel(&section.title)) {
            if !title.contains(&t) {
                title.push(t);
            }
        }
        let path_text = section.file_path.trim_end_matches(".md");
        let mut path = tokenize(path_text);
        for t in tokenize(&split_camel(path_text)) {
            if !path.contains(&t) {
                path.push(t);
            }
        }
        let body_text = normalize(&section.body);
        let body = body_text
            .split(' ')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            title,
            path,
            body,
            body_text,
        }
    }
}

/// Immutable index over all sections of a vault.
#[derive(Debug, Clone, Default)]
pub struct VaultIndex {
    sections: Vec<Section>,
    terms: Vec<SectionTerms>,
    notes: Vec<NoteMeta>,
    note_by_path: BTreeMap<String, usize>,
    aliases: AliasMap,
    services_note: Option<usize>,
    count_note: Option<usize>,
    count_section: Option<SectionId>,
    count_categories: BTreeSet<String>,
    warnings: Vec<String>,
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn matches_file_name(path: &str, wanted: Option<&str>) -> bool {
    wanted.is_some_and(|w| file_name(path).eq_ignore_ascii_case(w.trim()))
}

impl VaultIndex {
    /// An index with no sections.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an index from notes. Notes are processed in path order, so the
    /// result does not depend on the order of `docs`.
    pub fn build(mut docs: Vec<NoteDocument>, options: &IndexOptions, lexicon: &Lexicon) -> Self {
        docs.sort_by(|a, b| a.path.cmp(&b.path));
        docs.dedup_by(|a, b| a.path == b.path);

        let mut index = Self::empty();
        let mut note_extra_aliases: Vec<Vec<String>> = Vec::with_capacity(docs.len());

        for doc in &docs {
            let first_id = index.sections.len();
            let sections = split_sections(&doc.path, &doc.content, first_id);
            let fm = front_matter(&doc.content);
            let primary = sections
                .iter()
                .find(|s| !s.is_preamble())
                .or_else(|| sections.first())
                .map(|s| s.id);
            let title = fm
                .title
                .clone()
                .or_else(|| {
                    sections
                        .iter()
                        .find(|s| !s.is_preamble())
                        .map(|s| s.title.clone())
                })
                .unwrap_or_else(|| file_stem(&doc.path).replace(['-', '_'], " "));

            let note_idx = index.notes.len();
            index.note_by_path.insert(doc.path.clone(), note_idx);
            if matches_file_name(&doc.path, options.services_index_note.as_deref()) {
                index.services_note = Some(note_idx);
            }
            if matches_file_name(&doc.path, options.count_index_note.as_deref()) {
                index.count_note = Some(note_idx);
            }
            index.notes.push(NoteMeta {
                path: doc.path.clone(),
                title,
                sections: sections.iter().map(|s| s.id).collect(),
                primary,
            });
            note_extra_aliases.push(fm.aliases);
            index.sections.extend(sections);
        }

        for section in &index.sections {
            if !section.is_preamble() {
                for alias in title_aliases(&section.title, lexicon) {
                    index.aliases.insert(&alias, section.id);
                }
            }
        }

        for (note, extra) in index.notes.iter().zip(&note_extra_aliases) {
            if let Some(primary) = note.primary {
                for alias in note_aliases(&note.title, &note.path, extra, lexicon) {
                    index.aliases.insert(&alias, primary);
                }
            }
        }

        if let Some(note_idx) = index.services_note {
            let content = &docs[note_idx].content;
            for entry in parse_index_note(content) {
                let Some(target) = index.resolve_note(&entry.target) else {
                    index.warnings.push(format!(
                        "{}:{}: services index entry '{}' points to unknown note '{}'",
                        index.notes[note_idx].path, entry.line, entry.name, entry.target
                    ));
                    continue;
                };
                let Some(primary) = index.notes[target].primary else {
                    continue;
                };
                for alias in title_aliases(&entry.name, lexicon) {
                    index.aliases.insert(&alias, primary);
                }
                let exact = normalize(&entry.name);
                if exact.split(' ').all(|t| lexicon.is_stopword(t)) {
                    index.aliases.insert_whole_query(&exact, primary);
                } else {
                    index.aliases.insert(&exact, primary);
                }
            }
        } else if let Some(name) = &options.services_index_note {
            index
                .warnings
                .push(format!("services index note '{}' not found", name));
        }

        let alias_lists: Vec<(SectionId, String)> = index
            .aliases
            .iter()
            .flat_map(|(alias, ids)| ids.iter().map(move |id| (*id, alias.to_string())))
            .collect();
        for (id, alias) in alias_lists {
            index.sections[id].aliases.insert(alias);
        }

        index.terms = index.sections.iter().map(SectionTerms::new).collect();
        index.resolve_count_section(options);
        tracing::debug!(
            notes = index.notes.len(),
            sections = index.sections.len(),
            aliases = index.aliases.len(),
            "vault index built"
        );
        index
    }

    fn resolve_count_section(&mut self, options: &IndexOptions) {
        let Some(note_idx) = self.count_note else {
            if let Some(name) = &options.count_index_note {
                self.warnings
                    .push(format!("count index note '{}' not found", name));
            }
            return;
        };
        let wanted = normalize(&options.count_section);
        let note = &self.notes[note_idx];
        let by_title = note
            .sections
            .iter()
            .copied()
            .find(|id| normalize(&self.sections[*id].title) == wanted);
        let chosen = by_title.or_else(|| {
            note.sections
                .iter()
                .copied()
                .find(|id| !build_brancher_count_snippets(Some(&self.sections[*id])).is_empty())
        });
        self.count_section = chosen;

        if let Some(id) = chosen {
            for record in build_brancher_count_snippets(Some(&self.sections[id])) {
                if record.confidence != Confidence::High {
                    continue;
                }
                if let RecordFields::Count { category, .. } = &record.fields {
                    let normalized = normalize(category);
                    if !normalized.is_empty() {
                        self.count_categories.insert(normalized);
                    }
                }
            }
        }
    }

    /// Find a note by link target: relative path (without `.md`) or file
    /// stem, compared case-insensitively.
    pub fn resolve_note(&self, target: &str) -> Option<usize> {
        let wanted = target.trim().trim_end_matches(".md").to_lowercase();
        let by_path = self
            .notes
            .iter()
            .position(|n| n.path.trim_end_matches(".md").to_lowercase() == wanted);
        by_path.or_else(|| {
            let wanted_stem = file_stem(&wanted).to_string();
            self.notes
                .iter()
                .position(|n| file_stem(&n.path).to_lowercase() == wanted_stem)
        })
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.get(id)
    }

    pub fn terms(&self, id: SectionId) -> Option<&SectionTerms> {
        self.terms.get(id)
    }

    pub fn notes(&self) -> &[NoteMeta] {
        &self.notes
    }

    pub fn note(&self, path: &str) -> Option<&NoteMeta> {
        self.note_by_path.get(path).map(|i| &self.notes[*i])
    }

    /// The note owning a section.
    pub fn note_of(&self, section: &Section) -> Option<&NoteMeta> {
        self.note(&section.file_path)
    }

    pub fn aliases(&self) -> &AliasMap {
        &self.aliases
    }

    /// Maximal aliases occurring in a normalized query.
    pub fn alias_hits(&self, normalized_query: &str) -> Vec<AliasHit<'_>> {
        self.aliases.matches_in(normalized_query)
    }

    /// All sections of the given notes, in document order.
    pub fn sections_for_paths<S: AsRef<str>>(&self, paths: &[S]) -> Vec<&Section> {
        let wanted: BTreeSet<&str> = paths.iter().map(AsRef::as_ref).collect();
        self.sections
            .iter()
            .filter(|s| wanted.contains(s.file_path.as_str()))
            .collect()
    }

    pub fn services_note(&self) -> Option<&NoteMeta> {
        self.services_note.map(|i| &self.notes[i])
    }

    pub fn count_note(&self) -> Option<&NoteMeta> {
        self.count_note.map(|i| &self.notes[i])
    }

    /// The section of the count note that lists categories.
    pub fn count_section(&self) -> Option<&Section> {
        self.count_section.map(|id| &self.sections[id])
    }

    /// Normalized category names found in the count section.
    pub fn count_categories(&self) -> &BTreeSet<String> {
        &self.count_categories
    }

    /// Problems noticed while building, such as unresolved index entries.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> Vec<NoteDocument> {
        vec![
            NoteDocument::new(
                "services/GS1 Basis.md",
                "# GS1 Basis\nIntro\n## Priser\nBasis: 500 kr / år\n",
            ),
            NoteDocument::new(
                "GS1DK Services Index.md",
                "# Services\n- [[GS1 Basis|Starter]]\n- [[Missing Note]]\n",
            ),
            NoteDocument::new(
                "GS1DK Brancher Index.md",
                "# Brancher\n## Pages\n- Retail: 12\n- Healthcare: 7\n",
            ),
        ]
    }

    #[test]
    fn test_build_orders_notes_by_path() {
        let index = VaultIndex::build(docs(), &IndexOptions::default(), &Lexicon::default());
        let paths: Vec<&str> = index.notes().iter().map(|n| n.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["GS1DK Brancher Index.md", "GS1DK Services Index.md", "services/GS1 Basis.md"]
        );
        for (i, s) in index.sections().iter().enumerate() {
            assert_eq!(s.id, i);
        }
    }

    #[test]
    fn test_services_index_registers_display_names() {
        let index = VaultIndex::build(docs(), &IndexOptions::default(), &Lexicon::default());
        let basis = index.note("services/GS1 Basis.md").unwrap();
        let primary = basis.primary.unwrap();
        assert!(index.aliases().get("starter").unwrap().contains(&primary));
        assert!(index.section(primary).unwrap().aliases.contains("starter"));
        assert!(index
            .warnings()
            .iter()
            .any(|w| w.contains("Missing Note")));
    }

    #[test]
    fn test_short_and_stopword_entry_names_still_register() {
        let docs = vec![
            NoteDocument::new(
                "GS1DK Services Index.md",
                "# Services\n- [[Artificial Intelligence|AI]]\n- Pris -> Price List.md\n",
            ),
            NoteDocument::new("Artificial Intelligence.md", "# Artificial Intelligence\ntext\n"),
            NoteDocument::new("Price List.md", "# Price List\n## Oversigt\ntext\n"),
        ];
        let index = VaultIndex::build(docs, &IndexOptions::default(), &Lexicon::default());
        let ai = index.note("Artificial Intelligence.md").unwrap().primary.unwrap();
        let list = index.note("Price List.md").unwrap().primary.unwrap();
        assert!(index.aliases().get("ai").unwrap().contains(&ai));
        assert!(index.aliases().get("pris").unwrap().contains(&list));
        assert_eq!(index.alias_hits("hvad koster ai").len(), 1);
        assert_eq!(index.alias_hits("pris").len(), 1);
        assert!(index.alias_hits("hvad er din pris").is_empty());
    }

    #[test]
    fn test_count_section_and_categories() {
        let index = VaultIndex::build(docs(), &IndexOptions::default(), &Lexicon::default());
        assert_eq!(index.count_section().unwrap().title, "Pages");
        assert!(index.count_categories().contains("retail"));
        assert!(index.count_categories().contains("healthcare"));
    }

    #[test]
    fn test_missing_designated_notes_warn() {
        let docs = vec![NoteDocument::new("a.md", "# A\ntext")];
        let index = VaultIndex::build(docs, &IndexOptions::default(), &Lexicon::default());
        assert!(index.services_note().is_none());
        assert!(index.count_section().is_none());
        assert_eq!(index.warnings().len(), 2);
    }

    #[test]
    fn test_sections_for_paths_and_resolve() {
        let index = VaultIndex::build(docs(), &IndexOptions::default(), &Lexicon::default());
        let sections = index.sections_for_paths(&["services/GS1 Basis.md"]);
        assert_eq!(sections.len(), 2);
        assert!(index.resolve_note("gs1 basis").is_some());
        assert!(index.resolve_note("services/GS1 Basis.md").is_some());
        assert!(index.resolve_note("nope").is_none());
    }

    #[test]
    fn test_empty_index() {
        let index = VaultIndex::empty();
        assert!(index.is_empty());
        assert!(index.alias_hits("anything").is_empty());
    }
}
