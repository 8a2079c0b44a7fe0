//! Markdown section splitter.
//!
//! Splits one note into heading-delimited [`Section`]s with exact 1-based
//! line ranges.
//!
//! # Rules
//!
//! 1. Every ATX heading line (`#` to `######` followed by whitespace)
//!    outside a fenced code block or the front-matter block starts a new
//!    section.
//! 2. A section runs from its heading line to the line before the next
//!    heading of any level, or to the end of the file. Ranges therefore
//!    never overlap and cover every line after the first heading.
//! 3. Non-blank text before the first heading (YAML front matter included)
//!    becomes an implicit level-0 section titled [`PREAMBLE_TITLE`]. A blank
//!    preamble produces no section.
//! 4. A file without headings yields a single preamble section when it has
//!    any non-blank text, and nothing otherwise.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use crate::models::{Section, SectionId, PREAMBLE_TITLE};

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}(#{1,6})(?:[ \t]+(.*?))?[ \t]*$").expect("valid heading regex"));
static CLOSING_HASHES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+#+$").expect("valid closing regex"));

/// Title used for a heading line with no text.
pub const UNTITLED: &str = "(untitled)";

/// A heading found on a line: level and title text.
pub fn parse_heading(line: &str) -> Option<(u8, String)> {
    let caps = HEADING.captures(line)?;
    let level = caps.get(1)?.as_str().len() as u8;
    let raw = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let title = CLOSING_HASHES.replace(raw, "").trim().to_string();
    let title = if title.is_empty() || title.chars().all(|c| c == '#') {
        UNTITLED.to_string()
    } else {
        title
    };
    Some((level, title))
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Split a note into sections, assigning ids from `first_id` upward.
pub fn split_sections(file_path: &str, content: &str, first_id: SectionId) -> Vec<Section> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let mut boundaries: Vec<(usize, u8, String)> = Vec::new();
    let mut in_fence = false;
    for (idx, line) in lines.iter().enumerate().skip(front_matter_len(&lines)) {
        if is_fence(line) {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some((level, title)) = parse_heading(line) {
            boundaries.push((idx, level, title));
        }
    }

    let mut sections = Vec::new();
    let mut next_id = first_id;
    let mut push = |title: String, level: u8, start: usize, end: usize, body: String| {
        sections.push(Section {
            id: next_id,
            title,
            level,
            body,
            file_path: file_path.to_string(),
            line_start: start + 1,
            line_end: end + 1,
            aliases: BTreeSet::new(),
        });
        next_id += 1;
    };

    let first_heading = boundaries.first().map(|(idx, _, _)| *idx).unwrap_or(lines.len());
    if first_heading > 0 {
        let preamble = &lines[..first_heading];
        if preamble.iter().any(|l| !l.trim().is_empty()) {
            push(
                PREAMBLE_TITLE.to_string(),
                0,
                0,
                first_heading - 1,
                preamble.join("\n"),
            );
        }
    }

    for (i, (start, level, title)) in boundaries.iter().enumerate() {
        let end = boundaries
            .get(i + 1)
            .map(|(next, _, _)| next - 1)
            .unwrap_or(lines.len() - 1);
        let body = lines[start + 1..=end].join("\n");
        push(title.clone(), *level, *start, end, body);
    }

    sections
}

/// Number of lines taken by a leading `---` front-matter block, closing
/// fence included. An unclosed block counts as no front matter.
fn front_matter_len(lines: &[&str]) -> usize {
    if lines.first().map(|l| l.trim()) != Some("---") {
        return 0;
    }
    lines
        .iter()
        .skip(1)
        .position(|l| matches!(l.trim(), "---" | "..."))
        .map(|pos| pos + 2)
        .unwrap_or(0)
}

/// Fields read from a YAML front-matter block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub aliases: Vec<String>,
}

fn unquote(value: &str) -> String {
    value
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

/// Read `title:` and `aliases:` from a leading `---` front-matter block.
///
/// Supports inline lists (`aliases: [a, b]`), block lists (`- a`), and a
/// single scalar (`aliases: a`). Anything else in the block is ignored.
pub fn front_matter(content: &str) -> FrontMatter {
    let mut lines = content.lines();
    if lines.next().map(str::trim) != Some("---") {
        return FrontMatter::default();
    }

    let mut fm = FrontMatter::default();
    let mut in_aliases = false;
    for line in lines {
        let trimmed = line.trim();
        if trimmed == "---" || trimmed == "..." {
            break;
        }
        if in_aliases {
            if let Some(item) = trimmed.strip_prefix("- ") {
                let item = unquote(item);
                if !item.is_empty() {
                    fm.aliases.push(item);
                }
                continue;
            }
            in_aliases = false;
        }
        let Some((key, value)) = trimmed.split_once(':') else {
            continue;
        };
        match key.trim().to_lowercase().as_str() {
            "title" => {
                let value = unquote(value);
                if !value.is_empty() {
                    fm.title = Some(value);
                }
            }
            "aliases" | "alias" => {
                let value = value.trim();
                if value.is_empty() {
                    in_aliases = true;
                } else if let Some(inner) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
                    fm.aliases.extend(
                        inner
                            .split(',')
                            .map(unquote)
                            .filter(|s| !s.is_empty()),
                    );
                } else {
                    fm.aliases.push(unquote(value));
                }
            }
            _ => {}
        }
    }
    fm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_heading_levels() {
        assert_eq!(parse_heading("# Title"), Some((1, "Title".to_string())));
        assert_eq!(parse_heading("### Sub ###"), Some((3, "Sub".to_string())));
        assert_eq!(parse_heading("##"), Some((2, UNTITLED.to_string())));
        assert_eq!(parse_heading("#hashtag"), None);
        assert_eq!(parse_heading("####### seven"), None);
        assert_eq!(parse_heading("    # indented code"), None);
    }

    #[test]
    fn test_split_every_heading_one_section() {
        let content = "# A\nalpha\n## B\nbeta\n### C\ngamma\n# D";
        let sections = split_sections("n.md", content, 0);
        let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C", "D"]);
        assert_eq!(
            sections.iter().map(|s| (s.line_start, s.line_end)).collect::<Vec<_>>(),
            vec![(1, 2), (3, 4), (5, 6), (7, 7)]
        );
        assert_eq!(sections[1].body, "beta");
        assert_eq!(sections[3].body, "");
    }

    #[test]
    fn test_ids_continue_from_first_id() {
        let sections = split_sections("n.md", "# A\n# B", 10);
        assert_eq!(sections[0].id, 10);
        assert_eq!(sections[1].id, 11);
    }

    #[test]
    fn test_preamble_becomes_top_section() {
        let content = "---\ntags: x\n---\nIntro line\n\n# First\nbody";
        let sections = split_sections("n.md", content, 0);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, PREAMBLE_TITLE);
        assert_eq!(sections[0].level, 0);
        assert_eq!((sections[0].line_start, sections[0].line_end), (1, 5));
        assert!(sections[0].body.contains("Intro line"));
        assert_eq!(sections[1].line_start, 6);
    }

    #[test]
    fn test_yaml_comments_in_front_matter_are_not_headings() {
        let content = "---\n# owner: sales\naliases: [Basis]\n---\n# Basis\ntext";
        let sections = split_sections("n.md", content, 0);
        let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec![PREAMBLE_TITLE, "Basis"]);
        assert_eq!((sections[0].line_start, sections[0].line_end), (1, 4));
        assert_eq!(sections[1].line_start, 5);

        let unclosed = split_sections("n.md", "---\n# Title\nbody", 0);
        assert_eq!(unclosed[1].title, "Title");
    }

    #[test]
    fn test_blank_preamble_is_dropped() {
        let sections = split_sections("n.md", "\n\n# Only\ntext", 0);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Only");
        assert_eq!(sections[0].line_start, 3);
    }

    #[test]
    fn test_no_headings_single_top_section() {
        let sections = split_sections("n.md", "just text\nmore", 0);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, PREAMBLE_TITLE);
        assert_eq!((sections[0].line_start, sections[0].line_end), (1, 2));
        assert!(split_sections("n.md", "", 0).is_empty());
        assert!(split_sections("n.md", "  \n\n", 0).is_empty());
    }

    #[test]
    fn test_headings_inside_fences_ignored() {
        let content = "# Real\n```\n# not a heading\n```\n## Next";
        let sections = split_sections("n.md", content, 0);
        let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Real", "Next"]);
        assert_eq!(sections[0].line_end, 4);
    }

    #[test]
    fn test_front_matter_aliases() {
        let inline = "---\ntitle: \"GS1 Basis\"\naliases: [Basis, 'Basic plan']\n---\n# X";
        let fm = front_matter(inline);
        assert_eq!(fm.title.as_deref(), Some("GS1 Basis"));
        assert_eq!(fm.aliases, vec!["Basis", "Basic plan"]);

        let block = "---\naliases:\n  - One\n  - Two\ntags: [a]\n---\n";
        assert_eq!(front_matter(block).aliases, vec!["One", "Two"]);

        assert_eq!(front_matter("# no front matter"), FrontMatter::default());
    }
}
