//! Table-of-contents extraction from markdown via tree-sitter, plus the
//! filtering and identity rules the active-heading tracker relies on.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use tree_sitter::{Node, Parser, Tree};

use crate::error::Error;

/// Heading levels that take part in scroll tracking.
pub const OBSERVED_LEVELS: RangeInclusive<u8> = 2..=3;

/// Closing section title that is never highlighted.
pub const EXCLUDED_TITLE: &str = "Next steps";

/// One heading in a document's table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    /// Stable anchor id. Absent when the heading text slugifies to nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Heading depth, 1 through 6.
    pub level: u8,
    /// Display text.
    pub title: String,
}

impl TocEntry {
    /// The id, when present and non-empty.
    pub fn anchor(&self) -> Option<&str> {
        return self.id.as_deref().filter(|id| return !id.is_empty());
    }
}

/// A heading together with its zero-based source line, used for layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// The table-of-contents entry.
    pub entry: TocEntry,
    /// Zero-based line the heading starts on.
    pub line: u32,
}

/// SHA-256 identity of an ordered table of contents, 64 lowercase hex chars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocFingerprint(
    /// The hex-encoded digest.
    pub String,
);

/// Whether an entry is eligible for scroll tracking: non-empty id,
/// level 2 or 3, and not the closing "Next steps" section.
pub fn is_observable(entry: &TocEntry) -> bool {
    return entry.anchor().is_some()
        && OBSERVED_LEVELS.contains(&entry.level)
        && entry.title != EXCLUDED_TITLE;
}

/// Entries eligible for scroll tracking, in document order.
pub fn observable_entries(toc: &[TocEntry]) -> Vec<&TocEntry> {
    return toc.iter().filter(|e| return is_observable(e)).collect();
}

/// Identity of a table of contents. Equal fingerprints mean the same input.
pub fn fingerprint(toc: &[TocEntry]) -> TocFingerprint {
    let mut hasher = Sha256::new();
    for entry in toc {
        hasher.update([entry.level]);
        hasher.update(entry.id.as_deref().unwrap_or("").as_bytes());
        hasher.update([0]);
        hasher.update(entry.title.as_bytes());
        hasher.update([0]);
    }
    return TocFingerprint(format!("{:x}", hasher.finalize()));
}

/// Extract the table of contents of a markdown document.
///
/// # Errors
///
/// Returns `Error::ParseFailed` if tree-sitter cannot parse the source.
pub fn extract(path: &Path, source: &str) -> Result<Vec<TocEntry>, Error> {
    return Ok(headings(path, source)?.into_iter().map(|h| return h.entry).collect());
}

/// Parse markdown into a tree-sitter block tree.
///
/// # Errors
///
/// Returns `Error::ParseFailed` if the grammar cannot be loaded or tree-sitter
/// gives up on the source.
pub fn parse_tree(path: &Path, source: &str) -> Result<Tree, Error> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_md::LANGUAGE.into())
        .map_err(|e| {
            return Error::ParseFailed {
                file: path.to_path_buf(),
                reason: e.to_string(),
            };
        })?;

    return parser.parse(source, None).ok_or_else(|| {
        return Error::ParseFailed {
            file: path.to_path_buf(),
            reason: "tree-sitter returned None".to_string(),
        };
    });
}

/// Extract every ATX and setext heading with its source line.
/// Ids are slugs of the heading text, deduplicated with `-1`, `-2`, … suffixes.
///
/// # Errors
///
/// Returns `Error::ParseFailed` if tree-sitter cannot parse the source.
pub fn headings(path: &Path, source: &str) -> Result<Vec<Heading>, Error> {
    let tree = parse_tree(path, source)?;
    let mut slugs = SlugCounter::default();
    let mut out = Vec::new();
    collect_headings(tree.root_node(), source, &mut slugs, &mut out);
    return Ok(out);
}

/// Depth-first walk collecting heading nodes in document order.
fn collect_headings(node: Node<'_>, source: &str, slugs: &mut SlugCounter, out: &mut Vec<Heading>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "atx_heading" | "setext_heading" => {
                if let Some(heading) = heading_from_node(child, source, slugs) {
                    out.push(heading);
                }
            },
            _ => collect_headings(child, source, slugs, out),
        }
    }
}

/// Build a heading from an `atx_heading` or `setext_heading` node.
fn heading_from_node(node: Node<'_>, source: &str, slugs: &mut SlugCounter) -> Option<Heading> {
    let mut level = None;
    let mut title = None;

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let kind = child.kind();
        if let Some(marker_level) = level_from_marker(kind) {
            level = Some(marker_level);
        } else if kind == "inline" || kind == "paragraph" {
            title = child.utf8_text(source.as_bytes()).ok().map(str::trim);
        }
    }

    let level = level?;
    let mut title = title.unwrap_or_default();
    if node.kind() == "atx_heading" {
        title = strip_closing_sequence(title);
    }
    let id = slugs.unique(&slugify(title));
    let line = u32::try_from(node.start_position().row).ok()?;

    return Some(Heading {
        entry: TocEntry {
            id,
            level,
            title: title.to_string(),
        },
        line,
    });
}

/// Drop an ATX closing sequence: a trailing run of `#` preceded by a space
/// or making up the whole text. `C#` and `Title\#` are left alone.
fn strip_closing_sequence(text: &str) -> &str {
    let trimmed = text.trim_end();
    let without = trimmed.trim_end_matches('#');
    if without.len() == trimmed.len() {
        return trimmed;
    }
    if without.is_empty() {
        return without;
    }
    if without.ends_with([' ', '\t']) {
        return without.trim_end();
    }
    return trimmed;
}

/// Heading level encoded in a marker node kind, e.g. `atx_h2_marker` or `setext_h1_underline`.
fn level_from_marker(kind: &str) -> Option<u8> {
    let digit = kind
        .strip_prefix("atx_h")
        .and_then(|rest| return rest.strip_suffix("_marker"))
        .or_else(|| {
            return kind
                .strip_prefix("setext_h")
                .and_then(|rest| return rest.strip_suffix("_underline"));
        })?;
    return digit.parse().ok();
}

/// Hands out unique ids. A base seen before gets the next free `-N` suffix,
/// skipping any candidate already emitted, so `Example`, `Example`,
/// `Example 1` become `example`, `example-1`, `example-1-1`.
#[derive(Default)]
struct SlugCounter {
    /// Every id emitted so far, with the last suffix tried for it as a base.
    seen: HashMap<String, u32>,
}

impl SlugCounter {
    /// Next unused id for `base`; `None` for an empty slug.
    fn unique(&mut self, base: &str) -> Option<String> {
        if base.is_empty() {
            return None;
        }
        if !self.seen.contains_key(base) {
            self.seen.insert(base.to_string(), 0);
            return Some(base.to_string());
        }
        loop {
            let count = self.seen.entry(base.to_string()).or_insert(0);
            *count = count.saturating_add(1);
            let candidate = format!("{base}-{count}");
            if !self.seen.contains_key(&candidate) {
                self.seen.insert(candidate.clone(), 0);
                return Some(candidate);
            }
        }
    }
}

/// GitHub-style anchor slug: lowercase, punctuation dropped, each space
/// turned into a hyphen. Letters, digits, `-` and `_` are kept.
fn slugify(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let mut result = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            result.push(c);
        } else if c == ' ' {
            result.push('-');
        }
    }
    return result;
}

#[cfg(test)]
#[allow(
    clippy::indexing_slicing,
    clippy::missing_assert_message,
    clippy::missing_panics_doc,
    reason = "tests index fixtures and assert without messages"
)]
mod tests {
    use super::*;

    fn entry(id: &str, level: u8, title: &str) -> TocEntry {
        return TocEntry {
            id: Some(id.to_string()),
            level,
            title: title.to_string(),
        };
    }

    #[test]
    fn filters_empty_ids_levels_and_next_steps() {
        let toc = vec![
            entry("a", 2, "Intro"),
            entry("", 2, "Skip"),
            entry("b", 4, "Deep"),
            entry("c", 3, "Next steps"),
        ];
        let kept: Vec<&str> = observable_entries(&toc).into_iter().filter_map(TocEntry::anchor).collect();
        assert_eq!(kept, vec!["a"]);
    }

    #[test]
    fn absent_id_is_not_observable() {
        let mut e = entry("x", 2, "Title");
        e.id = None;
        assert!(!is_observable(&e));
    }

    #[test]
    fn extracts_atx_headings_in_order() {
        let source = "# Guide\n\n## Getting Started\n\nText.\n\n### Install it\n\n#### Details\n";
        let toc = extract(Path::new("guide.md"), source).unwrap();
        assert_eq!(
            toc,
            vec![
                entry("guide", 1, "Guide"),
                entry("getting-started", 2, "Getting Started"),
                entry("install-it", 3, "Install it"),
                entry("details", 4, "Details"),
            ]
        );
    }

    #[test]
    fn records_source_lines() {
        let source = "# Title\n\nIntro text.\n\n## Usage\n";
        let found = headings(Path::new("t.md"), source).unwrap();
        let lines: Vec<u32> = found.iter().map(|h| h.line).collect();
        assert_eq!(lines, vec![0, 4]);
    }

    #[test]
    fn repeated_titles_get_suffixed_ids() {
        let source = "## Example\n\n## Example\n\n## Example\n";
        let ids: Vec<Option<String>> =
            extract(Path::new("t.md"), source).unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(
            ids,
            vec![
                Some("example".to_string()),
                Some("example-1".to_string()),
                Some("example-2".to_string()),
            ]
        );
    }

    #[test]
    fn setext_headings_are_extracted() {
        let source = "Overview\n========\n\nSection\n-------\n";
        let toc = extract(Path::new("t.md"), source).unwrap();
        assert_eq!(toc, vec![entry("overview", 1, "Overview"), entry("section", 2, "Section")]);
    }

    #[test]
    fn punctuation_only_heading_has_no_id() {
        let toc = extract(Path::new("t.md"), "## ???\n").unwrap();
        assert_eq!(toc.len(), 1);
        assert_eq!(toc[0].id, None);
        assert!(!is_observable(&toc[0]));
    }

    #[test]
    fn fingerprint_tracks_content_and_order() {
        let a = vec![entry("a", 2, "A"), entry("b", 2, "B")];
        let same = a.clone();
        let reordered = vec![entry("b", 2, "B"), entry("a", 2, "A")];
        assert_eq!(fingerprint(&a), fingerprint(&same));
        assert_ne!(fingerprint(&a), fingerprint(&reordered));
        assert_eq!(fingerprint(&a).0.len(), 64);
    }

    #[test]
    fn slugify_matches_github_anchors() {
        assert_eq!(slugify("Getting Started"), "getting-started");
        assert_eq!(slugify("What's New?"), "whats-new");
        assert_eq!(slugify("C# & .NET"), "c--net");
        assert_eq!(slugify("snake_case and kebab-case"), "snake_case-and-kebab-case");
        assert_eq!(slugify("  Hello World  "), "hello-world");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn suffixed_ids_never_collide_with_literal_titles() {
        let source = "## Example\n\n## Example\n\n## Example 1\n\n## Example 1\n";
        let ids: Vec<Option<String>> =
            extract(Path::new("t.md"), source).unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(
            ids,
            vec![
                Some("example".to_string()),
                Some("example-1".to_string()),
                Some("example-1-1".to_string()),
                Some("example-1-2".to_string()),
            ]
        );
    }

    #[test]
    fn literal_title_first_pushes_suffix_past_it() {
        let source = "## Example 1\n\n## Example\n\n## Example\n";
        let ids: Vec<Option<String>> =
            extract(Path::new("t.md"), source).unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(
            ids,
            vec![
                Some("example-1".to_string()),
                Some("example".to_string()),
                Some("example-2".to_string()),
            ]
        );
    }

    #[test]
    fn atx_closing_sequence_is_not_part_of_the_title() {
        let toc = extract(Path::new("t.md"), "## Title ##\n\n### Usage #####   \n").unwrap();
        assert_eq!(toc, vec![entry("title", 2, "Title"), entry("usage", 3, "Usage")]);
    }

    #[test]
    fn closed_next_steps_heading_is_excluded() {
        let toc = extract(Path::new("t.md"), "## Setup\n\n## Next steps ##\n").unwrap();
        assert_eq!(toc[1].title, EXCLUDED_TITLE);
        let kept: Vec<&str> = observable_entries(&toc).into_iter().filter_map(TocEntry::anchor).collect();
        assert_eq!(kept, vec!["setup"]);
    }

    #[test]
    fn hashes_inside_titles_are_kept() {
        assert_eq!(strip_closing_sequence("C#"), "C#");
        assert_eq!(strip_closing_sequence("Title \\#"), "Title \\#");
        assert_eq!(strip_closing_sequence("Title #"), "Title");
        assert_eq!(strip_closing_sequence("###"), "");
    }
}
