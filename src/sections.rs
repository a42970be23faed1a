//! `<LanguageSection language="…">` blocks in markdown: parsing, mounting
//! each block behind a [`LanguageGate`], and rendering for a selection.

use std::ops::Range;
use std::path::Path;

use regex::Regex;
use tree_sitter::Node;

use crate::context::{AppContext, LanguageScope};
use crate::error::Error;
use crate::gate::LanguageGate;
use crate::platform::Platform;
use crate::toc;

/// Markdown split into plain text and unvalidated language sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawBlock {
    /// A section whose language has not been checked yet.
    Section {
        /// Nested blocks.
        body: Vec<Self>,
        /// The `language` attribute, verbatim.
        language: String,
        /// One-based line of the opening tag.
        line: u32,
    },
    /// Consecutive plain lines, newlines included.
    Text(String),
}

/// Markdown with every section mounted behind a gate.
#[derive(Debug)]
pub enum Block {
    /// A gated section.
    Section(LanguageGate<Vec<Self>>),
    /// Consecutive plain lines, newlines included.
    Text(String),
}

/// A section whose language is not a platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSection {
    /// The rejected language value.
    pub language: String,
    /// One-based line of the opening tag.
    pub line: u32,
}

/// Compiled tag patterns.
struct SectionSyntax {
    /// Captures the `language` attribute value (double or single quoted).
    attribute: Regex,
    /// Matches a closing tag line.
    close: Regex,
    /// Matches an opening tag line, capturing its attributes.
    open: Regex,
}

impl SectionSyntax {
    /// Compile the tag patterns.
    ///
    /// # Panics
    ///
    /// Panics if a hardcoded pattern is invalid (compile-time invariant).
    #[allow(clippy::expect_used, reason = "patterns are literals; a bad one fails every test")]
    fn new() -> Self {
        return Self {
            attribute: Regex::new(r#"\blanguage\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex"),
            close: Regex::new(r"^\s*</LanguageSection\s*>\s*$").expect("valid regex"),
            open: Regex::new(r"^\s*<LanguageSection\b([^>]*)>\s*$").expect("valid regex"),
        };
    }
}

/// A section still waiting for its closing tag.
struct OpenSection {
    /// Blocks collected so far.
    body: Vec<RawBlock>,
    /// The `language` attribute.
    language: String,
    /// One-based line of the opening tag.
    line: u32,
}

/// Split markdown into text and sections. Tags must sit on their own line.
/// Lines inside fenced or indented code blocks are always text, so a page
/// can show the tag syntax as an example.
///
/// # Errors
///
/// Returns `Error::ParseFailed` if the markdown cannot be parsed, or
/// `Error::MalformedSection` for a closing tag without an opening tag, an
/// opening tag without a `language` attribute, or a section left open at
/// the end of the file.
pub fn parse(path: &Path, source: &str) -> Result<Vec<RawBlock>, Error> {
    let syntax = SectionSyntax::new();
    let code = code_lines(path, source)?;
    let mut root: Vec<RawBlock> = Vec::new();
    let mut stack: Vec<OpenSection> = Vec::new();

    for (idx, line) in source.split_inclusive('\n').enumerate() {
        if code.iter().any(|range| return range.contains(&idx)) {
            push_text(current_body(&mut root, &mut stack), line);
            continue;
        }

        let line_no = u32::try_from(idx).unwrap_or(u32::MAX).saturating_add(1);
        let trimmed = line.trim_end_matches(['\r', '\n']);

        if let Some(cap) = syntax.open.captures(trimmed) {
            let attrs = cap.get(1).map_or("", |m| return m.as_str());
            let Some(language) = language_attribute(&syntax, attrs) else {
                return Err(malformed(path, line_no, "missing `language` attribute"));
            };
            stack.push(OpenSection {
                body: Vec::new(),
                language,
                line: line_no,
            });
            continue;
        }

        if syntax.close.is_match(trimmed) {
            let Some(open) = stack.pop() else {
                return Err(malformed(path, line_no, "closing tag without an opening tag"));
            };
            current_body(&mut root, &mut stack).push(RawBlock::Section {
                body: open.body,
                language: open.language,
                line: open.line,
            });
            continue;
        }

        push_text(current_body(&mut root, &mut stack), line);
    }

    if let Some(open) = stack.last() {
        return Err(malformed(path, open.line, "section is never closed"));
    }
    return Ok(root);
}

/// Zero-based line ranges covered by fenced or indented code blocks.
///
/// # Errors
///
/// Returns `Error::ParseFailed` if tree-sitter cannot parse the source.
fn code_lines(path: &Path, source: &str) -> Result<Vec<Range<usize>>, Error> {
    let tree = toc::parse_tree(path, source)?;
    let mut out = Vec::new();
    collect_code(tree.root_node(), &mut out);
    return Ok(out);
}

/// Depth-first walk collecting code block line ranges; blocks nest in lists and quotes.
fn collect_code(node: Node<'_>, out: &mut Vec<Range<usize>>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "fenced_code_block" | "indented_code_block" => {
                let end = child.end_position();
                let stop = if end.column == 0 { end.row } else { end.row.saturating_add(1) };
                out.push(child.start_position().row..stop);
            },
            _ => collect_code(child, out),
        }
    }
}

/// Extract the `language` attribute value from a tag's attribute text.
fn language_attribute(syntax: &SectionSyntax, attrs: &str) -> Option<String> {
    let cap = syntax.attribute.captures(attrs)?;
    return cap.get(1).or_else(|| return cap.get(2)).map(|m| return m.as_str().to_string());
}

/// The block list new content goes into: the innermost open section, or the document.
fn current_body<'a>(root: &'a mut Vec<RawBlock>, stack: &'a mut [OpenSection]) -> &'a mut Vec<RawBlock> {
    return match stack.last_mut() {
        Some(open) => &mut open.body,
        None => root,
    };
}

/// Append a line, merging with a preceding text block.
fn push_text(blocks: &mut Vec<RawBlock>, line: &str) {
    if let Some(RawBlock::Text(text)) = blocks.last_mut() {
        text.push_str(line);
        return;
    }
    blocks.push(RawBlock::Text(line.to_string()));
}

/// Build a `MalformedSection` error.
fn malformed(path: &Path, line: u32, reason: &str) -> Error {
    return Error::MalformedSection {
        file: path.to_path_buf(),
        line,
        reason: reason.to_string(),
    };
}

/// Every section whose language is not a platform, in document order.
pub fn invalid_sections(blocks: &[RawBlock]) -> Vec<InvalidSection> {
    let mut out = Vec::new();
    collect_invalid(blocks, &mut out);
    return out;
}

/// Recursive worker for [`invalid_sections`].
fn collect_invalid(blocks: &[RawBlock], out: &mut Vec<InvalidSection>) {
    for block in blocks {
        if let RawBlock::Section { body, language, line } = block {
            if Platform::parse(language).is_err() {
                out.push(InvalidSection {
                    language: language.clone(),
                    line: *line,
                });
            }
            collect_invalid(body, out);
        }
    }
}

/// Mount every section behind a gate bound to `ctx`. Validation covers the
/// whole document before anything can be rendered.
///
/// # Errors
///
/// Returns `Error::InvalidLanguage` for the first section whose language
/// is not a platform.
pub fn mount(blocks: Vec<RawBlock>, ctx: &AppContext) -> Result<Vec<Block>, Error> {
    let mut mounted = Vec::with_capacity(blocks.len());
    for block in blocks {
        match block {
            RawBlock::Section { body, language, line } => {
                let children = mount(body, ctx)?;
                let gate = LanguageGate::new(&language, children, ctx).inspect_err(|_| {
                    log::debug!("rejected section language {language:?} at line {line}");
                })?;
                mounted.push(Block::Section(gate));
            },
            RawBlock::Text(text) => mounted.push(Block::Text(text)),
        }
    }
    return Ok(mounted);
}

/// Propagate a selection change to every gate, including hidden ones.
pub fn sync(blocks: &mut [Block], ctx: &AppContext) {
    for block in blocks {
        if let Block::Section(gate) = block {
            gate.on_context_change(ctx);
            sync(gate.children_mut(), ctx);
        }
    }
}

/// Render the visible content. Hidden sections contribute nothing.
pub fn render(blocks: &[Block], scope: &LanguageScope) -> String {
    let mut out = String::new();
    render_into(blocks, scope, &mut out);
    return out;
}

/// Recursive worker for [`render`].
fn render_into(blocks: &[Block], scope: &LanguageScope, out: &mut String) {
    for block in blocks {
        match block {
            Block::Section(gate) => {
                let Some(rendered) = gate.render(scope) else { continue };
                out.push_str(&rendered.tab_row_html());
                render_into(rendered.children, &rendered.scope, out);
            },
            Block::Text(text) => out.push_str(text),
        }
    }
}

/// Parse, mount, and render `source` for `ctx` in one step.
///
/// # Errors
///
/// Returns `Error::MalformedSection` or `Error::InvalidLanguage`.
pub fn render_document(path: &Path, source: &str, ctx: &AppContext) -> Result<String, Error> {
    let blocks = mount(parse(path, source)?, ctx)?;
    return Ok(render(&blocks, &LanguageScope::root()));
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

    const DOC: &str = "\
# Install

<LanguageSection language=\"csharp\">

Run `dotnet add package`.

</LanguageSection>
<LanguageSection language='rust'>

Run `cargo add`.

</LanguageSection>
Done.
";

    const fn ctx(platform: Platform) -> AppContext {
        AppContext { platform }
    }

    #[test]
    fn parses_sections_with_lines() {
        let blocks = parse(Path::new("t.md"), DOC).unwrap();
        let sections: Vec<(&str, u32)> = blocks
            .iter()
            .filter_map(|b| match b {
                RawBlock::Section { language, line, .. } => Some((language.as_str(), *line)),
                RawBlock::Text(_) => None,
            })
            .collect();
        assert_eq!(sections, vec![("csharp", 3), ("rust", 8)]);
    }

    #[test]
    fn renders_only_the_selected_language() {
        let csharp = render_document(Path::new("t.md"), DOC, &ctx(Platform::CSharp)).unwrap();
        assert!(csharp.contains("dotnet add"));
        assert!(!csharp.contains("cargo add"));
        assert_eq!(csharp.matches("role=\"tablist\"").count(), 1);
        assert!(csharp.starts_with("# Install\n"));
        assert!(csharp.ends_with("Done.\n"));

        let rust = render_document(Path::new("t.md"), DOC, &ctx(Platform::Rust)).unwrap();
        assert!(rust.contains("cargo add"));
        assert!(!rust.contains("dotnet add"));
    }

    #[test]
    fn fallback_selection_renders_csharp() {
        let out = render_document(Path::new("t.md"), DOC, &ctx(Platform::Swift)).unwrap();
        assert!(out.contains("dotnet add"));
    }

    #[test]
    fn nested_section_reads_enclosing_scope() {
        let doc = "<LanguageSection language=\"rust\">\nouter\n<LanguageSection language=\"rust\">\ninner\n</LanguageSection>\n</LanguageSection>\n";
        let out = render_document(Path::new("t.md"), doc, &ctx(Platform::Rust)).unwrap();
        assert!(out.contains("outer\n"));
        assert!(out.contains("inner\n"));
        assert_eq!(out.matches("role=\"tablist\"").count(), 2);
    }

    #[test]
    fn invalid_language_fails_before_rendering() {
        let doc = "<LanguageSection language=\"rust\">\nok\n</LanguageSection>\n<LanguageSection language=\"go\">\nno\n</LanguageSection>\n";
        let err = render_document(Path::new("t.md"), doc, &ctx(Platform::Rust)).unwrap_err();
        assert!(matches!(err, Error::InvalidLanguage { ref language, .. } if language == "go"));
    }

    #[test]
    fn reports_every_invalid_section() {
        let doc = "<LanguageSection language=\"go\">\n<LanguageSection language=\"Rust\">\n</LanguageSection>\n</LanguageSection>\n";
        let blocks = parse(Path::new("t.md"), doc).unwrap();
        assert_eq!(
            invalid_sections(&blocks),
            vec![
                InvalidSection {
                    language: "go".to_string(),
                    line: 1,
                },
                InvalidSection {
                    language: "Rust".to_string(),
                    line: 2,
                },
            ]
        );
    }

    #[test]
    fn unbalanced_tags_are_malformed() {
        let unclosed = parse(Path::new("t.md"), "<LanguageSection language=\"rust\">\ntext\n").unwrap_err();
        assert!(matches!(unclosed, Error::MalformedSection { line: 1, .. }));

        let stray = parse(Path::new("t.md"), "text\n</LanguageSection>\n").unwrap_err();
        assert!(matches!(stray, Error::MalformedSection { line: 2, .. }));

        let bare = parse(Path::new("t.md"), "<LanguageSection>\n</LanguageSection>\n").unwrap_err();
        assert!(matches!(bare, Error::MalformedSection { line: 1, .. }));
    }

    #[test]
    fn tags_inside_fenced_code_are_text() {
        let doc = "Example:\n\n```md\n<LanguageSection language=\"rust\">\n```\n\nAfter.\n";
        let blocks = parse(Path::new("t.md"), doc).unwrap();
        assert_eq!(blocks, vec![RawBlock::Text(doc.to_string())]);

        let out = render_document(Path::new("t.md"), doc, &ctx(Platform::CSharp)).unwrap();
        assert_eq!(out, doc);
    }

    #[test]
    fn tags_inside_indented_code_are_text() {
        let doc = "Sections look like this:\n\n    <LanguageSection language=\"kotlin\">\n    ...\n    </LanguageSection>\n\nDone.\n";
        let blocks = parse(Path::new("t.md"), doc).unwrap();
        assert!(invalid_sections(&blocks).is_empty());
        assert_eq!(render_document(Path::new("t.md"), doc, &ctx(Platform::Rust)).unwrap(), doc);
    }

    #[test]
    fn code_example_inside_a_real_section_stays_in_its_body() {
        let doc = "<LanguageSection language=\"rust\">\n\n```\n</LanguageSection>\n```\n\n</LanguageSection>\n";
        let blocks = parse(Path::new("t.md"), doc).unwrap();
        let [RawBlock::Section { body, language, line }] = blocks.as_slice() else {
            panic!("expected one section, got {blocks:?}");
        };
        assert_eq!((language.as_str(), *line), ("rust", 1));
        assert_eq!(body, &vec![RawBlock::Text("\n```\n</LanguageSection>\n```\n\n".to_string())]);
    }

    #[test]
    fn sync_follows_selection_changes() {
        let mut blocks = mount(parse(Path::new("t.md"), DOC).unwrap(), &ctx(Platform::CSharp)).unwrap();
        sync(&mut blocks, &ctx(Platform::Rust));
        let out = render(&blocks, &LanguageScope::root());
        assert!(out.contains("cargo add"));
        assert!(!out.contains("dotnet add"));
    }
}
