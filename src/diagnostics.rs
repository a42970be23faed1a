use std::fmt::Write as _;

use crate::error::Error;

/// ANSI bold, applied to markdown heading lines.
const BOLD: &str = "\x1b[1m";
/// ANSI reset.
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic: what happened,
/// and how to fix it where a fix is known.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::InvalidLanguage { language, valid } => render_invalid_language(language, valid),
        Error::MalformedSection { file, line, reason } => {
            render_malformed_section(&file.display().to_string(), *line, reason)
        },
        _ => render_generic(e),
    };
}

/// Diagnostics that need no more than the error's own fields.
fn render_generic(e: &Error) -> String {
    return match e {
        Error::FileNotFound { path } => format!("\
# Error: File Not Found

`{}` does not exist.
", path.display()),

        Error::ParseFailed { file, reason } => format!("\
# Error: Parse Failed

Could not parse `{}`: {reason}
", file.display()),

        Error::Io(e) => format!("\
# Error: I/O

{e}
"),
        Error::TomlDe(e) => format!("\
# Error: Invalid .docnav.toml

{e}
"),
        Error::Watch { reason } => format!("\
# Error: Watch Failed

{reason}
"),
        // Already handled in render_error, but need exhaustive match.
        _ => format!("\
# Error

{e}
"),
    };
}

/// List every platform, plus a suggestion when the value only differs in case.
fn render_invalid_language(language: &str, valid: &[String]) -> String {
    let mut out = format!("\
# Error: Invalid Language

`{language}` is not a supported platform.

## Valid platforms

");
    for v in valid {
        let _ = writeln!(out, "- `{v}`");
    }

    if let Some(suggestion) = find_case_insensitive_match(language, valid) {
        let _ = write!(out, "\n## Did you mean `{suggestion}`?\n\n    <LanguageSection language=\"{suggestion}\">\n");
    }
    return out;
}

/// Point at the bad tag and show the expected tag layout.
fn render_malformed_section(file: &str, line: u32, reason: &str) -> String {
    return format!("\
# Error: Malformed Section

`{file}:{line}`: {reason}

## Fix

Sections open and close on their own lines:

    <LanguageSection language=\"rust\">
    ...
    </LanguageSection>
");
}

/// Platform values compare case-sensitively; a near miss differs only in case.
pub(crate) fn find_case_insensitive_match(language: &str, valid: &[String]) -> Option<String> {
    let needle = language.trim();
    return valid.iter().find(|v| return v.eq_ignore_ascii_case(needle)).cloned();
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
    use crate::platform::Platform;

    #[test]
    fn invalid_language_lists_platforms() {
        let err = Platform::parse("Kotlin").unwrap_err();
        let md = render_error(&err);
        assert!(md.starts_with("# Error: Invalid Language"));
        for platform in Platform::ALL {
            assert!(md.contains(&format!("- `{platform}`")), "{md}");
        }
        assert!(!md.contains("Did you mean"));
    }

    #[test]
    fn near_miss_gets_a_suggestion() {
        let err = Platform::parse("Rust").unwrap_err();
        let md = render_error(&err);
        assert!(md.contains("Did you mean `rust`?"), "{md}");
    }

    #[test]
    fn malformed_section_points_at_line() {
        let err = Error::MalformedSection {
            file: "docs/a.md".into(),
            line: 7,
            reason: "section is never closed".to_string(),
        };
        assert!(render_error(&err).contains("`docs/a.md:7`: section is never closed"));
    }
}
