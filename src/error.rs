/// Crate-level error types for docnav diagnostics.
use std::path::PathBuf;

/// Every error names the file, line, or value at fault so the diagnostic
/// can tell the author what to change without a debugger.
#[allow(clippy::error_impl_error, reason = "crate-internal error type in binary")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A markdown source file does not exist on disk.
    #[error("file not found: {}", path.display())]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// A language value is not a member of the platform enumeration.
    #[error(
        "invalid language '{language}'. The language must be one of the following options: {}",
        valid.join(",")
    )]
    InvalidLanguage {
        /// The rejected language value, verbatim.
        language: String,
        /// Every accepted platform value, in canonical order.
        valid: Vec<String>,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// A `LanguageSection` tag is unbalanced or missing its `language` attribute.
    #[error("malformed section at {}:{line}: {reason}", file.display())]
    MalformedSection {
        /// Markdown file containing the section.
        file: PathBuf,
        /// One-based line of the offending tag.
        line: u32,
        /// What is wrong with the tag.
        reason: String,
    },

    /// Tree-sitter failed to parse a markdown file.
    #[error("parse failed: {}: {reason}", file.display())]
    ParseFailed {
        /// File that failed to parse.
        file: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// The filesystem watcher could not be created or attached.
    #[error("watch: {reason}")]
    Watch {
        /// Description of the watcher failure.
        reason: String,
    },
}
