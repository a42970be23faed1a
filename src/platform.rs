//! The closed set of programming languages the documentation targets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A documentation target language. Membership is checked at every
/// boundary where a language arrives as a string. Variants are declared
/// alphabetically; [`Platform::ALL`] is the only ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// C# / .NET.
    CSharp,
    /// C++.
    Cpp,
    /// Java.
    Java,
    /// Python.
    Python,
    /// Rust.
    Rust,
    /// Swift.
    Swift,
    /// TypeScript / JavaScript.
    TypeScript,
}

impl Platform {
    /// Every platform in canonical order. The tab row renders one marker per entry.
    pub const ALL: [Self; 7] = [
        Self::CSharp,
        Self::Rust,
        Self::Cpp,
        Self::Java,
        Self::Python,
        Self::Swift,
        Self::TypeScript,
    ];

    /// The wire string used in markdown attributes, config, and JSON.
    pub const fn as_str(self) -> &'static str {
        return match self {
            Self::CSharp => "csharp",
            Self::Cpp => "cpp",
            Self::Java => "java",
            Self::Python => "python",
            Self::Rust => "rust",
            Self::Swift => "swift",
            Self::TypeScript => "typescript",
        };
    }

    /// Parse a wire string. Matching is exact and case-sensitive.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidLanguage` listing every valid value when
    /// `value` is not a platform.
    pub fn parse(value: &str) -> Result<Self, Error> {
        return Self::ALL
            .iter()
            .find(|p| return p.as_str() == value)
            .copied()
            .ok_or_else(|| {
                return Error::InvalidLanguage {
                    language: value.to_string(),
                    valid: Self::valid_values(),
                };
            });
    }

    /// Wire strings of every platform, in canonical order.
    pub fn valid_values() -> Vec<String> {
        return Self::ALL.iter().map(|p| return p.as_str().to_string()).collect();
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(self.as_str());
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        return Self::parse(s);
    }
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

    #[test]
    fn every_platform_parses_from_its_wire_string() {
        for platform in Platform::ALL {
            assert_eq!(Platform::parse(platform.as_str()).unwrap(), platform);
        }
    }

    #[test]
    fn unknown_language_lists_every_valid_value() {
        let err = Platform::parse("cobol").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'cobol'"), "{message}");
        for platform in Platform::ALL {
            assert!(message.contains(platform.as_str()), "{message} is missing {platform}");
        }
        let Error::InvalidLanguage { valid, .. } = err else {
            panic!("expected InvalidLanguage");
        };
        assert_eq!(valid.len(), Platform::ALL.len());
    }

    #[test]
    fn canonical_order_starts_with_mapped_tabs() {
        assert_eq!(
            Platform::valid_values(),
            vec!["csharp", "rust", "cpp", "java", "python", "swift", "typescript"]
        );
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!(Platform::parse("Rust").is_err());
        assert!(Platform::parse(" rust").is_err());
        assert!(Platform::parse("").is_err());
    }

    #[test]
    fn serde_uses_wire_strings() {
        let json = serde_json::to_string(&Platform::TypeScript).unwrap();
        assert_eq!(json, "\"typescript\"");
        let back: Platform = serde_json::from_str("\"csharp\"").unwrap();
        assert_eq!(back, Platform::CSharp);
    }
}
