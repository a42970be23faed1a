use std::path::Path;

use crate::error::Error;
use crate::platform::Platform;
use crate::tracker::TieBreak;

/// File name of the project configuration.
pub const CONFIG_FILE: &str = ".docnav.toml";

/// Project configuration loaded from `.docnav.toml`.
/// Include/exclude patterns are path prefixes applied to markdown files.
#[derive(Debug)]
pub struct Config {
    exclude: Vec<String>,
    include: Vec<String>,
    platform: Platform,
    tie_break: TieBreak,
}

/// Raw TOML structure for `.docnav.toml`.
#[derive(serde::Deserialize)]
struct DocnavTomlConfig {
    #[serde(default)]
    exclude: Vec<String>,
    #[serde(default)]
    include: Vec<String>,
    platform: Option<String>,
    #[serde(default)]
    tracker: TrackerTomlConfig,
}

/// `[tracker]` table.
#[derive(Default, serde::Deserialize)]
struct TrackerTomlConfig {
    #[serde(default)]
    tie_break: TieBreak,
}

impl Config {
    /// Load config from `.docnav.toml` in the given root directory.
    /// Returns the defaults if the file doesn't exist.
    /// Returns an error if the file exists but is malformed; a config the
    /// user wrote is never silently replaced by defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// `Error::TomlDe` if the TOML is malformed,
    /// or `Error::InvalidLanguage` if `platform` is not a platform.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::Io(e)),
        };
        return Self::parse(&content);
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` if the TOML is malformed,
    /// or `Error::InvalidLanguage` if `platform` is not a platform.
    pub fn parse(content: &str) -> Result<Self, Error> {
        let raw: DocnavTomlConfig = toml::from_str(content)?;
        let platform = match raw.platform.as_deref() {
            Some(value) => Platform::parse(value)?,
            None => Platform::CSharp,
        };

        return Ok(Self {
            exclude: raw.exclude,
            include: raw.include,
            platform,
            tie_break: raw.tracker.tie_break,
        });
    }

    /// Platform selected when the application starts.
    pub const fn platform(&self) -> Platform {
        return self.platform;
    }

    /// Check whether a markdown file path should be scanned.
    ///
    /// A path is included if no include patterns are set (scan everything),
    /// or if the path starts with at least one include pattern.
    /// An included path is then excluded if it starts with any exclude pattern.
    pub fn should_scan(&self, relative_path: &str) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|p| return relative_path.starts_with(p.as_str()));

        if !included {
            return false;
        }

        return !self.exclude.iter().any(|p| return relative_path.starts_with(p.as_str()));
    }

    /// Tie-break policy for the active-heading tracker.
    pub const fn tie_break(&self) -> TieBreak {
        return self.tie_break;
    }
}

impl Default for Config {
    /// Scan everything, start on C#, last delivered report wins.
    fn default() -> Self {
        return Self {
            exclude: Vec::new(),
            include: Vec::new(),
            platform: Platform::CSharp,
            tie_break: TieBreak::LastDelivered,
        };
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
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.platform(), Platform::CSharp);
        assert_eq!(config.tie_break(), TieBreak::LastDelivered);
        assert!(config.should_scan("anything.md"));
    }

    #[test]
    fn loads_all_fields() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "platform = \"rust\"\ninclude = [\"docs/\"]\nexclude = [\"docs/archive/\"]\n\n[tracker]\ntie_break = \"topmost\"\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.platform(), Platform::Rust);
        assert_eq!(config.tie_break(), TieBreak::Topmost);
        assert!(config.should_scan("docs/guide.md"));
        assert!(!config.should_scan("docs/archive/old.md"));
        assert!(!config.should_scan("README.md"));
    }

    #[test]
    fn unknown_platform_is_an_error() {
        let err = Config::parse("platform = \"fortran\"\n").unwrap_err();
        assert!(matches!(err, Error::InvalidLanguage { .. }));
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(matches!(Config::parse("platform = ").unwrap_err(), Error::TomlDe(_)));
        assert!(matches!(
            Config::parse("[tracker]\ntie_break = \"random\"\n").unwrap_err(),
            Error::TomlDe(_)
        ));
    }
}
