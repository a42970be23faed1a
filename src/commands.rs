//! Core CLI commands for docnav: render, toc, spy, check, platforms.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use serde::Serialize;
use walkdir::WalkDir;

use crate::config::Config;
use crate::context::PlatformSelector;
use crate::error;
use crate::host::Band;
use crate::layout::{DocumentLayout, Metrics};
use crate::platform::Platform;
use crate::sections;
use crate::toc::{self, TocEntry};
use crate::tracker::ActiveHeadingTracker;

/// Viewport geometry and scroll step for `spy`.
#[derive(Debug, Clone, Copy)]
pub struct SpyOptions {
    /// Height of one source line in pixels.
    pub line_height: u32,
    /// Pixels scrolled between samples.
    pub step: u32,
    /// Viewport height in pixels.
    pub viewport: u32,
}

/// One change of the active heading during a `spy` run.
#[derive(Debug, Serialize)]
struct SpySample {
    /// Active heading id, empty when none.
    active: String,
    /// Scroll offset at which the change was observed.
    scroll: u32,
}

/// Validate every `LanguageSection` in the scanned markdown files.
/// Exit 0 when all are valid, 1 when any language is not a platform.
///
/// # Errors
///
/// Returns errors from config loading, file reading, or malformed sections.
pub fn check() -> Result<ExitCode, error::Error> {
    let root = PathBuf::from(".");
    let config = Config::load(&root)?;

    let mut files = 0_u32;
    let mut invalid_count = 0_u32;

    for entry in WalkDir::new(&root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| return e.path().extension().is_some_and(|ext| return ext == "md"))
    {
        let md_path = entry.path();
        let relative = md_path.strip_prefix(&root).unwrap_or(md_path);
        if !config.should_scan(&relative.to_string_lossy()) {
            continue;
        }

        let source = std::fs::read_to_string(md_path)?;
        let blocks = sections::parse(relative, &source)?;
        files = files.saturating_add(1);

        for invalid in sections::invalid_sections(&blocks) {
            invalid_count = invalid_count.saturating_add(1);
            println!(
                "INVALID {}:{} language '{}'",
                relative.display(),
                invalid.line,
                invalid.language
            );
        }
    }

    if invalid_count > 0 {
        println!();
        println!("{invalid_count} invalid sections in {files} files");
        eprintln!();
        eprintln!("hint: valid languages are {}", Platform::valid_values().join(", "));
        return Ok(ExitCode::from(1));
    }

    println!("All sections valid in {files} files");
    return Ok(ExitCode::SUCCESS);
}

/// Output a comprehensive reference document for docnav.
pub fn info(json: bool) {
    return crate::info::run(json);
}

/// List every valid platform, one per line.
pub fn platforms() {
    for platform in Platform::ALL {
        println!("{platform}");
    }
    return;
}

/// Read a markdown file, mapping a missing file to `FileNotFound`.
///
/// # Errors
///
/// Returns `Error::FileNotFound` if the file cannot be read.
pub fn read_markdown(path: &Path) -> Result<String, error::Error> {
    return std::fs::read_to_string(path)
        .map_err(|_err| return error::Error::FileNotFound { path: path.to_path_buf() });
}

/// Print the markdown with language sections gated for the selected platform.
///
/// # Errors
///
/// Returns errors from config loading, file reading, or section validation.
pub fn render(file: &str, platform: Option<&str>) -> Result<(), error::Error> {
    let path = PathBuf::from(file);
    let (_, selector) = selection(platform)?;
    let source = read_markdown(&path)?;

    let rendered = sections::render_document(&path, &source, &selector.context())?;
    print!("{rendered}");
    return Ok(());
}

/// Load config and apply an optional `--platform` override through the selector.
///
/// # Errors
///
/// Returns errors from config loading, or `Error::InvalidLanguage` for a bad override.
pub fn selection(platform: Option<&str>) -> Result<(Config, PlatformSelector), error::Error> {
    let config = Config::load(Path::new("."))?;
    let mut selector = PlatformSelector::new(config.platform());
    if let Some(value) = platform {
        selector.select(Platform::parse(value)?);
    }
    return Ok((config, selector));
}

/// Scroll the rendered document top to bottom and print each change of the active heading.
///
/// # Errors
///
/// Returns errors from config loading, file reading, section validation, or parsing.
pub fn spy(file: &str, platform: Option<&str>, options: SpyOptions, json: bool) -> Result<(), error::Error> {
    let path = PathBuf::from(file);
    let (config, selector) = selection(platform)?;
    let source = read_markdown(&path)?;
    let rendered = sections::render_document(&path, &source, &selector.context())?;

    let toc = toc::extract(&path, &rendered)?;
    let metrics = Metrics {
        line_height: options.line_height,
        viewport_height: options.viewport,
    };
    let mut layout = DocumentLayout::from_markdown(&path, &rendered, metrics)?;
    let mut tracker = ActiveHeadingTracker::new(config.tie_break());
    tracker.set_toc(&toc, &mut layout);
    tracker.pump();

    let mut samples = vec![SpySample {
        active: tracker.active_id().to_string(),
        scroll: 0,
    }];
    let step = options.step.max(1);
    let max_scroll = layout.max_scroll();
    let mut offset = 0_u32;
    while offset < max_scroll {
        offset = offset.saturating_add(step).min(max_scroll);
        layout.scroll_to(offset);
        if tracker.pump() {
            samples.push(SpySample {
                active: tracker.active_id().to_string(),
                scroll: layout.scroll(),
            });
        }
    }
    tracker.unmount(&mut layout);

    if json {
        // serde_json::to_string_pretty won't fail on this structure.
        println!("{}", serde_json::to_string_pretty(&samples).unwrap_or_default());
        return Ok(());
    }

    println!("band {} over a {}px viewport", Band::DEFAULT.css_root_margin(), options.viewport);
    for sample in &samples {
        let active = if sample.active.is_empty() { "-" } else { &sample.active };
        println!("{:>7}  {active}", sample.scroll);
    }
    return Ok(());
}

/// Print the table of contents of the rendered document.
/// Only trackable entries are listed unless `all` is set.
///
/// # Errors
///
/// Returns errors from config loading, file reading, section validation, or parsing.
pub fn toc(file: &str, platform: Option<&str>, all: bool, json: bool) -> Result<(), error::Error> {
    let path = PathBuf::from(file);
    let (_, selector) = selection(platform)?;
    let source = read_markdown(&path)?;
    let rendered = sections::render_document(&path, &source, &selector.context())?;

    let entries = toc::extract(&path, &rendered)?;
    let listed: Vec<&TocEntry> = if all {
        entries.iter().collect()
    } else {
        toc::observable_entries(&entries)
    };

    if json {
        // serde_json::to_string_pretty won't fail on this structure.
        println!("{}", serde_json::to_string_pretty(&listed).unwrap_or_default());
        return Ok(());
    }

    for entry in listed {
        let indent = "  ".repeat(usize::from(entry.level.saturating_sub(1)));
        let anchor = entry.anchor().unwrap_or("-");
        println!("{indent}{}  #{anchor}", entry.title);
    }
    return Ok(());
}
