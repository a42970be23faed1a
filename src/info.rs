use std::path::PathBuf;

use serde::Serialize;

use crate::config::{self, Config};
use crate::host::Band;
use crate::platform::Platform;
use crate::toc;
use crate::tracker::TieBreak;

/// Output the comprehensive docnav reference document.
pub fn run(json: bool) {
    let root = PathBuf::from(".");
    let state = gather_state(&root);

    if json {
        print_json(&state);
    } else {
        print_markdown(&state);
    }
}

// ── State gathering ───────────────────────────────────────────────────

/// Project state as seen from the working directory.
struct CurrentState {
    /// Why `.docnav.toml` failed to load, if it did.
    config_error: Option<String>,
    /// Whether `.docnav.toml` exists.
    config_found: bool,
    /// Initial platform after config.
    platform: Platform,
    /// Configured tie-break policy.
    tie_break: TieBreak,
}

/// Load config from `root`, keeping a load failure as text instead of aborting.
fn gather_state(root: &std::path::Path) -> CurrentState {
    let config_found = root.join(config::CONFIG_FILE).exists();
    let (config, config_error) = match Config::load(root) {
        Ok(c) => (c, None),
        Err(e) => (Config::default(), Some(e.to_string())),
    };

    return CurrentState {
        config_error,
        config_found,
        platform: config.platform(),
        tie_break: config.tie_break(),
    };
}

// ── Markdown output ───────────────────────────────────────────────────

/// Print the full reference sheet as markdown.
fn print_markdown(state: &CurrentState) {
    let version = env!("CARGO_PKG_VERSION");
    print_markdown_header(version);
    print_markdown_platforms();
    print_markdown_tracking();
    print_markdown_state(state);
    println!();
    print_markdown_exit_codes();
}

/// Syntax, workflow, and config sections.
fn print_markdown_header(version: &str) {
    print!(
        "\
# docnav {version}

Language-gated documentation sections and scroll-spy heading tracking.

## Section Syntax

    <LanguageSection language=\"rust\">
    Content shown only when the reader's platform maps to Rust.
    </LanguageSection>

Tags sit on their own lines and may nest. A reader on C# or Rust sees
their own sections; every other platform sees the C# sections.

## Workflow

    docnav render <file.md> [--platform P]    Print the gated markdown
    docnav toc <file.md> [--all] [--json]     List trackable headings
    docnav spy <file.md> [--viewport PX]      Simulate scrolling, print active heading
    docnav check                              Validate every section language
    docnav watch <file.md>                    Re-render on change; type a platform to switch

## Configuration (.docnav.toml)

    platform = \"rust\"                   # initial selection
    include = [\"docs/\"]                 # only check these paths
    exclude = [\"docs/archive/\"]         # skip these paths

    [tracker]
    tie_break = \"last-delivered\"        # or \"topmost\"

"
    );
}

/// Valid `language` values.
fn print_markdown_platforms() {
    println!("## Platforms\n");
    for platform in Platform::ALL {
        println!("- `{platform}`");
    }
    println!();
}

/// Which headings are tracked and with what band.
fn print_markdown_tracking() {
    println!("## Heading Tracking\n");
    println!("Levels:        {}-{}", toc::OBSERVED_LEVELS.start(), toc::OBSERVED_LEVELS.end());
    println!("Excluded:      \"{}\"", toc::EXCLUDED_TITLE);
    println!("Root margin:   {}", Band::DEFAULT.css_root_margin());
    println!();
    println!("## Current State\n");
}

/// Config status and effective settings.
fn print_markdown_state(state: &CurrentState) {
    match (&state.config_error, state.config_found) {
        (Some(e), _) => println!("Config:     .docnav.toml (invalid: {e})"),
        (None, true) => println!("Config:     .docnav.toml (found)"),
        (None, false) => println!("Config:     .docnav.toml (not found)"),
    }
    println!("Platform:   {}", state.platform);
    println!("Tie-break:  {:?}", state.tie_break);
}

/// Exit code table.
fn print_markdown_exit_codes() {
    print!(
        "\
## Exit Codes

| Code | Meaning |
|------|---------|
| 0    | Success / all sections valid |
| 1    | Invalid section languages found |
| 3    | Runtime error |
"
    );
}

// ── JSON output ───────────────────────────────────────────────────────

/// Top-level `info --json` document.
#[derive(Serialize)]
struct InfoJson {
    /// Current project state.
    current_state: StateJson,
    /// Exit code meanings.
    exit_codes: Vec<ExitCodeInfo>,
    /// Valid platforms in canonical order.
    platforms: Vec<Platform>,
    /// Heading tracking rules.
    tracking: TrackingJson,
    /// Crate version.
    version: String,
}

/// Heading tracking rules.
#[derive(Serialize)]
struct TrackingJson {
    /// Title never tracked.
    excluded_title: String,
    /// Tracked heading levels.
    levels: Vec<u8>,
    /// CSS root margin of the band.
    root_margin: String,
}

/// One exit code.
#[derive(Serialize)]
struct ExitCodeInfo {
    /// Process exit code.
    code: u8,
    /// What it signals.
    meaning: String,
}

/// Project state.
#[derive(Serialize)]
struct StateJson {
    /// Why `.docnav.toml` failed to load, if it did.
    config_error: Option<String>,
    /// Whether `.docnav.toml` exists.
    config_found: bool,
    /// Initial platform.
    platform: Platform,
    /// Tie-break policy, as written in config.
    tie_break: String,
}

/// Print the reference sheet as pretty JSON.
fn print_json(state: &CurrentState) {
    let tie_break = match state.tie_break {
        TieBreak::LastDelivered => "last-delivered",
        TieBreak::Topmost => "topmost",
    };
    let info = InfoJson {
        current_state: StateJson {
            config_error: state.config_error.clone(),
            config_found: state.config_found,
            platform: state.platform,
            tie_break: tie_break.to_string(),
        },
        exit_codes: vec![
            ExitCodeInfo { code: 0, meaning: "Success / all sections valid".to_string() },
            ExitCodeInfo { code: 1, meaning: "Invalid section languages found".to_string() },
            ExitCodeInfo { code: 3, meaning: "Runtime error".to_string() },
        ],
        platforms: Platform::ALL.to_vec(),
        tracking: TrackingJson {
            excluded_title: toc::EXCLUDED_TITLE.to_string(),
            levels: toc::OBSERVED_LEVELS.collect(),
            root_margin: Band::DEFAULT.css_root_margin(),
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    // serde_json::to_string_pretty won't fail on this structure.
    let json = serde_json::to_string_pretty(&info).unwrap_or_default();
    println!("{json}");
}
