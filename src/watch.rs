//! File watcher: renders the document for the current selection, then
//! rebuilds the table of contents and the heading tracker whenever the
//! file or the selection changes.

use std::io::BufRead as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use notify::{RecursiveMode, Watcher as _};

use crate::commands;
use crate::context::{AppContext, LanguageScope};
use crate::diagnostics;
use crate::error;
use crate::layout::{DocumentLayout, Metrics};
use crate::platform::Platform;
use crate::sections::{self, Block};
use crate::toc::{self, TocEntry};
use crate::tracker::ActiveHeadingTracker;

/// Debounce delay between filesystem events and re-render.
const DEBOUNCE_MS: u64 = 100;

/// The watched document as currently mounted.
struct Session {
    /// Mounted sections, kept so selection changes reach existing gates.
    blocks: Vec<Block>,
    /// Layout of the last rendered output.
    layout: DocumentLayout,
    /// Markdown file being watched.
    path: PathBuf,
    /// Output of the last render.
    rendered: String,
    /// Scroll spy over `layout`.
    tracker: ActiveHeadingTracker,
}

impl Session {
    /// Render the blocks and install the resulting table of contents.
    /// Unchanged output is ignored. When only positions moved, the layout is
    /// updated under the live tracker; otherwise the tracker is rebuilt.
    ///
    /// # Errors
    ///
    /// Returns `Error::ParseFailed` if the rendered markdown cannot be parsed.
    fn refresh(&mut self) -> Result<(), error::Error> {
        let rendered = sections::render(&self.blocks, &LanguageScope::root());
        if rendered == self.rendered {
            log::debug!("render unchanged");
            return Ok(());
        }

        let headings = toc::headings(&self.path, &rendered)?;
        let entries: Vec<TocEntry> = headings.iter().map(|h| return h.entry.clone()).collect();
        let total_lines = u32::try_from(rendered.lines().count()).unwrap_or(u32::MAX);
        self.rendered = rendered;

        let unchanged = self.tracker.fingerprint() == Some(&toc::fingerprint(&entries));
        if unchanged && self.layout.relayout(&headings, total_lines) {
            self.tracker.pump();
            log::info!("headings moved, tracker kept");
            return Ok(());
        }

        self.tracker.teardown(&mut self.layout);
        self.layout = DocumentLayout::new(&headings, total_lines, Metrics::default());
        self.tracker.set_toc(&entries, &mut self.layout);
        self.tracker.pump();
        log::info!("tracker rebuilt for {} headings", entries.len());
        print_observed(&entries, self.tracker.active_id());
        return Ok(());
    }

    /// Re-read the file and remount every section for `ctx`.
    ///
    /// # Errors
    ///
    /// Returns errors from reading, section parsing, or validation.
    fn reload(&mut self, ctx: &AppContext) -> Result<(), error::Error> {
        let source = commands::read_markdown(&self.path)?;
        self.blocks = sections::mount(sections::parse(&self.path, &source)?, ctx)?;
        return self.refresh();
    }
}

/// Create a filesystem watcher that sends events on the given channel.
///
/// # Errors
///
/// Returns `Error::Watch` if the watcher cannot be created.
fn create_watcher(
    tx: crossbeam_channel::Sender<()>,
) -> Result<notify::RecommendedWatcher, error::Error> {
    return notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        if let Ok(event) = res
            && matches!(
                event.kind,
                notify::EventKind::Create(_)
                    | notify::EventKind::Modify(_)
                    | notify::EventKind::Remove(_)
            )
        {
            let _ = tx.send(());
        }
    })
    .map_err(|e| {
        return error::Error::Watch {
            reason: format!("watcher setup failed: {e}"),
        };
    });
}

/// Print the trackable headings and the active one.
fn print_observed(entries: &[TocEntry], active: &str) {
    let ids: Vec<&str> = toc::observable_entries(entries)
        .into_iter()
        .filter_map(TocEntry::anchor)
        .collect();
    let active = if active.is_empty() { "-" } else { active };
    println!("observing {} headings: {} (active: {active})", ids.len(), ids.join(", "));
    return;
}

/// Forward platform names typed on stdin, one per line.
fn spawn_stdin_reader() -> crossbeam_channel::Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    return rx;
}

/// Entry point for the watch command.
///
/// Renders once, then re-renders when the file changes or a platform name
/// is entered on stdin. Invalid edits are reported and the previous
/// render stays in place.
///
/// # Errors
///
/// Returns errors from config loading, the initial render, or watcher setup.
pub fn run(file: &str, platform: Option<&str>) -> Result<ExitCode, error::Error> {
    let path = PathBuf::from(file);
    let (config, mut selector) = commands::selection(platform)?;
    let selections = selector.subscribe();

    let source = commands::read_markdown(&path)?;
    let blocks = sections::mount(sections::parse(&path, &source)?, &selector.context())?;
    let mut session = Session {
        blocks,
        layout: DocumentLayout::new(&[], 0, Metrics::default()),
        path: path.clone(),
        rendered: String::new(),
        tracker: ActiveHeadingTracker::new(config.tie_break()),
    };
    eprintln!("watch: rendering {} for {}", path.display(), selector.context().platform);
    session.refresh()?;

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut watcher = create_watcher(tx)?;
    let dir = path.parent().filter(|p| return !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    watcher.watch(dir, RecursiveMode::NonRecursive).map_err(|e| {
        return error::Error::Watch {
            reason: format!("cannot watch {}: {e}", dir.display()),
        };
    })?;

    let mut input = spawn_stdin_reader();
    eprintln!("watch: type a platform name to switch, press Ctrl+C to stop");

    loop {
        let mut stdin_closed = false;
        crossbeam_channel::select! {
            recv(rx) -> msg => {
                if msg.is_err() {
                    break;
                }
                let debounce = Duration::from_millis(DEBOUNCE_MS);
                while rx.recv_timeout(debounce).is_ok() {}
                eprintln!("watch: change detected, re-rendering...");
                if let Err(e) = session.reload(&selector.context()) {
                    diagnostics::print_error(&e);
                }
            },
            recv(input) -> line => {
                match line.map(|l| return Platform::parse(l.trim())) {
                    Err(_) => stdin_closed = true,
                    Ok(Ok(platform)) => {
                        selector.select(platform);
                    },
                    Ok(Err(e)) => diagnostics::print_error(&e),
                }
            },
            recv(selections) -> ctx => {
                let Ok(ctx) = ctx else { continue };
                eprintln!("watch: platform {}", ctx.platform);
                sections::sync(&mut session.blocks, &ctx);
                if let Err(e) = session.refresh() {
                    diagnostics::print_error(&e);
                }
            },
        }
        if stdin_closed {
            input = crossbeam_channel::never();
        }
    }

    session.tracker.unmount(&mut session.layout);
    return Ok(ExitCode::SUCCESS);
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
    use crate::host::VisibilityHost as _;
    use crate::layout::HostOp;
    use crate::tracker::{TieBreak, TrackerState};

    fn session(source: &str, platform: Platform) -> Session {
        let path = PathBuf::from("t.md");
        let ctx = AppContext { platform };
        let blocks = sections::mount(sections::parse(&path, source).unwrap(), &ctx).unwrap();
        return Session {
            blocks,
            layout: DocumentLayout::new(&[], 0, Metrics::default()),
            path,
            rendered: String::new(),
            tracker: ActiveHeadingTracker::new(TieBreak::default()),
        };
    }

    fn document() -> String {
        let mut source = String::from("# Guide\n\n<LanguageSection language=\"csharp\">\n\n");
        for _ in 0..10 {
            source.push_str("csharp line\n");
        }
        source.push_str("\n</LanguageSection>\n<LanguageSection language=\"rust\">\n\nrust line\n\n</LanguageSection>\n\n## Usage\n\n");
        for _ in 0..60 {
            source.push_str("text\n");
        }
        return source;
    }

    fn subscribes(layout: &DocumentLayout) -> usize {
        return layout.log().iter().filter(|op| return matches!(op, HostOp::Subscribe { .. })).count();
    }

    #[test]
    fn moved_headings_update_layout_without_rebuilding_tracker() {
        let mut session = session(&document(), Platform::CSharp);
        session.refresh().unwrap();
        assert_eq!(session.tracker.state(), TrackerState::Observing);
        let before = session.layout.max_scroll();

        sections::sync(&mut session.blocks, &AppContext { platform: Platform::Rust });
        session.refresh().unwrap();

        assert!(session.layout.max_scroll() < before, "layout kept stale geometry");
        assert_eq!(subscribes(&session.layout), 1);
        assert!(!session.layout.log().iter().any(|op| return matches!(op, HostOp::Unsubscribe { .. })));
        assert_eq!(session.tracker.state(), TrackerState::Observing);
    }

    #[test]
    fn changed_headings_rebuild_tracker() {
        let source = "# Guide\n\n<LanguageSection language=\"csharp\">\n\n## NuGet\n\n</LanguageSection>\n<LanguageSection language=\"rust\">\n\n## Cargo\n\n</LanguageSection>\n";
        let mut session = session(source, Platform::CSharp);
        session.refresh().unwrap();
        assert_eq!(session.layout.resolve("nuget").map(|e| e.0), Some(1));

        sections::sync(&mut session.blocks, &AppContext { platform: Platform::Rust });
        session.refresh().unwrap();
        assert_eq!(session.layout.resolve("nuget"), None);
        assert!(session.tracker.registered().eq(["cargo"]));
    }

    #[test]
    fn identical_render_is_ignored() {
        let mut session = session(&document(), Platform::CSharp);
        session.refresh().unwrap();
        let ops = session.layout.log().len();
        session.refresh().unwrap();
        assert_eq!(session.layout.log().len(), ops);
    }
}
