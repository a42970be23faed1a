//! Application context: the current platform selection, its single mutator,
//! and the nestable language scope that gates hand to their descendants.

use crossbeam_channel::{Receiver, Sender};

use crate::platform::Platform;

/// Immutable snapshot of the application-wide selection. Passed explicitly
/// to every reader; only a [`PlatformSelector`] produces new snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppContext {
    /// The platform the reader has selected.
    pub platform: Platform,
}

/// Owner of the mutable platform selection. Holding a `&mut PlatformSelector`
/// is the capability to change what every gate sees.
#[derive(Debug)]
pub struct PlatformSelector {
    /// Current selection.
    current: Platform,
    /// Live subscribers; disconnected ones are pruned on the next broadcast.
    subscribers: Vec<Sender<AppContext>>,
}

impl PlatformSelector {
    /// Start a selection at `initial`.
    pub const fn new(initial: Platform) -> Self {
        return Self {
            current: initial,
            subscribers: Vec::new(),
        };
    }

    /// Snapshot of the current selection.
    pub const fn context(&self) -> AppContext {
        return AppContext { platform: self.current };
    }

    /// Change the selection and broadcast the new snapshot.
    /// Selecting the current platform is a no-op and broadcasts nothing.
    pub fn select(&mut self, platform: Platform) -> AppContext {
        if platform == self.current {
            return self.context();
        }

        log::debug!("platform selection {} -> {platform}", self.current);
        self.current = platform;
        let ctx = self.context();
        self.subscribers.retain(|tx| return tx.send(ctx).is_ok());
        return ctx;
    }

    /// Receive every future selection change.
    pub fn subscribe(&mut self) -> Receiver<AppContext> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        return rx;
    }
}

/// Scoped context exposing the effective tab of each enclosing visible gate.
/// Cloning is cheap enough for the nesting depths documentation uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageScope {
    /// Effective tabs from outermost to innermost gate.
    tabs: Vec<Platform>,
}

impl LanguageScope {
    /// The scope outside any gate.
    pub fn root() -> Self {
        return Self::default();
    }

    /// A child scope whose innermost value is `tab`.
    pub fn nest(&self, tab: Platform) -> Self {
        let mut tabs = self.tabs.clone();
        tabs.push(tab);
        return Self { tabs };
    }

    /// The nearest enclosing gate's effective tab, if any.
    pub fn current(&self) -> Option<Platform> {
        return self.tabs.last().copied();
    }

    /// How many gates enclose this scope.
    pub fn depth(&self) -> usize {
        return self.tabs.len();
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
    fn select_broadcasts_to_subscribers() {
        let mut selector = PlatformSelector::new(Platform::CSharp);
        let rx = selector.subscribe();

        let ctx = selector.select(Platform::Rust);
        assert_eq!(ctx.platform, Platform::Rust);
        assert_eq!(rx.try_recv().unwrap(), ctx);
        assert_eq!(selector.context().platform, Platform::Rust);
    }

    #[test]
    fn reselecting_current_platform_is_silent() {
        let mut selector = PlatformSelector::new(Platform::Rust);
        let rx = selector.subscribe();
        selector.select(Platform::Rust);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut selector = PlatformSelector::new(Platform::CSharp);
        drop(selector.subscribe());
        let live = selector.subscribe();
        selector.select(Platform::Java);
        assert_eq!(selector.subscribers.len(), 1);
        assert_eq!(live.try_recv().unwrap().platform, Platform::Java);
    }

    #[test]
    fn scopes_nest_innermost_last() {
        let root = LanguageScope::root();
        assert_eq!(root.current(), None);

        let outer = root.nest(Platform::CSharp);
        let inner = outer.nest(Platform::Rust);
        assert_eq!(outer.current(), Some(Platform::CSharp));
        assert_eq!(inner.current(), Some(Platform::Rust));
        assert_eq!(inner.depth(), 2);
        assert_eq!(root.depth(), 0);
    }
}
