//! Active-heading tracker: observes the trackable headings of a table of
//! contents and remembers which one most recently entered the band.

use std::collections::HashSet;

use serde::Deserialize;

use crate::host::{Band, Subscription, Unsubscribed, VisibilityEvent, VisibilityHost};
use crate::toc::{self, TocEntry, TocFingerprint};

/// How a batch with several newly visible headings picks the active one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Each visible report overwrites the active id; the last one delivered wins.
    #[default]
    LastDelivered,
    /// The visible report with the smallest viewport offset wins.
    Topmost,
}

/// Whether the tracker currently holds a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// Nothing registered.
    Idle,
    /// At least one element registered.
    Observing,
}

/// Scroll-spy state for one table of contents.
#[derive(Debug)]
pub struct ActiveHeadingTracker {
    /// Id of the active heading; empty until a heading is reported visible.
    active_id: String,
    /// Band elements are observed against.
    band: Band,
    /// Identity of the installed table of contents.
    fingerprint: Option<TocFingerprint>,
    /// Ids covered by the live subscription.
    registered: HashSet<String>,
    /// Live registration with the host.
    subscription: Option<Subscription>,
    /// Policy for batches with several visible headings.
    tie_break: TieBreak,
}

impl ActiveHeadingTracker {
    /// An idle tracker using the default band.
    pub fn new(tie_break: TieBreak) -> Self {
        return Self {
            active_id: String::new(),
            band: Band::DEFAULT,
            fingerprint: None,
            registered: HashSet::new(),
            subscription: None,
            tie_break,
        };
    }

    /// Id of the active heading, empty when none has been reported yet.
    pub fn active_id(&self) -> &str {
        return &self.active_id;
    }

    /// Apply one batch in delivery order. Reports for ids outside the live
    /// registration are ignored.
    pub fn apply_batch(&mut self, batch: &[VisibilityEvent]) {
        let mut candidates = batch.iter().filter(|e| return e.visible && self.registered.contains(&e.id));
        let winner = match self.tie_break {
            TieBreak::LastDelivered => candidates.next_back(),
            TieBreak::Topmost => candidates.min_by_key(|e| return e.offset),
        };

        if let Some(event) = winner {
            log::debug!("active heading {:?} -> {:?}", self.active_id, event.id);
            self.active_id.clone_from(&event.id);
        }
    }

    /// Identity of the installed table of contents.
    pub const fn fingerprint(&self) -> Option<&TocFingerprint> {
        return self.fingerprint.as_ref();
    }

    /// Drain every pending batch from the host. Returns whether the active id changed.
    pub fn pump(&mut self) -> bool {
        let Some(subscription) = &self.subscription else {
            return false;
        };
        let before = self.active_id.clone();
        for batch in subscription.pending() {
            self.apply_batch(&batch);
        }
        return self.active_id != before;
    }

    /// Ids currently registered for observation.
    pub fn registered(&self) -> impl Iterator<Item = &str> {
        return self.registered.iter().map(String::as_str);
    }

    /// Install a table of contents. A table with the same identity as the
    /// installed one is a no-op. Otherwise the previous registration is
    /// released before the trackable entries are resolved and registered.
    /// Returns whether the tracker was rebuilt.
    pub fn set_toc<H: VisibilityHost>(&mut self, toc: &[TocEntry], host: &mut H) -> bool {
        let fingerprint = toc::fingerprint(toc);
        if self.fingerprint.as_ref() == Some(&fingerprint) {
            return false;
        }

        self.teardown(host);
        self.fingerprint = Some(fingerprint);

        let mut elements = Vec::new();
        for entry in toc::observable_entries(toc) {
            let Some(id) = entry.anchor() else { continue };
            let Some(element) = host.resolve(id) else {
                log::debug!("heading {id:?} has no element, not observed");
                continue;
            };
            elements.push(element);
            self.registered.insert(id.to_string());
        }

        if elements.is_empty() {
            log::debug!("no trackable headings among {} entries", toc.len());
            return true;
        }

        let subscription = host.subscribe(elements, self.band);
        log::debug!(
            "observing {} headings with root margin {}",
            subscription.elements().len(),
            self.band.css_root_margin()
        );
        self.subscription = Some(subscription);
        return true;
    }

    /// Idle until a table with trackable, resolvable headings is installed.
    pub const fn state(&self) -> TrackerState {
        if self.subscription.is_some() {
            return TrackerState::Observing;
        }
        return TrackerState::Idle;
    }

    /// Release the registration and forget the installed table.
    pub fn teardown<H: VisibilityHost>(&mut self, host: &mut H) -> Option<Unsubscribed> {
        self.active_id.clear();
        self.fingerprint = None;
        self.registered.clear();

        let subscription = self.subscription.take()?;
        let done = host.unsubscribe(subscription);
        log::debug!("released {} observed headings", done.released);
        return Some(done);
    }

    /// Tear down for good when the owning view goes away.
    pub fn unmount<H: VisibilityHost>(mut self, host: &mut H) -> Option<Unsubscribed> {
        return self.teardown(host);
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
    use std::path::Path;

    use crossbeam_channel::Sender;

    use super::*;
    use crate::host::{ElementId, SubscriptionId};
    use crate::layout::{DocumentLayout, HostOp, Metrics};

    /// Host with a fixed element list whose batches are pushed by the test.
    #[derive(Default)]
    struct ScriptedHost {
        ids: Vec<String>,
        live: Vec<(SubscriptionId, Sender<Vec<VisibilityEvent>>)>,
        next: u64,
        subscribed: Vec<Vec<String>>,
    }

    impl ScriptedHost {
        fn with_ids(ids: &[&str]) -> Self {
            return Self {
                ids: ids.iter().map(|s| s.to_string()).collect(),
                ..Self::default()
            };
        }

        fn emit(&self, batch: &[(&str, i64, bool)]) {
            let events: Vec<VisibilityEvent> = batch
                .iter()
                .map(|&(id, offset, visible)| VisibilityEvent {
                    id: id.to_string(),
                    offset,
                    visible,
                })
                .collect();
            for (_, tx) in &self.live {
                tx.send(events.clone()).unwrap();
            }
        }
    }

    impl VisibilityHost for ScriptedHost {
        fn resolve(&self, id: &str) -> Option<ElementId> {
            return self.ids.iter().position(|known| known == id).map(ElementId);
        }

        fn subscribe(&mut self, elements: Vec<ElementId>, _band: Band) -> Subscription {
            let (tx, rx) = crossbeam_channel::unbounded();
            let id = SubscriptionId(self.next);
            self.next += 1;
            self.subscribed.push(elements.iter().map(|e| self.ids[e.0].clone()).collect());
            self.live.push((id, tx));
            return Subscription::new(id, elements, rx);
        }

        fn unsubscribe(&mut self, subscription: Subscription) -> Unsubscribed {
            self.live.retain(|(id, _)| *id != subscription.id());
            return Unsubscribed {
                id: subscription.id(),
                released: subscription.elements().len(),
            };
        }
    }

    fn entry(id: &str, level: u8, title: &str) -> TocEntry {
        return TocEntry {
            id: Some(id.to_string()),
            level,
            title: title.to_string(),
        };
    }

    #[test]
    fn registers_only_trackable_entries() {
        let mut host = ScriptedHost::with_ids(&["a", "", "b", "c"]);
        let mut tracker = ActiveHeadingTracker::new(TieBreak::LastDelivered);
        let toc = vec![
            entry("a", 2, "Intro"),
            entry("", 2, "Skip"),
            entry("b", 4, "Deep"),
            entry("c", 3, "Next steps"),
        ];

        assert!(tracker.set_toc(&toc, &mut host));
        assert_eq!(host.subscribed, vec![vec!["a".to_string()]]);
        assert_eq!(tracker.registered().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(tracker.state(), TrackerState::Observing);
    }

    #[test]
    fn last_visible_report_in_a_batch_wins() {
        let mut host = ScriptedHost::with_ids(&["a", "x"]);
        let mut tracker = ActiveHeadingTracker::new(TieBreak::LastDelivered);
        tracker.set_toc(&[entry("a", 2, "A"), entry("x", 3, "X")], &mut host);

        host.emit(&[("a", 10, true)]);
        assert!(tracker.pump());
        assert_eq!(tracker.active_id(), "a");

        host.emit(&[("a", 10, true), ("x", 40, true)]);
        tracker.pump();
        assert_eq!(tracker.active_id(), "x");
    }

    #[test]
    fn hidden_reports_do_not_clear_active() {
        let mut host = ScriptedHost::with_ids(&["a"]);
        let mut tracker = ActiveHeadingTracker::new(TieBreak::LastDelivered);
        tracker.set_toc(&[entry("a", 2, "A")], &mut host);

        host.emit(&[("a", 10, true)]);
        tracker.pump();
        host.emit(&[("a", -30, false)]);
        assert!(!tracker.pump());
        assert_eq!(tracker.active_id(), "a");
    }

    #[test]
    fn topmost_policy_prefers_smallest_offset() {
        let mut host = ScriptedHost::with_ids(&["a", "x"]);
        let mut tracker = ActiveHeadingTracker::new(TieBreak::Topmost);
        tracker.set_toc(&[entry("a", 2, "A"), entry("x", 3, "X")], &mut host);

        host.emit(&[("x", 40, true), ("a", 10, true)]);
        tracker.pump();
        assert_eq!(tracker.active_id(), "a");
    }

    #[test]
    fn unresolved_and_unregistered_ids_are_ignored() {
        let mut host = ScriptedHost::with_ids(&["a"]);
        let mut tracker = ActiveHeadingTracker::new(TieBreak::LastDelivered);
        tracker.set_toc(&[entry("a", 2, "A"), entry("ghost", 2, "Ghost")], &mut host);
        assert_eq!(tracker.registered().collect::<Vec<_>>(), vec!["a"]);

        host.emit(&[("a", 0, true), ("ghost", 5, true)]);
        tracker.pump();
        assert_eq!(tracker.active_id(), "a");
    }

    #[test]
    fn nothing_resolvable_stays_idle() {
        let mut host = ScriptedHost::with_ids(&[]);
        let mut tracker = ActiveHeadingTracker::new(TieBreak::LastDelivered);
        tracker.set_toc(&[entry("a", 2, "A")], &mut host);
        assert_eq!(tracker.state(), TrackerState::Idle);
        assert!(host.subscribed.is_empty());
        assert!(!tracker.pump());
    }

    #[test]
    fn same_toc_identity_is_not_rebuilt() {
        let mut host = ScriptedHost::with_ids(&["a"]);
        let mut tracker = ActiveHeadingTracker::new(TieBreak::LastDelivered);
        let toc = vec![entry("a", 2, "A")];
        assert!(tracker.set_toc(&toc, &mut host));
        assert!(!tracker.set_toc(&toc.clone(), &mut host));
        assert_eq!(host.subscribed.len(), 1);
    }

    #[test]
    fn new_toc_releases_old_registration_first() {
        let source = "## Alpha\n\ntext\n\n## Beta\n\ntext\n\n## Gamma\n\ntext\n\ntext\n";
        let metrics = Metrics {
            line_height: 10,
            viewport_height: 30,
        };
        let mut layout = DocumentLayout::from_markdown(Path::new("t.md"), source, metrics).unwrap();
        let mut tracker = ActiveHeadingTracker::new(TieBreak::LastDelivered);

        tracker.set_toc(&[entry("alpha", 2, "Alpha"), entry("beta", 2, "Beta")], &mut layout);
        tracker.pump();
        let first = match &layout.log()[0] {
            HostOp::Subscribe { subscription, .. } => *subscription,
            other => panic!("expected subscribe, got {other:?}"),
        };

        tracker.set_toc(&[entry("gamma", 2, "Gamma")], &mut layout);
        assert_eq!(tracker.active_id(), "");

        let ops: Vec<&HostOp> = layout
            .log()
            .iter()
            .filter(|op| !matches!(op, HostOp::Deliver { .. }))
            .collect();
        assert_eq!(ops.len(), 3);
        assert_eq!(
            ops[1],
            &HostOp::Unsubscribe {
                released: 2,
                subscription: first,
            }
        );
        assert!(matches!(ops[2], HostOp::Subscribe { ids, .. } if ids == &vec!["gamma".to_string()]));

        layout.scroll_to(70);
        let released_at = layout
            .log()
            .iter()
            .position(|op| matches!(op, HostOp::Unsubscribe { .. }))
            .unwrap();
        let stale = layout.log()[released_at..]
            .iter()
            .any(|op| matches!(op, HostOp::Deliver { subscription, .. } if *subscription == first));
        assert!(!stale, "delivery after release: {:?}", layout.log());
        assert!(matches!(
            layout.log().last(),
            Some(HostOp::Deliver { ids, .. }) if ids == &vec!["gamma".to_string()]
        ));
        assert_eq!(layout.registrations(), 1);
    }

    #[test]
    fn unmount_releases_everything() {
        let mut host = ScriptedHost::with_ids(&["a", "b"]);
        let mut tracker = ActiveHeadingTracker::new(TieBreak::LastDelivered);
        tracker.set_toc(&[entry("a", 2, "A"), entry("b", 2, "B")], &mut host);
        let done = tracker.unmount(&mut host).unwrap();
        assert_eq!(done.released, 2);
        assert!(host.live.is_empty());
    }
}
