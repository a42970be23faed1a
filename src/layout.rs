//! Deterministic visibility host over a line-based layout of a markdown
//! document. Every heading line is an element; scrolling re-evaluates which
//! elements overlap each registration's band.

use std::collections::HashMap;
use std::path::Path;

use crossbeam_channel::Sender;

use crate::error::Error;
use crate::host::{Band, ElementId, Subscription, SubscriptionId, Unsubscribed, VisibilityEvent, VisibilityHost};
use crate::toc::{self, Heading};

/// Pixel geometry of the simulated page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    /// Height of one source line.
    pub line_height: u32,
    /// Height of the viewport.
    pub viewport_height: u32,
}

impl Default for Metrics {
    fn default() -> Self {
        return Self {
            line_height: 24,
            viewport_height: 800,
        };
    }
}

/// One operation the host performed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
    /// A batch was sent on a registration.
    Deliver {
        /// Ids in the batch, in delivery order.
        ids: Vec<String>,
        /// Receiving registration.
        subscription: SubscriptionId,
    },
    /// Elements were registered.
    Subscribe {
        /// Ids of the registered elements.
        ids: Vec<String>,
        /// New registration.
        subscription: SubscriptionId,
    },
    /// A registration was released.
    Unsubscribe {
        /// Number of elements released.
        released: usize,
        /// Released registration.
        subscription: SubscriptionId,
    },
}

/// A heading element laid out on the page.
#[derive(Debug)]
struct Element {
    /// Height in pixels.
    height: u32,
    /// Anchor id.
    id: String,
    /// Absolute top in pixels.
    top: u32,
}

/// Host-side state of one subscription.
#[derive(Debug)]
struct Registration {
    /// Observation band.
    band: Band,
    /// Observed elements in document order.
    elements: Vec<ElementId>,
    /// Stream sender; dropped on unsubscribe.
    sender: Sender<Vec<VisibilityEvent>>,
    /// Registration id.
    subscription: SubscriptionId,
    /// Last reported intersection state, parallel to `elements`.
    visible: Vec<bool>,
}

/// A scrollable document whose heading elements can be observed.
#[derive(Debug)]
pub struct DocumentLayout {
    /// Total document height.
    content_height: u32,
    /// Heading elements in document order.
    elements: Vec<Element>,
    /// First element carrying each id.
    index: HashMap<String, ElementId>,
    /// Operation history.
    log: Vec<HostOp>,
    /// Page geometry.
    metrics: Metrics,
    /// Next registration id.
    next_subscription: u64,
    /// Live registrations.
    registrations: Vec<Registration>,
    /// Current scroll offset.
    scroll: u32,
}

impl DocumentLayout {
    /// Lay out `headings` in a document of `total_lines` lines.
    /// Headings without an id are not elements.
    pub fn new(headings: &[Heading], total_lines: u32, metrics: Metrics) -> Self {
        let mut elements = Vec::new();
        let mut index = HashMap::new();
        for heading in headings {
            let Some(id) = heading.entry.anchor() else { continue };
            index.entry(id.to_string()).or_insert(ElementId(elements.len()));
            elements.push(Element {
                height: metrics.line_height,
                id: id.to_string(),
                top: heading.line.saturating_mul(metrics.line_height),
            });
        }

        return Self {
            content_height: total_lines.saturating_mul(metrics.line_height),
            elements,
            index,
            log: Vec::new(),
            metrics,
            next_subscription: 0,
            registrations: Vec::new(),
            scroll: 0,
        };
    }

    /// Parse `source` and lay out its headings.
    ///
    /// # Errors
    ///
    /// Returns `Error::ParseFailed` if the markdown cannot be parsed.
    pub fn from_markdown(path: &Path, source: &str, metrics: Metrics) -> Result<Self, Error> {
        let headings = toc::headings(path, source)?;
        let total_lines = u32::try_from(source.lines().count()).unwrap_or(u32::MAX);
        return Ok(Self::new(&headings, total_lines, metrics));
    }

    /// Operations performed so far.
    pub fn log(&self) -> &[HostOp] {
        return &self.log;
    }

    /// Largest reachable scroll offset.
    pub const fn max_scroll(&self) -> u32 {
        return self.content_height.saturating_sub(self.metrics.viewport_height);
    }

    /// Number of live registrations.
    pub fn registrations(&self) -> usize {
        return self.registrations.len();
    }

    /// Current scroll offset.
    pub const fn scroll(&self) -> u32 {
        return self.scroll;
    }

    /// Move the existing elements to new positions without touching the
    /// registrations, then deliver batches for any element whose state
    /// changed. Only applies when `headings` carries the same ids in the same
    /// order; returns `false` and changes nothing otherwise.
    pub fn relayout(&mut self, headings: &[Heading], total_lines: u32) -> bool {
        let placed: Vec<(&str, u32)> = headings
            .iter()
            .filter_map(|h| return h.entry.anchor().map(|id| return (id, h.line)))
            .collect();
        let same_ids = placed.len() == self.elements.len()
            && placed.iter().zip(&self.elements).all(|((id, _), element)| return *id == element.id);
        if !same_ids {
            return false;
        }

        for ((_, line), element) in placed.iter().zip(self.elements.iter_mut()) {
            element.top = line.saturating_mul(self.metrics.line_height);
        }
        self.content_height = total_lines.saturating_mul(self.metrics.line_height);
        self.scroll_to(self.scroll);
        return true;
    }

    /// Scroll to `offset` (clamped) and deliver one batch per registration
    /// whose elements changed state.
    pub fn scroll_to(&mut self, offset: u32) {
        self.scroll = offset.min(self.max_scroll());
        let Self {
            elements,
            log,
            metrics,
            registrations,
            scroll,
            ..
        } = self;

        for registration in registrations.iter_mut() {
            let span = registration.band.span(*scroll, metrics.viewport_height);
            let mut batch = Vec::new();
            for (element_id, was_visible) in registration.elements.iter().zip(registration.visible.iter_mut()) {
                let Some(element) = elements.get(element_id.0) else { continue };
                let now_visible = element.top < span.end && element.top.saturating_add(element.height) > span.start;
                if now_visible != *was_visible {
                    *was_visible = now_visible;
                    batch.push(event_for(element, *scroll, now_visible));
                }
            }
            deliver(registration, batch, log);
        }
    }
}

/// Build the event an element reports at the given scroll offset.
fn event_for(element: &Element, scroll: u32, visible: bool) -> VisibilityEvent {
    return VisibilityEvent {
        id: element.id.clone(),
        offset: i64::from(element.top).saturating_sub(i64::from(scroll)),
        visible,
    };
}

/// Send a non-empty batch and record it.
fn deliver(registration: &Registration, batch: Vec<VisibilityEvent>, log: &mut Vec<HostOp>) {
    if batch.is_empty() {
        return;
    }
    let ids = batch.iter().map(|e| return e.id.clone()).collect();
    // The receiver may already be gone if the owner dropped it without unsubscribing.
    if registration.sender.send(batch).is_ok() {
        log.push(HostOp::Deliver {
            ids,
            subscription: registration.subscription,
        });
    }
}

impl VisibilityHost for DocumentLayout {
    fn resolve(&self, id: &str) -> Option<ElementId> {
        return self.index.get(id).copied();
    }

    fn subscribe(&mut self, mut elements: Vec<ElementId>, band: Band) -> Subscription {
        elements.sort_unstable();
        elements.dedup();
        elements.retain(|e| return e.0 < self.elements.len());

        let subscription = SubscriptionId(self.next_subscription);
        self.next_subscription = self.next_subscription.saturating_add(1);

        let (sender, receiver) = crossbeam_channel::unbounded();
        let span = band.span(self.scroll, self.metrics.viewport_height);
        let mut visible = Vec::with_capacity(elements.len());
        let mut initial = Vec::with_capacity(elements.len());
        for element_id in &elements {
            let Some(element) = self.elements.get(element_id.0) else { continue };
            let now_visible = element.top < span.end && element.top.saturating_add(element.height) > span.start;
            visible.push(now_visible);
            initial.push(event_for(element, self.scroll, now_visible));
        }

        self.log.push(HostOp::Subscribe {
            ids: initial.iter().map(|e| return e.id.clone()).collect(),
            subscription,
        });

        let registration = Registration {
            band,
            elements: elements.clone(),
            sender,
            subscription,
            visible,
        };
        deliver(&registration, initial, &mut self.log);
        self.registrations.push(registration);

        return Subscription::new(subscription, elements, receiver);
    }

    fn unsubscribe(&mut self, subscription: Subscription) -> Unsubscribed {
        let id = subscription.id();
        let released = self
            .registrations
            .iter()
            .position(|r| return r.subscription == id)
            .map_or(0, |pos| return self.registrations.remove(pos).elements.len());
        drop(subscription);

        self.log.push(HostOp::Unsubscribe {
            released,
            subscription: id,
        });
        return Unsubscribed { id, released };
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

    /// Line height 10, viewport 100: the band is `[scroll + 20, scroll + 55)`.
    const METRICS: Metrics = Metrics {
        line_height: 10,
        viewport_height: 100,
    };

    fn layout() -> DocumentLayout {
        let mut source = String::from("# Title\n\n## Intro\n");
        for _ in 3..10 {
            source.push_str("text\n");
        }
        source.push_str("## Usage\n");
        for _ in 11..40 {
            source.push_str("text\n");
        }
        DocumentLayout::from_markdown(Path::new("t.md"), &source, METRICS).unwrap()
    }

    fn visible_ids(batch: &[VisibilityEvent]) -> Vec<&str> {
        batch.iter().filter(|e| e.visible).map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn resolves_ids_in_document_order() {
        let layout = layout();
        assert_eq!(layout.resolve("title"), Some(ElementId(0)));
        assert_eq!(layout.resolve("intro"), Some(ElementId(1)));
        assert_eq!(layout.resolve("usage"), Some(ElementId(2)));
        assert_eq!(layout.resolve("missing"), None);
        assert_eq!(layout.max_scroll(), 300);
    }

    #[test]
    fn initial_batch_reports_every_element() {
        let mut layout = layout();
        let sub = layout.subscribe(vec![ElementId(2), ElementId(1)], Band::DEFAULT);
        let batches = sub.pending();
        assert_eq!(batches.len(), 1);
        let ids: Vec<&str> = batches[0].iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["intro", "usage"]);
        assert_eq!(visible_ids(&batches[0]), vec!["intro"]);
    }

    #[test]
    fn scrolling_delivers_only_changes() {
        let mut layout = layout();
        let sub = layout.subscribe(vec![ElementId(1), ElementId(2)], Band::DEFAULT);
        let _ = sub.pending();

        layout.scroll_to(50);
        let batches = sub.pending();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(visible_ids(&batches[0]), vec!["usage"]);
        assert_eq!(batches[0][1].offset, 50);

        layout.scroll_to(51);
        assert!(sub.pending().is_empty());
    }

    #[test]
    fn scroll_is_clamped() {
        let mut layout = layout();
        layout.scroll_to(10_000);
        assert_eq!(layout.scroll(), layout.max_scroll());
    }

    #[test]
    fn relayout_moves_elements_under_live_registrations() {
        let mut layout = layout();
        let sub = layout.subscribe(vec![ElementId(1), ElementId(2)], Band::DEFAULT);
        let _ = sub.pending();

        let mut moved = String::from("# Title\n\n## Intro\n## Usage\n");
        for _ in 4..40 {
            moved.push_str("text\n");
        }
        let headings = toc::headings(Path::new("t.md"), &moved).unwrap();
        assert!(layout.relayout(&headings, 40));

        let batches = sub.pending();
        assert_eq!(batches.len(), 1);
        assert_eq!(visible_ids(&batches[0]), vec!["usage"]);
        assert_eq!(batches[0][0].offset, 30);
        assert_eq!(layout.registrations(), 1);
    }

    #[test]
    fn relayout_refuses_different_headings() {
        let mut layout = layout();
        let headings = toc::headings(Path::new("t.md"), "# Title\n\n## Intro\n\n## Setup\n").unwrap();
        assert!(!layout.relayout(&headings, 5));
        assert_eq!(layout.resolve("usage"), Some(ElementId(2)));
        assert_eq!(layout.max_scroll(), 300);
    }

    #[test]
    fn unsubscribe_stops_delivery_and_is_logged() {
        let mut layout = layout();
        let sub = layout.subscribe(vec![ElementId(1), ElementId(2)], Band::DEFAULT);
        let id = sub.id();
        let done = layout.unsubscribe(sub);
        assert_eq!(done.released, 2);
        assert_eq!(layout.registrations(), 0);

        layout.scroll_to(50);
        assert_eq!(
            layout.log().last(),
            Some(&HostOp::Unsubscribe {
                released: 2,
                subscription: id,
            })
        );
    }
}
