//! Visibility subscription abstraction. A host resolves element ids and
//! streams batches of visibility changes for the elements registered with it.

use std::ops::Range;

use crossbeam_channel::Receiver;

/// Viewport-relative band an element must overlap to count as intersecting.
/// Margins are percentages of the viewport height cut from the top and bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    /// Percent of the viewport excluded at the bottom.
    pub bottom_percent: u8,
    /// Percent of the viewport excluded at the top.
    pub top_percent: u8,
}

impl Band {
    /// Middle band used for heading tracking: top 20% and bottom 45% excluded.
    pub const DEFAULT: Self = Self {
        bottom_percent: 45,
        top_percent: 20,
    };

    /// The equivalent CSS `rootMargin` value.
    pub fn css_root_margin(&self) -> String {
        return format!("-{}% 0% -{}% 0px", self.top_percent, self.bottom_percent);
    }

    /// Absolute document span of the band for a viewport scrolled to `scroll`.
    pub fn span(&self, scroll: u32, viewport_height: u32) -> Range<u32> {
        let top_cut = percent_of(viewport_height, self.top_percent);
        let bottom_cut = percent_of(viewport_height, self.bottom_percent);
        let start = scroll.saturating_add(top_cut);
        let end = scroll
            .saturating_add(viewport_height)
            .saturating_sub(bottom_cut)
            .max(start);
        return start..end;
    }
}

impl Default for Band {
    fn default() -> Self {
        return Self::DEFAULT;
    }
}

/// `percent`% of `value`, rounded down.
fn percent_of(value: u32, percent: u8) -> u32 {
    let scaled = u64::from(value).saturating_mul(u64::from(percent)) / 100;
    return u32::try_from(scaled).unwrap_or(u32::MAX);
}

/// Host-side handle of a resolved element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(
    /// Position of the element in document order.
    pub usize,
);

/// Identifies one registration with a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(
    /// Host-assigned sequence number.
    pub u64,
);

/// A change in one element's intersection with the band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityEvent {
    /// The element's anchor id.
    pub id: String,
    /// Element top relative to the viewport top; negative once scrolled past.
    pub offset: i64,
    /// Whether the element now intersects the band.
    pub visible: bool,
}

/// A live registration. Each message on the stream is one batch from one layout pass.
#[derive(Debug)]
pub struct Subscription {
    /// Registered elements in delivery order.
    elements: Vec<ElementId>,
    /// Batches of visibility changes.
    events: Receiver<Vec<VisibilityEvent>>,
    /// Registration id.
    id: SubscriptionId,
}

impl Subscription {
    /// Wrap a host-side registration.
    pub const fn new(id: SubscriptionId, elements: Vec<ElementId>, events: Receiver<Vec<VisibilityEvent>>) -> Self {
        return Self { elements, events, id };
    }

    /// Registered elements.
    pub fn elements(&self) -> &[ElementId] {
        return &self.elements;
    }

    /// Registration id.
    pub const fn id(&self) -> SubscriptionId {
        return self.id;
    }

    /// Every batch delivered so far and not yet taken, oldest first.
    pub fn pending(&self) -> Vec<Vec<VisibilityEvent>> {
        return self.events.try_iter().collect();
    }
}

/// Completion signal of an unsubscribe: the registration is gone and will
/// deliver nothing further.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unsubscribed {
    /// The released registration.
    pub id: SubscriptionId,
    /// Number of elements it observed.
    pub released: usize,
}

/// Element lookup plus visibility observation, as provided by a rendering host.
pub trait VisibilityHost {
    /// Find the element carrying anchor `id`.
    fn resolve(&self, id: &str) -> Option<ElementId>;

    /// Observe `elements` against `band`. The host delivers an initial batch
    /// describing every element, then one batch per change.
    fn subscribe(&mut self, elements: Vec<ElementId>, band: Band) -> Subscription;

    /// Release every element of `subscription`. Consumes the handle, so
    /// batches still queued on it are discarded with it.
    fn unsubscribe(&mut self, subscription: Subscription) -> Unsubscribed;
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
    fn default_band_matches_root_margin() {
        assert_eq!(Band::DEFAULT.css_root_margin(), "-20% 0% -45% 0px");
    }

    #[test]
    fn span_keeps_middle_band() {
        assert_eq!(Band::DEFAULT.span(0, 1000), 200..550);
        assert_eq!(Band::DEFAULT.span(300, 1000), 500..850);
    }

    #[test]
    fn degenerate_band_is_empty_not_inverted() {
        let band = Band {
            bottom_percent: 80,
            top_percent: 50,
        };
        assert!(band.span(0, 100).is_empty());
    }
}
