//! Language gate: shows content written for one platform only when the
//! reader's selection maps to that platform.

use std::fmt::Write as _;

use crate::context::{AppContext, LanguageScope};
use crate::error::Error;
use crate::platform::Platform;

/// Whether a gate currently renders its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Renders nothing, not even the tab row.
    Hidden,
    /// Renders the tab row and the children.
    Visible,
}

/// Map the selected platform to the tab a gate compares against.
///
/// Only C# and Rust have their own tab. Every other selection falls back
/// to the C# tab.
#[allow(clippy::match_same_arms, reason = "the C# arm names the mapping, the wildcard is the legacy fallback")]
pub const fn effective_tab_for(platform: Platform) -> Platform {
    return match platform {
        Platform::CSharp => Platform::CSharp,
        Platform::Rust => Platform::Rust,
        _ => Platform::CSharp,
    };
}

/// Content intended for exactly one target language.
#[derive(Debug)]
pub struct LanguageGate<C> {
    /// Opaque content shown when the gate is visible.
    children: C,
    /// Tab derived from the last context the gate saw.
    effective_tab: Platform,
    /// The language this content is written for.
    language: Platform,
}

impl<C> LanguageGate<C> {
    /// Validate `language` and bind the gate to the current selection.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidLanguage` listing every valid platform when
    /// `language` is not one. Nothing is rendered in that case.
    pub fn new(language: &str, children: C, ctx: &AppContext) -> Result<Self, Error> {
        let language = Platform::parse(language)?;
        return Ok(Self {
            children,
            effective_tab: effective_tab_for(ctx.platform),
            language,
        });
    }

    /// The gated content.
    pub const fn children(&self) -> &C {
        return &self.children;
    }

    /// Mutable access for recursive context propagation.
    pub const fn children_mut(&mut self) -> &mut C {
        return &mut self.children;
    }

    /// The tab the gate compares against after fallback mapping.
    pub const fn effective_tab(&self) -> Platform {
        return self.effective_tab;
    }

    /// The language the content is written for.
    pub const fn language(&self) -> Platform {
        return self.language;
    }

    /// Recompute the effective tab after the selection changed.
    pub fn on_context_change(&mut self, ctx: &AppContext) -> GateState {
        let before = self.state();
        self.effective_tab = effective_tab_for(ctx.platform);
        let after = self.state();
        if before != after {
            log::debug!(
                "gate {}: {before:?} -> {after:?} (selected {}, tab {})",
                self.language,
                ctx.platform,
                self.effective_tab
            );
        }
        return after;
    }

    /// Render against the enclosing scope. `None` when hidden.
    pub fn render(&self, parent: &LanguageScope) -> Option<Rendered<'_, C>> {
        if self.state() == GateState::Hidden {
            return None;
        }

        return Some(Rendered {
            children: &self.children,
            scope: parent.nest(self.effective_tab),
            tabs: Platform::ALL.iter().map(|&platform| return TabMarker { platform }).collect(),
        });
    }

    /// Visible iff the gate's language equals its effective tab.
    pub fn state(&self) -> GateState {
        if self.language == self.effective_tab {
            return GateState::Visible;
        }
        return GateState::Hidden;
    }
}

/// One unlabeled tab placeholder, keyed by platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabMarker {
    /// Platform the placeholder stands for.
    pub platform: Platform,
}

/// Output of a visible gate.
#[derive(Debug)]
pub struct Rendered<'a, C> {
    /// The gated content.
    pub children: &'a C,
    /// Scope descendants read the effective tab from.
    pub scope: LanguageScope,
    /// One marker per known platform.
    pub tabs: Vec<TabMarker>,
}

impl<C> Rendered<'_, C> {
    /// HTML for the tab row, followed by a blank line so markdown resumes after it.
    pub fn tab_row_html(&self) -> String {
        let mut out = String::from("<ul role=\"tablist\" class=\"flex flex-row items-center\">\n");
        for marker in &self.tabs {
            let _ = writeln!(out, "<li data-platform=\"{}\"></li>", marker.platform);
        }
        out.push_str("</ul>\n\n");
        return out;
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

    const fn ctx(platform: Platform) -> AppContext {
        return AppContext { platform };
    }

    #[test]
    fn every_platform_is_accepted() {
        for platform in Platform::ALL {
            assert!(LanguageGate::new(platform.as_str(), (), &ctx(Platform::CSharp)).is_ok());
        }
    }

    #[test]
    fn unknown_language_fails_before_rendering() {
        let err = LanguageGate::new("kotlin", (), &ctx(Platform::CSharp)).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("csharp,rust,cpp,java,python,swift,typescript"), "{message}");
    }

    #[test]
    fn csharp_selection_shows_csharp_only() {
        let csharp = LanguageGate::new("csharp", "body", &ctx(Platform::CSharp)).unwrap();
        let rust = LanguageGate::new("rust", "body", &ctx(Platform::CSharp)).unwrap();
        assert_eq!(csharp.state(), GateState::Visible);
        assert_eq!(rust.state(), GateState::Hidden);
        assert!(rust.render(&LanguageScope::root()).is_none());
    }

    #[test]
    fn rust_selection_shows_rust_only() {
        let csharp = LanguageGate::new("csharp", "body", &ctx(Platform::Rust)).unwrap();
        let rust = LanguageGate::new("rust", "body", &ctx(Platform::Rust)).unwrap();
        assert_eq!(rust.state(), GateState::Visible);
        assert_eq!(csharp.state(), GateState::Hidden);
    }

    #[test]
    fn other_selections_fall_back_to_csharp() {
        for platform in Platform::ALL {
            if matches!(platform, Platform::CSharp | Platform::Rust) {
                continue;
            }
            let csharp = LanguageGate::new("csharp", (), &ctx(platform)).unwrap();
            let own = LanguageGate::new(platform.as_str(), (), &ctx(platform)).unwrap();
            assert_eq!(csharp.state(), GateState::Visible, "{platform}");
            assert_eq!(own.state(), GateState::Hidden, "{platform}");
        }
    }

    #[test]
    fn context_change_toggles_state() {
        let mut gate = LanguageGate::new("rust", (), &ctx(Platform::CSharp)).unwrap();
        assert_eq!(gate.on_context_change(&ctx(Platform::Rust)), GateState::Visible);
        assert_eq!(gate.on_context_change(&ctx(Platform::Python)), GateState::Hidden);
        assert_eq!(gate.effective_tab(), Platform::CSharp);
    }

    #[test]
    fn visible_render_exposes_scope_and_tab_row() {
        let gate = LanguageGate::new("rust", vec!["child"], &ctx(Platform::Rust)).unwrap();
        let parent = LanguageScope::root().nest(Platform::CSharp);
        let rendered = gate.render(&parent).unwrap();

        assert_eq!(rendered.scope.current(), Some(Platform::Rust));
        assert_eq!(rendered.scope.depth(), 2);
        assert_eq!(rendered.tabs.len(), Platform::ALL.len());
        assert_eq!(rendered.children, &vec!["child"]);

        let html = rendered.tab_row_html();
        assert!(html.starts_with("<ul role=\"tablist\""));
        assert_eq!(html.matches("<li").count(), Platform::ALL.len());
        assert!(html.ends_with("</ul>\n\n"));
    }
}
