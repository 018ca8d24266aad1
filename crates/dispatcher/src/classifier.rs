//! ClickClassifier - which clicks get their navigation held

use contracts::{ClickEvent, MouseButton, TargetResolver};

/// Why a click is not held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotPrimaryButton,
    /// Modifier keys open a new tab/window or download; the page stays
    ModifierHeld,
    /// Synthetic or otherwise non-navigating event
    NotNavigating,
    DefaultPrevented,
    NoTarget,
    NoDestination,
    /// Link opens in another browsing context
    NewBrowsingContext,
    OptedOut,
}

/// Classification result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickDecision {
    Defer { target_url: String },
    Skip(SkipReason),
}

impl ClickDecision {
    pub fn is_defer(&self) -> bool {
        matches!(self, ClickDecision::Defer { .. })
    }
}

/// Classify a click; pure apart from the resolver's DOM walk
pub fn classify(event: &ClickEvent, resolver: &dyn TargetResolver) -> ClickDecision {
    if event.button != MouseButton::Primary {
        return ClickDecision::Skip(SkipReason::NotPrimaryButton);
    }
    if event.modifiers.any() {
        return ClickDecision::Skip(SkipReason::ModifierHeld);
    }
    if !event.kind.is_navigating() {
        return ClickDecision::Skip(SkipReason::NotNavigating);
    }
    if event.default_prevented() {
        return ClickDecision::Skip(SkipReason::DefaultPrevented);
    }

    let Some(target) = resolver.resolve_target(event) else {
        return ClickDecision::Skip(SkipReason::NoTarget);
    };
    if target.opt_out {
        return ClickDecision::Skip(SkipReason::OptedOut);
    }

    let Some(href) = target.href.as_deref().map(str::trim).filter(|h| is_navigable(h)) else {
        return ClickDecision::Skip(SkipReason::NoDestination);
    };
    if opens_new_context(target.browsing_context.as_deref()) {
        return ClickDecision::Skip(SkipReason::NewBrowsingContext);
    }

    ClickDecision::Defer {
        target_url: href.to_string(),
    }
}

/// Predicate form of [`classify`]
pub fn is_deferral_eligible(event: &ClickEvent, resolver: &dyn TargetResolver) -> bool {
    classify(event, resolver).is_defer()
}

fn is_navigable(href: &str) -> bool {
    !href.is_empty()
        && !href.starts_with('#')
        && !href.to_ascii_lowercase().starts_with("javascript:")
}

fn opens_new_context(browsing_context: Option<&str>) -> bool {
    match browsing_context.map(str::trim) {
        None | Some("") => false,
        Some(context) => !["_self", "_top", "_parent"]
            .iter()
            .any(|same| context.eq_ignore_ascii_case(same)),
    }
}
