//! Event model - what the host hands to the tracker
//!
//! Mirrors the small subset of DOM input events the tracker listens to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Semantic event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Genuine user click (may navigate)
    Click,
    /// Form submission
    Submit,
    /// Pointer entered a tracked element
    #[serde(rename = "mouseenter")]
    MouseEnter,
    /// Pointer left a tracked element
    #[serde(rename = "mouseleave")]
    MouseLeave,
    /// Click dispatched by script; never navigates
    SyntheticClick,
}

impl EventKind {
    /// All known kinds, in wire-name order used by config validation
    pub const ALL: [EventKind; 5] = [
        EventKind::Click,
        EventKind::Submit,
        EventKind::MouseEnter,
        EventKind::MouseLeave,
        EventKind::SyntheticClick,
    ];

    /// Stable wire name
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Click => "click",
            EventKind::Submit => "submit",
            EventKind::MouseEnter => "mouseenter",
            EventKind::MouseLeave => "mouseleave",
            EventKind::SyntheticClick => "synthetic_click",
        }
    }

    /// Only a genuine click follows a link
    pub fn is_navigating(self) -> bool {
        matches!(self, EventKind::Click)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown event kind '{s}'"))
    }
}

/// Mouse button that triggered a click
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseButton {
    #[default]
    Primary,
    Auxiliary,
    Secondary,
}

/// Modifier keys held during a click
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    /// True when any modifier is held
    pub fn any(&self) -> bool {
        self.ctrl || self.meta || self.shift || self.alt
    }
}

/// A click (or click-like) input event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickEvent {
    /// Event kind (`Click` or `SyntheticClick` in practice)
    pub kind: EventKind,
    /// Button pressed
    pub button: MouseButton,
    /// Modifier keys
    pub modifiers: Modifiers,
    /// Whether some other handler already cancelled the default action
    default_prevented: bool,
}

impl ClickEvent {
    /// Plain primary-button click
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            button: MouseButton::Primary,
            modifiers: Modifiers::default(),
            default_prevented: false,
        }
    }

    /// Override the button
    pub fn with_button(mut self, button: MouseButton) -> Self {
        self.button = button;
        self
    }

    /// Override the modifiers
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Cancel the host's default action for this event
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    /// Whether the default action was cancelled
    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

/// The element a click resolved to, as reported by the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickTarget {
    /// Link destination, if any
    pub href: Option<String>,
    /// Browsing context attribute (`_blank`, `_self`, ...)
    pub browsing_context: Option<String>,
    /// Element carries the tracking opt-out marker
    pub opt_out: bool,
}

impl ClickTarget {
    /// Link target with the given destination
    pub fn link(href: impl Into<String>) -> Self {
        Self {
            href: Some(href.into()),
            ..Self::default()
        }
    }
}

/// What the tracker is asked to report to each backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingRequest {
    PageView,
    Event(EventKind),
}

impl fmt::Display for TrackingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingRequest::PageView => f.write_str("pageview"),
            TrackingRequest::Event(kind) => write!(f, "event:{kind}"),
        }
    }
}
