//! Event model - finite event-kind table and redispatch cloning.
//!
//! Forwarded-event configuration redispatches a received event onto another
//! element. The browser original clones events through their constructors;
//! here the supported kinds form a closed table, and anything outside it
//! falls back to a generic copy of the common fields (a known limitation
//! for exotic event kinds).

use std::fmt;

use tracing::warn;

/// The closed set of event kinds the core understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Click,
    Input,
    Change,
    KeyDown,
    KeyUp,
    Focus,
    Blur,
    MouseEnter,
    MouseLeave,
    TransitionRun,
    TransitionEnd,
    AnimationRun,
    AnimationEnd,
    Attach,
    Detach,
    /// Anything outside the table. Redispatch copies common fields only.
    Custom(String),
}

impl EventKind {
    /// Wire name of this event kind (`click`, `keydown`, ...).
    pub fn type_name(&self) -> &str {
        match self {
            EventKind::Click => "click",
            EventKind::Input => "input",
            EventKind::Change => "change",
            EventKind::KeyDown => "keydown",
            EventKind::KeyUp => "keyup",
            EventKind::Focus => "focus",
            EventKind::Blur => "blur",
            EventKind::MouseEnter => "mouseenter",
            EventKind::MouseLeave => "mouseleave",
            EventKind::TransitionRun => "transitionrun",
            EventKind::TransitionEnd => "transitionend",
            EventKind::AnimationRun => "animationrun",
            EventKind::AnimationEnd => "animationend",
            EventKind::Attach => "attach",
            EventKind::Detach => "detach",
            EventKind::Custom(name) => name,
        }
    }

    /// Classify a wire name back into the table.
    pub fn from_type_name(name: &str) -> EventKind {
        match name {
            "click" => EventKind::Click,
            "input" => EventKind::Input,
            "change" => EventKind::Change,
            "keydown" => EventKind::KeyDown,
            "keyup" => EventKind::KeyUp,
            "focus" => EventKind::Focus,
            "blur" => EventKind::Blur,
            "mouseenter" => EventKind::MouseEnter,
            "mouseleave" => EventKind::MouseLeave,
            "transitionrun" => EventKind::TransitionRun,
            "transitionend" => EventKind::TransitionEnd,
            "animationrun" => EventKind::AnimationRun,
            "animationend" => EventKind::AnimationEnd,
            "attach" => EventKind::Attach,
            "detach" => EventKind::Detach,
            other => EventKind::Custom(other.to_string()),
        }
    }
}

/// An event delivered to element listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    kind: EventKind,
    /// Key name for keyboard events.
    pub key: Option<String>,
    /// Free-form payload for input/custom events.
    pub detail: Option<String>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Event {
            kind,
            key: None,
            detail: None,
        }
    }

    pub fn with_key(kind: EventKind, key: &str) -> Self {
        Event {
            kind,
            key: Some(key.to_string()),
            detail: None,
        }
    }

    pub fn with_detail(kind: EventKind, detail: &str) -> Self {
        Event {
            kind,
            key: None,
            detail: Some(detail.to_string()),
        }
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn type_name(&self) -> String {
        self.kind.type_name().to_string()
    }

    /// Clone this event for redispatch on another target.
    ///
    /// Kinds in the table clone fully. `Custom` events keep only the common
    /// fields and are reported once as a limitation.
    pub fn clone_for_redispatch(&self) -> Event {
        match &self.kind {
            EventKind::Custom(name) => {
                warn!(event = %name, "redispatching custom event: only common fields are carried");
                Event {
                    kind: self.kind.clone(),
                    key: self.key.clone(),
                    detail: self.detail.clone(),
                }
            }
            _ => self.clone(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.type_name())
    }
}
