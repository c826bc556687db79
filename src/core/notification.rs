//! Lifecycle notifications and their journal.
//!
//! Every lifecycle step emits a [`Notification`]. Observers subscribed on the
//! state receive it synchronously; when the tree is configured to record
//! lifecycle events, it is also appended to a [`LifecycleLog`] that the
//! container can drain after each tick.

use super::id::StateId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What happened to a state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    /// Initialization finished and the `setup` hook ran.
    Setup,
    /// The state became active.
    Entered,
    /// The state is about to become inactive.
    Exited,
    /// One update tick ran.
    Updated { delta: f64 },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Entered => "entered",
            Self::Exited => "exited",
            Self::Updated { .. } => "updated",
        }
    }
}

/// Record of one emitted notification.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// The state that emitted it
    pub state: StateId,
    /// The state's name at emission time
    pub name: String,
    pub notification: Notification,
    /// When it was emitted
    pub timestamp: DateTime<Utc>,
}

/// Ordered journal of lifecycle events.
///
/// With a capacity set, the oldest events are discarded first.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LifecycleLog {
    events: Vec<LifecycleEvent>,
    capacity: Option<usize>,
}

impl LifecycleLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            events: Vec::new(),
            capacity,
        }
    }

    /// Append an event, evicting the oldest if the log is full.
    pub fn record(&mut self, event: LifecycleEvent) {
        if self.capacity == Some(0) {
            return;
        }
        if let Some(capacity) = self.capacity {
            if self.events.len() >= capacity {
                let overflow = self.events.len() + 1 - capacity;
                self.events.drain(..overflow);
            }
        }
        self.events.push(event);
    }

    pub fn events(&self) -> &[LifecycleEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Remove and return everything recorded so far.
    pub fn drain(&mut self) -> Vec<LifecycleEvent> {
        std::mem::take(&mut self.events)
    }

    /// Events emitted by one state, oldest first.
    pub fn for_state(&self, state: StateId) -> Vec<&LifecycleEvent> {
        self.events.iter().filter(|e| e.state == state).collect()
    }

    /// Names of the states that were entered, in order.
    pub fn entered_path(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter(|e| e.notification == Notification::Entered)
            .map(|e| e.name.as_str())
            .collect()
    }

    /// Time between the first and last recorded events.
    ///
    /// Returns `None` if nothing has been recorded.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.events.first(), self.events.last()) {
            last.timestamp
                .signed_duration_since(first.timestamp)
                .to_std()
                .ok()
        } else {
            None
        }
    }
}
