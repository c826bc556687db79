//! Error types for the state tree.

use super::id::StateId;
use thiserror::Error;

/// Fatal precondition violations.
///
/// These indicate a programming error in the caller (usually the container
/// driving the tree). The offending call does nothing and returns the error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HsmError {
    #[error("State {0} does not exist in this tree")]
    UnknownState(StateId),

    #[error("Cannot initialize state '{name}' without a live agent")]
    NullAgent { name: String },

    #[error("Event name must not be empty")]
    EmptyEventName,

    #[error("Cannot restart state '{name}' while it is inactive")]
    RestartInactive { name: String },

    #[error("Cannot remove state '{name}' while it is active")]
    StillActive { name: String },

    #[error("Attaching {child} under {parent} would create a cycle")]
    HierarchyCycle { child: StateId, parent: StateId },

    #[error("Linking scope of state '{name}' would create a cycle")]
    ScopeCycle { name: String },
}

/// Failure reported by an event handler.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Recoverable dispatch failures.
///
/// [`StateTree::dispatch`](crate::tree::StateTree::dispatch) reports these and
/// returns `false`; [`StateTree::try_dispatch`](crate::tree::StateTree::try_dispatch)
/// hands them back to the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("Cannot dispatch an event with an empty name")]
    EmptyEventName,

    #[error("Cannot dispatch from unknown state {0}")]
    UnknownState(StateId),

    #[error("Error calling event handler for '{event}': {source}")]
    HandlerFailed {
        event: String,
        #[source]
        source: HandlerError,
    },
}
