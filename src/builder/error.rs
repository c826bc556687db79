//! Build errors for state builders.

use crate::core::HsmError;
use thiserror::Error;

/// Problems found while validating a state definition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildViolation {
    #[error("State at '{path}' has an empty name")]
    EmptyStateName { path: String },

    #[error("State '{path}' registers a handler with an empty event name")]
    EmptyEventName { path: String },

    #[error("State '{path}' has more than one child named '{name}'")]
    DuplicateChild { path: String, name: String },
}

/// Errors that can occur when building state subtrees.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Invalid state definition ({} problems)", .0.len())]
    Invalid(Vec<BuildViolation>),

    #[error(transparent)]
    Tree(#[from] HsmError),
}
