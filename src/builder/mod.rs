//! Builder API for ergonomic state tree construction.
//!
//! Builders describe a state and its children up front, validate the whole
//! definition at once and then insert it into a [`StateTree`](crate::tree::StateTree).

pub mod error;
pub mod state;

pub use error::{BuildError, BuildViolation};
pub use state::{BuildCheck, StateBuilder};
