//! Stable identifiers for states stored in a [`StateTree`](crate::tree::StateTree).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a state inside its owning tree.
///
/// Ids are handed out by [`StateTree::add_state`](crate::tree::StateTree::add_state)
/// and are never reused, even after the state is removed. A stale id simply
/// stops resolving.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(pub(crate) usize);

impl StateId {
    /// Raw arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
