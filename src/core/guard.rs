//! Guard predicates for controlling activation.
//!
//! A guard is published on a state for whoever decides transitions. The tree
//! itself never consults it while entering; containers call
//! [`StateTree::check_guard`](crate::tree::StateTree::check_guard) first.

use super::id::StateId;
use crate::tree::StateTree;
use std::fmt;
use std::rc::Rc;

/// Predicate that decides whether a state may be entered.
///
/// The predicate sees the whole tree (read-only) and the id of the guarded
/// state, so it can inspect scoped data or sibling activity.
///
/// # Example
///
/// ```rust
/// use mindset_hsm::core::Guard;
/// use mindset_hsm::tree::StateTree;
///
/// let mut tree = StateTree::new();
/// let attack = tree.add_state("Attack");
///
/// let has_ammo = Guard::new(|tree: &StateTree, id| {
///     tree.scope(id)
///         .and_then(|scope| scope.get("ammo"))
///         .and_then(|ammo| ammo.as_i64())
///         .is_some_and(|ammo| ammo > 0)
/// });
///
/// assert!(!has_ammo.check(&tree, attack));
/// tree.scope(attack).unwrap().set("ammo", 3);
/// assert!(has_ammo.check(&tree, attack));
/// ```
#[derive(Clone)]
pub struct Guard {
    predicate: Rc<dyn Fn(&StateTree, StateId) -> bool>,
}

impl Guard {
    /// Create a guard from a predicate function.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&StateTree, StateId) -> bool + 'static,
    {
        Guard {
            predicate: Rc::new(predicate),
        }
    }

    /// Evaluate the guard for `state`.
    pub fn check(&self, tree: &StateTree, state: StateId) -> bool {
        (self.predicate)(tree, state)
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard").finish_non_exhaustive()
    }
}
