//! Actions run when a state is entered and reverted when it exits.

use crate::core::{AgentRef, Payload, StateId};
use crate::scope::Scope;
use crate::tree::StateTree;

/// Unit of work attached to a state's enter list.
///
/// On enter every action is executed in list order. On exit the same list is
/// walked again in the same order and `revert` is called on the actions that
/// report [`is_revertible`](Action::is_revertible).
pub trait Action {
    fn execute(&self, ctx: &mut ExecutionContext<'_>);

    fn revert(&self, _ctx: &mut ExecutionContext<'_>) {}

    fn is_revertible(&self) -> bool {
        false
    }

    /// Name used in diagnostics.
    fn name(&self) -> &str {
        "Action"
    }
}

/// Context handed to a single action invocation.
///
/// A fresh context is created for every call.
pub struct ExecutionContext<'a> {
    tree: &'a mut StateTree,
    state: StateId,
}

impl<'a> ExecutionContext<'a> {
    pub(crate) fn new(tree: &'a mut StateTree, state: StateId) -> Self {
        Self { tree, state }
    }

    /// State whose enter list is running.
    pub fn state(&self) -> StateId {
        self.state
    }

    pub fn scope(&self) -> Scope {
        self.tree.scope(self.state).unwrap_or_default()
    }

    pub fn agent(&self) -> AgentRef {
        self.tree.agent(self.state).unwrap_or_default()
    }

    /// World the tree runs in, as set by the container.
    pub fn world_root(&self) -> AgentRef {
        self.tree.world_root()
    }

    pub fn tree(&self) -> &StateTree {
        &*self.tree
    }

    pub fn tree_mut(&mut self) -> &mut StateTree {
        &mut *self.tree
    }

    pub fn dispatch(&mut self, event: &str, payload: impl Into<Payload>) -> bool {
        self.tree.dispatch(self.state, event, payload)
    }
}
