//! Overridable state behavior.

use super::agent::AgentRef;
use super::id::StateId;
use super::payload::Payload;
use crate::scope::Scope;
use crate::tree::StateTree;

/// Hooks a concrete state may implement.
///
/// Every method has a no-op default, so a behavior implements only what it
/// needs. Hooks receive a [`StateContext`] with mutable access to the whole
/// tree, which allows them to dispatch events or drive other states while
/// running.
///
/// # Example
///
/// ```rust
/// use mindset_hsm::core::{StateBehavior, StateContext};
/// use mindset_hsm::tree::StateTree;
///
/// struct Countdown;
///
/// impl StateBehavior for Countdown {
///     fn enter(&mut self, ctx: &mut StateContext<'_>) {
///         ctx.scope().set("remaining", 3.0);
///     }
///
///     fn update(&mut self, ctx: &mut StateContext<'_>, delta: f64) {
///         let scope = ctx.scope();
///         let left = scope.get("remaining").and_then(|v| v.as_f64()).unwrap_or(0.0) - delta;
///         scope.set("remaining", left);
///         if left <= 0.0 {
///             let finished = ctx.event_finished();
///             ctx.dispatch(&finished, ());
///         }
///     }
/// }
///
/// let mut tree = StateTree::new();
/// let id = tree.add_state_with("Countdown", Countdown);
/// tree.enter(id).unwrap();
/// tree.update(id, 1.0).unwrap();
/// assert_eq!(tree.scope(id).unwrap().get("remaining"), Some(2.0.into()));
/// ```
pub trait StateBehavior {
    /// Runs once at the end of initialization.
    fn setup(&mut self, _ctx: &mut StateContext<'_>) {}

    /// Runs after the state is marked active, before enter actions.
    fn enter(&mut self, _ctx: &mut StateContext<'_>) {}

    /// Runs before enter actions are reverted.
    fn exit(&mut self, _ctx: &mut StateContext<'_>) {}

    /// Runs once per tick; `delta` is supplied by the caller.
    fn update(&mut self, _ctx: &mut StateContext<'_>, _delta: f64) {}

    /// Force a distinct scope even without a data plan.
    ///
    /// Composite states that introduce their own namespace return `true`.
    fn uses_new_scope(&self) -> bool {
        false
    }

    /// State handed to the data plan as its prefetch root.
    fn prefetch_root(&self, state: StateId) -> StateId {
        state
    }
}

/// Behavior used for states created without one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBehavior;

impl StateBehavior for NoopBehavior {}

/// View of the tree handed to behavior hooks.
pub struct StateContext<'a> {
    tree: &'a mut StateTree,
    state: StateId,
}

impl<'a> StateContext<'a> {
    pub(crate) fn new(tree: &'a mut StateTree, state: StateId) -> Self {
        Self { tree, state }
    }

    /// Id of the state whose hook is running.
    pub fn state(&self) -> StateId {
        self.state
    }

    pub fn name(&self) -> &str {
        self.tree.name(self.state).unwrap_or_default()
    }

    pub fn tree(&self) -> &StateTree {
        &*self.tree
    }

    pub fn tree_mut(&mut self) -> &mut StateTree {
        &mut *self.tree
    }

    /// The state's resolved scope.
    pub fn scope(&self) -> Scope {
        self.tree.scope(self.state).unwrap_or_default()
    }

    pub fn agent(&self) -> AgentRef {
        self.tree.agent(self.state).unwrap_or_default()
    }

    /// This state's per-instance "finished" event name.
    pub fn event_finished(&self) -> String {
        self.tree
            .event_finished(self.state)
            .map(str::to_string)
            .unwrap_or_default()
    }

    /// Dispatch to the hierarchy root of this state.
    pub fn dispatch(&mut self, event: &str, payload: impl Into<Payload>) -> bool {
        self.tree.dispatch(self.state, event, payload)
    }
}
