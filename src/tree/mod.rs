//! Arena that owns every state of a hierarchy.
//!
//! States live in a slot vector and refer to each other by [`StateId`].
//! Structural queries are index chases over the parent links (see
//! `hierarchy`), the lifecycle protocol lives in `lifecycle` and the event
//! path in `dispatch`.
//!
//! # Example
//!
//! ```rust
//! use mindset_hsm::core::{AgentRef, Payload};
//! use mindset_hsm::scope::Scope;
//! use mindset_hsm::tree::StateTree;
//! use std::rc::Rc;
//!
//! let mut tree = StateTree::new();
//! let root = tree.add_state("Root");
//! let child = tree.add_state("Child");
//! tree.attach(child, root).unwrap();
//!
//! tree.add_event_handler(root, "on_score", |_: &mut StateTree, payload: &Payload| {
//!     payload.as_i64() == Some(10)
//! })
//! .unwrap();
//!
//! let agent = Rc::new("npc");
//! tree.initialize_subtree(root, AgentRef::new(&agent), &Scope::new()).unwrap();
//! tree.enter(root).unwrap();
//!
//! assert!(tree.dispatch(child, "on_score", 10));
//! ```

mod dispatch;
mod hierarchy;
mod lifecycle;

pub use dispatch::EventHandler;
pub use hierarchy::Parent;

use lifecycle::Hook;

use crate::action::Action;
use crate::config::TreeConfig;
use crate::core::{
    AgentRef, Guard, HsmError, LifecycleEvent, LifecycleLog, NoopBehavior, Notification,
    StateBehavior, StateId,
};
use crate::scope::{DataPlan, Scope, ScopeMode};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

/// Callback notified of a state's lifecycle events.
pub type Observer = Rc<dyn Fn(&LifecycleEvent)>;

/// Handle returned by [`StateTree::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

pub(crate) struct StateNode {
    name: String,
    instance: Uuid,
    event_finished: String,
    active: bool,
    initialized: bool,
    agent: AgentRef,
    scope: ScopeMode,
    plan: Option<Rc<dyn DataPlan>>,
    guard: Option<Guard>,
    handlers: HashMap<String, EventHandler>,
    on_enter_actions: Vec<Rc<dyn Action>>,
    on_exit_actions: Vec<Rc<dyn Action>>,
    behavior: Option<Box<dyn StateBehavior>>,
    pending_hooks: VecDeque<Hook>,
    observers: Vec<(ObserverId, Observer)>,
    parent: Parent,
    children: Vec<StateId>,
}

impl StateNode {
    fn new(name: String, behavior: Box<dyn StateBehavior>) -> Self {
        let instance = Uuid::new_v4();
        Self {
            name,
            instance,
            event_finished: format!("finished_{}", instance.simple()),
            active: false,
            initialized: false,
            agent: AgentRef::detached(),
            scope: ScopeMode::default(),
            plan: None,
            guard: None,
            handlers: HashMap::new(),
            on_enter_actions: Vec::new(),
            on_exit_actions: Vec::new(),
            behavior: Some(behavior),
            pending_hooks: VecDeque::new(),
            observers: Vec::new(),
            parent: Parent::Detached,
            children: Vec::new(),
        }
    }
}

/// Owner of a hierarchy of states.
///
/// All operations run synchronously on the caller's thread. Hooks, actions,
/// handlers and guards receive access to the tree, so they may re-enter it.
pub struct StateTree {
    nodes: Vec<Option<StateNode>>,
    live: usize,
    config: TreeConfig,
    log: LifecycleLog,
    world_root: AgentRef,
    next_observer: u64,
}

impl Default for StateTree {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTree {
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            nodes: Vec::new(),
            live: 0,
            log: LifecycleLog::with_capacity(config.lifecycle_capacity),
            config,
            world_root: AgentRef::detached(),
            next_observer: 0,
        }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Add an inactive, detached state with no behavior.
    pub fn add_state(&mut self, name: impl Into<String>) -> StateId {
        self.add_state_with(name, NoopBehavior)
    }

    /// Add an inactive, detached state driven by `behavior`.
    pub fn add_state_with<B>(&mut self, name: impl Into<String>, behavior: B) -> StateId
    where
        B: StateBehavior + 'static,
    {
        self.add_boxed_state(name.into(), Box::new(behavior))
    }

    pub(crate) fn add_boxed_state(
        &mut self,
        name: String,
        behavior: Box<dyn StateBehavior>,
    ) -> StateId {
        let id = StateId(self.nodes.len());
        self.nodes.push(Some(StateNode::new(name, behavior)));
        self.live += 1;
        id
    }

    /// Remove a state together with its whole subtree.
    ///
    /// Every removed state must be inactive; otherwise nothing is removed.
    /// Slots of removed states stay vacant and their ids are never handed
    /// out again, so the arena only grows. Trees that churn through many
    /// short-lived states should be rebuilt rather than kept forever.
    pub fn remove_state(&mut self, id: StateId) -> Result<Vec<StateId>, HsmError> {
        self.node(id).ok_or(HsmError::UnknownState(id))?;

        let subtree = self.subtree(id);
        if let Some(active) = subtree.iter().find(|s| self.is_active(**s)) {
            return Err(HsmError::StillActive {
                name: self.name(*active).unwrap_or_default().to_string(),
            });
        }

        self.unlink_from_parent(id);
        for state in &subtree {
            if self.nodes[state.0].take().is_some() {
                self.live -= 1;
            }
        }
        Ok(subtree)
    }

    pub fn contains(&self, id: StateId) -> bool {
        self.node(id).is_some()
    }

    /// Number of live states.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of all live states in creation order.
    pub fn state_ids(&self) -> impl Iterator<Item = StateId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_some())
            .map(|(index, _)| StateId(index))
    }

    pub fn name(&self, id: StateId) -> Option<&str> {
        self.node(id).map(|n| n.name.as_str())
    }

    pub fn set_name(&mut self, id: StateId, name: impl Into<String>) -> Result<(), HsmError> {
        self.node_mut(id).ok_or(HsmError::UnknownState(id))?.name = name.into();
        Ok(())
    }

    /// Process-unique identifier of the state instance.
    pub fn instance_id(&self, id: StateId) -> Option<Uuid> {
        self.node(id).map(|n| n.instance)
    }

    pub fn is_active(&self, id: StateId) -> bool {
        self.node(id).is_some_and(|n| n.active)
    }

    pub fn is_initialized(&self, id: StateId) -> bool {
        self.node(id).is_some_and(|n| n.initialized)
    }

    pub fn agent(&self, id: StateId) -> Option<AgentRef> {
        self.node(id).map(|n| n.agent.clone())
    }

    pub fn set_agent(&mut self, id: StateId, agent: AgentRef) -> Result<(), HsmError> {
        self.node_mut(id).ok_or(HsmError::UnknownState(id))?.agent = agent;
        Ok(())
    }

    /// The state's current scope handle.
    pub fn scope(&self, id: StateId) -> Option<Scope> {
        self.node(id).map(|n| n.scope.scope().clone())
    }

    pub fn scope_mode(&self, id: StateId) -> Option<&ScopeMode> {
        self.node(id).map(|n| &n.scope)
    }

    pub fn data_plan(&self, id: StateId) -> Option<Rc<dyn DataPlan>> {
        self.node(id).and_then(|n| n.plan.clone())
    }

    pub fn set_data_plan(
        &mut self,
        id: StateId,
        plan: Option<Rc<dyn DataPlan>>,
    ) -> Result<(), HsmError> {
        self.node_mut(id).ok_or(HsmError::UnknownState(id))?.plan = plan;
        Ok(())
    }

    /// Publish a guard that containers consult before entering `id`.
    pub fn set_guard<F>(&mut self, id: StateId, predicate: F) -> Result<(), HsmError>
    where
        F: Fn(&StateTree, StateId) -> bool + 'static,
    {
        self.install_guard(id, Some(Guard::new(predicate)))
    }

    pub fn clear_guard(&mut self, id: StateId) -> Result<(), HsmError> {
        self.install_guard(id, None)
    }

    pub(crate) fn install_guard(
        &mut self,
        id: StateId,
        guard: Option<Guard>,
    ) -> Result<(), HsmError> {
        self.node_mut(id).ok_or(HsmError::UnknownState(id))?.guard = guard;
        Ok(())
    }

    pub fn has_guard(&self, id: StateId) -> bool {
        self.node(id).is_some_and(|n| n.guard.is_some())
    }

    /// Evaluate the guard of `id`. A state without a guard is always allowed;
    /// an unknown state never is.
    pub fn check_guard(&self, id: StateId) -> bool {
        match self.node(id) {
            Some(node) => node.guard.as_ref().is_none_or(|g| g.check(self, id)),
            None => false,
        }
    }

    pub fn on_enter_actions(&self, id: StateId) -> &[Rc<dyn Action>] {
        self.node(id)
            .map(|n| n.on_enter_actions.as_slice())
            .unwrap_or_default()
    }

    pub fn set_on_enter_actions(
        &mut self,
        id: StateId,
        actions: Vec<Rc<dyn Action>>,
    ) -> Result<(), HsmError> {
        self.node_mut(id).ok_or(HsmError::UnknownState(id))?.on_enter_actions = actions;
        Ok(())
    }

    pub fn add_on_enter_action(
        &mut self,
        id: StateId,
        action: Rc<dyn Action>,
    ) -> Result<(), HsmError> {
        self.node_mut(id)
            .ok_or(HsmError::UnknownState(id))?
            .on_enter_actions
            .push(action);
        Ok(())
    }

    /// Actions stored for exit. They are kept for authoring tools only and
    /// are never executed; exit reverts the enter list instead.
    pub fn on_exit_actions(&self, id: StateId) -> &[Rc<dyn Action>] {
        self.node(id)
            .map(|n| n.on_exit_actions.as_slice())
            .unwrap_or_default()
    }

    pub fn set_on_exit_actions(
        &mut self,
        id: StateId,
        actions: Vec<Rc<dyn Action>>,
    ) -> Result<(), HsmError> {
        self.node_mut(id).ok_or(HsmError::UnknownState(id))?.on_exit_actions = actions;
        Ok(())
    }

    /// Observe every notification emitted by `id`.
    pub fn subscribe<F>(&mut self, id: StateId, observer: F) -> Result<ObserverId, HsmError>
    where
        F: Fn(&LifecycleEvent) + 'static,
    {
        let observer_id = ObserverId(self.next_observer);
        self.node_mut(id)
            .ok_or(HsmError::UnknownState(id))?
            .observers
            .push((observer_id, Rc::new(observer)));
        self.next_observer += 1;
        Ok(observer_id)
    }

    /// Returns `false` if the observer was not subscribed on `id`.
    pub fn unsubscribe(&mut self, id: StateId, observer: ObserverId) -> bool {
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        let before = node.observers.len();
        node.observers.retain(|(oid, _)| *oid != observer);
        node.observers.len() != before
    }

    /// Call `callback` every time `id` is entered.
    pub fn call_on_enter<F>(&mut self, id: StateId, callback: F) -> Result<ObserverId, HsmError>
    where
        F: Fn() + 'static,
    {
        self.subscribe(id, move |event| {
            if event.notification == Notification::Entered {
                callback();
            }
        })
    }

    /// Call `callback` every time `id` exits.
    pub fn call_on_exit<F>(&mut self, id: StateId, callback: F) -> Result<ObserverId, HsmError>
    where
        F: Fn() + 'static,
    {
        self.subscribe(id, move |event| {
            if event.notification == Notification::Exited {
                callback();
            }
        })
    }

    /// Call `callback` with the tick delta every time `id` updates.
    pub fn call_on_update<F>(&mut self, id: StateId, callback: F) -> Result<ObserverId, HsmError>
    where
        F: Fn(f64) + 'static,
    {
        self.subscribe(id, move |event| {
            if let Notification::Updated { delta } = event.notification {
                callback(delta);
            }
        })
    }

    /// World root handed to actions through their execution context.
    pub fn world_root(&self) -> AgentRef {
        self.world_root.clone()
    }

    pub fn set_world_root(&mut self, root: AgentRef) {
        self.world_root = root;
    }

    pub fn lifecycle_log(&self) -> &LifecycleLog {
        &self.log
    }

    /// Drain the recorded lifecycle events.
    pub fn take_lifecycle_events(&mut self) -> Vec<LifecycleEvent> {
        self.log.drain()
    }

    pub(crate) fn node(&self, id: StateId) -> Option<&StateNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub(crate) fn node_mut(&mut self, id: StateId) -> Option<&mut StateNode> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    fn subtree(&self, id: StateId) -> Vec<StateId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.node(next) {
                out.push(next);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }
}

impl fmt::Debug for StateTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for id in self.state_ids() {
            if let Some(node) = self.node(id) {
                list.entry(&format_args!(
                    "{} {} (active: {}, parent: {:?})",
                    id, node.name, node.active, node.parent
                ));
            }
        }
        list.finish()
    }
}
