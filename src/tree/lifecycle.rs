//! Initialization and the enter/exit/update protocol.

use super::StateTree;
use crate::action::{Action, ExecutionContext};
use crate::core::{
    AgentRef, HsmError, LifecycleEvent, Notification, StateBehavior, StateContext, StateId,
};
use crate::scope::{PopulateContext, Scope, ScopeMode};
use chrono::Utc;
use std::rc::Rc;
use tracing::{debug, error, trace};

impl StateTree {
    /// Bind `id` to its agent and resolve its scope under `external`.
    ///
    /// A state that should use a new scope keeps its own store and links
    /// `external` as the fallback parent; any other state shares `external`
    /// directly. A non-empty data plan then fills the resolved store without
    /// overwriting values already present, and the `setup` hook runs.
    pub fn initialize(
        &mut self,
        id: StateId,
        agent: AgentRef,
        external: &Scope,
    ) -> Result<(), HsmError> {
        let use_new_scope = self.should_use_new_scope(id);
        let node = self.node_mut(id).ok_or(HsmError::UnknownState(id))?;

        if !agent.is_alive() {
            error!("Cannot initialize state '{}' without a live agent", node.name);
            return Err(HsmError::NullAgent {
                name: node.name.clone(),
            });
        }
        if node.initialized {
            debug!("State '{}' initialized again", node.name);
        }

        node.scope = ScopeMode::resolve(&node.scope, use_new_scope, external, &node.name)
            .inspect_err(|err| error!("{}", err))?;
        node.agent = agent;
        node.initialized = true;

        let scope = node.scope.scope().clone();
        let plan = node.plan.clone().filter(|plan| !plan.is_empty());
        let prefetch_root = node
            .behavior
            .as_ref()
            .map_or(id, |behavior| behavior.prefetch_root(id));

        if let Some(plan) = plan {
            let owner_name = node.name.clone();
            let ctx = PopulateContext {
                owner: id,
                owner_name: &owner_name,
                prefetch_root,
            };
            // Values set from code before initialization win over plan defaults.
            plan.populate(&scope, false, &ctx);
        }

        debug!(
            "Initialized state {} ({} scope)",
            id,
            if use_new_scope { "own" } else { "shared" }
        );
        self.setup(id);
        Ok(())
    }

    /// Initialize `root`, then every descendant with its parent's resolved
    /// scope, parents before children.
    pub fn initialize_subtree(
        &mut self,
        root: StateId,
        agent: AgentRef,
        external: &Scope,
    ) -> Result<(), HsmError> {
        self.initialize(root, agent.clone(), external)?;
        let scope = self.scope(root).ok_or(HsmError::UnknownState(root))?;
        for child in self.children(root).to_vec() {
            self.initialize_subtree(child, agent.clone(), &scope)?;
        }
        Ok(())
    }

    /// Activate `id`.
    ///
    /// The state is marked active before the hook and enter actions run, so
    /// anything they trigger observes it as active. Entering an active state
    /// does nothing.
    pub fn enter(&mut self, id: StateId) -> Result<(), HsmError> {
        let node = self.node_mut(id).ok_or(HsmError::UnknownState(id))?;
        if node.active {
            debug!("State '{}' is already active", node.name);
            return Ok(());
        }
        node.active = true;
        debug!("Entering state '{}'", node.name);

        self.run_hook(id, Hook::Enter);
        for action in self.on_enter_actions(id).to_vec() {
            trace!("Executing action '{}' for state {}", action.name(), id);
            action.execute(&mut ExecutionContext::new(self, id));
        }
        self.emit(id, Notification::Entered);
        Ok(())
    }

    /// Deactivate `id`, reverting its revertible enter actions in list order.
    ///
    /// Exiting an inactive state does nothing.
    pub fn exit(&mut self, id: StateId) -> Result<(), HsmError> {
        let node = self.node(id).ok_or(HsmError::UnknownState(id))?;
        if !node.active {
            return Ok(());
        }
        debug!("Exiting state '{}'", node.name);

        self.run_hook(id, Hook::Exit);
        let revertible: Vec<Rc<dyn Action>> = self
            .on_enter_actions(id)
            .iter()
            .filter(|action| action.is_revertible())
            .cloned()
            .collect();
        for action in revertible {
            trace!("Reverting action '{}' for state {}", action.name(), id);
            action.revert(&mut ExecutionContext::new(self, id));
        }
        self.emit(id, Notification::Exited);

        if let Some(node) = self.node_mut(id) {
            node.active = false;
        }
        Ok(())
    }

    /// Run one tick. `delta` is whatever the caller measured.
    pub fn update(&mut self, id: StateId, delta: f64) -> Result<(), HsmError> {
        if !self.contains(id) {
            return Err(HsmError::UnknownState(id));
        }
        trace!("Updating state {} (delta {})", id, delta);
        self.run_hook(id, Hook::Update(delta));
        self.emit(id, Notification::Updated { delta });
        Ok(())
    }

    /// Exit and re-enter an active state.
    pub fn restart(&mut self, id: StateId) -> Result<(), HsmError> {
        let node = self.node(id).ok_or(HsmError::UnknownState(id))?;
        if !node.active {
            let err = HsmError::RestartInactive {
                name: node.name.clone(),
            };
            error!("{}", err);
            return Err(err);
        }
        self.exit(id)?;
        self.enter(id)
    }

    fn setup(&mut self, id: StateId) {
        self.run_hook(id, Hook::Setup);
        self.emit(id, Notification::Setup);
    }

    /// Run a behavior hook with the behavior temporarily taken out of its
    /// node.
    ///
    /// A hook requested for the same state while one of its hooks is running
    /// is queued on the node and runs, in request order, as soon as the
    /// running hook returns.
    fn run_hook(&mut self, id: StateId, hook: Hook) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        let Some(mut behavior) = node.behavior.take() else {
            trace!("Deferring {:?} hook of state {}", hook, id);
            node.pending_hooks.push_back(hook);
            return;
        };

        hook.call(behavior.as_mut(), &mut StateContext::new(self, id));
        while let Some(next) = self
            .node_mut(id)
            .and_then(|node| node.pending_hooks.pop_front())
        {
            next.call(behavior.as_mut(), &mut StateContext::new(self, id));
        }

        if let Some(node) = self.node_mut(id) {
            if node.behavior.is_none() {
                node.behavior = Some(behavior);
            }
        }
    }

    fn emit(&mut self, id: StateId, notification: Notification) {
        let Some(node) = self.node(id) else {
            return;
        };
        let event = LifecycleEvent {
            state: id,
            name: node.name.clone(),
            notification,
            timestamp: Utc::now(),
        };
        let observers: Vec<_> = node.observers.iter().map(|(_, o)| o.clone()).collect();

        for observer in observers {
            observer(&event);
        }
        if self.config.record_lifecycle {
            self.log.record(event);
        }
    }
}

/// A behavior hook waiting to run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) enum Hook {
    Setup,
    Enter,
    Exit,
    Update(f64),
}

impl Hook {
    fn call(self, behavior: &mut dyn StateBehavior, ctx: &mut StateContext<'_>) {
        match self {
            Self::Setup => behavior.setup(ctx),
            Self::Enter => behavior.enter(ctx),
            Self::Exit => behavior.exit(ctx),
            Self::Update(delta) => behavior.update(ctx, delta),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Payload;
    use crate::scope::{DataPlan, ScopePlan, VarSpec, VarType};
    use serde_json::json;
    use std::cell::RefCell;

    type Journal = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        label: &'static str,
        revertible: bool,
        journal: Journal,
    }

    impl Action for Recorder {
        fn execute(&self, _ctx: &mut ExecutionContext<'_>) {
            self.journal
                .borrow_mut()
                .push(format!("execute {}", self.label));
        }

        fn revert(&self, _ctx: &mut ExecutionContext<'_>) {
            self.journal
                .borrow_mut()
                .push(format!("revert {}", self.label));
        }

        fn is_revertible(&self) -> bool {
            self.revertible
        }
    }

    struct Hooks {
        journal: Journal,
    }

    impl StateBehavior for Hooks {
        fn setup(&mut self, _ctx: &mut StateContext<'_>) {
            self.journal.borrow_mut().push("setup".to_string());
        }

        fn enter(&mut self, ctx: &mut StateContext<'_>) {
            let active = ctx.tree().is_active(ctx.state());
            self.journal.borrow_mut().push(format!("enter active={}", active));
        }

        fn exit(&mut self, _ctx: &mut StateContext<'_>) {
            self.journal.borrow_mut().push("exit".to_string());
        }

        fn update(&mut self, _ctx: &mut StateContext<'_>, delta: f64) {
            self.journal.borrow_mut().push(format!("update {}", delta));
        }
    }

    fn agent() -> Rc<String> {
        Rc::new("agent".to_string())
    }

    fn recorder(label: &'static str, revertible: bool, journal: &Journal) -> Rc<dyn Action> {
        Rc::new(Recorder {
            label,
            revertible,
            journal: journal.clone(),
        })
    }

    #[test]
    fn initialize_rejects_missing_agent() {
        let mut tree = StateTree::new();
        let id = tree.add_state("Idle");

        let err = tree
            .initialize(id, AgentRef::detached(), &Scope::new())
            .unwrap_err();

        assert_eq!(
            err,
            HsmError::NullAgent {
                name: "Idle".to_string()
            }
        );
        assert!(!tree.is_initialized(id));
    }

    #[test]
    fn initialize_rejects_dropped_agent() {
        let mut tree = StateTree::new();
        let id = tree.add_state("Idle");
        let npc = agent();
        let handle = AgentRef::new(&npc);
        drop(npc);

        assert!(tree.initialize(id, handle, &Scope::new()).is_err());
    }

    #[test]
    fn root_layers_scope_over_external() {
        let mut tree = StateTree::new();
        let root = tree.add_state("Root");
        let npc = agent();
        let external = Scope::new();
        external.set("team", "red");

        tree.initialize(root, AgentRef::new(&npc), &external).unwrap();

        let scope = tree.scope(root).unwrap();
        assert!(tree.scope_mode(root).unwrap().is_owned());
        assert!(!scope.same_store(&external));
        assert_eq!(scope.get("team"), Some(json!("red")));
        assert!(tree.agent(root).unwrap().same_agent(&AgentRef::new(&npc)));
    }

    #[test]
    fn leaf_shares_parent_scope() {
        let mut tree = StateTree::new();
        let root = tree.add_state("Root");
        let leaf = tree.add_state("Leaf");
        tree.attach(leaf, root).unwrap();
        let npc = agent();

        tree.initialize_subtree(root, AgentRef::new(&npc), &Scope::new())
            .unwrap();

        let root_scope = tree.scope(root).unwrap();
        let leaf_scope = tree.scope(leaf).unwrap();
        assert!(leaf_scope.same_store(&root_scope));

        leaf_scope.set("alert", true);
        assert_eq!(root_scope.get("alert"), Some(json!(true)));
    }

    #[test]
    fn plan_does_not_overwrite_code_values() {
        let mut tree = StateTree::new();
        let root = tree.add_state("Root");
        let plan = ScopePlan::new()
            .with_var("hp", VarSpec::new(VarType::Int, 100))
            .with_var("speed", VarSpec::new(VarType::Float, 2.0));
        tree.set_data_plan(root, Some(Rc::new(plan))).unwrap();
        tree.scope(root).unwrap().set("hp", 40);
        let npc = agent();

        tree.initialize(root, AgentRef::new(&npc), &Scope::new())
            .unwrap();

        let scope = tree.scope(root).unwrap();
        assert_eq!(scope.get("hp"), Some(json!(40)));
        assert_eq!(scope.get("speed"), Some(json!(2.0)));
    }

    #[test]
    fn plan_sees_owner_and_prefetch_root() {
        struct Probe {
            seen: Rc<RefCell<Option<(StateId, String, StateId)>>>,
        }

        impl DataPlan for Probe {
            fn is_empty(&self) -> bool {
                false
            }

            fn populate(&self, _scope: &Scope, overwrite: bool, ctx: &PopulateContext<'_>) {
                assert!(!overwrite);
                *self.seen.borrow_mut() =
                    Some((ctx.owner, ctx.owner_name.to_string(), ctx.prefetch_root));
            }
        }

        let seen = Rc::new(RefCell::new(None));
        let mut tree = StateTree::new();
        let root = tree.add_state("Root");
        tree.set_data_plan(root, Some(Rc::new(Probe { seen: seen.clone() })))
            .unwrap();
        let npc = agent();

        tree.initialize(root, AgentRef::new(&npc), &Scope::new())
            .unwrap();

        assert_eq!(*seen.borrow(), Some((root, "Root".to_string(), root)));
    }

    #[test]
    fn setup_runs_hook_then_notification() {
        let journal = Journal::default();
        let mut tree = StateTree::new();
        let id = tree.add_state_with(
            "Idle",
            Hooks {
                journal: journal.clone(),
            },
        );
        let sink = journal.clone();
        tree.subscribe(id, move |event| {
            sink.borrow_mut()
                .push(format!("notify {}", event.notification.kind()))
        })
        .unwrap();
        let npc = agent();

        tree.initialize(id, AgentRef::new(&npc), &Scope::new())
            .unwrap();

        assert_eq!(*journal.borrow(), vec!["setup", "notify setup"]);
    }

    #[test]
    fn enter_marks_active_before_hook() {
        let journal = Journal::default();
        let mut tree = StateTree::new();
        let id = tree.add_state_with(
            "Idle",
            Hooks {
                journal: journal.clone(),
            },
        );

        tree.enter(id).unwrap();

        assert!(tree.is_active(id));
        assert_eq!(*journal.borrow(), vec!["enter active=true"]);
    }

    #[test]
    fn exit_reverts_only_revertible_actions_in_order() {
        let journal = Journal::default();
        let mut tree = StateTree::new();
        let id = tree.add_state("Idle");
        tree.set_on_enter_actions(
            id,
            vec![
                recorder("a", true, &journal),
                recorder("b", false, &journal),
                recorder("c", true, &journal),
            ],
        )
        .unwrap();

        tree.enter(id).unwrap();
        tree.exit(id).unwrap();

        assert_eq!(
            *journal.borrow(),
            vec![
                "execute a",
                "execute b",
                "execute c",
                "revert a",
                "revert c"
            ]
        );
        assert!(!tree.is_active(id));
    }

    #[test]
    fn exit_while_inactive_is_silent() {
        let journal = Journal::default();
        let mut tree = StateTree::new();
        let id = tree.add_state_with(
            "Idle",
            Hooks {
                journal: journal.clone(),
            },
        );
        tree.add_on_enter_action(id, recorder("a", true, &journal))
            .unwrap();
        let sink = journal.clone();
        tree.subscribe(id, move |_| sink.borrow_mut().push("notify".to_string()))
            .unwrap();

        tree.exit(id).unwrap();
        tree.exit(id).unwrap();

        assert!(journal.borrow().is_empty());
    }

    #[test]
    fn exit_hook_runs_while_still_active() {
        let mut tree = StateTree::new();
        let id = tree.add_state("Idle");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        tree.call_on_exit(id, move || sink.borrow_mut().push("exited"))
            .unwrap();

        tree.enter(id).unwrap();
        tree.exit(id).unwrap();

        assert_eq!(*seen.borrow(), vec!["exited"]);
    }

    #[test]
    fn double_enter_runs_once() {
        let journal = Journal::default();
        let mut tree = StateTree::new();
        let id = tree.add_state("Idle");
        tree.add_on_enter_action(id, recorder("a", false, &journal))
            .unwrap();

        tree.enter(id).unwrap();
        tree.enter(id).unwrap();

        assert_eq!(*journal.borrow(), vec!["execute a"]);
    }

    #[test]
    fn update_runs_hook_and_notifies_delta() {
        let journal = Journal::default();
        let mut tree = StateTree::new();
        let id = tree.add_state_with(
            "Idle",
            Hooks {
                journal: journal.clone(),
            },
        );
        let deltas = Rc::new(RefCell::new(Vec::new()));
        let sink = deltas.clone();
        tree.call_on_update(id, move |delta| sink.borrow_mut().push(delta))
            .unwrap();

        tree.update(id, 0.25).unwrap();

        assert_eq!(*journal.borrow(), vec!["update 0.25"]);
        assert_eq!(*deltas.borrow(), vec![0.25]);
    }

    #[test]
    fn restart_requires_active_state() {
        let journal = Journal::default();
        let mut tree = StateTree::new();
        let id = tree.add_state("Idle");
        tree.add_on_enter_action(id, recorder("a", true, &journal))
            .unwrap();

        let err = tree.restart(id).unwrap_err();
        assert_eq!(
            err,
            HsmError::RestartInactive {
                name: "Idle".to_string()
            }
        );
        assert!(!tree.is_active(id));
        assert!(journal.borrow().is_empty());

        tree.enter(id).unwrap();
        tree.restart(id).unwrap();

        assert!(tree.is_active(id));
        assert_eq!(*journal.borrow(), vec!["execute a", "revert a", "execute a"]);
    }

    #[test]
    fn hook_can_drive_sibling_reentrantly() {
        struct Handoff {
            next: StateId,
        }

        impl StateBehavior for Handoff {
            fn enter(&mut self, ctx: &mut StateContext<'_>) {
                let me = ctx.state();
                let next = self.next;
                let tree = ctx.tree_mut();
                tree.exit(me).unwrap();
                tree.enter(next).unwrap();
            }
        }

        let mut tree = StateTree::new();
        let root = tree.add_state("Root");
        let b = tree.add_state("B");
        let a = tree.add_state_with("A", Handoff { next: b });
        tree.attach(a, root).unwrap();
        tree.attach(b, root).unwrap();

        tree.enter(a).unwrap();

        assert!(tree.is_active(b));
        assert!(!tree.is_active(a));
    }

    #[test]
    fn exit_requested_from_enter_hook_still_runs_exit_hook() {
        struct LeavesAtOnce {
            journal: Journal,
        }

        impl StateBehavior for LeavesAtOnce {
            fn enter(&mut self, ctx: &mut StateContext<'_>) {
                self.journal.borrow_mut().push("enter".to_string());
                let me = ctx.state();
                ctx.tree_mut().exit(me).unwrap();
                self.journal.borrow_mut().push("enter done".to_string());
            }

            fn exit(&mut self, _ctx: &mut StateContext<'_>) {
                self.journal.borrow_mut().push("exit".to_string());
            }
        }

        let journal: Journal = Rc::new(RefCell::new(Vec::new()));
        let mut tree = StateTree::new();
        let id = tree.add_state_with(
            "Flash",
            LeavesAtOnce {
                journal: journal.clone(),
            },
        );

        tree.enter(id).unwrap();

        assert!(!tree.is_active(id));
        assert_eq!(*journal.borrow(), vec!["enter", "enter done", "exit"]);

        // The behavior is back in place for the next activation.
        tree.enter(id).unwrap();
        assert_eq!(journal.borrow().len(), 6);
    }

    #[test]
    fn exit_requested_through_finished_event_runs_exit_hook() {
        struct Finisher {
            journal: Journal,
        }

        impl StateBehavior for Finisher {
            fn enter(&mut self, ctx: &mut StateContext<'_>) {
                let finished = ctx.event_finished();
                ctx.dispatch(&finished, ());
            }

            fn exit(&mut self, _ctx: &mut StateContext<'_>) {
                self.journal.borrow_mut().push("exit".to_string());
            }

            fn update(&mut self, _ctx: &mut StateContext<'_>, delta: f64) {
                self.journal.borrow_mut().push(format!("update {}", delta));
            }
        }

        let journal: Journal = Rc::new(RefCell::new(Vec::new()));
        let mut tree = StateTree::new();
        let root = tree.add_state("Root");
        let child = tree.add_state_with(
            "Child",
            Finisher {
                journal: journal.clone(),
            },
        );
        tree.attach(child, root).unwrap();
        let finished = tree.event_finished(child).unwrap().to_string();
        tree.add_event_handler(root, &finished, move |tree: &mut StateTree, _: &Payload| {
            tree.update(child, 0.25).is_ok() && tree.exit(child).is_ok()
        })
        .unwrap();

        tree.enter(child).unwrap();

        assert!(!tree.is_active(child));
        assert_eq!(*journal.borrow(), vec!["update 0.25", "exit"]);
    }

    #[test]
    fn lifecycle_log_records_when_enabled() {
        let mut tree = StateTree::with_config(crate::config::TreeConfig::default().recording());
        let id = tree.add_state("Idle");

        tree.enter(id).unwrap();
        tree.update(id, 0.5).unwrap();
        tree.exit(id).unwrap();

        let kinds: Vec<_> = tree
            .take_lifecycle_events()
            .iter()
            .map(|e| e.notification.kind())
            .collect();
        assert_eq!(kinds, vec!["entered", "updated", "exited"]);
        assert!(tree.lifecycle_log().is_empty());
    }

    #[test]
    fn lifecycle_log_off_by_default() {
        let mut tree = StateTree::new();
        let id = tree.add_state("Idle");
        tree.enter(id).unwrap();

        assert!(tree.lifecycle_log().is_empty());
    }

    #[test]
    fn actions_see_world_root() {
        struct NeedsWorld {
            found: Rc<RefCell<bool>>,
        }

        impl Action for NeedsWorld {
            fn execute(&self, ctx: &mut ExecutionContext<'_>) {
                *self.found.borrow_mut() = ctx.world_root().downcast::<String>().is_some();
            }
        }

        let found = Rc::new(RefCell::new(false));
        let world = Rc::new("level-1".to_string());
        let mut tree = StateTree::new();
        tree.set_world_root(AgentRef::new(&world));
        let id = tree.add_state("Idle");
        tree.add_on_enter_action(
            id,
            Rc::new(NeedsWorld {
                found: found.clone(),
            }),
        )
        .unwrap();

        tree.enter(id).unwrap();

        assert!(*found.borrow());
    }
}
