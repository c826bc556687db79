//! Builder for constructing state subtrees.

use crate::action::Action;
use crate::builder::error::{BuildError, BuildViolation};
use crate::core::{
    Guard, HandlerError, HsmError, LifecycleEvent, NoopBehavior, Notification, Payload,
    StateBehavior, StateId,
};
use crate::scope::DataPlan;
use crate::tree::{EventHandler, Observer, StateTree};
use std::collections::HashSet;
use std::rc::Rc;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Outcome of validating a state definition.
pub type BuildCheck = Validation<(), NonEmptyVec<BuildViolation>>;

/// Builder for a state and its children with a fluent API.
///
/// # Example
///
/// ```rust
/// use mindset_hsm::builder::StateBuilder;
/// use mindset_hsm::core::Payload;
/// use mindset_hsm::tree::StateTree;
///
/// let mut tree = StateTree::new();
/// let root = StateBuilder::new("Root")
///     .on_event("alarm", |_: &mut StateTree, _: &Payload| true)
///     .child(StateBuilder::new("Idle"))
///     .child(StateBuilder::new("Alert"))
///     .build(&mut tree)
///     .unwrap();
///
/// let idle = tree.find_child(root, "Idle").unwrap();
/// assert!(tree.dispatch(idle, "alarm", ()));
/// ```
pub struct StateBuilder {
    name: String,
    behavior: Option<Box<dyn StateBehavior>>,
    plan: Option<Rc<dyn DataPlan>>,
    guard: Option<Guard>,
    handlers: Vec<(String, EventHandler)>,
    on_enter_actions: Vec<Rc<dyn Action>>,
    on_exit_actions: Vec<Rc<dyn Action>>,
    observers: Vec<Observer>,
    children: Vec<StateBuilder>,
}

impl StateBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behavior: None,
            plan: None,
            guard: None,
            handlers: Vec::new(),
            on_enter_actions: Vec::new(),
            on_exit_actions: Vec::new(),
            observers: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn behavior<B: StateBehavior + 'static>(mut self, behavior: B) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }

    pub fn plan<P: DataPlan + 'static>(mut self, plan: P) -> Self {
        self.plan = Some(Rc::new(plan));
        self
    }

    /// Publish a guard for containers to consult.
    pub fn guard<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&StateTree, StateId) -> bool + 'static,
    {
        self.guard = Some(Guard::new(predicate));
        self
    }

    pub fn on_event<F>(mut self, event: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut StateTree, &Payload) -> bool + 'static,
    {
        let handler: EventHandler =
            Rc::new(move |tree: &mut StateTree, payload: &Payload| Ok(handler(tree, payload)));
        self.handlers.push((event.into(), handler));
        self
    }

    pub fn on_event_fallible<F>(mut self, event: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut StateTree, &Payload) -> Result<bool, HandlerError> + 'static,
    {
        self.handlers.push((event.into(), Rc::new(handler)));
        self
    }

    pub fn on_enter_action<A: Action + 'static>(mut self, action: A) -> Self {
        self.on_enter_actions.push(Rc::new(action));
        self
    }

    /// Store an exit action. Exit actions are kept for inspection only.
    pub fn on_exit_action<A: Action + 'static>(mut self, action: A) -> Self {
        self.on_exit_actions.push(Rc::new(action));
        self
    }

    pub fn call_on_enter<F: Fn() + 'static>(self, callback: F) -> Self {
        self.observe(move |event| {
            if event.notification == Notification::Entered {
                callback();
            }
        })
    }

    pub fn call_on_exit<F: Fn() + 'static>(self, callback: F) -> Self {
        self.observe(move |event| {
            if event.notification == Notification::Exited {
                callback();
            }
        })
    }

    pub fn call_on_update<F: Fn(f64) + 'static>(self, callback: F) -> Self {
        self.observe(move |event| {
            if let Notification::Updated { delta } = event.notification {
                callback(delta);
            }
        })
    }

    /// Observe every notification of the built state.
    pub fn observe<F: Fn(&LifecycleEvent) + 'static>(mut self, observer: F) -> Self {
        self.observers.push(Rc::new(observer));
        self
    }

    pub fn child(mut self, child: StateBuilder) -> Self {
        self.children.push(child);
        self
    }

    /// Check the whole definition, accumulating every problem.
    pub fn validate(&self) -> BuildCheck {
        let mut checks = Vec::new();
        self.collect_checks("", &mut checks);
        Validation::all_vec(checks).map(|_| ())
    }

    fn collect_checks(&self, parent_path: &str, checks: &mut Vec<BuildCheck>) {
        let path = if parent_path.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", parent_path, self.name)
        };

        if self.name.is_empty() {
            checks.push(Validation::fail(BuildViolation::EmptyStateName {
                path: path.clone(),
            }));
        }
        for (event, _) in &self.handlers {
            if event.is_empty() {
                checks.push(Validation::fail(BuildViolation::EmptyEventName {
                    path: path.clone(),
                }));
            }
        }

        let mut seen = HashSet::new();
        for child in &self.children {
            if !child.name.is_empty() && !seen.insert(child.name.as_str()) {
                checks.push(Validation::fail(BuildViolation::DuplicateChild {
                    path: path.clone(),
                    name: child.name.clone(),
                }));
            }
            child.collect_checks(&path, checks);
        }
    }

    /// Validate and insert as a new hierarchy root.
    pub fn build(self, tree: &mut StateTree) -> Result<StateId, BuildError> {
        self.ensure_valid()?;
        Ok(self.insert(tree, None)?)
    }

    /// Validate and insert as a child of `parent`.
    pub fn build_under(self, tree: &mut StateTree, parent: StateId) -> Result<StateId, BuildError> {
        if !tree.contains(parent) {
            return Err(HsmError::UnknownState(parent).into());
        }
        self.ensure_valid()?;
        Ok(self.insert(tree, Some(parent))?)
    }

    fn ensure_valid(&self) -> Result<(), BuildError> {
        match self.validate() {
            Validation::Success(_) => Ok(()),
            Validation::Failure(errors) => {
                Err(BuildError::Invalid(errors.iter().cloned().collect()))
            }
        }
    }

    fn insert(self, tree: &mut StateTree, parent: Option<StateId>) -> Result<StateId, HsmError> {
        let behavior = self
            .behavior
            .unwrap_or_else(|| Box::new(NoopBehavior));
        let id = tree.add_boxed_state(self.name, behavior);
        if let Some(parent) = parent {
            tree.attach(id, parent)?;
        }

        tree.set_data_plan(id, self.plan)?;
        tree.install_guard(id, self.guard)?;
        for (event, handler) in self.handlers {
            tree.install_handler(id, &event, handler)?;
        }
        tree.set_on_enter_actions(id, self.on_enter_actions)?;
        tree.set_on_exit_actions(id, self.on_exit_actions)?;
        for observer in self.observers {
            tree.subscribe(id, move |event| observer(event))?;
        }
        for child in self.children {
            child.insert(tree, Some(id))?;
        }
        Ok(id)
    }
}
