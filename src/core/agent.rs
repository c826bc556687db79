//! Non-owning handle to the entity a state controls.

use std::any::Any;
use std::fmt;
use std::rc::{Rc, Weak};

/// Weak reference to an agent.
///
/// States never own their agent. A detached handle, or one whose agent has
/// been dropped, counts as "no agent" and is rejected by
/// [`StateTree::initialize`](crate::tree::StateTree::initialize).
#[derive(Clone, Default)]
pub struct AgentRef(Option<Weak<dyn Any>>);

impl AgentRef {
    /// Borrow `agent` without taking ownership.
    pub fn new<T: Any>(agent: &Rc<T>) -> Self {
        let erased: Rc<dyn Any> = agent.clone();
        Self(Some(Rc::downgrade(&erased)))
    }

    /// Handle that points at nothing.
    pub fn detached() -> Self {
        Self(None)
    }

    /// True while the referenced agent is still alive.
    pub fn is_alive(&self) -> bool {
        self.0.as_ref().is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Upgrade to a strong, type-erased reference.
    pub fn upgrade(&self) -> Option<Rc<dyn Any>> {
        self.0.as_ref().and_then(Weak::upgrade)
    }

    /// Upgrade and downcast to the concrete agent type.
    pub fn downcast<T: Any>(&self) -> Option<Rc<T>> {
        self.upgrade()?.downcast::<T>().ok()
    }

    /// True if both handles point at the same live agent.
    pub fn same_agent(&self, other: &AgentRef) -> bool {
        match (self.upgrade(), other.upgrade()) {
            (Some(a), Some(b)) => Rc::ptr_eq(&a, &b),
            _ => false,
        }
    }
}

impl fmt::Debug for AgentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match &self.0 {
            None => "detached",
            Some(_) if self.is_alive() => "alive",
            Some(_) => "dropped",
        };
        f.debug_tuple("AgentRef").field(&status).finish()
    }
}
