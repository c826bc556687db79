//! Scoped shared data.
//!
//! A [`Scope`] is a key/value store that can be linked to a parent. Lookups
//! that miss locally fall through the parent chain; writes always land in the
//! local store, so a child may shadow but never modify its ancestors' entries.
//!
//! Each state resolves its scope once, at initialization, into a
//! [`ScopeMode`]: either a store it owns (layered over the parent's) or the
//! parent's store itself (shared).

use crate::core::HsmError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

pub mod plan;

pub use plan::{DataPlan, PlanCheck, PlanViolation, PopulateContext, ScopePlan, VarSpec, VarType};

#[derive(Default)]
struct ScopeData {
    vars: BTreeMap<String, Value>,
    parent: Option<Scope>,
}

/// Shared handle to a key/value store.
///
/// Cloning the handle does not copy the data: every clone observes the same
/// store. Use [`Scope::same_store`] to compare identity.
#[derive(Clone, Default)]
pub struct Scope {
    inner: Rc<RefCell<ScopeData>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh store layered over `parent`.
    pub fn with_parent(parent: &Scope) -> Self {
        let scope = Self::new();
        scope.inner.borrow_mut().parent = Some(parent.clone());
        scope
    }

    pub fn parent(&self) -> Option<Scope> {
        self.inner.borrow().parent.clone()
    }

    /// Link (or unlink with `None`) the parent store.
    ///
    /// Returns `false` and leaves the link untouched if `parent` is this store
    /// or already falls back to it.
    pub fn set_parent(&self, parent: Option<&Scope>) -> bool {
        if let Some(parent) = parent {
            if parent.chain().any(|ancestor| ancestor.same_store(self)) {
                return false;
            }
        }
        self.inner.borrow_mut().parent = parent.cloned();
        true
    }

    /// This store followed by every ancestor store.
    pub fn chain(&self) -> impl Iterator<Item = Scope> {
        std::iter::successors(Some(self.clone()), Scope::parent)
    }

    /// Look up `key` here, then in each ancestor.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.chain()
            .find_map(|scope| scope.inner.borrow().vars.get(key).cloned())
    }

    /// Look up `key` and decode it.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    pub fn get_local(&self, key: &str) -> Option<Value> {
        self.inner.borrow().vars.get(key).cloned()
    }

    /// Write `key` into this store. Ancestors are never modified.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner.borrow_mut().vars.insert(key.into(), value.into());
    }

    pub fn has_var(&self, key: &str) -> bool {
        self.chain()
            .any(|scope| scope.inner.borrow().vars.contains_key(key))
    }

    pub fn has_local(&self, key: &str) -> bool {
        self.inner.borrow().vars.contains_key(key)
    }

    /// Remove a local entry, uncovering any ancestor value of the same key.
    pub fn erase(&self, key: &str) -> Option<Value> {
        self.inner.borrow_mut().vars.remove(key)
    }

    pub fn local_keys(&self) -> Vec<String> {
        self.inner.borrow().vars.keys().cloned().collect()
    }

    /// Copy of the local entries.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.inner.borrow().vars.clone()
    }

    pub fn same_store(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of stores in the chain above this one.
    pub fn depth(&self) -> usize {
        self.chain().count() - 1
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("vars", &self.inner.borrow().vars)
            .field("depth", &self.depth())
            .finish()
    }
}

/// How a state holds its scope.
#[derive(Clone, Debug)]
pub enum ScopeMode {
    /// A store of the state's own, possibly layered over an ancestor's.
    Owned(Scope),
    /// The parent's store, shared by reference.
    Shared(Scope),
}

impl ScopeMode {
    pub fn scope(&self) -> &Scope {
        match self {
            Self::Owned(scope) | Self::Shared(scope) => scope,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }

    /// Resolve the mode for a state being initialized under `external`.
    ///
    /// An owned store is kept (or created, if the state was previously
    /// sharing) and linked to `external`; otherwise `external` is shared.
    pub(crate) fn resolve(
        current: &ScopeMode,
        use_new_scope: bool,
        external: &Scope,
        name: &str,
    ) -> Result<ScopeMode, HsmError> {
        if !use_new_scope {
            return Ok(ScopeMode::Shared(external.clone()));
        }
        let own = match current {
            ScopeMode::Owned(scope) => scope.clone(),
            ScopeMode::Shared(_) => Scope::new(),
        };
        if !own.set_parent(Some(external)) {
            return Err(HsmError::ScopeCycle {
                name: name.to_string(),
            });
        }
        Ok(ScopeMode::Owned(own))
    }
}

impl Default for ScopeMode {
    fn default() -> Self {
        Self::Owned(Scope::new())
    }
}
