//! Parent/child structure, root discovery and scope-plan resolution.

use super::StateTree;
use crate::core::{HsmError, StateId};
use crate::scope::DataPlan;
use std::rc::Rc;
use tracing::debug;

/// What a state hangs off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parent {
    /// Not attached to anything.
    Detached,
    /// Attached to something outside the hierarchy.
    Host,
    /// Child of another state.
    State(StateId),
}

impl StateTree {
    /// Make `child` a child of `parent`, detaching it from any previous parent.
    pub fn attach(&mut self, child: StateId, parent: StateId) -> Result<(), HsmError> {
        if !self.contains(child) {
            return Err(HsmError::UnknownState(child));
        }
        if !self.contains(parent) {
            return Err(HsmError::UnknownState(parent));
        }
        if child == parent || self.ancestors(parent).any(|a| a == child) {
            return Err(HsmError::HierarchyCycle { child, parent });
        }

        self.unlink_from_parent(child);
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = Parent::State(parent);
        }
        debug!("Attached state {} under {}", child, parent);
        Ok(())
    }

    /// Attach `id` to the outside world, making it a hierarchy root.
    pub fn attach_to_host(&mut self, id: StateId) -> Result<(), HsmError> {
        self.set_parent_link(id, Parent::Host)
    }

    pub fn detach(&mut self, id: StateId) -> Result<(), HsmError> {
        self.set_parent_link(id, Parent::Detached)
    }

    fn set_parent_link(&mut self, id: StateId, link: Parent) -> Result<(), HsmError> {
        if !self.contains(id) {
            return Err(HsmError::UnknownState(id));
        }
        self.unlink_from_parent(id);
        if let Some(node) = self.node_mut(id) {
            node.parent = link;
        }
        Ok(())
    }

    pub(crate) fn unlink_from_parent(&mut self, id: StateId) {
        let Some(Parent::State(parent)) = self.parent_link(id) else {
            return;
        };
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|c| *c != id);
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = Parent::Detached;
        }
    }

    pub fn parent_link(&self, id: StateId) -> Option<Parent> {
        self.node(id).map(|n| n.parent)
    }

    /// Structural parent, if it is a live state.
    pub fn parent(&self, id: StateId) -> Option<StateId> {
        match self.parent_link(id)? {
            Parent::State(parent) if self.contains(parent) => Some(parent),
            _ => None,
        }
    }

    pub fn children(&self, id: StateId) -> &[StateId] {
        self.node(id)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    pub fn find_child(&self, parent: StateId, name: &str) -> Option<StateId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|c| self.name(*c) == Some(name))
    }

    /// Ancestor states of `id`, nearest first. The walk stops at the first
    /// parent that is not a live state.
    pub fn ancestors(&self, id: StateId) -> impl Iterator<Item = StateId> + '_ {
        std::iter::successors(self.parent(id), move |current| self.parent(*current))
    }

    /// True iff the structural parent is absent or not a state.
    pub fn is_root(&self, id: StateId) -> bool {
        self.parent(id).is_none()
    }

    /// Topmost state reachable through state parents; `id` itself if it is a
    /// root. `None` only if `id` is unknown.
    pub fn get_root(&self, id: StateId) -> Option<StateId> {
        if !self.contains(id) {
            return None;
        }
        Some(self.ancestors(id).last().unwrap_or(id))
    }

    /// Whether `id` gets a scope of its own on initialization.
    ///
    /// True when the state carries a data plan, is a root, or its behavior
    /// asks for one.
    pub fn should_use_new_scope(&self, id: StateId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        node.plan.is_some()
            || self.is_root(id)
            || node
                .behavior
                .as_ref()
                .is_some_and(|behavior| behavior.uses_new_scope())
    }

    /// Nearest ancestor's non-empty data plan.
    pub fn resolve_parent_scope_plan(&self, id: StateId) -> Option<Rc<dyn DataPlan>> {
        self.ancestors(id).find_map(|ancestor| {
            self.node(ancestor)
                .and_then(|n| n.plan.clone())
                .filter(|plan| !plan.is_empty())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StateBehavior;
    use crate::scope::{ScopePlan, VarSpec, VarType};

    fn chain(tree: &mut StateTree, names: &[&str]) -> Vec<StateId> {
        let ids: Vec<StateId> = names.iter().map(|n| tree.add_state(*n)).collect();
        for pair in ids.windows(2) {
            tree.attach(pair[1], pair[0]).unwrap();
        }
        ids
    }

    #[test]
    fn get_root_walks_to_top() {
        let mut tree = StateTree::new();
        let ids = chain(&mut tree, &["Root", "Combat", "Melee", "Swing"]);

        for id in &ids {
            assert_eq!(tree.get_root(*id), Some(ids[0]));
        }
        assert!(tree.is_root(ids[0]));
        assert!(!tree.is_root(ids[3]));
        assert_eq!(tree.ancestors(ids[3]).collect::<Vec<_>>(), vec![ids[2], ids[1], ids[0]]);
    }

    #[test]
    fn host_parent_makes_a_root() {
        let mut tree = StateTree::new();
        let ids = chain(&mut tree, &["Root", "Child"]);

        tree.attach_to_host(ids[1]).unwrap();

        assert!(tree.is_root(ids[1]));
        assert_eq!(tree.parent_link(ids[1]), Some(Parent::Host));
        assert!(tree.children(ids[0]).is_empty());
    }

    #[test]
    fn walk_stops_at_removed_parent() {
        let mut tree = StateTree::new();
        let ids = chain(&mut tree, &["Root", "Child"]);
        tree.node_mut(ids[1]).unwrap().parent = Parent::State(StateId(99));

        assert!(tree.is_root(ids[1]));
        assert_eq!(tree.get_root(ids[1]), Some(ids[1]));
    }

    #[test]
    fn attach_rejects_cycles() {
        let mut tree = StateTree::new();
        let ids = chain(&mut tree, &["A", "B", "C"]);

        assert_eq!(
            tree.attach(ids[0], ids[2]),
            Err(HsmError::HierarchyCycle {
                child: ids[0],
                parent: ids[2]
            })
        );
        assert!(tree.attach(ids[1], ids[1]).is_err());
        assert!(tree.is_root(ids[0]));
    }

    #[test]
    fn reattach_moves_child() {
        let mut tree = StateTree::new();
        let a = tree.add_state("A");
        let b = tree.add_state("B");
        let c = tree.add_state("C");
        tree.attach(c, a).unwrap();

        tree.attach(c, b).unwrap();

        assert!(tree.children(a).is_empty());
        assert_eq!(tree.children(b), &[c]);
        assert_eq!(tree.find_child(b, "C"), Some(c));
        assert_eq!(tree.find_child(a, "C"), None);
    }

    #[test]
    fn new_scope_for_root_or_plan() {
        struct Composite;
        impl StateBehavior for Composite {
            fn uses_new_scope(&self) -> bool {
                true
            }
        }

        let mut tree = StateTree::new();
        let root = tree.add_state("Root");
        let leaf = tree.add_state("Leaf");
        let planned = tree.add_state("Planned");
        let composite = tree.add_state_with("Composite", Composite);
        for id in [leaf, planned, composite] {
            tree.attach(id, root).unwrap();
        }
        tree.set_data_plan(planned, Some(Rc::new(ScopePlan::new())))
            .unwrap();

        assert!(tree.should_use_new_scope(root));
        assert!(!tree.should_use_new_scope(leaf));
        assert!(tree.should_use_new_scope(planned));
        assert!(tree.should_use_new_scope(composite));
    }

    #[test]
    fn parent_scope_plan_skips_empty_plans() {
        let mut tree = StateTree::new();
        let ids = chain(&mut tree, &["Root", "Mid", "Leaf"]);
        let root_plan = ScopePlan::new().with_var("hp", VarSpec::new(VarType::Int, 100));
        tree.set_data_plan(ids[0], Some(Rc::new(root_plan))).unwrap();
        tree.set_data_plan(ids[1], Some(Rc::new(ScopePlan::new())))
            .unwrap();

        let resolved = tree.resolve_parent_scope_plan(ids[2]).unwrap();
        assert!(!resolved.is_empty());
        assert!(tree.resolve_parent_scope_plan(ids[0]).is_none());
    }

    #[test]
    fn parent_scope_plan_ignores_own_plan() {
        let mut tree = StateTree::new();
        let ids = chain(&mut tree, &["Root", "Leaf"]);
        let plan = ScopePlan::new().with_var("x", VarSpec::typed(VarType::Int));
        tree.set_data_plan(ids[1], Some(Rc::new(plan))).unwrap();

        assert!(tree.resolve_parent_scope_plan(ids[1]).is_none());
    }
}
