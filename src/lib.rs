//! Mindset HSM: hierarchical state machine core
//!
//! States live in an arena-backed [`StateTree`] and are addressed by
//! [`StateId`]. A state can own a child list, run lifecycle hooks, carry a
//! data plan that seeds its variable scope, publish a guard and register
//! event handlers. Events raised anywhere in a hierarchy are routed to the
//! handler table of its root.
//!
//! # Core Concepts
//!
//! - **Hierarchy**: parent/child links with root discovery
//! - **Scopes**: variable stores that fall back to a parent scope on lookup
//! - **Lifecycle**: initialize, enter, update, exit and restart with observer notifications
//! - **Dispatch**: root-bound event handling with per-instance "finished" events
//!
//! # Example
//!
//! ```rust
//! use mindset_hsm::core::{AgentRef, Payload};
//! use mindset_hsm::scope::{Scope, ScopePlan, VarSpec, VarType};
//! use mindset_hsm::{StateBuilder, StateTree};
//! use std::rc::Rc;
//!
//! let mut tree = StateTree::new();
//! let root = StateBuilder::new("Npc")
//!     .plan(ScopePlan::new().with_var("hp", VarSpec::new(VarType::Int, 100)))
//!     .on_event("damage", |tree: &mut StateTree, payload: &Payload| {
//!         payload.as_i64().is_some() && tree.state_ids().count() > 0
//!     })
//!     .child(StateBuilder::new("Patrol"))
//!     .build(&mut tree)
//!     .unwrap();
//!
//! let npc = Rc::new("guard");
//! tree.initialize_subtree(root, AgentRef::new(&npc), &Scope::new()).unwrap();
//!
//! let patrol = tree.find_child(root, "Patrol").unwrap();
//! tree.enter(patrol).unwrap();
//! assert_eq!(tree.scope(patrol).unwrap().get_as::<i64>("hp"), Some(100));
//! assert!(tree.dispatch(patrol, "damage", 5));
//! ```

pub mod action;
pub mod builder;
pub mod config;
pub mod core;
pub mod scope;
pub mod tree;

// Re-export commonly used types
pub use action::{Action, ExecutionContext};
pub use builder::{BuildError, StateBuilder};
pub use config::TreeConfig;
pub use core::{AgentRef, HsmError, Payload, StateBehavior, StateContext, StateId};
pub use scope::{Scope, ScopeMode, ScopePlan};
pub use tree::{Parent, StateTree};
