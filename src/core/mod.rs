//! Core building blocks of the state tree.
//!
//! This module contains the value types the tree is made of:
//! - Stable state ids and non-owning agent handles
//! - Event payloads and guard predicates
//! - The overridable `StateBehavior` hooks
//! - Lifecycle notifications and their journal
//! - Error types

mod agent;
mod behavior;
mod error;
mod guard;
mod id;
mod notification;
mod payload;

pub use agent::AgentRef;
pub use behavior::{NoopBehavior, StateBehavior, StateContext};
pub use error::{DispatchError, HandlerError, HsmError};
pub use guard::Guard;
pub use id::StateId;
pub use notification::{LifecycleEvent, LifecycleLog, Notification};
pub use payload::Payload;
