//! Event handlers and root-bound dispatch.
//!
//! Every state keeps a handler table, but only the table of the hierarchy
//! root is ever consulted: dispatching from any state in the tree resolves
//! the root first. This gives the whole hierarchy a single flat event
//! namespace.

use super::StateTree;
use crate::core::{DispatchError, HandlerError, HsmError, Payload, StateId};
use std::rc::Rc;
use tracing::{error, trace};

/// Registered event handler.
///
/// Handlers get mutable access to the tree so they can drive transitions.
/// `Ok(true)` means the event was handled.
pub type EventHandler = Rc<dyn Fn(&mut StateTree, &Payload) -> Result<bool, HandlerError>>;

impl StateTree {
    /// Register `handler` for `event` on `id`, replacing any previous one.
    pub fn add_event_handler<F>(
        &mut self,
        id: StateId,
        event: &str,
        handler: F,
    ) -> Result<(), HsmError>
    where
        F: Fn(&mut StateTree, &Payload) -> bool + 'static,
    {
        let handler: EventHandler =
            Rc::new(move |tree: &mut StateTree, payload: &Payload| Ok(handler(tree, payload)));
        self.install_handler(id, event, handler)
    }

    /// Register a handler that can fail. Failures are reported by
    /// [`dispatch`](Self::dispatch) and count as unhandled.
    pub fn add_fallible_event_handler<F>(
        &mut self,
        id: StateId,
        event: &str,
        handler: F,
    ) -> Result<(), HsmError>
    where
        F: Fn(&mut StateTree, &Payload) -> Result<bool, HandlerError> + 'static,
    {
        self.install_handler(id, event, Rc::new(handler))
    }

    pub(crate) fn install_handler(
        &mut self,
        id: StateId,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), HsmError> {
        if event.is_empty() {
            error!("Cannot register a handler for an empty event name");
            return Err(HsmError::EmptyEventName);
        }
        self.node_mut(id)
            .ok_or(HsmError::UnknownState(id))?
            .handlers
            .insert(event.to_string(), handler);
        Ok(())
    }

    pub fn remove_event_handler(&mut self, id: StateId, event: &str) -> bool {
        self.node_mut(id)
            .is_some_and(|n| n.handlers.remove(event).is_some())
    }

    pub fn has_event_handler(&self, id: StateId, event: &str) -> bool {
        self.node(id).is_some_and(|n| n.handlers.contains_key(event))
    }

    /// Per-instance event name a container can use to signal that `id` is
    /// done. Distinct for every state instance.
    pub fn event_finished(&self, id: StateId) -> Option<&str> {
        self.node(id).map(|n| n.event_finished.as_str())
    }

    /// Dispatch `event` to the handler table of the root of `from`.
    ///
    /// Returns whether a handler took the event. Errors are reported and
    /// count as unhandled.
    pub fn dispatch(&mut self, from: StateId, event: &str, payload: impl Into<Payload>) -> bool {
        match self.try_dispatch(from, event, payload) {
            Ok(handled) => handled,
            Err(err) => {
                error!("{}", err);
                false
            }
        }
    }

    /// Like [`dispatch`](Self::dispatch) but hands failures back.
    pub fn try_dispatch(
        &mut self,
        from: StateId,
        event: &str,
        payload: impl Into<Payload>,
    ) -> Result<bool, DispatchError> {
        if event.is_empty() {
            return Err(DispatchError::EmptyEventName);
        }
        let root = self.get_root(from).ok_or(DispatchError::UnknownState(from))?;
        let handler = self.node(root).and_then(|n| n.handlers.get(event).cloned());

        let Some(handler) = handler else {
            trace!("Event '{}' from {} has no handler at root {}", event, from, root);
            return Ok(false);
        };
        let payload: Payload = payload.into();
        handler(self, &payload).map_err(|source| DispatchError::HandlerFailed {
            event: event.to_string(),
            source,
        })
    }
}
