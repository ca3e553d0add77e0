//! Default reducer-driven container

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::action::Action;
use crate::error::ContainerError;

use super::middleware::{Middleware, Next, ReducedSlot};
use super::{Container, ContainerListener, ListenerId, Reducer};

/// Reducer-driven state container
///
/// Dispatch runs the middleware pipeline, applies the reducer and then calls
/// every listener synchronously, in subscription order. No internal lock is
/// held while listeners run, so a listener may dispatch again.
pub struct Store {
    name: String,
    reducer: RwLock<Reducer>,
    state: RwLock<Value>,
    listeners: Mutex<Vec<(ListenerId, ContainerListener)>>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Store {
    /// Create a store; the reducer is run once to produce the initial state
    pub fn new(
        name: impl Into<String>,
        reducer: Reducer,
        middlewares: Vec<Arc<dyn Middleware>>,
    ) -> Result<Arc<Self>, ContainerError> {
        let name = name.into();
        debug!(%name, middlewares = middlewares.len(), "Store::new: called");

        let init = Action::init();
        let initial = reducer(&Value::Null, &init).map_err(|source| ContainerError::Reducer {
            action_type: init.action_type.clone(),
            source,
        })?;

        Ok(Arc::new(Self {
            name,
            reducer: RwLock::new(reducer),
            state: RwLock::new(initial),
            listeners: Mutex::new(Vec::new()),
            middlewares,
        }))
    }

    /// Number of attached listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Innermost pipeline step: reduce, store, notify
    ///
    /// The new state is written to `reduced` before listeners are called.
    pub(crate) fn apply(&self, action: &Action, reduced: Option<&ReducedSlot>) -> Result<(), ContainerError> {
        let reducer = self.reducer.read().clone();
        {
            let mut state = self.state.write();
            let next = reducer(&*state, action).map_err(|source| {
                warn!(store = %self.name, action_type = %action.action_type, error = %source, "Store::apply: reducer failed");
                ContainerError::Reducer {
                    action_type: action.action_type.clone(),
                    source,
                }
            })?;
            if let Some(slot) = reduced {
                *slot.lock() = Some(next.clone());
            }
            *state = next;
        }
        self.notify();
        Ok(())
    }

    fn notify(&self) {
        let listeners: Vec<ContainerListener> = self.listeners.lock().iter().map(|(_, l)| l.clone()).collect();
        debug!(store = %self.name, count = listeners.len(), "Store::notify: called");
        for listener in listeners {
            listener();
        }
    }
}

impl Container for Store {
    fn name(&self) -> &str {
        &self.name
    }

    fn dispatch(&self, action: &Action) -> Result<(), ContainerError> {
        debug!(store = %self.name, action_type = %action.action_type, "Store::dispatch: called");
        let reduced = ReducedSlot::new(None);
        Next::new(self, &self.middlewares, &reduced).run(action)
    }

    fn state(&self) -> Value {
        self.state.read().clone()
    }

    fn subscribe(&self, listener: ContainerListener) -> ListenerId {
        let id = Uuid::now_v7();
        debug!(store = %self.name, %id, "Store::subscribe: called");
        self.listeners.lock().push((id, listener));
        id
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        let removed = listeners.len() != before;
        debug!(store = %self.name, %id, removed, "Store::unsubscribe: called");
        removed
    }

    fn replace_reducer(&self, reducer: Reducer) -> Result<(), ContainerError> {
        debug!(store = %self.name, "Store::replace_reducer: called");
        *self.reducer.write() = reducer;
        self.apply(&Action::replace(), None)
    }
}
