//! State containers
//!
//! The coordinator never looks inside a container: it dispatches actions,
//! reads state and attaches change listeners through the [`Container`] trait.
//! [`Store`] is the default reducer-driven implementation used by
//! `Coordinator::create_store`; tenants that bring their own engine implement
//! the trait and use `Coordinator::register_store`.

mod middleware;
mod store;

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::action::Action;
use crate::error::ContainerError;

pub use middleware::{FnMiddleware, Middleware, Next, middleware};
pub use store::Store;

/// Boxed error produced by user code (reducers, middleware)
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Pure state transition: `(current state, action) -> next state`
///
/// On store creation the reducer is called with `Value::Null` to produce the
/// initial state.
pub type Reducer = Arc<dyn Fn(&Value, &Action) -> Result<Value, BoxError> + Send + Sync>;

/// Change notification attached to a container
pub type ContainerListener = Arc<dyn Fn() + Send + Sync>;

/// Identifier of a listener attached to a container
pub type ListenerId = Uuid;

/// Opaque per-tenant state container
pub trait Container: Send + Sync {
    /// Name of the owning tenant
    fn name(&self) -> &str;

    /// Apply an action; listeners are notified before this returns
    fn dispatch(&self, action: &Action) -> Result<(), ContainerError>;

    /// Deep copy of the current state
    fn state(&self) -> Value;

    /// Attach a change listener
    fn subscribe(&self, listener: ContainerListener) -> ListenerId;

    /// Detach a listener; unknown ids are ignored and return `false`
    fn unsubscribe(&self, id: ListenerId) -> bool;

    /// Swap the reducer in place, keeping listeners attached
    fn replace_reducer(&self, reducer: Reducer) -> Result<(), ContainerError>;
}

impl std::fmt::Debug for dyn Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container").field("name", &self.name()).finish_non_exhaustive()
    }
}

/// Wrap a closure as a [`Reducer`]
pub fn reducer<F>(f: F) -> Reducer
where
    F: Fn(&Value, &Action) -> Result<Value, BoxError> + Send + Sync + 'static,
{
    Arc::new(f)
}
