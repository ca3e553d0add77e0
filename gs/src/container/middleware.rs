//! Middleware pipeline wrapped around a store's dispatch

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::action::Action;
use crate::error::ContainerError;

use super::store::Store;

/// A step in a store's dispatch pipeline
///
/// Middlewares run outermost-first in the order given to [`Store::new`]. A
/// middleware continues the pipeline by calling [`Next::run`], optionally with a
/// different action, or short-circuits by returning without calling it.
pub trait Middleware: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    fn handle(&self, store: &Store, action: &Action, next: Next<'_>) -> Result<(), ContainerError>;
}

/// State produced by the reducer during one dispatch
pub(crate) type ReducedSlot = Mutex<Option<Value>>;

/// Remainder of the pipeline after the current middleware
pub struct Next<'a> {
    store: &'a Store,
    remaining: &'a [Arc<dyn Middleware>],
    reduced: &'a ReducedSlot,
}

impl<'a> Next<'a> {
    pub(crate) fn new(store: &'a Store, remaining: &'a [Arc<dyn Middleware>], reduced: &'a ReducedSlot) -> Self {
        Self {
            store,
            remaining,
            reduced,
        }
    }

    /// Pass the action to the next middleware, or to the reducer at the end
    pub fn run(self, action: &Action) -> Result<(), ContainerError> {
        match self.remaining.split_first() {
            Some((head, rest)) => head.handle(self.store, action, Next::new(self.store, rest, self.reduced)),
            None => self.store.apply(action, Some(self.reduced)),
        }
    }

    /// Like [`Next::run`], returning the state this action produced
    ///
    /// The state is captured before listeners run, so dispatches made from a
    /// listener do not show up in it. `None` when a later middleware stopped
    /// the action before the reducer.
    pub fn run_for_state(self, action: &Action) -> Result<Option<Value>, ContainerError> {
        let reduced = self.reduced;
        *reduced.lock() = None;
        self.run(action)?;
        Ok(reduced.lock().clone())
    }
}

type HandleFn = dyn Fn(&Store, &Action, Next<'_>) -> Result<(), ContainerError> + Send + Sync;

/// Closure-backed middleware, see [`middleware`]
pub struct FnMiddleware {
    name: String,
    handle: Box<HandleFn>,
}

impl Middleware for FnMiddleware {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, store: &Store, action: &Action, next: Next<'_>) -> Result<(), ContainerError> {
        (self.handle)(store, action, next)
    }
}

/// Build a middleware from a closure
pub fn middleware<F>(name: impl Into<String>, f: F) -> Arc<dyn Middleware>
where
    F: Fn(&Store, &Action, Next<'_>) -> Result<(), ContainerError> + Send + Sync + 'static,
{
    Arc::new(FnMiddleware {
        name: name.into(),
        handle: Box::new(f),
    })
}
