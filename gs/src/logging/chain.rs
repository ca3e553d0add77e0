//! Logger chain with cycle-safe append

use std::collections::HashSet;
use std::error::Error;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{CoordinatorError, CoordinatorResult};

/// A link in the logging chain
pub trait LogHandler: Send + Sync {
    /// Identity used to detect a handler appearing twice in the chain
    fn identity(&self) -> &str;

    fn process_event(&self, source: &str, event_name: &str, properties: &Value);

    fn process_exception(&self, source: &str, error: &(dyn Error + 'static), properties: &Value);

    /// `false` marks a terminal sink: records stop here
    fn forwards(&self) -> bool {
        true
    }
}

/// Ordered sequence of log handlers
///
/// Membership is checked on every append so that forwarding can never loop.
#[derive(Default)]
pub struct LoggerChain {
    handlers: Vec<Arc<dyn LogHandler>>,
    identities: HashSet<String>,
}

impl LoggerChain {
    /// Chain with a single head handler
    pub fn new(head: Arc<dyn LogHandler>) -> Self {
        let mut chain = Self::default();
        chain.identities.insert(head.identity().to_string());
        chain.handlers.push(head);
        chain
    }

    /// Append a handler at the tail of the chain
    ///
    /// Fails with [`CoordinatorError::LoggerCycle`] when the handler, or another
    /// handler with the same identity, is already linked; the chain is then left
    /// unchanged.
    pub fn set_next_logger(&mut self, next: Arc<dyn LogHandler>) -> CoordinatorResult<()> {
        let identity = next.identity().to_string();
        debug!(%identity, len = self.handlers.len(), "LoggerChain::set_next_logger: called");

        if self.identities.contains(&identity) || self.handlers.iter().any(|h| Arc::ptr_eq(h, &next)) {
            warn!(%identity, "LoggerChain::set_next_logger: handler already in chain");
            return Err(CoordinatorError::LoggerCycle(identity));
        }

        self.identities.insert(identity);
        self.handlers.push(next);
        Ok(())
    }

    /// Identities in chain order
    pub fn identities(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.identity()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handlers that a record reaches, in order
    fn reachable(&self) -> Vec<Arc<dyn LogHandler>> {
        let mut reached = Vec::with_capacity(self.handlers.len());
        for handler in &self.handlers {
            reached.push(handler.clone());
            if !handler.forwards() {
                break;
            }
        }
        reached
    }

    pub fn log_event(&self, source: &str, event_name: &str, properties: &Value) {
        for handler in self.reachable() {
            handler.process_event(source, event_name, properties);
        }
    }

    pub fn log_exception(&self, source: &str, error: &(dyn Error + 'static), properties: &Value) {
        for handler in self.reachable() {
            handler.process_exception(source, error, properties);
        }
    }
}

/// Shared handle to a [`LoggerChain`]
///
/// Handlers are called on a snapshot of the chain, so a handler may itself
/// reconfigure the chain without deadlocking.
#[derive(Clone, Default)]
pub struct LoggerHandle {
    chain: Arc<RwLock<LoggerChain>>,
}

impl LoggerHandle {
    pub fn new(head: Arc<dyn LogHandler>) -> Self {
        Self {
            chain: Arc::new(RwLock::new(LoggerChain::new(head))),
        }
    }

    /// Replace the whole chain with a single head handler
    pub fn reset(&self, head: Arc<dyn LogHandler>) {
        debug!(identity = head.identity(), "LoggerHandle::reset: called");
        *self.chain.write() = LoggerChain::new(head);
    }

    /// Append a handler at the tail, see [`LoggerChain::set_next_logger`]
    pub fn set_next_logger(&self, next: Arc<dyn LogHandler>) -> CoordinatorResult<()> {
        self.chain.write().set_next_logger(next)
    }

    pub fn identities(&self) -> Vec<String> {
        self.chain.read().identities().into_iter().map(str::to_string).collect()
    }

    pub fn log_event(&self, source: &str, event_name: &str, properties: &Value) {
        let handlers = self.chain.read().reachable();
        for handler in handlers {
            handler.process_event(source, event_name, properties);
        }
    }

    pub fn log_exception(&self, source: &str, error: &(dyn Error + 'static), properties: &Value) {
        let handlers = self.chain.read().reachable();
        for handler in handlers {
            handler.process_exception(source, error, properties);
        }
    }
}
