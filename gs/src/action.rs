//! Action type routed between tenants

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type emitted once when a store is created
pub const INIT_ACTION: &str = "@@globalstore/INIT";

/// Type emitted when a store's reducer is replaced
pub const REPLACE_ACTION: &str = "@@globalstore/REPLACE";

/// A state-changing request
///
/// The router only looks at `action_type`; the payload belongs to the
/// dispatching tenant and is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl Action {
    /// Create an action without payload
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            payload: Value::Null,
        }
    }

    /// Attach a payload
    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = payload.into();
        self
    }

    pub(crate) fn init() -> Self {
        Self::new(INIT_ACTION)
    }

    pub(crate) fn replace() -> Self {
        Self::new(REPLACE_ACTION)
    }
}
