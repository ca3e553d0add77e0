//! Logger forwarding chain records to `tracing`

use std::error::Error;

use serde_json::Value;
use tracing::{debug, error, info};

use super::chain::LogHandler;

/// Default chain head: writes records through `tracing`
///
/// In debug mode events are emitted at INFO, otherwise at DEBUG. Exceptions are
/// always emitted at ERROR.
pub struct TracingLogger {
    debug_mode: bool,
}

impl TracingLogger {
    pub const IDENTITY: &'static str = "TracingLogger";

    pub fn new(debug_mode: bool) -> Self {
        Self { debug_mode }
    }

    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new(false)
    }
}

impl LogHandler for TracingLogger {
    fn identity(&self) -> &str {
        Self::IDENTITY
    }

    fn process_event(&self, source: &str, event_name: &str, properties: &Value) {
        if self.debug_mode {
            info!(%source, %event_name, %properties, "event");
        } else {
            debug!(%source, %event_name, %properties, "event");
        }
    }

    fn process_exception(&self, source: &str, err: &(dyn Error + 'static), properties: &Value) {
        error!(%source, error = %err, %properties, "exception");
    }
}
