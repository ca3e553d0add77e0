//! Store middleware reporting actions and their effect on state

use serde_json::json;
use tracing::debug;

use crate::action::Action;
use crate::container::{Container, Middleware, Next, Store};
use crate::error::ContainerError;

use super::chain::LoggerHandle;
use super::events;

/// Reports every dispatch on a store through the logger chain
///
/// Only active in debug mode, since each record carries the previous and next
/// state of the store.
#[derive(Clone)]
pub struct ActionLogger {
    logger: LoggerHandle,
    debug_mode: bool,
}

impl ActionLogger {
    pub const NAME: &'static str = "ActionLogger";

    pub fn new(logger: LoggerHandle, debug_mode: bool) -> Self {
        Self { logger, debug_mode }
    }

    fn is_logging_allowed(&self) -> bool {
        self.debug_mode
    }
}

impl Middleware for ActionLogger {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle(&self, store: &Store, action: &Action, next: Next<'_>) -> Result<(), ContainerError> {
        if !self.is_logging_allowed() {
            return next.run(action);
        }

        debug!(store = store.name(), action_type = %action.action_type, "ActionLogger::handle: called");
        let previous = store.state();
        self.logger.log_event(
            store.name(),
            events::ACTION_START,
            &json!({
                "actionType": action.action_type,
                "payload": action.payload,
                "previousState": previous,
            }),
        );

        match next.run_for_state(action) {
            Ok(reduced) => {
                let next_state = reduced.unwrap_or_else(|| previous.clone());
                self.logger.log_event(
                    store.name(),
                    events::ACTION_COMPLETE,
                    &json!({
                        "actionType": action.action_type,
                        "previousState": previous,
                        "nextState": next_state,
                    }),
                );
                Ok(())
            }
            Err(e) => {
                let properties = json!({
                    "actionType": action.action_type,
                    "event": events::ACTION_FAILURE,
                });
                self.logger.log_exception(store.name(), &e, &properties);
                Err(e)
            }
        }
    }
}
