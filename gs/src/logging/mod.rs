//! Chain-of-responsibility logging
//!
//! Every dispatch, registration and error is reported through a chain of
//! [`LogHandler`]s. Each handler processes the record and the chain forwards it
//! to the next handler, unless the handler is a terminal sink.
//!
//! - [`TracingLogger`] - forwards records to `tracing` (default chain head)
//! - [`JsonlLogger`] - appends records to a JSONL file
//! - [`ActionLogger`] - store middleware reporting every action and its state change

mod action_logger;
mod chain;
mod jsonl;
mod tracing_logger;

pub use action_logger::ActionLogger;
pub use chain::{LogHandler, LoggerChain, LoggerHandle};
pub use jsonl::{JsonlLogger, LogRecord, LogRecordKind, read_records};
pub use tracing_logger::TracingLogger;

#[cfg(test)]
pub(crate) use chain::tests::Recorder;

/// Event names reported by the coordinator
pub mod events {
    pub const DISPATCH_START: &str = "GlobalStore.Dispatch.Start";
    pub const DISPATCH_COMPLETE: &str = "GlobalStore.Dispatch.Complete";
    pub const DISPATCH_FAILURE: &str = "GlobalStore.Dispatch.Failure";
    pub const STORE_REGISTERED: &str = "GlobalStore.Store.Registered";
    pub const STORE_REPLACED: &str = "GlobalStore.Store.Replaced";
    pub const REDUCER_REPLACED: &str = "GlobalStore.Reducer.Replaced";
    pub const STORE_UNREGISTERED: &str = "GlobalStore.Store.Unregistered";
    pub const GLOBAL_ACTIONS_REGISTERED: &str = "GlobalStore.GlobalActions.Registered";
    pub const ACTION_START: &str = "Store.Action.Dispatch.Start";
    pub const ACTION_COMPLETE: &str = "Store.Action.Dispatch.Complete";
    pub const ACTION_FAILURE: &str = "Store.Action.Dispatch.Failure";
}
