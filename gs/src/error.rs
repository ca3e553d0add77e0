//! Error types for the coordinator and its containers

use thiserror::Error;

use crate::container::BoxError;

/// Errors raised by a state container while dispatching
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Reducer failed on action {action_type}: {source}")]
    Reducer {
        action_type: String,
        #[source]
        source: BoxError,
    },

    #[error("Middleware {middleware} rejected action {action_type}: {reason}")]
    Middleware {
        middleware: String,
        action_type: String,
        reason: String,
    },
}

impl ContainerError {
    /// Action type the failing dispatch was processing
    pub fn action_type(&self) -> &str {
        match self {
            Self::Reducer { action_type, .. } | Self::Middleware { action_type, .. } => action_type,
        }
    }
}

/// Errors surfaced by the coordinator
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Tenant already registered: {0}")]
    DuplicateTenant(String),

    #[error("Unknown tenant: {0}")]
    UnknownTenant(String),

    #[error("Tenant is not registered: {0}")]
    UnregisteredTenant(String),

    #[error("Partner is not registered: {0}")]
    UnregisteredPartner(String),

    #[error("Logger {0} is already part of the chain")]
    LoggerCycle(String),

    #[error("Dispatch of {action_type} failed in tenant {tenant}")]
    DispatchFailure {
        tenant: String,
        action_type: String,
        #[source]
        source: ContainerError,
    },
}

/// Result alias for coordinator operations
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
