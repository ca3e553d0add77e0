//! Coordinator facade
//!
//! The Coordinator composes the tenant registry, the action router, the
//! subscription manager and the logger chain behind one cloneable handle.
//! Tenants receive the handle at load time; [`get_coordinator`] provides the
//! process-wide instance for hosts that do not inject one.

mod config;
mod core;

use std::sync::{Arc, OnceLock};

use tracing::debug;

pub use config::CoordinatorConfig;
pub use core::{Coordinator, StoreOptions};

use crate::logging::LogHandler;

static INSTANCE: OnceLock<Coordinator> = OnceLock::new();

/// Process-wide coordinator
///
/// The first call decides debug mode and the logger; later calls return the
/// same instance and ignore their arguments. Use [`Coordinator::set_logger`] to
/// swap the logger afterwards.
pub fn get_coordinator(debug_mode: Option<bool>, logger: Option<Arc<dyn LogHandler>>) -> Coordinator {
    INSTANCE
        .get_or_init(|| {
            let config = CoordinatorConfig {
                debug_mode: debug_mode.unwrap_or(false),
            };
            debug!(?config, custom_logger = logger.is_some(), "get_coordinator: creating instance");
            match logger {
                Some(logger) => Coordinator::with_logger(config, logger),
                None => Coordinator::new(config),
            }
        })
        .clone()
}
