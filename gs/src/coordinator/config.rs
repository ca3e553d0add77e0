//! Coordinator configuration

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Report every store action (with state before/after) through the logger chain
    #[serde(default = "default_debug_mode")]
    pub debug_mode: bool,
}

fn default_debug_mode() -> bool {
    debug!("default_debug_mode: called");
    false
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        debug!("CoordinatorConfig::default: called");
        Self {
            debug_mode: default_debug_mode(),
        }
    }
}

impl CoordinatorConfig {
    pub fn debug() -> Self {
        Self { debug_mode: true }
    }
}
