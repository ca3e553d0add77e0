//! Action routing
//!
//! Decides which containers receive an action and in what order:
//! - **Local:** only the source tenant's own container
//! - **Global:** every other tenant, in registry order, whose allow-list
//!   contains the action type or `"*"`
//! - **Both:** local first, then global
//!
//! Targets are resolved from the registry up front and the registry lock is
//! released before any container runs, so listeners may dispatch or register
//! re-entrantly. A container failure aborts the remaining fan-out; tenants
//! already visited keep their new state.

use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::action::Action;
use crate::container::Container;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::logging::{LoggerHandle, events};
use crate::registry::TenantRegistry;

/// Where a dispatched action goes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchScope {
    Local,
    Global,
    #[default]
    Both,
}

impl DispatchScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Global => "global",
            Self::Both => "both",
        }
    }
}

impl FromStr for DispatchScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "global" => Ok(Self::Global),
            "both" => Ok(Self::Both),
            _ => Err(format!("Unknown dispatch scope: {}. Use local, global, or both", s)),
        }
    }
}

/// Routes actions to tenant containers
pub struct ActionRouter<'a> {
    registry: &'a RwLock<TenantRegistry>,
    logger: &'a LoggerHandle,
}

impl<'a> ActionRouter<'a> {
    pub fn new(registry: &'a RwLock<TenantRegistry>, logger: &'a LoggerHandle) -> Self {
        Self { registry, logger }
    }

    pub fn dispatch(&self, scope: DispatchScope, source: &str, action: &Action) -> CoordinatorResult<()> {
        match scope {
            DispatchScope::Local => self.dispatch_local(source, action),
            DispatchScope::Global => self.dispatch_global(source, action),
            DispatchScope::Both => self.dispatch_both(source, action),
        }
    }

    /// Apply the action to the source tenant's own container
    pub fn dispatch_local(&self, source: &str, action: &Action) -> CoordinatorResult<()> {
        debug!(%source, action_type = %action.action_type, "ActionRouter::dispatch_local: called");
        self.log_start(DispatchScope::Local, source, action);

        let container = self.registry.read().lookup(source).map(|e| e.container.clone());
        let Some(container) = container else {
            let err = CoordinatorError::UnknownTenant(source.to_string());
            self.logger.log_exception(
                source,
                &err,
                &json!({ "event": events::DISPATCH_FAILURE, "scope": "local", "actionType": action.action_type }),
            );
            return Err(err);
        };

        self.deliver(DispatchScope::Local, source, source, &container, action)?;
        self.log_complete(DispatchScope::Local, source, action, &[source.to_string()]);
        Ok(())
    }

    /// Fan the action out to every other tenant that opted into it
    pub fn dispatch_global(&self, source: &str, action: &Action) -> CoordinatorResult<()> {
        debug!(%source, action_type = %action.action_type, "ActionRouter::dispatch_global: called");
        self.log_start(DispatchScope::Global, source, action);

        let targets = self.global_targets(source, &action.action_type);
        let mut delivered = Vec::with_capacity(targets.len());
        for (tenant, container) in &targets {
            self.deliver(DispatchScope::Global, source, tenant, container, action)?;
            delivered.push(tenant.clone());
        }

        self.log_complete(DispatchScope::Global, source, action, &delivered);
        Ok(())
    }

    /// Local dispatch followed by global dispatch
    pub fn dispatch_both(&self, source: &str, action: &Action) -> CoordinatorResult<()> {
        debug!(%source, action_type = %action.action_type, "ActionRouter::dispatch_both: called");
        self.dispatch_local(source, action)?;
        self.dispatch_global(source, action)
    }

    /// Tenants a global dispatch from `source` reaches, in fan-out order
    pub fn global_targets(&self, source: &str, action_type: &str) -> Vec<(String, Arc<dyn Container>)> {
        let registry = self.registry.read();
        registry
            .entries()
            .into_iter()
            .filter(|entry| entry.name != source && entry.allows(action_type))
            .map(|entry| (entry.name.clone(), entry.container.clone()))
            .collect()
    }

    fn deliver(
        &self,
        scope: DispatchScope,
        source: &str,
        tenant: &str,
        container: &Arc<dyn Container>,
        action: &Action,
    ) -> CoordinatorResult<()> {
        container.dispatch(action).map_err(|source_err| {
            warn!(%source, %tenant, action_type = %action.action_type, error = %source_err, "ActionRouter: dispatch failed");
            let err = CoordinatorError::DispatchFailure {
                tenant: tenant.to_string(),
                action_type: action.action_type.clone(),
                source: source_err,
            };
            self.logger.log_exception(
                source,
                &err,
                &json!({
                    "event": events::DISPATCH_FAILURE,
                    "scope": scope.as_str(),
                    "actionType": action.action_type,
                    "tenant": tenant,
                }),
            );
            err
        })
    }

    fn log_start(&self, scope: DispatchScope, source: &str, action: &Action) {
        self.logger.log_event(
            source,
            events::DISPATCH_START,
            &json!({ "scope": scope.as_str(), "actionType": action.action_type }),
        );
    }

    fn log_complete(&self, scope: DispatchScope, source: &str, action: &Action, delivered: &[String]) {
        self.logger.log_event(
            source,
            events::DISPATCH_COMPLETE,
            &json!({ "scope": scope.as_str(), "actionType": action.action_type, "delivered": delivered }),
        );
    }
}
