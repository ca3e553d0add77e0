//! Declarative scenarios
//!
//! A scenario describes a set of tenants and a sequence of steps to run
//! against a fresh coordinator. Each tenant gets a keyed reducer: its handlers
//! map an action type to a state key, and a matching action writes its payload
//! under that key.
//!
//! ```yaml
//! tenants:
//!   - name: Platform
//!     global_actions: [SET_THEME]
//!     initial_state: { theme: light }
//!     handlers: { SET_THEME: theme }
//! steps:
//!   - step: dispatch
//!     source: Checkout
//!     scope: global
//!     action: { type: SET_THEME, payload: dark }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::action::Action;
use crate::container::{Reducer, reducer};
use crate::coordinator::{Coordinator, StoreOptions};
use crate::router::DispatchScope;

/// A tenant declared by a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantSpec {
    pub name: String,

    #[serde(default)]
    pub global_actions: Vec<String>,

    /// State before any action; `null` becomes `{}`
    #[serde(default)]
    pub initial_state: Value,

    /// Action type -> state key receiving the payload
    #[serde(default)]
    pub handlers: BTreeMap<String, String>,
}

impl TenantSpec {
    /// Reducer writing the payload of handled actions under their state key
    pub fn reducer(&self) -> Reducer {
        let initial = match &self.initial_state {
            Value::Null => Value::Object(Map::new()),
            other => other.clone(),
        };
        let handlers = self.handlers.clone();

        reducer(move |state, action| {
            let mut next = if state.is_null() { initial.clone() } else { state.clone() };
            if let Some(key) = handlers.get(&action.action_type) {
                match next.as_object_mut() {
                    Some(map) => {
                        map.insert(key.clone(), action.payload.clone());
                    }
                    None => return Err(format!("state is not an object, cannot set {}", key).into()),
                }
            }
            Ok(next)
        })
    }
}

/// One step of a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Dispatch {
        source: String,
        #[serde(default)]
        scope: DispatchScope,
        action: Action,
    },
    RegisterGlobalActions {
        tenant: String,
        #[serde(default)]
        actions: Vec<String>,
    },
    Unregister {
        tenant: String,
    },
}

impl Step {
    fn describe(&self) -> String {
        match self {
            Step::Dispatch { source, scope, action } => {
                format!("dispatch {} from {} ({})", action.action_type, source, scope.as_str())
            }
            Step::RegisterGlobalActions { tenant, .. } => format!("register_global_actions on {}", tenant),
            Step::Unregister { tenant } => format!("unregister {}", tenant),
        }
    }
}

/// Tenants plus the steps to run against them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub tenants: Vec<TenantSpec>,

    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse scenario")
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!(?path, "Scenario::load: called");
        let content =
            std::fs::read_to_string(path).context(format!("Failed to read scenario {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Problems that would make the scenario fail; empty when it is runnable
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let mut live: HashSet<&str> = HashSet::new();

        for tenant in &self.tenants {
            if tenant.name.is_empty() {
                issues.push("tenant with an empty name".to_string());
            } else if !live.insert(tenant.name.as_str()) {
                issues.push(format!("tenant {} declared more than once", tenant.name));
            }
            if !tenant.initial_state.is_null() && !tenant.initial_state.is_object() {
                issues.push(format!("tenant {}: initial_state must be a mapping", tenant.name));
            }
            for (action_type, key) in &tenant.handlers {
                if key.is_empty() {
                    issues.push(format!("tenant {}: handler for {} has an empty state key", tenant.name, action_type));
                }
            }
        }

        for (idx, step) in self.steps.iter().enumerate() {
            let n = idx + 1;
            match step {
                Step::Dispatch { source, scope, action } => {
                    if action.action_type.is_empty() {
                        issues.push(format!("step {}: action without a type", n));
                    }
                    if *scope != DispatchScope::Global && !live.contains(source.as_str()) {
                        issues.push(format!("step {}: unknown source tenant {}", n, source));
                    }
                }
                Step::RegisterGlobalActions { tenant, .. } => {
                    if !live.contains(tenant.as_str()) {
                        issues.push(format!("step {}: unknown tenant {}", n, tenant));
                    }
                }
                Step::Unregister { tenant } => {
                    if !live.remove(tenant.as_str()) {
                        issues.push(format!("step {}: unknown tenant {}", n, tenant));
                    }
                }
            }
        }

        issues
    }

    pub fn validate(&self) -> Result<()> {
        let issues = self.issues();
        if !issues.is_empty() {
            bail!("Invalid scenario: {}", issues.join("; "));
        }
        Ok(())
    }

    /// Create a store for every declared tenant
    pub fn register_tenants(&self, coordinator: &Coordinator) -> Result<()> {
        for tenant in &self.tenants {
            debug!(tenant = %tenant.name, "Scenario::register_tenants: creating store");
            coordinator
                .create_store(
                    &tenant.name,
                    tenant.reducer(),
                    StoreOptions::default().with_global_actions(tenant.global_actions.clone()),
                )
                .context(format!("Failed to create store for {}", tenant.name))?;
        }
        Ok(())
    }

    /// Execute the steps in order; the first failing step stops the run
    pub fn run_steps(&self, coordinator: &Coordinator) -> Result<()> {
        for (idx, step) in self.steps.iter().enumerate() {
            info!(step = idx + 1, what = %step.describe(), "Running scenario step");
            let result = match step {
                Step::Dispatch { source, scope, action } => coordinator.dispatch_with_scope(*scope, source, action),
                Step::RegisterGlobalActions { tenant, actions } => {
                    coordinator.register_global_actions(tenant, actions.clone())
                }
                Step::Unregister { tenant } => coordinator.unregister_store(tenant),
            };
            result.context(format!("Step {} failed: {}", idx + 1, step.describe()))?;
        }
        Ok(())
    }

    /// Validate, register tenants, run steps and return the final global state
    pub fn run(&self, coordinator: &Coordinator) -> Result<Value> {
        self.validate()?;
        self.register_tenants(coordinator)?;
        self.run_steps(coordinator)?;
        Ok(coordinator.global_state())
    }
}
