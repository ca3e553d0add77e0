//! Coordinator implementation

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use super::config::CoordinatorConfig;
use crate::action::{Action, INIT_ACTION, REPLACE_ACTION};
use crate::container::{Container, Middleware, Reducer, Store};
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::logging::{ActionLogger, LogHandler, LoggerHandle, TracingLogger, events};
use crate::registry::{Registration, TenantRegistry};
use crate::router::{ActionRouter, DispatchScope};
use crate::subscriptions::{AggregateFn, StateListener, SubscriptionManager, Unsubscribe};
use crate::PLATFORM;

/// Source name used when the coordinator itself reports a record
const COORDINATOR_SOURCE: &str = "GlobalStore";

/// Options for [`Coordinator::create_store`]
#[derive(Clone, Default)]
pub struct StoreOptions {
    /// Extra middlewares, run after the built-in action logger
    pub middlewares: Vec<Arc<dyn Middleware>>,

    /// Allow-list for cross-tenant actions; `None` keeps the current list on
    /// replacement and means "none" for a new tenant
    pub global_actions: Option<Vec<String>>,

    /// Swap the whole container of an existing tenant
    pub replace_container: bool,

    /// Swap only the reducer of an existing tenant's container
    pub replace_reducer: bool,
}

impl StoreOptions {
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn with_global_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.global_actions = Some(actions.into_iter().map(Into::into).collect());
        self
    }

    pub fn replacing_container(mut self) -> Self {
        self.replace_container = true;
        self
    }

    pub fn replacing_reducer(mut self) -> Self {
        self.replace_reducer = true;
        self
    }
}

struct Shared {
    config: CoordinatorConfig,
    registry: RwLock<TenantRegistry>,
    subscriptions: Arc<Mutex<SubscriptionManager>>,
    logger: LoggerHandle,
}

impl Shared {
    fn global_state(&self) -> Value {
        let containers: Vec<(String, Arc<dyn Container>)> = self
            .registry
            .read()
            .entries()
            .into_iter()
            .map(|e| (e.name.clone(), e.container.clone()))
            .collect();

        let mut state = Map::new();
        state.insert(PLATFORM.to_string(), Value::Object(Map::new()));
        for (name, container) in containers {
            state.insert(name, container.state());
        }
        Value::Object(state)
    }

    fn container(&self, tenant: &str) -> Option<Arc<dyn Container>> {
        self.registry.read().lookup(tenant).map(|e| e.container.clone())
    }

    /// Report an error through the logger chain and hand it back
    fn fail(&self, source: &str, err: CoordinatorError, properties: Value) -> CoordinatorError {
        warn!(%source, error = %err, "Coordinator: operation failed");
        self.logger.log_exception(source, &err, &properties);
        err
    }
}

/// Process-wide coordinator of tenant state containers
///
/// Cheap to clone; every clone shares the same registry, listeners and logger.
#[derive(Clone)]
pub struct Coordinator {
    shared: Arc<Shared>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(CoordinatorConfig::default())
    }
}

impl Coordinator {
    /// Create a coordinator logging through a [`TracingLogger`]
    pub fn new(config: CoordinatorConfig) -> Self {
        let head = Arc::new(TracingLogger::new(config.debug_mode));
        Self::with_logger(config, head)
    }

    /// Create a coordinator with a custom logger chain head
    pub fn with_logger(config: CoordinatorConfig, logger: Arc<dyn LogHandler>) -> Self {
        debug!(?config, logger = logger.identity(), "Coordinator::with_logger: called");
        let shared = Arc::new_cyclic(|weak: &Weak<Shared>| {
            let weak = weak.clone();
            let aggregate: AggregateFn = Arc::new(move || match weak.upgrade() {
                Some(shared) => shared.global_state(),
                None => Value::Object(Map::new()),
            });
            Shared {
                config,
                registry: RwLock::new(TenantRegistry::new()),
                subscriptions: Arc::new(Mutex::new(SubscriptionManager::new(aggregate))),
                logger: LoggerHandle::new(logger),
            }
        });
        Self { shared }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.shared.config
    }

    pub fn is_debug_mode(&self) -> bool {
        self.shared.config.debug_mode
    }

    /// Handle to the logger chain shared by the coordinator and its stores
    pub fn logger(&self) -> LoggerHandle {
        self.shared.logger.clone()
    }

    /// Replace the logger chain with a single handler
    pub fn set_logger(&self, logger: Arc<dyn LogHandler>) {
        info!(logger = logger.identity(), "Coordinator::set_logger: called");
        self.shared.logger.reset(logger);
    }

    /// Append a handler at the tail of the logger chain
    pub fn add_logger(&self, logger: Arc<dyn LogHandler>) -> CoordinatorResult<()> {
        let identity = logger.identity().to_string();
        debug!(%identity, "Coordinator::add_logger: called");
        self.shared
            .logger
            .set_next_logger(logger)
            .map_err(|e| self.shared.fail(COORDINATOR_SOURCE, e, json!({ "logger": identity })))
    }

    /// Create a store for `tenant` and register it
    ///
    /// The built-in [`ActionLogger`] runs in front of `options.middlewares`.
    /// When the tenant exists, `replace_container` swaps the whole store
    /// (listeners move to the new one) and `replace_reducer` keeps the store
    /// and swaps its reducer; without either flag the call fails with
    /// [`CoordinatorError::DuplicateTenant`].
    pub fn create_store(
        &self,
        tenant: &str,
        reducer: Reducer,
        options: StoreOptions,
    ) -> CoordinatorResult<Arc<dyn Container>> {
        debug!(
            %tenant,
            replace_container = options.replace_container,
            replace_reducer = options.replace_reducer,
            "Coordinator::create_store: called"
        );

        if !options.replace_container
            && options.replace_reducer
            && let Some(existing) = self.shared.container(tenant)
        {
            return self.replace_reducer(tenant, existing, reducer, options.global_actions);
        }

        let mut middlewares: Vec<Arc<dyn Middleware>> = Vec::with_capacity(options.middlewares.len() + 1);
        middlewares.push(Arc::new(ActionLogger::new(self.shared.logger.clone(), self.is_debug_mode())));
        middlewares.extend(options.middlewares);

        let store: Arc<dyn Container> = Store::new(tenant, reducer, middlewares).map_err(|source| {
            self.shared.fail(
                tenant,
                CoordinatorError::DispatchFailure {
                    tenant: tenant.to_string(),
                    action_type: INIT_ACTION.to_string(),
                    source,
                },
                json!({ "event": events::DISPATCH_FAILURE, "actionType": INIT_ACTION }),
            )
        })?;

        self.install(tenant, store.clone(), options.global_actions, options.replace_container)?;
        Ok(store)
    }

    fn replace_reducer(
        &self,
        tenant: &str,
        container: Arc<dyn Container>,
        reducer: Reducer,
        global_actions: Option<Vec<String>>,
    ) -> CoordinatorResult<Arc<dyn Container>> {
        debug!(%tenant, "Coordinator::replace_reducer: called");
        container.replace_reducer(reducer).map_err(|source| {
            self.shared.fail(
                tenant,
                CoordinatorError::DispatchFailure {
                    tenant: tenant.to_string(),
                    action_type: REPLACE_ACTION.to_string(),
                    source,
                },
                json!({ "event": events::DISPATCH_FAILURE, "actionType": REPLACE_ACTION }),
            )
        })?;

        if let Some(actions) = global_actions {
            self.register_global_actions(tenant, actions)?;
        }

        info!(%tenant, "Reducer replaced");
        self.shared
            .logger
            .log_event(COORDINATOR_SOURCE, events::REDUCER_REPLACED, &json!({ "tenant": tenant }));
        Ok(container)
    }

    /// Register a container built outside the coordinator
    pub fn register_store(
        &self,
        tenant: &str,
        container: Arc<dyn Container>,
        global_actions: Option<Vec<String>>,
        replace_container: bool,
    ) -> CoordinatorResult<()> {
        debug!(%tenant, replace_container, "Coordinator::register_store: called");
        self.install(tenant, container, global_actions, replace_container)
    }

    fn install(
        &self,
        tenant: &str,
        container: Arc<dyn Container>,
        global_actions: Option<Vec<String>>,
        replace_container: bool,
    ) -> CoordinatorResult<()> {
        // Errors are reported only after the registry lock is released, so a
        // handler may read coordinator state.
        let outcome = {
            let mut registry = self.shared.registry.write();
            match registry.register(tenant, container.clone(), global_actions, replace_container) {
                Ok(Registration::Added) => {
                    self.shared.subscriptions.lock().on_container_added(tenant, &container);
                    Ok(events::STORE_REGISTERED)
                }
                Ok(Registration::Replaced(_)) => {
                    self.shared.subscriptions.lock().on_container_replaced(tenant, &container);
                    Ok(events::STORE_REPLACED)
                }
                Err(e) => Err(e),
            }
        };
        let outcome =
            outcome.map_err(|e| self.shared.fail(tenant, e, json!({ "replaceContainer": replace_container })))?;

        info!(%tenant, event = outcome, "Store registered");
        let global_actions = self.global_actions(tenant).unwrap_or_default();
        self.shared.logger.log_event(
            COORDINATOR_SOURCE,
            outcome,
            &json!({ "tenant": tenant, "globalActions": global_actions }),
        );
        Ok(())
    }

    /// Remove a tenant and detach every listener from its container
    pub fn unregister_store(&self, tenant: &str) -> CoordinatorResult<()> {
        debug!(%tenant, "Coordinator::unregister_store: called");
        {
            let mut registry = self.shared.registry.write();
            if registry.remove(tenant).is_none() {
                drop(registry);
                return Err(self.shared.fail(
                    tenant,
                    CoordinatorError::UnknownTenant(tenant.to_string()),
                    json!({ "operation": "unregister_store" }),
                ));
            }
            self.shared.subscriptions.lock().on_container_removed(tenant);
        }

        info!(%tenant, "Store unregistered");
        self.shared
            .logger
            .log_event(COORDINATOR_SOURCE, events::STORE_UNREGISTERED, &json!({ "tenant": tenant }));
        Ok(())
    }

    /// Set the action types other tenants may dispatch on `tenant`
    ///
    /// An empty list closes the tenant to cross-tenant actions; `["*"]` opens it
    /// to all.
    pub fn register_global_actions(&self, tenant: &str, actions: Vec<String>) -> CoordinatorResult<()> {
        debug!(%tenant, ?actions, "Coordinator::register_global_actions: called");
        let properties = json!({ "tenant": tenant, "globalActions": actions });
        let result = self.shared.registry.write().register_global_actions(tenant, actions);
        result.map_err(|e| self.shared.fail(tenant, e, properties.clone()))?;

        self.shared
            .logger
            .log_event(COORDINATOR_SOURCE, events::GLOBAL_ACTIONS_REGISTERED, &properties);
        Ok(())
    }

    /// Current allow-list of a tenant, sorted
    pub fn global_actions(&self, tenant: &str) -> Option<Vec<String>> {
        self.shared
            .registry
            .read()
            .lookup(tenant)
            .map(|e| e.global_actions.iter().cloned().collect())
    }

    /// Registered tenant names, Platform first
    pub fn tenants(&self) -> Vec<String> {
        self.shared.registry.read().all_names()
    }

    /// Platform's current state, `None` until the Platform registers
    pub fn platform_state(&self) -> Option<Value> {
        self.partner_state(PLATFORM)
    }

    /// Copy of a tenant's current state, `None` if the tenant is unknown
    ///
    /// The returned value is independent of the container: mutating it has no
    /// effect on the tenant.
    pub fn partner_state(&self, tenant: &str) -> Option<Value> {
        self.shared.container(tenant).map(|c| c.state())
    }

    /// `{ "Platform": ..., "<tenant>": ..., ... }` in registry order
    ///
    /// `Platform` is always present (`{}` until it registers).
    pub fn global_state(&self) -> Value {
        self.shared.global_state()
    }

    fn router(&self) -> ActionRouter<'_> {
        ActionRouter::new(&self.shared.registry, &self.shared.logger)
    }

    /// Dispatch on every other tenant whose allow-list accepts the action
    pub fn dispatch_global_action(&self, source: &str, action: &Action) -> CoordinatorResult<()> {
        self.router().dispatch_global(source, action)
    }

    /// Dispatch on the source tenant's own container
    pub fn dispatch_local_action(&self, source: &str, action: &Action) -> CoordinatorResult<()> {
        self.router().dispatch_local(source, action)
    }

    /// Local dispatch, then global dispatch
    pub fn dispatch_action(&self, source: &str, action: &Action) -> CoordinatorResult<()> {
        self.router().dispatch_both(source, action)
    }

    pub fn dispatch_with_scope(&self, scope: DispatchScope, source: &str, action: &Action) -> CoordinatorResult<()> {
        self.router().dispatch(scope, source, action)
    }

    /// Observe the source tenant's own state
    pub fn subscribe<F>(&self, source: &str, callback: F) -> CoordinatorResult<Unsubscribe>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        debug!(%source, "Coordinator::subscribe: called");
        self.subscribe_tenant(source, source, Arc::new(callback), CoordinatorError::UnregisteredTenant)
    }

    /// Observe the Platform's state
    pub fn subscribe_to_platform_state<F>(&self, source: &str, callback: F) -> CoordinatorResult<Unsubscribe>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        debug!(%source, "Coordinator::subscribe_to_platform_state: called");
        self.subscribe_tenant(source, PLATFORM, Arc::new(callback), CoordinatorError::UnregisteredTenant)
    }

    /// Observe another tenant's state; the partner must already be registered
    pub fn subscribe_to_partner_state<F>(
        &self,
        source: &str,
        partner: &str,
        callback: F,
    ) -> CoordinatorResult<Unsubscribe>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        debug!(%source, %partner, "Coordinator::subscribe_to_partner_state: called");
        self.subscribe_tenant(source, partner, Arc::new(callback), CoordinatorError::UnregisteredPartner)
    }

    /// Observe the aggregate state; fires once per underlying container change
    pub fn subscribe_to_global_state<F>(&self, source: &str, callback: F) -> Unsubscribe
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        debug!(%source, "Coordinator::subscribe_to_global_state: called");
        let registry = self.shared.registry.read();
        let containers: Vec<(String, Arc<dyn Container>)> = registry
            .entries()
            .into_iter()
            .map(|e| (e.name.clone(), e.container.clone()))
            .collect();
        let id = self
            .shared
            .subscriptions
            .lock()
            .add_global_listener(source, &containers, Arc::new(callback));
        drop(registry);
        Unsubscribe::new(id, &self.shared.subscriptions)
    }

    fn subscribe_tenant(
        &self,
        source: &str,
        tenant: &str,
        callback: StateListener,
        missing: fn(String) -> CoordinatorError,
    ) -> CoordinatorResult<Unsubscribe> {
        let registry = self.shared.registry.read();
        let container = registry.lookup(tenant).map(|e| e.container.clone());
        let Some(container) = container else {
            drop(registry);
            return Err(self.shared.fail(
                source,
                missing(tenant.to_string()),
                json!({ "operation": "subscribe", "tenant": tenant }),
            ));
        };
        let id = self
            .shared
            .subscriptions
            .lock()
            .add_tenant_listener(source, tenant, &container, callback);
        drop(registry);
        Ok(Unsubscribe::new(id, &self.shared.subscriptions))
    }

    /// Number of live subscriptions
    pub fn subscription_count(&self) -> usize {
        self.shared.subscriptions.lock().len()
    }
}
