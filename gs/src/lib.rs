//! GlobalStore - coordinator for co-hosted tenant state containers
//!
//! Several independently developed modules ("tenants") share one host process.
//! Each tenant owns a private state container; the coordinator keeps the
//! registry of those containers, routes actions between them and lets any
//! tenant observe its own state, the Platform's state, a partner's state or the
//! aggregate of all of them.
//!
//! # Core Concepts
//!
//! - **Private by default**: a tenant's container only receives actions from
//!   other tenants when the action type is on its global allow-list
//! - **Platform**: the reserved tenant representing the host shell
//! - **Deterministic fan-out**: global dispatch visits tenants in registry order
//!   (Platform first), synchronously, one container at a time
//! - **Live subscriptions**: listeners follow container replacement and newly
//!   registered tenants
//!
//! # Modules
//!
//! - [`container`] - Container trait and the default reducer-driven [`Store`]
//! - [`logging`] - Chain-of-responsibility logging and the action logger middleware
//! - [`registry`] - Tenant registry
//! - [`router`] - Local/global action routing
//! - [`subscriptions`] - Listener bookkeeping
//! - [`coordinator`] - The public facade
//!
//! # Example
//!
//! ```ignore
//! use globalstore::{Action, Coordinator, StoreOptions, reducer};
//!
//! let coordinator = Coordinator::default();
//! coordinator.create_store(
//!     "Platform",
//!     reducer(|state, action| Ok(match action.action_type.as_str() {
//!         "SET_THEME" => serde_json::json!({ "theme": action.payload }),
//!         _ if state.is_null() => serde_json::json!({ "theme": "light" }),
//!         _ => state.clone(),
//!     })),
//!     StoreOptions::default().with_global_actions(["SET_THEME"]),
//! )?;
//! coordinator.dispatch_global_action("Checkout", &Action::new("SET_THEME").with_payload("dark"))?;
//! ```

pub mod action;
pub mod cli;
pub mod config;
pub mod container;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod registry;
pub mod router;
pub mod scenario;
pub mod subscriptions;

pub use action::Action;
pub use container::{
    BoxError, Container, ContainerListener, ListenerId, Middleware, Next, Reducer, Store, middleware, reducer,
};
pub use coordinator::{Coordinator, CoordinatorConfig, StoreOptions, get_coordinator};
pub use error::{ContainerError, CoordinatorError, CoordinatorResult};
pub use logging::{ActionLogger, JsonlLogger, LogHandler, LoggerChain, LoggerHandle, TracingLogger};
pub use registry::{TenantEntry, TenantRegistry};
pub use router::{ActionRouter, DispatchScope};
pub use subscriptions::{StateListener, SubscriptionManager, Unsubscribe};

/// Reserved name of the host shell tenant
pub const PLATFORM: &str = "Platform";

/// Allow-list sentinel permitting every action type
pub const ALLOW_ALL: &str = "*";
