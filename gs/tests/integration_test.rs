//! Integration tests for GlobalStore
//!
//! These tests drive the coordinator through its public API only.

use std::error::Error;
use std::sync::{Arc, Mutex};

use globalstore::logging::read_records;
use globalstore::{
    ALLOW_ALL, Action, Container, Coordinator, CoordinatorConfig, CoordinatorError, JsonlLogger, LogHandler,
    PLATFORM, StoreOptions, get_coordinator, middleware, reducer,
};
use serde_json::{Value, json};
use tempfile::TempDir;

// =============================================================================
// Helpers
// =============================================================================

#[derive(Default)]
struct Collector {
    events: Mutex<Vec<(String, String)>>,
    errors: Mutex<Vec<String>>,
}

impl LogHandler for Collector {
    fn identity(&self) -> &str {
        "Collector"
    }

    fn process_event(&self, source: &str, event_name: &str, _properties: &Value) {
        self.events
            .lock()
            .unwrap()
            .push((source.to_string(), event_name.to_string()));
    }

    fn process_exception(&self, _source: &str, error: &(dyn Error + 'static), _properties: &Value) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

fn theme_store(coordinator: &Coordinator) -> Arc<dyn Container> {
    coordinator
        .create_store(
            PLATFORM,
            reducer(|state, action| {
                Ok(match action.action_type.as_str() {
                    "SET_THEME" => json!({ "theme": action.payload }),
                    _ if state.is_null() => json!({ "theme": "light" }),
                    _ => state.clone(),
                })
            }),
            StoreOptions::default().with_global_actions(["SET_THEME"]),
        )
        .expect("Failed to create Platform store")
}

fn cart_store(coordinator: &Coordinator, global_actions: &[&str]) -> Arc<dyn Container> {
    coordinator
        .create_store(
            "Checkout",
            reducer(|state, action| {
                let items = state.get("items").and_then(Value::as_u64).unwrap_or(0);
                Ok(match action.action_type.as_str() {
                    "ADD_ITEM" => json!({ "items": items + 1 }),
                    "RESET_CART" => json!({ "items": 0 }),
                    _ => json!({ "items": items }),
                })
            }),
            StoreOptions::default().with_global_actions(global_actions.iter().copied()),
        )
        .expect("Failed to create Checkout store")
}

fn recording() -> (Arc<Mutex<Vec<Value>>>, impl Fn(&Value) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |state: &Value| sink.lock().unwrap().push(state.clone()))
}

// =============================================================================
// Routing Tests
// =============================================================================

#[test]
fn test_theme_change_reaches_platform_only() {
    let coordinator = Coordinator::default();
    theme_store(&coordinator);
    cart_store(&coordinator, &[ALLOW_ALL]);
    coordinator
        .dispatch_local_action("Checkout", &Action::new("ADD_ITEM"))
        .unwrap();

    coordinator
        .dispatch_global_action("Checkout", &Action::new("SET_THEME").with_payload("dark"))
        .unwrap();

    assert_eq!(coordinator.platform_state(), Some(json!({ "theme": "dark" })));
    assert_eq!(coordinator.partner_state("Checkout"), Some(json!({ "items": 1 })));
}

#[test]
fn test_private_tenant_ignores_global_actions() {
    let coordinator = Coordinator::default();
    theme_store(&coordinator);
    cart_store(&coordinator, &[]);
    coordinator
        .dispatch_local_action("Checkout", &Action::new("ADD_ITEM"))
        .unwrap();

    coordinator
        .dispatch_global_action(PLATFORM, &Action::new("RESET_CART"))
        .unwrap();
    assert_eq!(coordinator.partner_state("Checkout"), Some(json!({ "items": 1 })));

    coordinator
        .register_global_actions("Checkout", vec!["RESET_CART".to_string()])
        .unwrap();
    coordinator
        .dispatch_global_action(PLATFORM, &Action::new("RESET_CART"))
        .unwrap();
    assert_eq!(coordinator.partner_state("Checkout"), Some(json!({ "items": 0 })));
}

#[test]
fn test_dispatch_action_runs_local_then_global() {
    let coordinator = Coordinator::default();
    let order = Arc::new(Mutex::new(Vec::new()));
    for tenant in [PLATFORM, "Checkout"] {
        let journal = order.clone();
        let name = tenant.to_string();
        coordinator
            .create_store(
                tenant,
                reducer(move |state, action| {
                    if action.action_type == "LOGOUT" {
                        journal.lock().unwrap().push(name.clone());
                    }
                    Ok(if state.is_null() { json!({}) } else { state.clone() })
                }),
                StoreOptions::default().with_global_actions([ALLOW_ALL]),
            )
            .unwrap();
    }

    coordinator
        .dispatch_action("Checkout", &Action::new("LOGOUT"))
        .unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["Checkout", PLATFORM]);
}

#[test]
fn test_failing_middleware_surfaces_dispatch_failure() {
    let collector = Arc::new(Collector::default());
    let coordinator = Coordinator::with_logger(CoordinatorConfig::default(), collector.clone());
    coordinator
        .create_store(
            "Checkout",
            reducer(|state, _| Ok(if state.is_null() { json!({}) } else { state.clone() })),
            StoreOptions::default().with_middleware(middleware("Guard", |store, action, next| {
                if action.action_type == "FORBIDDEN" {
                    return Err(globalstore::ContainerError::Middleware {
                        middleware: "Guard".to_string(),
                        action_type: action.action_type.clone(),
                        reason: format!("blocked in {}", store.name()),
                    });
                }
                next.run(action)
            })),
        )
        .unwrap();

    let err = coordinator
        .dispatch_local_action("Checkout", &Action::new("FORBIDDEN"))
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::DispatchFailure { ref tenant, .. } if tenant == "Checkout"));
    assert_eq!(collector.errors.lock().unwrap().len(), 1);
}

// =============================================================================
// Subscription Tests
// =============================================================================

#[test]
fn test_global_listener_sees_late_tenants() {
    let coordinator = Coordinator::default();
    let (seen, callback) = recording();
    let _sub = coordinator.subscribe_to_global_state("Observer", callback);

    cart_store(&coordinator, &[]);
    coordinator
        .dispatch_local_action("Checkout", &Action::new("ADD_ITEM"))
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], json!({ "Platform": {}, "Checkout": { "items": 1 } }));
}

#[test]
fn test_global_listener_fires_once_per_container_change() {
    let coordinator = Coordinator::default();
    theme_store(&coordinator);
    for tenant in ["Checkout", "Search", "Profile"] {
        coordinator
            .create_store(
                tenant,
                reducer(|state, action| {
                    Ok(match action.action_type.as_str() {
                        "LOGOUT" => json!({ "signedIn": false }),
                        _ if state.is_null() => json!({ "signedIn": true }),
                        _ => state.clone(),
                    })
                }),
                StoreOptions::default().with_global_actions(["LOGOUT"]),
            )
            .unwrap();
    }
    let (seen, callback) = recording();
    let _sub = coordinator.subscribe_to_global_state("Observer", callback);

    coordinator
        .dispatch_global_action(PLATFORM, &Action::new("LOGOUT"))
        .unwrap();

    let platform = json!({ "theme": "light" });
    let signed_in = json!({ "signedIn": true });
    let signed_out = json!({ "signedIn": false });
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            json!({ "Platform": platform, "Checkout": signed_out, "Search": signed_in, "Profile": signed_in }),
            json!({ "Platform": platform, "Checkout": signed_out, "Search": signed_out, "Profile": signed_in }),
            json!({ "Platform": platform, "Checkout": signed_out, "Search": signed_out, "Profile": signed_out }),
        ]
    );
}

#[test]
fn test_platform_subscription_survives_replacement() {
    let coordinator = Coordinator::default();
    theme_store(&coordinator);
    cart_store(&coordinator, &[]);
    let (seen, callback) = recording();
    let sub = coordinator
        .subscribe_to_platform_state("Checkout", callback)
        .unwrap();

    coordinator
        .create_store(
            PLATFORM,
            reducer(|state, action| {
                Ok(match action.action_type.as_str() {
                    "SET_THEME" => json!({ "theme": action.payload, "version": 2 }),
                    _ if state.is_null() => json!({ "theme": "light", "version": 2 }),
                    _ => state.clone(),
                })
            }),
            StoreOptions::default().replacing_container(),
        )
        .unwrap();
    assert_eq!(coordinator.global_actions(PLATFORM), Some(vec!["SET_THEME".to_string()]));

    coordinator
        .dispatch_global_action("Checkout", &Action::new("SET_THEME").with_payload("dark"))
        .unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![json!({ "theme": "dark", "version": 2 })]);

    sub.unsubscribe();
    coordinator
        .dispatch_global_action("Checkout", &Action::new("SET_THEME").with_payload("light"))
        .unwrap();
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn test_partner_subscription_after_registration() {
    let coordinator = Coordinator::default();
    theme_store(&coordinator);
    let (seen, callback) = recording();

    let err = coordinator
        .subscribe_to_partner_state(PLATFORM, "Checkout", |_| {})
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::UnregisteredPartner(_)));

    cart_store(&coordinator, &[]);
    let _sub = coordinator
        .subscribe_to_partner_state(PLATFORM, "Checkout", callback)
        .unwrap();
    coordinator
        .dispatch_local_action("Checkout", &Action::new("ADD_ITEM"))
        .unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![json!({ "items": 1 })]);
}

#[test]
fn test_local_mutation_observed_before_global() {
    let coordinator = Coordinator::default();
    theme_store(&coordinator);
    cart_store(&coordinator, &[]);
    let order = Arc::new(Mutex::new(Vec::new()));

    let own = order.clone();
    let _own = coordinator
        .subscribe("Checkout", move |_| own.lock().unwrap().push("Checkout"))
        .unwrap();
    let platform = order.clone();
    let _platform = coordinator
        .subscribe_to_platform_state("Checkout", move |_| platform.lock().unwrap().push(PLATFORM))
        .unwrap();

    coordinator
        .dispatch_action("Checkout", &Action::new("SET_THEME").with_payload("dark"))
        .unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["Checkout", PLATFORM]);
}

#[test]
fn test_listener_may_dispatch_reentrantly() {
    let coordinator = Coordinator::default();
    theme_store(&coordinator);
    cart_store(&coordinator, &[ALLOW_ALL]);

    let inner = coordinator.clone();
    let _sub = coordinator
        .subscribe_to_platform_state("Checkout", move |state| {
            if state["theme"] == "dark" {
                inner
                    .dispatch_local_action("Checkout", &Action::new("RESET_CART"))
                    .unwrap();
            }
        })
        .unwrap();
    coordinator
        .dispatch_local_action("Checkout", &Action::new("ADD_ITEM"))
        .unwrap();

    coordinator
        .dispatch_global_action("Checkout", &Action::new("SET_THEME").with_payload("dark"))
        .unwrap();
    assert_eq!(coordinator.partner_state("Checkout"), Some(json!({ "items": 0 })));
}

// =============================================================================
// Logging Tests
// =============================================================================

#[test]
fn test_jsonl_event_log_in_chain() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("logs").join("events.jsonl");
    let coordinator = Coordinator::new(CoordinatorConfig::debug());
    coordinator
        .add_logger(Arc::new(JsonlLogger::open(&path).unwrap()))
        .unwrap();

    cart_store(&coordinator, &[]);
    coordinator
        .dispatch_local_action("Checkout", &Action::new("ADD_ITEM"))
        .unwrap();
    let _ = coordinator.subscribe_to_partner_state("Checkout", "Search", |_| {});

    let records = read_records(&path).unwrap();
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert!(names.contains(&"GlobalStore.Store.Registered"));
    assert!(names.contains(&"Store.Action.Dispatch.Start"));
    assert!(names.contains(&"GlobalStore.Dispatch.Complete"));
    assert!(names.iter().any(|n| n.contains("Search")));
}

#[test]
fn test_duplicate_logger_rejected() {
    let coordinator = Coordinator::default();
    let collector = Arc::new(Collector::default());
    coordinator.add_logger(collector.clone()).unwrap();

    let err = coordinator.add_logger(collector.clone()).unwrap_err();
    assert!(matches!(err, CoordinatorError::LoggerCycle(_)));
    assert_eq!(coordinator.logger().identities(), vec!["TracingLogger", "Collector"]);
}

// =============================================================================
// Singleton Tests
// =============================================================================

#[test]
fn test_get_coordinator_first_call_wins() {
    let first = get_coordinator(Some(true), None);
    let second = get_coordinator(Some(false), Some(Arc::new(Collector::default())));

    assert!(first.is_debug_mode());
    assert!(second.is_debug_mode());
    assert_eq!(second.logger().identities(), vec!["TracingLogger"]);

    first
        .create_store(
            "Singleton",
            reducer(|state, _| Ok(if state.is_null() { json!({}) } else { state.clone() })),
            StoreOptions::default(),
        )
        .unwrap();
    assert!(second.tenants().contains(&"Singleton".to_string()));
}
