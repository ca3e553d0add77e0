//! Subscription bookkeeping
//!
//! Listeners are registered at two granularities: one tenant (which covers the
//! Platform and partner subscriptions) or the global aggregate. The manager
//! remembers every registration so it can re-wire listeners when a tenant's
//! container is replaced, attach global listeners to tenants registered later,
//! and detach everything when a tenant goes away.
//!
//! ```text
//! subscribe_to_global_state(cb)
//!     │
//!     ├──► Platform container ── change ──► cb(aggregate)
//!     ├──► Checkout container ── change ──► cb(aggregate)
//!     └──► (registered later) ── change ──► cb(aggregate)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::container::{Container, ContainerListener, ListenerId};

/// Callback receiving a state snapshot
pub type StateListener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Produces the aggregate state delivered to global listeners
pub type AggregateFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// Identifier of a coordinator-level subscription
pub type SubscriptionId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    Tenant(String),
    Global,
}

struct Attachment {
    tenant: String,
    container: Weak<dyn Container>,
    listener: ListenerId,
}

struct ListenerEntry {
    id: SubscriptionId,
    source: String,
    scope: Scope,
    callback: StateListener,
    attachments: Vec<Attachment>,
}

impl ListenerEntry {
    fn detach_all(&mut self) {
        for attachment in self.attachments.drain(..) {
            if let Some(container) = attachment.container.upgrade() {
                container.unsubscribe(attachment.listener);
            }
        }
    }

    fn detach_tenant(&mut self, tenant: &str) {
        self.attachments.retain(|attachment| {
            if attachment.tenant != tenant {
                return true;
            }
            if let Some(container) = attachment.container.upgrade() {
                container.unsubscribe(attachment.listener);
            }
            false
        });
    }
}

/// Tracks tenant-scoped and global listeners and their container attachments
pub struct SubscriptionManager {
    entries: Vec<ListenerEntry>,
    aggregate: AggregateFn,
}

impl SubscriptionManager {
    pub fn new(aggregate: AggregateFn) -> Self {
        Self {
            entries: Vec::new(),
            aggregate,
        }
    }

    /// Listener on one tenant, invoked with that tenant's state on every change
    pub fn add_tenant_listener(
        &mut self,
        source: &str,
        tenant: &str,
        container: &Arc<dyn Container>,
        callback: StateListener,
    ) -> SubscriptionId {
        let id = Uuid::now_v7();
        debug!(%id, %source, %tenant, "SubscriptionManager::add_tenant_listener: called");

        let mut entry = ListenerEntry {
            id,
            source: source.to_string(),
            scope: Scope::Tenant(tenant.to_string()),
            callback,
            attachments: Vec::new(),
        };
        self.attach(&mut entry, tenant, container);
        self.entries.push(entry);
        id
    }

    /// Listener on every container, current and future, invoked with the aggregate state
    pub fn add_global_listener(
        &mut self,
        source: &str,
        containers: &[(String, Arc<dyn Container>)],
        callback: StateListener,
    ) -> SubscriptionId {
        let id = Uuid::now_v7();
        debug!(%id, %source, containers = containers.len(), "SubscriptionManager::add_global_listener: called");

        let mut entry = ListenerEntry {
            id,
            source: source.to_string(),
            scope: Scope::Global,
            callback,
            attachments: Vec::new(),
        };
        for (tenant, container) in containers {
            self.attach(&mut entry, tenant, container);
        }
        self.entries.push(entry);
        id
    }

    /// Drop a subscription; unknown ids are a no-op returning `false`
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let Some(pos) = self.entries.iter().position(|e| e.id == id) else {
            debug!(%id, "SubscriptionManager::remove: unknown subscription");
            return false;
        };
        let mut entry = self.entries.remove(pos);
        debug!(%id, source = %entry.source, "SubscriptionManager::remove: called");
        entry.detach_all();
        true
    }

    /// Wire every global listener into a newly registered container
    pub fn on_container_added(&mut self, tenant: &str, container: &Arc<dyn Container>) {
        debug!(%tenant, "SubscriptionManager::on_container_added: called");
        let mut entries = std::mem::take(&mut self.entries);
        for entry in entries.iter_mut().filter(|e| e.scope == Scope::Global) {
            self.attach(entry, tenant, container);
        }
        self.entries = entries;
    }

    /// Move every listener of `tenant` from its old container to the new one
    ///
    /// All listeners are detached from the old container before any is attached
    /// to the new one.
    pub fn on_container_replaced(&mut self, tenant: &str, new: &Arc<dyn Container>) {
        debug!(%tenant, "SubscriptionManager::on_container_replaced: called");
        let mut entries = std::mem::take(&mut self.entries);

        let mut moved = Vec::new();
        for (idx, entry) in entries.iter_mut().enumerate() {
            let targets_tenant = entry.scope == Scope::Tenant(tenant.to_string());
            let had_attachment = entry.attachments.iter().any(|a| a.tenant == tenant);
            if targets_tenant || had_attachment {
                entry.detach_tenant(tenant);
                moved.push(idx);
            }
        }
        for idx in moved {
            self.attach(&mut entries[idx], tenant, new);
        }

        self.entries = entries;
    }

    /// Detach everything from a removed tenant's container
    ///
    /// Subscriptions aimed at that tenant are dropped; their unsubscribe
    /// handles become no-ops. Global subscriptions stay.
    pub fn on_container_removed(&mut self, tenant: &str) {
        debug!(%tenant, "SubscriptionManager::on_container_removed: called");
        for entry in self.entries.iter_mut() {
            entry.detach_tenant(tenant);
        }
        let scope = Scope::Tenant(tenant.to_string());
        self.entries.retain(|e| e.scope != scope);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of subscriptions created by a given source
    pub fn count_for_source(&self, source: &str) -> usize {
        self.entries.iter().filter(|e| e.source == source).count()
    }

    fn attach(&self, entry: &mut ListenerEntry, tenant: &str, container: &Arc<dyn Container>) {
        let callback = entry.callback.clone();
        let listener: ContainerListener = match entry.scope {
            Scope::Tenant(_) => {
                let weak = Arc::downgrade(container);
                Arc::new(move || {
                    if let Some(container) = weak.upgrade() {
                        callback(&container.state());
                    }
                })
            }
            Scope::Global => {
                let aggregate = self.aggregate.clone();
                Arc::new(move || callback(&aggregate()))
            }
        };

        let listener = container.subscribe(listener);
        entry.attachments.push(Attachment {
            tenant: tenant.to_string(),
            container: Arc::downgrade(container),
            listener,
        });
    }
}

/// Handle returned by every subscribe call
///
/// Calling [`Unsubscribe::unsubscribe`] more than once, or after the tenant's
/// container was replaced or removed, is a no-op.
pub struct Unsubscribe {
    id: SubscriptionId,
    manager: Weak<Mutex<SubscriptionManager>>,
    done: AtomicBool,
}

impl Unsubscribe {
    pub(crate) fn new(id: SubscriptionId, manager: &Arc<Mutex<SubscriptionManager>>) -> Self {
        Self {
            id,
            manager: Arc::downgrade(manager),
            done: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn unsubscribe(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            debug!(id = %self.id, "Unsubscribe::unsubscribe: already unsubscribed");
            return;
        }
        if let Some(manager) = self.manager.upgrade() {
            manager.lock().remove(self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        !self.done.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::container::{Store, reducer};
    use serde_json::json;

    fn counter(name: &str) -> Arc<dyn Container> {
        Store::new(
            name,
            reducer(|state, action| {
                let n = state.get("n").and_then(Value::as_i64).unwrap_or(0);
                Ok(match action.action_type.as_str() {
                    "INC" => json!({ "n": n + 1 }),
                    _ => json!({ "n": n }),
                })
            }),
            vec![],
        )
        .unwrap()
    }

    fn recording() -> (StateListener, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: StateListener = Arc::new(move |state: &Value| sink.lock().push(state.clone()));
        (callback, seen)
    }

    fn manager() -> SubscriptionManager {
        SubscriptionManager::new(Arc::new(|| json!({"aggregate": true})))
    }

    #[test]
    fn test_tenant_listener_receives_state() {
        let mut manager = manager();
        let container = counter("A");
        let (cb, seen) = recording();
        manager.add_tenant_listener("B", "A", &container, cb);

        container.dispatch(&Action::new("INC")).unwrap();
        assert_eq!(*seen.lock(), vec![json!({"n": 1})]);
    }

    #[test]
    fn test_global_listener_follows_new_containers() {
        let mut manager = manager();
        let a = counter("A");
        let (cb, seen) = recording();
        manager.add_global_listener("A", &[("A".to_string(), a.clone())], cb);

        let b = counter("B");
        manager.on_container_added("B", &b);

        a.dispatch(&Action::new("INC")).unwrap();
        b.dispatch(&Action::new("INC")).unwrap();
        assert_eq!(seen.lock().len(), 2);
        assert_eq!(seen.lock()[0], json!({"aggregate": true}));
    }

    #[test]
    fn test_remove_detaches() {
        let mut manager = manager();
        let container = counter("A");
        let (cb, seen) = recording();
        let id = manager.add_tenant_listener("A", "A", &container, cb);

        assert!(manager.remove(id));
        assert!(!manager.remove(id));
        container.dispatch(&Action::new("INC")).unwrap();
        assert!(seen.lock().is_empty());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_replace_moves_listeners() {
        let mut manager = manager();
        let old = counter("A");
        let (cb, seen) = recording();
        manager.add_tenant_listener("A", "A", &old, cb);
        let (global_cb, global_seen) = recording();
        manager.add_global_listener("B", &[("A".to_string(), old.clone())], global_cb);

        let new = counter("A");
        manager.on_container_replaced("A", &new);

        old.dispatch(&Action::new("INC")).unwrap();
        assert!(seen.lock().is_empty());
        assert!(global_seen.lock().is_empty());

        new.dispatch(&Action::new("INC")).unwrap();
        assert_eq!(*seen.lock(), vec![json!({"n": 1})]);
        assert_eq!(global_seen.lock().len(), 1);
    }

    #[test]
    fn test_removed_tenant_drops_partner_listeners() {
        let mut manager = manager();
        let a = counter("A");
        let (cb, _) = recording();
        let partner = manager.add_tenant_listener("B", "A", &a, cb);
        let (global_cb, _) = recording();
        manager.add_global_listener("B", &[("A".to_string(), a.clone())], global_cb);

        manager.on_container_removed("A");

        assert_eq!(manager.len(), 1);
        assert!(!manager.remove(partner));
        a.dispatch(&Action::new("INC")).unwrap();
    }

    #[test]
    fn test_unsubscribe_handle_is_idempotent() {
        let manager = Arc::new(Mutex::new(manager()));
        let container = counter("A");
        let (cb, seen) = recording();
        let id = manager.lock().add_tenant_listener("A", "A", &container, cb);
        let handle = Unsubscribe::new(id, &manager);

        handle.unsubscribe();
        handle.unsubscribe();
        assert!(!handle.is_active());

        container.dispatch(&Action::new("INC")).unwrap();
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_duplicate_callbacks_are_distinct() {
        let mut manager = manager();
        let container = counter("A");
        let (cb, seen) = recording();
        let first = manager.add_tenant_listener("A", "A", &container, cb.clone());
        manager.add_tenant_listener("A", "A", &container, cb);
        assert_eq!(manager.count_for_source("A"), 2);

        manager.remove(first);
        container.dispatch(&Action::new("INC")).unwrap();
        assert_eq!(seen.lock().len(), 1);
    }
}
