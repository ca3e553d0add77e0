//! Tenant registry
//!
//! The single table of tenant name -> container and global-action allow-list.
//! Insertion order is kept because it drives the fan-out order of global
//! dispatch and the key order of the aggregate state.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::container::Container;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::{ALLOW_ALL, PLATFORM};

/// One registered tenant
#[derive(Clone)]
pub struct TenantEntry {
    pub name: String,
    pub container: Arc<dyn Container>,
    pub global_actions: BTreeSet<String>,
}

impl TenantEntry {
    /// Whether other tenants may dispatch this action type here
    pub fn allows(&self, action_type: &str) -> bool {
        self.global_actions.contains(ALLOW_ALL) || self.global_actions.contains(action_type)
    }
}

impl std::fmt::Debug for TenantEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantEntry")
            .field("name", &self.name)
            .field("global_actions", &self.global_actions)
            .finish_non_exhaustive()
    }
}

/// Outcome of [`TenantRegistry::register`]
#[derive(Debug)]
pub enum Registration {
    /// The name was free
    Added,
    /// An existing entry was swapped out; the old entry is returned
    Replaced(TenantEntry),
}

/// Name -> entry table in registration order
#[derive(Default)]
pub struct TenantRegistry {
    entries: HashMap<String, TenantEntry>,
    order: Vec<String>,
}

impl TenantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tenant, or swap its container when `replace_container` is set
    ///
    /// `global_actions: None` means an empty allow-list for a new tenant and
    /// keeps the current allow-list on replacement.
    pub fn register(
        &mut self,
        name: &str,
        container: Arc<dyn Container>,
        global_actions: Option<Vec<String>>,
        replace_container: bool,
    ) -> CoordinatorResult<Registration> {
        debug!(%name, replace_container, "TenantRegistry::register: called");

        if let Some(existing) = self.entries.get_mut(name) {
            if !replace_container {
                return Err(CoordinatorError::DuplicateTenant(name.to_string()));
            }
            let global_actions = match global_actions {
                Some(actions) => actions.into_iter().collect(),
                None => existing.global_actions.clone(),
            };
            let old = std::mem::replace(
                existing,
                TenantEntry {
                    name: name.to_string(),
                    container,
                    global_actions,
                },
            );
            return Ok(Registration::Replaced(old));
        }

        self.entries.insert(
            name.to_string(),
            TenantEntry {
                name: name.to_string(),
                container,
                global_actions: global_actions.unwrap_or_default().into_iter().collect(),
            },
        );
        self.order.push(name.to_string());
        Ok(Registration::Added)
    }

    /// Replace a tenant's allow-list; an empty list clears it
    pub fn register_global_actions(&mut self, name: &str, actions: Vec<String>) -> CoordinatorResult<()> {
        debug!(%name, count = actions.len(), "TenantRegistry::register_global_actions: called");
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| CoordinatorError::UnknownTenant(name.to_string()))?;
        entry.global_actions = actions.into_iter().collect();
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&TenantEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<TenantEntry> {
        debug!(%name, "TenantRegistry::remove: called");
        let entry = self.entries.remove(name)?;
        self.order.retain(|n| n != name);
        Some(entry)
    }

    /// Names in fan-out order: Platform first, then registration order
    pub fn all_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.order.len());
        if self.entries.contains_key(PLATFORM) {
            names.push(PLATFORM.to_string());
        }
        names.extend(self.order.iter().filter(|n| n.as_str() != PLATFORM).cloned());
        names
    }

    /// Entries in fan-out order
    pub fn entries(&self) -> Vec<&TenantEntry> {
        self.all_names().iter().filter_map(|n| self.entries.get(n)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
