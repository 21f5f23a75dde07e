//! Tenant Directory
//!
//! The lookup seam between the connection manager and wherever tenant
//! records actually live (a control-plane database, a registry service, a
//! config file).

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::TenancyResult;
use crate::tenant::{Tenant, TenantId};

/// Source of tenant connection metadata.
///
/// Returning `Ok(None)` means the tenant does not exist. Infrastructure
/// failures should surface as errors so the manager can report them
/// distinctly from a missing record.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Look up a tenant by id.
    async fn find_tenant(&self, id: &TenantId) -> TenancyResult<Option<Tenant>>;
}

/// In-memory tenant directory.
///
/// Reference implementation for tests and single-process deployments.
///
/// # Examples
///
/// ```
/// use tenfold::{InMemoryTenantDirectory, Tenant, TenantId};
///
/// let directory = InMemoryTenantDirectory::new();
/// directory.insert(Tenant::new(TenantId::new("acme").unwrap(), "Acme Corp"));
/// assert_eq!(directory.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryTenantDirectory {
    tenants: RwLock<HashMap<TenantId, Tenant>>,
}

impl InMemoryTenantDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a tenant record.
    pub fn insert(&self, tenant: Tenant) {
        self.tenants.write().insert(tenant.id.clone(), tenant);
    }

    /// Remove a tenant record.
    pub fn remove(&self, id: &TenantId) -> Option<Tenant> {
        self.tenants.write().remove(id)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.tenants.read().len()
    }

    /// Check if the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.tenants.read().is_empty()
    }
}

#[async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn find_tenant(&self, id: &TenantId) -> TenancyResult<Option<Tenant>> {
        Ok(self.tenants.read().get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(key: &str) -> TenantId {
        TenantId::new(key).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let directory = InMemoryTenantDirectory::new();
        directory.insert(Tenant::new(id("acme"), "Acme Corp"));

        let found = directory.find_tenant(&id("acme")).await.unwrap();
        assert_eq!(found.unwrap().display_name, "Acme Corp");

        let missing = directory.find_tenant(&id("globex")).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_insert_replaces() {
        let directory = InMemoryTenantDirectory::new();
        directory.insert(Tenant::new(id("acme"), "Acme Corp"));
        directory.insert(Tenant::new(id("acme"), "Acme Inc"));

        assert_eq!(directory.len(), 1);
        let found = directory.find_tenant(&id("acme")).await.unwrap();
        assert_eq!(found.unwrap().display_name, "Acme Inc");
    }

    #[tokio::test]
    async fn test_remove() {
        let directory = InMemoryTenantDirectory::new();
        assert!(directory.is_empty());

        directory.insert(Tenant::new(id("acme"), "Acme Corp"));
        let removed = directory.remove(&id("acme"));
        assert!(removed.is_some());
        assert!(directory.is_empty());

        assert!(directory.remove(&id("acme")).is_none());
    }
}
