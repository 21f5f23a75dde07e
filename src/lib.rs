//! Multi-Tenant Connection Management
//!
//! Per-tenant resolution of backend connection metadata and a
//! lifecycle-managed cache of live connections: connections are opened
//! lazily on first use, shared while hot, closed after a configurable idle
//! period, and drained on shutdown. At most one connection exists per
//! tenant at any instant, even under concurrent access.
//!
//! # Features
//!
//! - 🔑 **Validated Tenant Keys** - Malformed keys are rejected before any lookup
//! - 🗄️ **Lazy Connections** - One live connection per tenant, opened on demand
//! - 🤝 **Single-Flight Creation** - Concurrent misses share one connection attempt
//! - ⏱️ **Idle Eviction** - Unused connections close after a configurable timeout
//! - 🚦 **Connection Bound** - Optional cap with queueing instead of rejection
//! - 🔌 **Pluggable Drivers** - Bring your own directory and connector
//! - 🧹 **Draining Shutdown** - Bounded-grace concurrent close of everything
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tenfold::prelude::*;
//!
//! // 1. Implement the directory over your tenant registry.
//! struct RegistryDirectory {
//!     pool: PgPool,
//! }
//!
//! #[async_trait]
//! impl TenantDirectory for RegistryDirectory {
//!     async fn find_tenant(&self, id: &TenantId) -> TenancyResult<Option<Tenant>> {
//!         // SELECT ... FROM tenants WHERE id = $1
//!     }
//! }
//!
//! // 2. Implement the connector for your driver.
//! struct PgConnector;
//!
//! #[async_trait]
//! impl BackendConnector for PgConnector {
//!     type Handle = PgPool;
//!
//!     async fn open(&self, tenant: &Tenant, options: &ConnectOptions) -> TenancyResult<PgPool> {
//!         // connect with options.connect_timeout
//!     }
//!
//!     async fn close(&self, handle: &PgPool) -> TenancyResult<()> {
//!         handle.close().await;
//!         Ok(())
//!     }
//! }
//!
//! // 3. Acquire per-tenant connections anywhere in the application.
//! let manager = TenantConnectionManager::new(
//!     Arc::new(RegistryDirectory { pool }),
//!     Arc::new(PgConnector),
//!     ManagerConfig::new(DriverKind::Postgres),
//! )?;
//!
//! let pool = manager.acquire("acme").await?;
//! let context = manager.acquire_context("acme").await?;
//! manager.shutdown().await;
//! ```

pub mod config;
pub mod connector;
pub mod directory;
pub mod error;
pub mod manager;
pub mod tenant;

pub use config::ManagerConfig;
pub use connector::{BackendConnector, ConnectOptions, DriverKind};
pub use directory::{InMemoryTenantDirectory, TenantDirectory};
pub use error::{TenancyError, TenancyResult};
pub use manager::{ManagerStats, TenantConnectionManager};
pub use tenant::{Tenant, TenantContext, TenantId};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::ManagerConfig;
    pub use crate::connector::{BackendConnector, ConnectOptions, DriverKind};
    pub use crate::directory::{InMemoryTenantDirectory, TenantDirectory};
    pub use crate::error::{TenancyError, TenancyResult};
    pub use crate::manager::{ManagerStats, TenantConnectionManager};
    pub use crate::tenant::{Tenant, TenantContext, TenantId};
}
