//! Tenant Model
//!
//! Validated tenant keys, connection metadata, and the request-scoped
//! context pairing a tenant with its live connection.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{TenancyError, TenancyResult};

/// Validated tenant identifier.
///
/// Keys are 1 to 100 characters of ASCII alphanumerics, hyphens and
/// underscores. Validation happens at construction, so an invalid key is
/// rejected before it ever reaches a directory or connector.
///
/// # Examples
///
/// ```
/// use tenfold::TenantId;
///
/// let id = TenantId::new("acme-corp").unwrap();
/// assert_eq!(id.as_str(), "acme-corp");
///
/// assert!(TenantId::new("acme corp").is_err());
/// assert!(TenantId::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Maximum key length in characters.
    pub const MAX_LENGTH: usize = 100;

    /// Parse and validate a tenant key.
    pub fn new(key: impl AsRef<str>) -> TenancyResult<Self> {
        let key = key.as_ref();
        if key.is_empty() || key.len() > Self::MAX_LENGTH {
            return Err(TenancyError::InvalidKey(format!(
                "length must be 1-{} characters, got {}",
                Self::MAX_LENGTH,
                key.len()
            )));
        }
        if let Some(c) = key
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
        {
            return Err(TenancyError::InvalidKey(format!(
                "unexpected character '{}' (allowed: ASCII alphanumerics, '-' and '_')",
                c
            )));
        }
        Ok(Self(key.to_string()))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for TenantId {
    type Err = TenancyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TenantId {
    type Error = TenancyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

/// Tenant connection metadata.
///
/// Owned by the tenant directory; the connection manager treats it as an
/// immutable snapshot per lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tenant {
    /// Unique tenant identifier.
    pub id: TenantId,

    /// Human-readable tenant name.
    pub display_name: String,

    /// Backend host.
    pub host: String,

    /// Backend port. `None` means the driver default.
    pub port: Option<u16>,

    /// Username for the backend.
    pub username: Option<String>,

    /// Password for the backend.
    pub password: Option<String>,

    /// Database name (for database-per-tenant).
    pub database: Option<String>,

    /// Schema name (for schema-per-tenant).
    pub schema: Option<String>,

    /// Whether the tenant is active. Inactive tenants are never connected.
    pub active: bool,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,

    /// Additional metadata.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Tenant {
    /// Create a new active tenant.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenfold::{Tenant, TenantId};
    ///
    /// let tenant = Tenant::new(TenantId::new("acme").unwrap(), "Acme Corp");
    /// assert!(tenant.active);
    /// assert_eq!(tenant.host, "localhost");
    /// ```
    pub fn new(id: TenantId, display_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            display_name: display_name.into(),
            host: "localhost".to_string(),
            port: None,
            username: None,
            password: None,
            database: None,
            schema: None,
            active: true,
            created_at: now,
            updated_at: now,
            metadata: HashMap::new(),
        }
    }

    /// Set backend host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set backend port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set backend credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set database name.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set schema name.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Set active status.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Add metadata.
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Request-scoped view pairing tenant metadata with its live connection.
///
/// Contexts are assembled per lookup and never cached; the handle they carry
/// is the shared cached connection.
pub struct TenantContext<H> {
    tenant: Tenant,
    handle: Arc<H>,
}

impl<H> TenantContext<H> {
    /// Create a context from a metadata snapshot and a live handle.
    pub fn new(tenant: Tenant, handle: Arc<H>) -> Self {
        Self { tenant, handle }
    }

    /// Tenant metadata snapshot.
    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    /// Tenant identifier.
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant.id
    }

    /// Live connection handle.
    pub fn handle(&self) -> &Arc<H> {
        &self.handle
    }

    /// Additional tenant metadata.
    pub fn metadata(&self) -> &HashMap<String, serde_json::Value> {
        &self.tenant.metadata
    }
}

impl<H> Clone for TenantContext<H> {
    fn clone(&self) -> Self {
        Self {
            tenant: self.tenant.clone(),
            handle: Arc::clone(&self.handle),
        }
    }
}

impl<H> fmt::Debug for TenantContext<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantContext")
            .field("tenant", &self.tenant.id)
            .finish_non_exhaustive()
    }
}
