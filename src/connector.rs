//! Backend Connector
//!
//! The driver seam: opening and closing per-tenant backend connections.
//! Applications implement [`BackendConnector`] once for their driver of
//! choice and the manager stays agnostic of the concrete connection type.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{TenancyError, TenancyResult};
use crate::tenant::Tenant;

/// Supported backend driver families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// PostgreSQL wire protocol.
    Postgres,
    /// MySQL wire protocol.
    MySql,
    /// MongoDB document store.
    MongoDb,
}

impl DriverKind {
    /// Conventional default port for the driver.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenfold::DriverKind;
    ///
    /// assert_eq!(DriverKind::Postgres.default_port(), 5432);
    /// ```
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Postgres => 5432,
            Self::MySql => 3306,
            Self::MongoDb => 27017,
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::MongoDb => "mongodb",
        };
        f.write_str(name)
    }
}

impl FromStr for DriverKind {
    type Err = TenancyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" => Ok(Self::MySql),
            "mongodb" | "mongo" => Ok(Self::MongoDb),
            other => Err(TenancyError::Config(format!("Unknown driver: {}", other))),
        }
    }
}

/// Options passed through to the connector on every open.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Driver family the manager was configured for.
    pub driver: DriverKind,

    /// Deadline the driver should apply to connection establishment. The
    /// manager passes it through without enforcing it.
    pub connect_timeout: Duration,
}

/// Driver capability implemented by the embedding application.
///
/// `open` must return a fully usable handle or fail; the manager never
/// stores half-open connections. `close` is best-effort: the manager logs
/// failures and drops the handle regardless.
///
/// # Examples
///
/// ```rust,ignore
/// struct PgConnector {
///     pools: PoolBuilder,
/// }
///
/// #[async_trait]
/// impl BackendConnector for PgConnector {
///     type Handle = PgPool;
///
///     async fn open(&self, tenant: &Tenant, options: &ConnectOptions) -> TenancyResult<PgPool> {
///         self.pools.connect(tenant, options.connect_timeout).await
///     }
///
///     async fn close(&self, handle: &PgPool) -> TenancyResult<()> {
///         handle.close().await;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait BackendConnector: Send + Sync + 'static {
    /// Live connection type (a pool, client or socket wrapper).
    type Handle: Send + Sync + 'static;

    /// Open a connection to the tenant's backend.
    async fn open(
        &self,
        tenant: &Tenant,
        options: &ConnectOptions,
    ) -> TenancyResult<Self::Handle>;

    /// Close a previously opened handle.
    async fn close(&self, handle: &Self::Handle) -> TenancyResult<()>;

    /// Whether this connector serves the given driver family.
    ///
    /// Checked once at manager construction so a misconfigured driver fails
    /// fast instead of on the first request.
    fn supports(&self, driver: DriverKind) -> bool {
        let _ = driver;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_kind_display() {
        assert_eq!(DriverKind::Postgres.to_string(), "postgres");
        assert_eq!(DriverKind::MySql.to_string(), "mysql");
        assert_eq!(DriverKind::MongoDb.to_string(), "mongodb");
    }

    #[test]
    fn test_driver_kind_from_str() {
        assert_eq!(
            "postgres".parse::<DriverKind>().unwrap(),
            DriverKind::Postgres
        );
        assert_eq!(
            "PostgreSQL".parse::<DriverKind>().unwrap(),
            DriverKind::Postgres
        );
        assert_eq!("mysql".parse::<DriverKind>().unwrap(), DriverKind::MySql);
        assert_eq!("mongo".parse::<DriverKind>().unwrap(), DriverKind::MongoDb);
        assert!("oracle".parse::<DriverKind>().is_err());
    }

    #[test]
    fn test_driver_kind_default_port() {
        assert_eq!(DriverKind::Postgres.default_port(), 5432);
        assert_eq!(DriverKind::MySql.default_port(), 3306);
        assert_eq!(DriverKind::MongoDb.default_port(), 27017);
    }

    #[test]
    fn test_driver_kind_serde() {
        let json = serde_json::to_string(&DriverKind::MongoDb).unwrap();
        assert_eq!(json, "\"mongodb\"");
        let kind: DriverKind = serde_json::from_str("\"mysql\"").unwrap();
        assert_eq!(kind, DriverKind::MySql);
    }
}
