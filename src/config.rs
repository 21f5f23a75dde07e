//! Manager Configuration

use std::time::Duration;

use crate::connector::DriverKind;
use crate::error::{TenancyError, TenancyResult};

/// Configuration for [`TenantConnectionManager`](crate::TenantConnectionManager).
///
/// Validated once at manager construction; invalid settings fail fast with
/// [`TenancyError::Config`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tenfold::{DriverKind, ManagerConfig};
///
/// let config = ManagerConfig::new(DriverKind::Postgres)
///     .with_max_connections(50)
///     .with_idle_timeout(Duration::from_secs(120));
///
/// assert!(config.caching_enabled);
/// assert_eq!(config.max_connections, Some(50));
/// ```
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Driver family handed to the connector on every open.
    pub driver: DriverKind,

    /// Cache connections between requests. When disabled, every acquire
    /// opens a fresh connection and nothing is tracked: no entries, no idle
    /// timers, and the connection bound is not enforced.
    pub caching_enabled: bool,

    /// Upper bound on concurrently cached connections. Creations past the
    /// bound queue until capacity frees. `None` means unbounded.
    pub max_connections: Option<usize>,

    /// Deadline passed through to the connector for each open.
    pub connect_timeout: Duration,

    /// Inactivity window after which a cached connection is closed.
    pub idle_timeout: Duration,

    /// How long shutdown waits for each close before abandoning it.
    pub shutdown_grace: Duration,
}

impl ManagerConfig {
    /// Create a configuration with defaults for the given driver.
    pub fn new(driver: DriverKind) -> Self {
        Self {
            driver,
            caching_enabled: true,
            max_connections: Some(100),
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(300),
            shutdown_grace: Duration::from_secs(5),
        }
    }

    /// Enable or disable connection caching.
    pub fn with_caching_enabled(mut self, enabled: bool) -> Self {
        self.caching_enabled = enabled;
        self
    }

    /// Set the maximum number of cached connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = Some(max);
        self
    }

    /// Remove the connection bound entirely.
    pub fn without_connection_limit(mut self) -> Self {
        self.max_connections = None;
        self
    }

    /// Set the connect timeout passed through to the connector.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the idle timeout after which cached connections are closed.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the per-connection grace period for shutdown closes.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub(crate) fn validate(&self) -> TenancyResult<()> {
        if self.max_connections == Some(0) {
            return Err(TenancyError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.idle_timeout.is_zero() {
            return Err(TenancyError::Config(
                "idle_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new(DriverKind::Postgres)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.driver, DriverKind::Postgres);
        assert!(config.caching_enabled);
        assert_eq!(config.max_connections, Some(100));
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.idle_timeout, Duration::from_secs(300));
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
    }

    #[test]
    fn test_config_builder() {
        let config = ManagerConfig::new(DriverKind::MongoDb)
            .with_caching_enabled(false)
            .with_max_connections(10)
            .with_connect_timeout(Duration::from_secs(5))
            .with_idle_timeout(Duration::from_millis(100))
            .with_shutdown_grace(Duration::from_secs(1));

        assert_eq!(config.driver, DriverKind::MongoDb);
        assert!(!config.caching_enabled);
        assert_eq!(config.max_connections, Some(10));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Duration::from_millis(100));
        assert_eq!(config.shutdown_grace, Duration::from_secs(1));
    }

    #[test]
    fn test_config_validation() {
        assert!(ManagerConfig::default().validate().is_ok());
        assert!(
            ManagerConfig::default()
                .without_connection_limit()
                .validate()
                .is_ok()
        );

        let zero_cap = ManagerConfig::default().with_max_connections(0);
        assert!(matches!(zero_cap.validate(), Err(TenancyError::Config(_))));

        let zero_idle = ManagerConfig::default().with_idle_timeout(Duration::ZERO);
        assert!(zero_idle.validate().is_err());
    }
}
