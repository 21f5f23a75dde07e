//! Tenancy error types.

use std::sync::Arc;

use thiserror::Error;

use crate::connector::DriverKind;
use crate::tenant::TenantId;

/// Result type for tenancy operations.
pub type TenancyResult<T> = std::result::Result<T, TenancyError>;

/// Tenant resolution and connection errors.
///
/// The enum is `Clone` so a single connection attempt can hand the same
/// outcome to every caller waiting on it; underlying causes are kept behind
/// `Arc` for that reason.
#[derive(Debug, Clone, Error)]
pub enum TenancyError {
    /// No tenant record exists for the key.
    #[error("Tenant not found: {0}")]
    NotFound(TenantId),

    /// The tenant exists but is deactivated.
    #[error("Tenant is inactive: {0}")]
    Inactive(TenantId),

    /// The tenant key failed format validation.
    #[error("Invalid tenant key: {0}")]
    InvalidKey(String),

    /// The backend connector could not open a connection.
    #[error("Connection failed for tenant '{tenant}': {source}")]
    ConnectionFailed {
        /// Tenant the connection was opened for.
        tenant: TenantId,
        /// Underlying driver error.
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// The connector does not serve the configured driver family.
    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(DriverKind),

    /// The tenant directory itself failed, as opposed to returning no record.
    #[error("Tenant directory unavailable: {source}")]
    Directory {
        /// Underlying directory error.
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The connection manager has been shut down.
    #[error("Connection manager is shut down")]
    Closed,
}

impl TenancyError {
    /// Check if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is an inactive tenant error.
    pub fn is_inactive(&self) -> bool {
        matches!(self, Self::Inactive(_))
    }

    /// Check if retrying the operation later could succeed.
    ///
    /// Connection and directory failures are transient; the other variants
    /// require an input or configuration change first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. } | Self::Directory { .. })
    }

    /// Convert to HTTP status code.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Inactive(_) => 403,
            Self::InvalidKey(_) => 400,
            Self::ConnectionFailed { .. } => 502,
            Self::Directory { .. } | Self::Closed => 503,
            Self::UnsupportedDriver(_) | Self::Config(_) => 500,
        }
    }
}
