//! Reconciliation error types.
//!
//! Every collaborator the reconciler talks to reports failures through
//! [`SyncError`], so a pass can short-circuit on the first failure with `?`.

use thiserror::Error;

/// Errors raised by the plugin registry, dashboard catalog, and stores.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A referenced plugin, dashboard, or setting does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// The plugin dashboard catalog could not be read.
    #[error("plugin dashboard catalog unavailable: {0:#}")]
    CatalogUnavailable(#[source] anyhow::Error),

    /// A backing store (settings or dashboards) failed.
    #[error("store unavailable: {0:#}")]
    StoreUnavailable(#[source] anyhow::Error),

    /// A dashboard payload was rejected.
    #[error("invalid dashboard: {0}")]
    Validation(String),

    /// The caller cancelled the pass before the call completed.
    #[error("operation cancelled")]
    Cancelled,
}

impl SyncError {
    /// Create a not-found error for the given kind of entity.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True for [`SyncError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True for infrastructure failures that a later pass may not hit again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::CatalogUnavailable(_) | Self::StoreUnavailable(_))
    }

    /// Short machine-readable class, used as a metrics label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::CatalogUnavailable(_) => "catalog_unavailable",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Validation(_) => "validation",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Result type alias using SyncError.
pub type SyncResult<T> = Result<T, SyncError>;
