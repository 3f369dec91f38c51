//! Provisioner error types.
//!
//! All errors in the `libprovisioner` crate are represented by the
//! [`ProvisionerError`] enum, which derives [`thiserror::Error`] for ergonomic
//! error handling and also implements [`Serialize`]/[`Deserialize`] so errors
//! can travel back to a remote orchestration loop over QUIC.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for provisioner operations.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum ProvisionerError {
    /// A required startup value is missing or malformed.  Fatal: the process
    /// must not start serving.
    #[error("invalid configuration {var}: {reason}")]
    Config {
        /// Name of the offending environment variable.
        var: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// A session with the storage appliance could not be opened.
    #[error("failed to connect to storage {endpoint}: {reason}")]
    Connect {
        /// Storage endpoint URL.
        endpoint: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// A folder operation on the storage appliance failed.
    #[error("failed to {op} '{path}': {reason}")]
    Backend {
        /// Operation that failed, e.g. `"ensure storage folder"`.
        op: String,
        /// Backend folder path the operation targeted.
        path: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// A QUIC / transport-level error.
    #[error("transport error: {0}")]
    Transport(String),

    /// The caller supplied an invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An unclassified internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProvisionerError {
    /// Create a [`ProvisionerError::Backend`] wrapping `e` with the operation
    /// and folder path it occurred on.
    pub fn backend<E: std::fmt::Display>(op: &str, path: &str, e: E) -> Self {
        Self::Backend {
            op: op.to_owned(),
            path: path.to_owned(),
            reason: e.to_string(),
        }
    }

    /// Create a [`ProvisionerError::Transport`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn transport<E: std::fmt::Display>(e: E) -> Self {
        Self::Transport(e.to_string())
    }

    /// Create a [`ProvisionerError::Internal`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }

    /// Re-wrap a session-level error with the adapter operation that hit it.
    ///
    /// The result is always a [`ProvisionerError::Backend`] for `op` on
    /// `path`.  A failed connect keeps its endpoint and reason in the message.
    pub fn context(self, op: &str, path: &str) -> Self {
        match self {
            Self::Backend { reason, .. } => Self::backend(op, path, reason),
            other => Self::backend(op, path, other),
        }
    }

    /// Whether the orchestration loop should retry the failed operation.
    ///
    /// Backend and transport failures are presumed transient.  Configuration
    /// and argument errors will fail the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Backend { .. } | Self::Transport(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_display() {
        let err = ProvisionerError::backend(
            "ensure storage folder",
            "/k8s/default_data_pvc-1",
            "permission denied",
        );
        assert_eq!(
            err.to_string(),
            "failed to ensure storage folder '/k8s/default_data_pvc-1': permission denied"
        );
    }

    #[test]
    fn context_rewraps_backend_reason() {
        let err = ProvisionerError::backend("createdir", "/k8s/a", "status 4")
            .context("ensure storage folder", "/k8s/a/b");
        assert_eq!(
            err,
            ProvisionerError::Backend {
                op: "ensure storage folder".into(),
                path: "/k8s/a/b".into(),
                reason: "status 4".into(),
            }
        );
    }

    #[test]
    fn context_wraps_connect_errors() {
        let err = ProvisionerError::Connect {
            endpoint: "https://nas".into(),
            reason: "timed out".into(),
        }
        .context("delete storage folder", "/k8s/x");
        assert!(err.is_retryable());
        assert_eq!(
            err.to_string(),
            "failed to delete storage folder '/k8s/x': failed to connect to storage https://nas: timed out"
        );
    }

    #[test]
    fn retry_classification() {
        assert!(ProvisionerError::backend("delete storage folder", "/x", "io").is_retryable());
        assert!(ProvisionerError::transport("reset").is_retryable());
        assert!(!ProvisionerError::InvalidArgument("empty name".into()).is_retryable());
        assert!(
            !ProvisionerError::Config {
                var: "QNAP_URL".into(),
                reason: "not set".into(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn error_serde_roundtrip() {
        let err = ProvisionerError::backend("delete storage folder", "/k8s/x", "busy");
        let json = serde_json::to_string(&err).expect("serialize");
        let de: ProvisionerError = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(err, de);
    }
}
