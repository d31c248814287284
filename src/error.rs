//! Error types for the sharding proxy core
//!
//! This module provides detailed error types for backend execution and
//! routing, plus the MySQL-compatible error codes the session surfaces to
//! clients.

use crate::types::ShardId;
use thiserror::Error;

/// MySQL-compatible error codes surfaced by the session
///
/// Only the codes the core itself produces are listed; shard-reported errors
/// carry whatever code the backend returned.
pub mod code {
    /// Generic error, used for transaction-interrupted rejections
    pub const ER_YES: u16 = 1003;

    /// Statement could not be parsed or routed to any shard
    pub const ER_PARSE_ERROR: u16 = 1064;

    /// Statement was cancelled mid-flight (client kill)
    pub const ER_QUERY_INTERRUPTED: u16 = 1317;

    /// Backend connection closed while a statement was outstanding
    pub const ER_NET_READ_ERROR: u16 = 1158;

    /// Statement deadline elapsed before all shards resolved
    pub const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
}

/// Errors produced by backend connections and the connection provider
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum BackendError {
    /// The shard executed the statement and reported an error
    #[error("shard '{shard}' reported error {code}: {message}")]
    Shard {
        shard: ShardId,
        code: u16,
        message: String,
    },

    /// No physical connection could be leased for the shard
    #[error("no connection available for shard '{shard}': {reason}")]
    Acquire { shard: ShardId, reason: String },

    /// The physical connection closed while a statement was outstanding
    #[error("connection to shard '{shard}' closed mid-statement")]
    ConnectionClosed { shard: ShardId },

    /// The shard did not resolve before the statement deadline
    #[error("shard '{shard}' did not respond before the statement deadline")]
    Timeout { shard: ShardId },
}

impl BackendError {
    /// The error code written to the client when this failure is surfaced
    #[must_use]
    pub fn error_code(&self) -> u16 {
        match self {
            Self::Shard { code, .. } => *code,
            Self::Acquire { .. } => code::ER_YES,
            Self::ConnectionClosed { .. } => code::ER_NET_READ_ERROR,
            Self::Timeout { .. } => code::ER_LOCK_WAIT_TIMEOUT,
        }
    }

    /// Check if this error means the physical connection is unusable
    ///
    /// Shard-reported errors leave the connection healthy; closed or
    /// unleasable connections do not.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::Acquire { .. } | Self::ConnectionClosed { .. })
    }

    /// Get the appropriate log level for this error
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        match self {
            // Shard errors are statement-level; the client decides what to do
            Self::Shard { .. } => tracing::Level::DEBUG,
            // Timeouts might be transient
            Self::Timeout { .. } => tracing::Level::WARN,
            // Lost or unleasable connections need attention
            Self::Acquire { .. } | Self::ConnectionClosed { .. } => tracing::Level::WARN,
        }
    }
}

/// Routing failure: the router could not turn a statement into a plan
///
/// The session treats this exactly like a plan with zero nodes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("routing failed: {message}")]
pub struct RouteError {
    message: String,
}

impl RouteError {
    /// Create a routing error with the given reason
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The routing failure reason
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_error_display() {
        let err = BackendError::Shard {
            shard: ShardId::new("shard-0"),
            code: 1062,
            message: "Duplicate entry".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("shard-0"));
        assert!(msg.contains("1062"));
        assert!(msg.contains("Duplicate entry"));
    }

    #[test]
    fn test_shard_error_keeps_backend_code() {
        let err = BackendError::Shard {
            shard: ShardId::new("shard-0"),
            code: 1062,
            message: "Duplicate entry".to_string(),
        };
        assert_eq!(err.error_code(), 1062);
    }

    #[test]
    fn test_acquire_error_code() {
        let err = BackendError::Acquire {
            shard: ShardId::new("shard-1"),
            reason: "pool exhausted".to_string(),
        };
        assert_eq!(err.error_code(), code::ER_YES);
        assert!(err.is_connection_error());
    }

    #[test]
    fn test_connection_closed_error_code() {
        let err = BackendError::ConnectionClosed {
            shard: ShardId::new("shard-2"),
        };
        assert_eq!(err.error_code(), code::ER_NET_READ_ERROR);
        assert!(err.is_connection_error());
    }

    #[test]
    fn test_timeout_error_code() {
        let err = BackendError::Timeout {
            shard: ShardId::new("shard-2"),
        };
        assert_eq!(err.error_code(), code::ER_LOCK_WAIT_TIMEOUT);
        assert!(!err.is_connection_error());
    }

    #[test]
    fn test_log_level() {
        let shard_err = BackendError::Shard {
            shard: ShardId::new("s"),
            code: 1064,
            message: "bad".to_string(),
        };
        assert_eq!(shard_err.log_level(), tracing::Level::DEBUG);

        let closed = BackendError::ConnectionClosed {
            shard: ShardId::new("s"),
        };
        assert_eq!(closed.log_level(), tracing::Level::WARN);
    }

    #[test]
    fn test_route_error_display() {
        let err = RouteError::new("no shard matches partition key");
        assert!(err.to_string().contains("routing failed"));
        assert_eq!(err.message(), "no shard matches partition key");
    }
}
