//! Constants used throughout the proxy core
//!
//! This module centralizes magic numbers and default values
//! to improve maintainability and reduce duplication.

use std::time::Duration;

/// Timeout constants
pub mod timeout {
    use super::Duration;

    /// Default deadline for one statement to resolve across all its shards
    ///
    /// Generous enough for cross-shard scans; a statement that outlives it
    /// is abandoned and surfaced as a lock-wait timeout.
    pub const STATEMENT: Duration = Duration::from_secs(30);
}

/// Session limits
pub mod limits {
    /// Default cap on how many shards one statement may fan out to
    ///
    /// A plan wider than this almost always means a missing sharding key;
    /// rejecting it protects the backends from accidental full-cluster scans.
    pub const MAX_FANOUT: usize = 64;

    /// Longest transaction-interrupt reason kept verbatim
    ///
    /// Backend error text is operator-controlled but unbounded; anything
    /// longer is truncated before being stored on the session.
    pub const MAX_INTERRUPT_REASON: usize = 1024;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_timeout_is_positive() {
        assert!(timeout::STATEMENT > Duration::ZERO);
    }

    #[test]
    fn test_fanout_limit_sane() {
        assert!(limits::MAX_FANOUT >= 2);
    }
}
