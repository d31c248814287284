//! Core identifier types used throughout the proxy core
//!
//! This module provides the value-typed identifiers the session layer keys on.

use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for client connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Generate a new unique client ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one logical shard node
///
/// This is the key of the session's connection binding table, so it hashes
/// and compares by value (the shard name), never by identity. Cloning is
/// cheap: the name is reference-counted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId(Arc<str>);

impl ShardId {
    /// Create a shard identity from a shard name
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Get the shard name
    #[must_use]
    #[inline]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ShardId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl std::fmt::Display for ShardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generation tag for one in-flight statement
///
/// Every statement a session executes gets a fresh `StatementId`. Backend
/// callbacks carry the tag of the statement that dispatched them; events
/// whose tag does not match the statement currently in flight are stale and
/// must be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatementId(u64);

impl StatementId {
    /// Create a statement ID from a raw sequence number
    #[must_use]
    #[inline]
    pub const fn from_seq(seq: u64) -> Self {
        Self(seq)
    }

    /// Get the underlying sequence number
    #[must_use]
    #[inline]
    pub fn as_seq(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for StatementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Statement({})", self.0)
    }
}
