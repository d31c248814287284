//! Statement executors and the response-handler contract
//!
//! Exactly one executor is active per statement. The single-node executor
//! relays one shard's reply verbatim; the multi-node executor joins a
//! fan-out. Both are pure state machines fed by the session's drive loop —
//! backend I/O never touches them directly, it goes through
//! [`ResponseSink`](crate::backend::ResponseSink) and the per-statement
//! event channel.

pub mod multi;
pub mod single;

pub use multi::MultiNodeHandler;
pub use single::SingleNodeHandler;

use crate::error::BackendError;
use crate::reply::StatementReply;
use crate::types::ShardId;

/// The one client-facing resolution of a statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementOutcome {
    /// Statement succeeded; reply to relay or aggregate result
    Reply(StatementReply),
    /// Statement failed; a single error write carrying this code and message
    Failed { code: u16, message: String },
    /// Statement was cancelled mid-flight
    Cancelled,
}

/// Contract both executors implement: receive per-shard resolutions
///
/// Each dispatched shard must resolve exactly once. Duplicate or
/// unknown-shard deliveries are dropped, never applied.
pub trait ResponseHandler {
    /// The shard returned a reply
    fn handle_reply(&mut self, shard: &ShardId, reply: StatementReply);

    /// The shard (or its connection) reported an error
    fn handle_error(&mut self, shard: &ShardId, error: BackendError);

    /// The shard's connection closed without a reply
    fn handle_closed(&mut self, shard: &ShardId);

    /// Join condition: every dispatched shard has resolved
    fn is_complete(&self) -> bool;

    /// Shards that have not resolved yet, in dispatch order
    fn pending_shards(&self) -> Vec<ShardId>;

    /// Produce the single client-facing outcome; only valid once complete
    fn into_outcome(self) -> StatementOutcome;
}

/// The executor active for the current statement
///
/// A tagged variant selected once per statement: the session picks
/// `Single` or `Multi` from the plan's node count before dispatching, and
/// event delivery pattern-matches on the tag.
#[derive(Debug)]
pub enum ExecutorState {
    Single(SingleNodeHandler),
    Multi(MultiNodeHandler),
}

impl ExecutorState {
    /// Short label for logging
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Single(_) => "single-node",
            Self::Multi(_) => "multi-node",
        }
    }
}

impl ResponseHandler for ExecutorState {
    fn handle_reply(&mut self, shard: &ShardId, reply: StatementReply) {
        match self {
            Self::Single(h) => h.handle_reply(shard, reply),
            Self::Multi(h) => h.handle_reply(shard, reply),
        }
    }

    fn handle_error(&mut self, shard: &ShardId, error: BackendError) {
        match self {
            Self::Single(h) => h.handle_error(shard, error),
            Self::Multi(h) => h.handle_error(shard, error),
        }
    }

    fn handle_closed(&mut self, shard: &ShardId) {
        match self {
            Self::Single(h) => h.handle_closed(shard),
            Self::Multi(h) => h.handle_closed(shard),
        }
    }

    fn is_complete(&self) -> bool {
        match self {
            Self::Single(h) => h.is_complete(),
            Self::Multi(h) => h.is_complete(),
        }
    }

    fn pending_shards(&self) -> Vec<ShardId> {
        match self {
            Self::Single(h) => h.pending_shards(),
            Self::Multi(h) => h.pending_shards(),
        }
    }

    fn into_outcome(self) -> StatementOutcome {
        match self {
            Self::Single(h) => h.into_outcome(),
            Self::Multi(h) => h.into_outcome(),
        }
    }
}
