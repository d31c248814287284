//! Backend collaborator contracts and asynchronous response delivery
//!
//! Physical connections, pooling and protocol framing live outside the core.
//! The session leases connections through [`ConnectionProvider`], dispatches
//! sub-statements through [`ShardConnection`], and receives each shard's
//! outcome later through the [`ResponseSink`] handed out at dispatch time.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::BackendError;
use crate::reply::StatementReply;
use crate::types::{ShardId, StatementId};

/// What one shard ultimately reported for a dispatched sub-statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOutcome {
    /// The shard executed the sub-statement and returned a reply
    Reply(StatementReply),
    /// The shard (or its connection) reported an error
    Error(BackendError),
    /// The connection closed without a reply
    Closed,
}

/// One asynchronous backend event, tagged with the statement that caused it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendEvent {
    pub statement: StatementId,
    pub shard: ShardId,
    pub outcome: BackendOutcome,
}

/// Response-delivery handle given to backend I/O at dispatch time
///
/// This is the response-handler capability seen from the wire side: backend
/// read tasks call [`reply`](Self::reply), [`error`](Self::error) or
/// [`closed`](Self::closed) when their shard resolves. Delivery after the
/// statement was cancelled, or after it already resolved, is a silent no-op
/// — a late response must never corrupt a newer statement's state.
#[derive(Debug, Clone)]
pub struct ResponseSink {
    statement: StatementId,
    abandoned: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<BackendEvent>,
}

impl ResponseSink {
    /// Create a sink for one statement
    #[must_use]
    pub fn new(
        statement: StatementId,
        abandoned: Arc<AtomicBool>,
        tx: mpsc::UnboundedSender<BackendEvent>,
    ) -> Self {
        Self {
            statement,
            abandoned,
            tx,
        }
    }

    /// The statement this sink delivers for
    #[must_use]
    #[inline]
    pub fn statement(&self) -> StatementId {
        self.statement
    }

    /// Deliver a successful shard reply
    pub fn reply(&self, shard: ShardId, reply: StatementReply) {
        self.deliver(shard, BackendOutcome::Reply(reply));
    }

    /// Deliver a shard error
    pub fn error(&self, shard: ShardId, error: BackendError) {
        self.deliver(shard, BackendOutcome::Error(error));
    }

    /// Deliver a connection-closed notification
    pub fn closed(&self, shard: ShardId) {
        self.deliver(shard, BackendOutcome::Closed);
    }

    fn deliver(&self, shard: ShardId, outcome: BackendOutcome) {
        if self.abandoned.load(Ordering::Acquire) {
            debug!(
                "Dropping backend event from shard '{}' for abandoned {}",
                shard, self.statement
            );
            return;
        }

        // A closed receiver means the statement already resolved; the late
        // event is dropped, not an error.
        let event = BackendEvent {
            statement: self.statement,
            shard,
            outcome,
        };
        if self.tx.send(event).is_err() {
            debug!("Dropping late backend event for resolved {}", self.statement);
        }
    }
}

/// One leased physical connection to a shard
///
/// The session borrows the lease; `recycle` returns it to the pool. Sending
/// and receiving protocol frames is the implementation's business — the core
/// only dispatches sub-statement text and waits for sink deliveries.
#[async_trait]
pub trait ShardConnection: Send + Sync + std::fmt::Debug {
    /// The shard this connection is bound to
    fn shard(&self) -> &ShardId;

    /// Send a sub-statement down the connection
    ///
    /// Returns as soon as the statement is on the wire; the shard's outcome
    /// arrives later through `reply_to`. An `Err` means nothing was
    /// dispatched and no sink delivery will follow.
    async fn dispatch(&self, statement: &str, reply_to: ResponseSink)
    -> Result<(), BackendError>;

    /// Ask the shard to abandon whatever this connection has in flight
    async fn cancel(&self);

    /// Return the lease to the pool
    fn recycle(&self);
}

/// The external connection pool seam
///
/// Must be safe to call from the binding table's get-or-create path. Retry
/// policy, if any, belongs to the implementation — the core never retries.
#[async_trait]
pub trait ConnectionProvider: Send + Sync + std::fmt::Debug {
    /// Lease a live connection to the given shard
    async fn acquire(&self, shard: &ShardId) -> Result<Arc<dyn ShardConnection>, BackendError>;
}
