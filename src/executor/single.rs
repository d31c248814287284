//! Single-node execution: relay one shard's reply verbatim

use tracing::warn;

use super::{ResponseHandler, StatementOutcome};
use crate::error::BackendError;
use crate::reply::StatementReply;
use crate::types::ShardId;

/// Handler for a plan that targets exactly one shard
///
/// The sub-statement goes to the bound connection for the single target
/// node; whatever the shard answers is relayed to the client unchanged.
/// Failures surface through the session's error path — nothing is retried
/// here, retry policy belongs to the pool.
#[derive(Debug)]
pub struct SingleNodeHandler {
    shard: ShardId,
    outcome: Option<StatementOutcome>,
}

impl SingleNodeHandler {
    /// Create a handler expecting a resolution from `shard`
    #[must_use]
    pub fn new(shard: ShardId) -> Self {
        Self {
            shard,
            outcome: None,
        }
    }

    /// The target shard
    #[must_use]
    pub fn shard(&self) -> &ShardId {
        &self.shard
    }

    fn resolve(&mut self, shard: &ShardId, outcome: StatementOutcome) {
        if shard != &self.shard {
            warn!(
                "Dropping event from unexpected shard '{}' (expected '{}')",
                shard, self.shard
            );
            return;
        }
        if self.outcome.is_some() {
            warn!("Dropping duplicate resolution from shard '{}'", shard);
            return;
        }
        self.outcome = Some(outcome);
    }
}

impl ResponseHandler for SingleNodeHandler {
    fn handle_reply(&mut self, shard: &ShardId, reply: StatementReply) {
        self.resolve(shard, StatementOutcome::Reply(reply));
    }

    fn handle_error(&mut self, shard: &ShardId, error: BackendError) {
        let outcome = StatementOutcome::Failed {
            code: error.error_code(),
            message: error.to_string(),
        };
        self.resolve(shard, outcome);
    }

    fn handle_closed(&mut self, shard: &ShardId) {
        let error = BackendError::ConnectionClosed {
            shard: shard.clone(),
        };
        self.handle_error(shard, error);
    }

    fn is_complete(&self) -> bool {
        self.outcome.is_some()
    }

    fn pending_shards(&self) -> Vec<ShardId> {
        if self.outcome.is_none() {
            vec![self.shard.clone()]
        } else {
            Vec::new()
        }
    }

    fn into_outcome(self) -> StatementOutcome {
        self.outcome.unwrap_or_else(|| StatementOutcome::Failed {
            code: crate::error::code::ER_YES,
            message: format!("shard '{}' never resolved", self.shard),
        })
    }
}
