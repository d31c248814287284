//! Multi-node execution: fan-out/fan-in across two or more shards
//!
//! Each target shard gets one slot, in dispatch order. The join condition
//! is an explicit outstanding counter: the statement is complete only once
//! every dispatched shard has resolved exactly once.
//!
//! Partial-failure policy (fixed, applied uniformly): wait for all shards to
//! resolve, then report the first error in dispatch order while draining the
//! successful replies. Draining keeps the succeeding shards' connections in
//! a clean state so the transaction can continue after rollback.

use tracing::warn;

use super::{ResponseHandler, StatementOutcome};
use crate::error::BackendError;
use crate::reply::{ResultSet, StatementReply};
use crate::route::{RoutePlan, StatementKind};
use crate::types::ShardId;

/// Resolution state of one dispatched shard
#[derive(Debug)]
enum NodeSlot {
    Pending,
    Succeeded(StatementReply),
    Failed(BackendError),
}

impl NodeSlot {
    const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Handler for a plan that targets two or more shards
#[derive(Debug)]
pub struct MultiNodeHandler {
    kind: StatementKind,
    slots: Vec<(ShardId, NodeSlot)>,
    outstanding: usize,
}

impl MultiNodeHandler {
    /// Create a handler with one pending slot per plan node, in plan order
    #[must_use]
    pub fn new(plan: &RoutePlan) -> Self {
        let slots: Vec<(ShardId, NodeSlot)> = plan
            .nodes()
            .iter()
            .map(|node| (node.shard().clone(), NodeSlot::Pending))
            .collect();
        let outstanding = slots.len();
        Self {
            kind: plan.kind(),
            slots,
            outstanding,
        }
    }

    /// Number of shards still outstanding
    #[must_use]
    #[inline]
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    fn resolve(&mut self, shard: &ShardId, resolution: Result<StatementReply, BackendError>) {
        // First pending slot for this shard wins; anything else is a
        // duplicate or unknown delivery and must not touch the join state.
        let Some(slot) = self
            .slots
            .iter_mut()
            .find(|(s, state)| s == shard && state.is_pending())
        else {
            warn!("Dropping duplicate or unknown resolution from shard '{}'", shard);
            return;
        };

        slot.1 = match resolution {
            Ok(reply) => NodeSlot::Succeeded(reply),
            Err(error) => NodeSlot::Failed(error),
        };
        self.outstanding -= 1;
    }

    /// Aggregate successful replies once no shard failed
    fn aggregate(self) -> StatementOutcome {
        if self.kind.is_result_bearing() {
            let mut merged = ResultSet::default();
            for (shard, slot) in self.slots {
                match slot {
                    NodeSlot::Succeeded(StatementReply::Rows(rs)) => merged.append(rs),
                    NodeSlot::Succeeded(StatementReply::Affected(_)) => {
                        warn!(
                            "Shard '{}' answered a result-bearing statement with a row count",
                            shard
                        );
                    }
                    NodeSlot::Pending | NodeSlot::Failed(_) => unreachable!(
                        "aggregate called with unresolved or failed slot for shard '{shard}'"
                    ),
                }
            }
            StatementOutcome::Reply(StatementReply::Rows(merged))
        } else {
            let mut affected: u64 = 0;
            for (shard, slot) in self.slots {
                match slot {
                    NodeSlot::Succeeded(StatementReply::Affected(n)) => affected += n,
                    NodeSlot::Succeeded(StatementReply::Rows(_)) => {
                        warn!("Shard '{}' answered a write statement with rows", shard);
                    }
                    NodeSlot::Pending | NodeSlot::Failed(_) => unreachable!(
                        "aggregate called with unresolved or failed slot for shard '{shard}'"
                    ),
                }
            }
            StatementOutcome::Reply(StatementReply::Affected(affected))
        }
    }
}

impl ResponseHandler for MultiNodeHandler {
    fn handle_reply(&mut self, shard: &ShardId, reply: StatementReply) {
        self.resolve(shard, Ok(reply));
    }

    fn handle_error(&mut self, shard: &ShardId, error: BackendError) {
        self.resolve(shard, Err(error));
    }

    fn handle_closed(&mut self, shard: &ShardId) {
        let error = BackendError::ConnectionClosed {
            shard: shard.clone(),
        };
        self.resolve(shard, Err(error));
    }

    fn is_complete(&self) -> bool {
        self.outstanding == 0
    }

    fn pending_shards(&self) -> Vec<ShardId> {
        self.slots
            .iter()
            .filter(|(_, state)| state.is_pending())
            .map(|(shard, _)| shard.clone())
            .collect()
    }

    fn into_outcome(self) -> StatementOutcome {
        // First error in dispatch order wins; successes were already drained.
        if let Some((_, NodeSlot::Failed(error))) = self
            .slots
            .iter()
            .find(|(_, state)| matches!(state, NodeSlot::Failed(_)))
        {
            return StatementOutcome::Failed {
                code: error.error_code(),
                message: error.to_string(),
            };
        }
        self.aggregate()
    }
}
