//! Connection binding table: shard identity → leased physical connection
//!
//! Owned exclusively by one session. Lookups are read-heavy (the statement
//! task and backend callback tasks both read), writes happen only on the
//! first statement that touches a shard within the current transaction
//! scope. The map is sharded internally, so unrelated shard lookups never
//! serialize on one lock.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tracing::debug;

use crate::backend::{ConnectionProvider, ShardConnection};
use crate::error::BackendError;
use crate::types::ShardId;

/// Per-session map from shard node to bound backend connection
#[derive(Debug, Default)]
pub struct BindingTable {
    bindings: DashMap<ShardId, Arc<dyn ShardConnection>>,
}

impl BindingTable {
    /// Create an empty binding table
    #[must_use]
    pub fn new() -> Self {
        Self {
            bindings: DashMap::new(),
        }
    }

    /// Get the existing binding for a shard, if any
    #[must_use]
    pub fn get(&self, shard: &ShardId) -> Option<Arc<dyn ShardConnection>> {
        self.bindings.get(shard).map(|entry| entry.value().clone())
    }

    /// Get the bound connection for a shard, leasing one on first access
    ///
    /// Once bound, the same physical connection is returned for every later
    /// lookup until [`release`](Self::release) — backend transaction state
    /// lives on the connection, so rebinding mid-transaction would break it.
    ///
    /// The pool acquire happens outside any map lock. If two tasks race to
    /// bind the same shard, the loser's fresh lease is recycled immediately
    /// and the winner's binding is returned.
    pub async fn get_or_create(
        &self,
        shard: &ShardId,
        provider: &Arc<dyn ConnectionProvider>,
    ) -> Result<Arc<dyn ShardConnection>, BackendError> {
        if let Some(existing) = self.get(shard) {
            return Ok(existing);
        }

        let fresh = provider.acquire(shard).await?;
        match self.bindings.entry(shard.clone()) {
            Entry::Occupied(entry) => {
                debug!("Lost binding race for shard '{}', recycling fresh lease", shard);
                fresh.recycle();
                Ok(entry.get().clone())
            }
            Entry::Vacant(entry) => {
                debug!("Bound shard '{}' to a fresh connection", shard);
                entry.insert(fresh.clone());
                Ok(fresh)
            }
        }
    }

    /// Number of bound shard connections
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether no shard is currently bound
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Recycle every bound connection back to the pool and clear the table
    ///
    /// Entries are removed before recycling, so each lease is recycled at
    /// most once even if release is called twice or races with itself.
    /// Returns the number of connections recycled.
    pub fn release(&self) -> usize {
        let shards: Vec<ShardId> = self
            .bindings
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        let mut recycled = 0;
        for shard in shards {
            if let Some((_, connection)) = self.bindings.remove(&shard) {
                connection.recycle();
                recycled += 1;
            }
        }
        recycled
    }
}
