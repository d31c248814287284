//! Test helpers for integration tests
//!
//! Programmable fakes for the session core's collaborator seams: a canned
//! router, a scripted shard connection, a counting pool, and a recording
//! client connection.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shard_proxy::{
    BackendError, ClientConnection, ClientId, ConnectionProvider, ResponseSink, RouteError,
    RouteNode, RoutePlan, Router, Session, SessionConfig, ShardConnection, ShardId, StatementKind,
    StatementReply,
};

/// A rows reply with `n` single-column rows prefixed by `prefix`
pub fn rows_reply(prefix: &str, n: usize) -> StatementReply {
    StatementReply::Rows(shard_proxy::ResultSet::new(
        vec!["id".to_string()],
        (0..n).map(|i| vec![format!("{prefix}-{i}")]).collect(),
    ))
}

/// Build a routing plan over `(shard, sub-statement)` pairs
pub fn plan(kind: StatementKind, nodes: &[(&str, &str)]) -> RoutePlan {
    RoutePlan::new(
        kind,
        nodes
            .iter()
            .map(|(shard, stmt)| RouteNode::new(ShardId::new(shard), *stmt))
            .collect(),
    )
}

/// Router returning canned plans keyed by statement text
#[derive(Debug, Default)]
pub struct FakeRouter {
    plans: Mutex<HashMap<String, RoutePlan>>,
    calls: AtomicUsize,
}

impl FakeRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(self, statement: &str, plan: RoutePlan) -> Self {
        self.plans
            .lock()
            .unwrap()
            .insert(statement.to_string(), plan);
        self
    }

    /// How many times the session invoked routing
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Router for FakeRouter {
    fn route(&self, statement: &str, _kind: StatementKind) -> Result<RoutePlan, RouteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.plans
            .lock()
            .unwrap()
            .get(statement)
            .cloned()
            .ok_or_else(|| RouteError::new(format!("no route for '{statement}'")))
    }
}

/// One scripted behavior for a dispatch on a fake shard connection
#[derive(Debug, Clone)]
pub enum ShardScript {
    /// Deliver this reply through the sink
    Reply(StatementReply),
    /// Deliver this reply after a delay (for cancellation races)
    ReplyAfter(Duration, StatementReply),
    /// Deliver a shard error
    Fail(u16, &'static str),
    /// Deliver a shard error after a delay (for arrival-order tests)
    FailAfter(Duration, u16, &'static str),
    /// Deliver connection-closed
    Close,
    /// Accept the dispatch but never respond
    Silent,
    /// Reject the dispatch itself
    RejectDispatch,
}

/// Scripted fake backend connection with call counters
#[derive(Debug)]
pub struct FakeShardConnection {
    shard: ShardId,
    script: Mutex<VecDeque<ShardScript>>,
    dispatch_count: AtomicUsize,
    cancel_count: AtomicUsize,
    recycle_count: AtomicUsize,
}

impl FakeShardConnection {
    pub fn new(shard: ShardId) -> Self {
        Self {
            shard,
            script: Mutex::new(VecDeque::new()),
            dispatch_count: AtomicUsize::new(0),
            cancel_count: AtomicUsize::new(0),
            recycle_count: AtomicUsize::new(0),
        }
    }

    /// Queue the behavior for the next dispatch
    pub fn push_script(&self, step: ShardScript) {
        self.script.lock().unwrap().push_back(step);
    }

    pub fn dispatch_count(&self) -> usize {
        self.dispatch_count.load(Ordering::SeqCst)
    }

    pub fn cancel_count(&self) -> usize {
        self.cancel_count.load(Ordering::SeqCst)
    }

    pub fn recycle_count(&self) -> usize {
        self.recycle_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ShardConnection for FakeShardConnection {
    fn shard(&self) -> &ShardId {
        &self.shard
    }

    async fn dispatch(
        &self,
        _statement: &str,
        reply_to: ResponseSink,
    ) -> Result<(), BackendError> {
        self.dispatch_count.fetch_add(1, Ordering::SeqCst);

        // Unscripted dispatches succeed with one affected row
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ShardScript::Reply(StatementReply::Affected(1)));

        let shard = self.shard.clone();
        match step {
            ShardScript::Reply(reply) => {
                tokio::spawn(async move { reply_to.reply(shard, reply) });
                Ok(())
            }
            ShardScript::ReplyAfter(delay, reply) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    reply_to.reply(shard, reply);
                });
                Ok(())
            }
            ShardScript::Fail(code, message) => {
                tokio::spawn(async move {
                    reply_to.error(
                        shard.clone(),
                        BackendError::Shard {
                            shard,
                            code,
                            message: message.to_string(),
                        },
                    );
                });
                Ok(())
            }
            ShardScript::FailAfter(delay, code, message) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    reply_to.error(
                        shard.clone(),
                        BackendError::Shard {
                            shard,
                            code,
                            message: message.to_string(),
                        },
                    );
                });
                Ok(())
            }
            ShardScript::Close => {
                tokio::spawn(async move { reply_to.closed(shard) });
                Ok(())
            }
            ShardScript::Silent => {
                // Park the sink; dropping it would close the event channel
                // and resolve the shard as closed instead of leaving the
                // statement in flight.
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    drop(reply_to);
                });
                Ok(())
            }
            ShardScript::RejectDispatch => Err(BackendError::ConnectionClosed { shard }),
        }
    }

    async fn cancel(&self) {
        self.cancel_count.fetch_add(1, Ordering::SeqCst);
    }

    fn recycle(&self) {
        self.recycle_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Connection provider backed by one fake connection per shard
#[derive(Debug, Default)]
pub struct FakePool {
    connections: Mutex<HashMap<ShardId, Arc<FakeShardConnection>>>,
    acquire_counts: Mutex<HashMap<ShardId, usize>>,
    failing: Mutex<HashSet<ShardId>>,
}

impl FakePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fake connection for a shard, creating it on first use
    ///
    /// Lets tests script behavior before the session ever acquires.
    pub fn connection(&self, shard: &ShardId) -> Arc<FakeShardConnection> {
        self.connections
            .lock()
            .unwrap()
            .entry(shard.clone())
            .or_insert_with(|| Arc::new(FakeShardConnection::new(shard.clone())))
            .clone()
    }

    /// Make acquires for this shard fail
    pub fn fail_shard(&self, shard: &ShardId) {
        self.failing.lock().unwrap().insert(shard.clone());
    }

    /// How many times the session acquired a lease for this shard
    pub fn acquire_count(&self, shard: &ShardId) -> usize {
        self.acquire_counts
            .lock()
            .unwrap()
            .get(shard)
            .copied()
            .unwrap_or(0)
    }

    /// Total acquires across all shards
    pub fn total_acquires(&self) -> usize {
        self.acquire_counts.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl ConnectionProvider for FakePool {
    async fn acquire(&self, shard: &ShardId) -> Result<Arc<dyn ShardConnection>, BackendError> {
        if self.failing.lock().unwrap().contains(shard) {
            return Err(BackendError::Acquire {
                shard: shard.clone(),
                reason: "pool exhausted".to_string(),
            });
        }
        *self
            .acquire_counts
            .lock()
            .unwrap()
            .entry(shard.clone())
            .or_insert(0) += 1;
        Ok(self.connection(shard))
    }
}

/// One write the session made to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientWrite {
    Reply(StatementReply),
    Error {
        severity: u8,
        code: u16,
        message: String,
    },
}

/// Client connection that records every write
#[derive(Debug)]
pub struct RecordingClient {
    id: ClientId,
    writes: Mutex<Vec<ClientWrite>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self {
            id: ClientId::new(),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn writes(&self) -> Vec<ClientWrite> {
        self.writes.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    /// The single recorded reply, if the last statement succeeded
    pub fn last_reply(&self) -> Option<StatementReply> {
        self.writes.lock().unwrap().iter().rev().find_map(|w| match w {
            ClientWrite::Reply(reply) => Some(reply.clone()),
            ClientWrite::Error { .. } => None,
        })
    }

    /// Code and message of the most recent error write
    pub fn last_error(&self) -> Option<(u16, String)> {
        self.writes.lock().unwrap().iter().rev().find_map(|w| match w {
            ClientWrite::Error { code, message, .. } => Some((*code, message.clone())),
            ClientWrite::Reply(_) => None,
        })
    }
}

impl Default for RecordingClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClientConnection for RecordingClient {
    fn client_id(&self) -> ClientId {
        self.id
    }

    async fn write_reply(&self, reply: StatementReply) -> Result<(), std::io::Error> {
        self.writes.lock().unwrap().push(ClientWrite::Reply(reply));
        Ok(())
    }

    async fn write_error(
        &self,
        severity: u8,
        code: u16,
        message: &str,
    ) -> Result<(), std::io::Error> {
        self.writes.lock().unwrap().push(ClientWrite::Error {
            severity,
            code,
            message: message.to_string(),
        });
        Ok(())
    }
}

/// Everything a session test needs, wired together
pub struct TestHarness {
    pub session: Arc<Session>,
    pub router: Arc<FakeRouter>,
    pub pool: Arc<FakePool>,
    pub client: Arc<RecordingClient>,
}

/// Build a session over fakes with a short statement deadline
pub fn harness(router: FakeRouter) -> TestHarness {
    harness_with_config(
        router,
        SessionConfig {
            statement_timeout: Duration::from_secs(5),
            max_fanout: 64,
        },
    )
}

pub fn harness_with_config(router: FakeRouter, config: SessionConfig) -> TestHarness {
    let router = Arc::new(router);
    let pool = Arc::new(FakePool::new());
    let client = Arc::new(RecordingClient::new());
    let session = Arc::new(Session::new(
        client.clone(),
        router.clone(),
        pool.clone(),
        config,
    ));
    TestHarness {
        session,
        router,
        pool,
        client,
    }
}
