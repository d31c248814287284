//! Per-client session orchestration
//!
//! One [`Session`] exists per client connection. It is the single entry and
//! control point for the statement lifecycle: routing, executor selection,
//! fan-out dispatch, fan-in driving, transaction-interrupt tracking, and
//! connection-binding ownership. All failures funnel through
//! [`write_err`](Session::write_err), exactly once per statement.

mod binding;
mod interrupt;

pub use binding::BindingTable;
pub use interrupt::TxInterrupt;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::backend::{BackendOutcome, ConnectionProvider, ResponseSink, ShardConnection};
use crate::client::{ClientConnection, ERROR_SEVERITY};
use crate::config::SessionConfig;
use crate::error::{BackendError, code};
use crate::executor::{
    ExecutorState, MultiNodeHandler, ResponseHandler, SingleNodeHandler, StatementOutcome,
};
use crate::route::{RoutePlan, Router, StatementKind};
use crate::types::{ClientId, ShardId, StatementId};

/// Cancellation signal for one in-flight statement
///
/// The abandoned flag is shared with every [`ResponseSink`] clone handed to
/// backend I/O, so a response arriving after cancellation is dropped before
/// it can touch executor state. The notify half wakes the drive loop.
#[derive(Debug, Default)]
pub struct CancelSignal {
    abandoned: Arc<AtomicBool>,
    notify: Notify,
}

impl CancelSignal {
    /// Create a fresh, un-cancelled signal
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the abandoned flag and wake the drive loop
    pub fn cancel(&self) {
        self.abandoned.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Whether the statement has been abandoned
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::Acquire)
    }

    /// Shared flag handed to response sinks
    #[must_use]
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abandoned)
    }

    /// Resolve once the statement is abandoned
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_abandoned() {
                return;
            }
            notified.await;
        }
    }
}

/// Bookkeeping for the statement currently in flight
#[derive(Debug)]
struct InFlight {
    statement: StatementId,
    cancel: Arc<CancelSignal>,
    executor: &'static str,
}

/// Clears the in-flight slot on every exit path of `execute`
struct InFlightGuard<'a> {
    session: &'a Session,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        *self
            .session
            .in_flight
            .lock()
            .expect("in-flight slot poisoned") = None;
        // A terminate that arrived mid-statement deferred its release to
        // this point, once the drive loop holds no leases anymore.
        if self.session.terminated.load(Ordering::Acquire) {
            self.session.release();
        }
    }
}

/// One client connection's session: statement lifecycle, transaction state,
/// and shard-connection bindings
#[derive(Debug)]
pub struct Session {
    client: Arc<dyn ClientConnection>,
    router: Arc<dyn Router>,
    provider: Arc<dyn ConnectionProvider>,
    config: SessionConfig,
    bindings: BindingTable,
    interrupt: TxInterrupt,
    in_transaction: AtomicBool,
    terminated: AtomicBool,
    statement_seq: AtomicU64,
    in_flight: Mutex<Option<InFlight>>,
}

impl Session {
    /// Create a session for an accepted client connection
    #[must_use]
    pub fn new(
        client: Arc<dyn ClientConnection>,
        router: Arc<dyn Router>,
        provider: Arc<dyn ConnectionProvider>,
        config: SessionConfig,
    ) -> Self {
        Self {
            client,
            router,
            provider,
            config,
            bindings: BindingTable::new(),
            interrupt: TxInterrupt::new(),
            in_transaction: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
            statement_seq: AtomicU64::new(0),
            in_flight: Mutex::new(None),
        }
    }

    /// The client this session serves
    #[must_use]
    pub fn client_id(&self) -> ClientId {
        self.client.client_id()
    }

    /// Number of shard connections currently bound
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the session is transaction-interrupted
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.interrupt.is_interrupted()
    }

    /// Whether a transaction is open on this session
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.in_transaction.load(Ordering::Acquire)
    }

    /// Execute one client statement end to end
    ///
    /// Produces exactly one client-facing response: an aggregated reply, an
    /// error write, or a cancellation status. Awaiting this future does not
    /// block the task — the session suspends on the backend event channel
    /// until every dispatched shard resolves.
    ///
    /// # Panics
    ///
    /// Panics if called while a previous statement on this session is still
    /// unresolved; that is a caller bug, not a recoverable condition.
    pub async fn execute(&self, statement: &str, kind: StatementKind) {
        // Fast-fail path: a poisoned transaction rejects statements without
        // ever invoking the router.
        if let Some(reason) = self.interrupt.reason() {
            self.write_err(
                code::ER_YES,
                &format!("transaction interrupted, rollback required: {reason}"),
            )
            .await;
            return;
        }

        let plan = match self.router.route(statement, kind) {
            Ok(plan) => plan,
            Err(error) => {
                self.write_err(code::ER_PARSE_ERROR, &error.to_string()).await;
                return;
            }
        };

        if plan.is_empty() {
            self.write_err(code::ER_PARSE_ERROR, "statement routed to zero shards")
                .await;
            return;
        }

        if plan.node_count() > self.config.max_fanout {
            self.write_err(
                code::ER_YES,
                &format!(
                    "statement fans out to {} shards, limit is {}",
                    plan.node_count(),
                    self.config.max_fanout
                ),
            )
            .await;
            return;
        }

        let statement_id = StatementId::from_seq(self.statement_seq.fetch_add(1, Ordering::Relaxed));
        let cancel = Arc::new(CancelSignal::new());

        // The active executor is designated before any dispatch so that
        // backend events arriving mid-execution are routed correctly.
        let mut executor = match plan.single() {
            Some(node) => ExecutorState::Single(SingleNodeHandler::new(node.shard().clone())),
            None => ExecutorState::Multi(MultiNodeHandler::new(&plan)),
        };

        let _guard = self.claim(statement_id, Arc::clone(&cancel), executor.label());
        debug!(
            "Session {} executing {} via {} executor across {} shard(s)",
            self.client_id(),
            statement_id,
            executor.label(),
            plan.node_count()
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = ResponseSink::new(statement_id, cancel.flag(), tx);

        let dispatched = self.fan_out(&plan, &sink, &cancel, &mut executor).await;
        drop(sink);

        let outcome = self
            .drive(statement_id, executor, &mut rx, &cancel, &dispatched)
            .await;

        match outcome {
            StatementOutcome::Reply(reply) => {
                debug!("Session {} resolved {}", self.client_id(), statement_id);
                if let Err(error) = self.client.write_reply(reply).await {
                    warn!(
                        "Failed to write reply to client {}: {}",
                        self.client_id(),
                        error
                    );
                }
            }
            StatementOutcome::Failed { code, message } => {
                // A failure inside an open transaction poisons the session
                // until the client rolls back.
                if self.in_transaction() {
                    self.interrupt.interrupt(message.clone());
                }
                self.write_err(code, &message).await;
            }
            StatementOutcome::Cancelled => {
                self.write_err(code::ER_QUERY_INTERRUPTED, "statement cancelled")
                    .await;
            }
        }
    }

    /// Dispatch the plan's sub-statements in plan order
    ///
    /// A node whose connection cannot be leased, or whose dispatch fails,
    /// resolves immediately as failed; the remaining nodes still dispatch so
    /// the join condition stays "every node reports exactly once".
    async fn fan_out(
        &self,
        plan: &RoutePlan,
        sink: &ResponseSink,
        cancel: &CancelSignal,
        executor: &mut ExecutorState,
    ) -> Vec<Arc<dyn ShardConnection>> {
        let mut dispatched = Vec::with_capacity(plan.node_count());
        for node in plan.nodes() {
            if cancel.is_abandoned() {
                break;
            }
            match self.target(node.shard()).await {
                Ok(connection) => match connection.dispatch(node.statement(), sink.clone()).await {
                    Ok(()) => dispatched.push(connection),
                    Err(error) => {
                        warn!("Dispatch to shard '{}' failed: {}", node.shard(), error);
                        executor.handle_error(node.shard(), error);
                    }
                },
                Err(error) => {
                    warn!("No connection for shard '{}': {}", node.shard(), error);
                    executor.handle_error(node.shard(), error);
                }
            }
        }
        dispatched
    }

    /// Join over backend events until the executor completes, the statement
    /// deadline passes, or the statement is cancelled
    async fn drive(
        &self,
        statement_id: StatementId,
        mut executor: ExecutorState,
        rx: &mut mpsc::UnboundedReceiver<crate::backend::BackendEvent>,
        cancel: &CancelSignal,
        dispatched: &[Arc<dyn ShardConnection>],
    ) -> StatementOutcome {
        let deadline = tokio::time::Instant::now() + self.config.statement_timeout;

        loop {
            if executor.is_complete() {
                return executor.into_outcome();
            }

            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(
                        "Session {} abandoning {} with {} shard(s) outstanding",
                        self.client_id(),
                        statement_id,
                        executor.pending_shards().len()
                    );
                    for connection in dispatched {
                        connection.cancel().await;
                    }
                    return StatementOutcome::Cancelled;
                }
                event = tokio::time::timeout_at(deadline, rx.recv()) => match event {
                    Err(_elapsed) => {
                        warn!(
                            "Session {} timed out {} after {:?}",
                            self.client_id(),
                            statement_id,
                            self.config.statement_timeout
                        );
                        // Suppress whatever still arrives, then resolve the
                        // stragglers as timed out.
                        cancel.cancel();
                        for connection in dispatched {
                            connection.cancel().await;
                        }
                        for shard in executor.pending_shards() {
                            let error = BackendError::Timeout { shard: shard.clone() };
                            executor.handle_error(&shard, error);
                        }
                        return executor.into_outcome();
                    }
                    Ok(None) => {
                        // Every sink is gone without completion: the
                        // remaining shards can never report, treat their
                        // connections as closed.
                        for shard in executor.pending_shards() {
                            executor.handle_closed(&shard);
                        }
                    }
                    Ok(Some(event)) => {
                        if event.statement != statement_id {
                            warn!(
                                "Dropping stale backend event tagged {} during {}",
                                event.statement, statement_id
                            );
                            continue;
                        }
                        match event.outcome {
                            BackendOutcome::Reply(reply) => {
                                executor.handle_reply(&event.shard, reply);
                            }
                            BackendOutcome::Error(error) => {
                                executor.handle_error(&event.shard, error);
                            }
                            BackendOutcome::Closed => executor.handle_closed(&event.shard),
                        }
                    }
                }
            }
        }
    }

    /// Bound connection for a shard node, leasing one on first access
    ///
    /// The only mutation point of the binding table. Within a transaction
    /// scope every statement targeting the same shard gets the identical
    /// physical connection back.
    pub async fn target(
        &self,
        shard: &ShardId,
    ) -> Result<Arc<dyn ShardConnection>, BackendError> {
        self.bindings.get_or_create(shard, &self.provider).await
    }

    /// Open a transaction scope on this session
    pub fn begin_transaction(&self) {
        self.in_transaction.store(true, Ordering::Release);
    }

    /// Commit boundary: close the transaction scope and release bindings
    pub fn commit(&self) {
        self.in_transaction.store(false, Ordering::Release);
        self.release();
    }

    /// Rollback boundary: clear the interrupt, close the scope, release
    ///
    /// Rollback is the only operation that clears the transaction-interrupt
    /// state; after it, the next `execute` proceeds to routing again.
    pub fn rollback(&self) {
        self.interrupt.clear();
        self.in_transaction.store(false, Ordering::Release);
        self.release();
    }

    /// Cancel the in-flight statement on behalf of another connection
    ///
    /// Safe to call concurrently with an in-progress execute/response cycle;
    /// late backend responses are suppressed, never applied. No-op when
    /// nothing is in flight.
    pub fn cancel(&self, sponsor: ClientId) {
        let current = {
            let slot = self.in_flight.lock().expect("in-flight slot poisoned");
            slot.as_ref()
                .map(|f| (f.statement, f.executor, Arc::clone(&f.cancel)))
        };
        match current {
            Some((statement, executor, cancel)) => {
                info!(
                    "Client {} cancelled {} ({} executor) on session {}",
                    sponsor,
                    statement,
                    executor,
                    self.client_id()
                );
                cancel.cancel();
            }
            None => debug!(
                "Client {} cancel on session {} with nothing in flight",
                sponsor,
                self.client_id()
            ),
        }
    }

    /// Hard stop: the client connection itself is being torn down
    ///
    /// Abandons any in-flight statement. With the session idle the bindings
    /// are released immediately; with a statement in flight the release is
    /// deferred until the drive loop has let go of its leases, so a
    /// recycled connection can never receive a cancel meant for this
    /// session after another session leased it.
    pub fn terminate(&self) {
        self.terminated.store(true, Ordering::Release);
        let cancel = {
            let slot = self.in_flight.lock().expect("in-flight slot poisoned");
            slot.as_ref().map(|f| Arc::clone(&f.cancel))
        };
        info!("Session {} terminated", self.client_id());
        match cancel {
            Some(cancel) => cancel.cancel(),
            None => self.release(),
        }
    }

    /// Recycle every bound connection back to the pool and clear the table
    ///
    /// Idempotent: each lease is recycled at most once no matter how many
    /// times release runs, and calling with nothing bound is a no-op.
    pub fn release(&self) {
        let recycled = self.bindings.release();
        if recycled > 0 {
            info!(
                "Session {} released {} shard connection(s)",
                self.client_id(),
                recycled
            );
        }
    }

    /// The single error-surfacing path: log, then one client error write
    pub async fn write_err(&self, code: u16, message: &str) {
        warn!(
            "Session {} error {}: {}",
            self.client_id(),
            code,
            message
        );
        if let Err(error) = self
            .client
            .write_error(ERROR_SEVERITY, code, message)
            .await
        {
            warn!(
                "Failed to write error to client {}: {}",
                self.client_id(),
                error
            );
        }
    }

    fn claim(
        &self,
        statement: StatementId,
        cancel: Arc<CancelSignal>,
        executor: &'static str,
    ) -> InFlightGuard<'_> {
        let mut slot = self.in_flight.lock().expect("in-flight slot poisoned");
        assert!(
            slot.is_none(),
            "execute called while a statement is in flight"
        );
        *slot = Some(InFlight {
            statement,
            cancel,
            executor,
        });
        InFlightGuard { session: self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_signal_starts_clear() {
        let signal = CancelSignal::new();
        assert!(!signal.is_abandoned());
    }

    #[tokio::test]
    async fn test_cancel_signal_wakes_waiter() {
        let signal = Arc::new(CancelSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            tokio::spawn(async move { signal.cancelled().await })
        };

        signal.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .expect("waiter should not panic");
        assert!(signal.is_abandoned());
    }

    #[tokio::test]
    async fn test_cancel_signal_resolves_if_already_cancelled() {
        let signal = CancelSignal::new();
        signal.cancel();
        // Must resolve immediately even though cancel happened first
        tokio::time::timeout(Duration::from_millis(100), signal.cancelled())
            .await
            .expect("already-cancelled signal should resolve");
    }

    #[tokio::test]
    async fn test_cancel_signal_flag_shared() {
        let signal = CancelSignal::new();
        let flag = signal.flag();
        assert!(!flag.load(Ordering::Acquire));
        signal.cancel();
        assert!(flag.load(Ordering::Acquire));
    }
}
