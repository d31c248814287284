//! Session, routing and execution core for a database-sharding proxy
//!
//! This crate is the orchestration slice of a proxy that sits between SQL
//! clients and physically separate backend shards. For each client statement
//! it consumes a routing plan, dispatches execution to one or many leased
//! backend connections, joins the asynchronous responses into exactly one
//! client-facing reply, and tracks transaction state across statements.
//!
//! The surrounding proxy supplies the collaborators through narrow seams:
//! the wire codec and SQL parser behind [`route::Router`], connection
//! establishment and pooling behind [`backend::ConnectionProvider`], and the
//! client socket behind [`client::ClientConnection`]. The core owns none of
//! their internals.

pub mod backend;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod executor;
pub mod logging;
pub mod reply;
pub mod route;
pub mod session;
pub mod types;

pub use backend::{BackendEvent, BackendOutcome, ConnectionProvider, ResponseSink, ShardConnection};
pub use client::ClientConnection;
pub use config::{ProxyConfig, SessionConfig, ShardConfig, create_default_config, load_config};
pub use error::{BackendError, RouteError};
pub use executor::{ResponseHandler, StatementOutcome};
pub use reply::{ResultSet, StatementReply};
pub use route::{RouteNode, RoutePlan, Router, StatementKind};
pub use session::{BindingTable, CancelSignal, Session, TxInterrupt};
pub use types::{ClientId, ShardId, StatementId};
