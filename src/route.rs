//! Routing plans and the router seam
//!
//! The router itself is an external collaborator: it parses a statement,
//! computes the sharding key, and produces a [`RoutePlan`]. The core only
//! consumes the plan — node count 0 is a routing failure, 1 takes the
//! single-node path, more than 1 fans out.

use crate::error::RouteError;
use crate::types::ShardId;

/// Broad classification of a client statement
///
/// The router receives this alongside the statement text; the multi-node
/// executor uses it to pick the aggregation shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Other,
}

impl StatementKind {
    /// Whether this statement returns rows (and therefore stitches result
    /// sets on the multi-node path instead of summing affected-row counts)
    #[must_use]
    #[inline]
    pub const fn is_result_bearing(self) -> bool {
        matches!(self, Self::Select)
    }
}

/// One target of a routing plan: a shard plus the sub-statement to run there
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteNode {
    shard: ShardId,
    statement: String,
}

impl RouteNode {
    /// Create a route node
    #[must_use]
    pub fn new(shard: ShardId, statement: impl Into<String>) -> Self {
        Self {
            shard,
            statement: statement.into(),
        }
    }

    /// The shard this node targets
    #[must_use]
    #[inline]
    pub fn shard(&self) -> &ShardId {
        &self.shard
    }

    /// The shard-specific statement text
    #[must_use]
    #[inline]
    pub fn statement(&self) -> &str {
        &self.statement
    }
}

/// Immutable description of which shards a statement touches
///
/// Produced once per statement by the external router. Node order is the
/// dispatch order, which also fixes the ordering of stitched multi-node
/// results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePlan {
    kind: StatementKind,
    nodes: Vec<RouteNode>,
}

impl RoutePlan {
    /// Create a routing plan from target nodes in dispatch order
    #[must_use]
    pub fn new(kind: StatementKind, nodes: Vec<RouteNode>) -> Self {
        Self { kind, nodes }
    }

    /// Create an empty plan (routes to nothing)
    #[must_use]
    pub fn empty(kind: StatementKind) -> Self {
        Self {
            kind,
            nodes: Vec::new(),
        }
    }

    /// The statement classification this plan was built for
    #[must_use]
    #[inline]
    pub const fn kind(&self) -> StatementKind {
        self.kind
    }

    /// Number of target shard nodes
    #[must_use]
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the plan routes to nothing (a routing/parse failure)
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The single target node, if this is a single-node plan
    #[must_use]
    pub fn single(&self) -> Option<&RouteNode> {
        match self.nodes.as_slice() {
            [node] => Some(node),
            _ => None,
        }
    }

    /// Target nodes in dispatch order
    #[must_use]
    #[inline]
    pub fn nodes(&self) -> &[RouteNode] {
        &self.nodes
    }
}

/// The external routing collaborator
///
/// Failure modes are equivalent for the session: returning `Err` and
/// returning an empty plan both surface as a parse/routing error without any
/// backend dispatch.
pub trait Router: Send + Sync + std::fmt::Debug {
    /// Turn a client statement into a routing plan
    fn route(&self, statement: &str, kind: StatementKind) -> Result<RoutePlan, RouteError>;
}
