//! Decoded statement results
//!
//! Protocol framing is external; the core moves already-decoded replies
//! between backends and the client. A reply is either a result set (reads)
//! or an affected-row count (writes).

/// A decoded result set from one or more shards
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ResultSet {
    /// Create a result set from column names and rows
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    /// Column names
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Data rows
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of data rows
    #[must_use]
    #[inline]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Append another shard's rows onto this result set
    ///
    /// Used by multi-node fan-in: the first shard's columns win, later
    /// shards contribute rows in dispatch order.
    pub fn append(&mut self, other: ResultSet) {
        if self.columns.is_empty() {
            self.columns = other.columns;
        }
        self.rows.extend(other.rows);
    }
}

/// One complete reply to a statement
///
/// Used both for what a single shard returns and for the aggregated reply
/// the client receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementReply {
    /// Result-bearing statement: rows to stream to the client
    Rows(ResultSet),
    /// Non-result statement: total affected-row count
    Affected(u64),
}

impl StatementReply {
    /// Affected-row count, if this is a write reply
    #[must_use]
    pub fn affected_rows(&self) -> Option<u64> {
        match self {
            Self::Affected(n) => Some(*n),
            Self::Rows(_) => None,
        }
    }

    /// The result set, if this is a read reply
    #[must_use]
    pub fn result_set(&self) -> Option<&ResultSet> {
        match self {
            Self::Rows(rs) => Some(rs),
            Self::Affected(_) => None,
        }
    }
}
