//! Client-connection collaborator seam
//!
//! The frontend connection (accept loop, codec, socket) lives outside the
//! core. The session is the only caller of this trait: every statement
//! produces exactly one `write_reply` or `write_error`, never both.

use async_trait::async_trait;

use crate::reply::StatementReply;
use crate::types::ClientId;

/// Severity byte for client-facing error packets
pub const ERROR_SEVERITY: u8 = 1;

/// Handle to one client connection
#[async_trait]
pub trait ClientConnection: Send + Sync + std::fmt::Debug {
    /// Identity of the client this connection serves
    fn client_id(&self) -> ClientId;

    /// Write a successful statement reply to the client
    async fn write_reply(&self, reply: StatementReply) -> Result<(), std::io::Error>;

    /// Write an error packet to the client
    async fn write_error(
        &self,
        severity: u8,
        code: u16,
        message: &str,
    ) -> Result<(), std::io::Error>;
}
