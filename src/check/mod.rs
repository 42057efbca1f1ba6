//! Replication consistency check
//!
//! This module decides whether MySQL replication is *actually* running: the
//! master must hold a live binlog-dump connection for every configured slave,
//! and every slave's read position must sit within a byte tolerance of the
//! master's current position.
//!
//! The master's position is read after the processlist and before the slave
//! queries, so a transaction landing in between can mark an in-sync slave
//! CRITICAL for one cycle. The scheduler's soft/hard re-check semantics are
//! expected to absorb that.

mod engine;
mod master;
mod slave;

pub use engine::{ReplicationCheck, ReplicationVerdict, SlaveReport};
pub use master::ActiveStreamSet;

use std::fmt;

use crate::client::{ConnectionError, QueryError};
use crate::config::ServerEndpoint;
use crate::protocol::ResultSet;

/// A point in the master's binary log
///
/// Offsets are comparable only within the same file; across files the
/// file-name mismatch itself is the signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPosition {
    pub file: String,
    pub offset: u64,
}

impl LogPosition {
    pub fn new(file: impl Into<String>, offset: u64) -> Self {
        Self {
            file: file.into(),
            offset,
        }
    }

    /// Byte distance to `other` within the same log file
    pub fn byte_diff(&self, other: &Self) -> Option<u64> {
        (self.file == other.file).then(|| self.offset.abs_diff(other.offset))
    }

    /// Byte distance ignoring file names; informational when files differ
    pub fn offset_diff(&self, other: &Self) -> u64 {
        self.offset.abs_diff(other.offset)
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.offset)
    }
}

/// Error during a check invocation
///
/// Every variant aborts the invocation as UNKNOWN: a check that could not
/// observe all servers never reports a partial verdict. Replication being
/// behind is NOT an error, it is a CRITICAL verdict.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("unable to connect to MySQL master server {addr} as {user}: {source}")]
    MasterConnection {
        addr: String,
        user: String,
        #[source]
        source: ConnectionError,
    },

    #[error("error in MySQL query to master: {query}: {source}")]
    MasterQuery {
        query: String,
        #[source]
        source: QueryError,
    },

    #[error("malformed reply from master: {0}")]
    MasterReply(String),

    #[error("unable to connect to MySQL slave server {addr} as {user}: {source}")]
    SlaveConnection {
        addr: String,
        user: String,
        #[source]
        source: ConnectionError,
    },

    #[error("error in MySQL query to slave {addr}: {query}: {source}")]
    SlaveQuery {
        addr: String,
        query: String,
        #[source]
        source: QueryError,
    },

    #[error("malformed reply from slave {addr}: {reason}")]
    SlaveReply { addr: String, reason: String },
}

/// One established connection the readers can query
///
/// The real implementation is `client::MysqlConn`; tests substitute scripted
/// fakes.
#[allow(async_fn_in_trait)]
pub trait Querier {
    async fn query(&mut self, sql: &str) -> Result<ResultSet, QueryError>;

    /// Close the connection, best effort
    async fn quit(self);
}

/// Connection factory the engine drives
#[allow(async_fn_in_trait)]
pub trait Connector {
    type Conn: Querier;

    async fn connect(&self, endpoint: &ServerEndpoint) -> Result<Self::Conn, ConnectionError>;
}
