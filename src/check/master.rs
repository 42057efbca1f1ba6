//! Master-side status reading
//!
//! Two observations come from the master, on one shared connection: the set
//! of hosts it is actively streaming the binary log to (SHOW PROCESSLIST
//! filtered to binlog-dump commands) and its current log position
//! (SHOW MASTER STATUS).

use std::collections::HashSet;

use tracing::debug;

use super::{CheckError, LogPosition, Querier};

const PROCESSLIST_QUERY: &str = "SHOW PROCESSLIST";
const MASTER_STATUS_QUERY: &str = "SHOW MASTER STATUS";

/// Hosts with a live binlog-dump connection on the master
///
/// A liveness signal only: a slave present here is receiving log events right
/// now, it says nothing about how far behind it is.
#[derive(Debug, Clone, Default)]
pub struct ActiveStreamSet {
    hosts: HashSet<String>,
}

impl ActiveStreamSet {
    pub fn contains(&self, host: &str) -> bool {
        self.hosts.contains(host)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// List hosts the master is currently streaming the binary log to
///
/// The processlist `Host` column carries `host:port`; slaves are matched on
/// the bare host, so the port part is dropped. Both the plain and the GTID
/// binlog-dump command names count as streaming.
pub async fn active_stream_hosts<Q: Querier>(
    conn: &mut Q,
) -> Result<ActiveStreamSet, CheckError> {
    let result = conn
        .query(PROCESSLIST_QUERY)
        .await
        .map_err(|source| CheckError::MasterQuery {
            query: PROCESSLIST_QUERY.to_string(),
            source,
        })?;

    let mut hosts = HashSet::new();
    for row in result.row_indexes() {
        match result.value(row, "Command") {
            Some(command) if command.starts_with("Binlog Dump") => {}
            _ => continue,
        }
        if let Some(host) = result.value(row, "Host") {
            let bare = host.split(':').next().unwrap_or(host);
            hosts.insert(bare.to_string());
        }
    }

    debug!(streaming = hosts.len(), "enumerated binlog dump connections");
    Ok(ActiveStreamSet { hosts })
}

/// Read the master's current binary log file and offset
pub async fn current_position<Q: Querier>(conn: &mut Q) -> Result<LogPosition, CheckError> {
    let result = conn
        .query(MASTER_STATUS_QUERY)
        .await
        .map_err(|source| CheckError::MasterQuery {
            query: MASTER_STATUS_QUERY.to_string(),
            source,
        })?;

    // Multi-source setups may return several rows; the first is authoritative
    if result.is_empty() {
        return Err(CheckError::MasterReply(
            "SHOW MASTER STATUS returned no rows (binary logging disabled?)".to_string(),
        ));
    }

    let file = result
        .value(0, "File")
        .ok_or_else(|| CheckError::MasterReply("missing File column".to_string()))?
        .to_string();

    let offset = result
        .value(0, "Position")
        .ok_or_else(|| CheckError::MasterReply("missing Position column".to_string()))?
        .parse::<u64>()
        .map_err(|_| CheckError::MasterReply("Position is not an integer".to_string()))?;

    let position = LogPosition { file, offset };
    debug!(position = %position, "read master log position");
    Ok(position)
}
