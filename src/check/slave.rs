//! Slave-side status reading

use tracing::debug;

use super::{CheckError, LogPosition, Querier};

const SLAVE_STATUS_QUERY: &str = "SHOW SLAVE STATUS";

/// Read the slave's view of the master position it has read up to
///
/// `Master_Log_File` / `Read_Master_Log_Pos` from SHOW SLAVE STATUS. A host
/// that returns no slave-status row is not replicating at all; that is a
/// malformed observation (the check cannot judge it), not a "behind" data
/// point.
pub async fn applied_position<Q: Querier>(
    conn: &mut Q,
    addr: &str,
) -> Result<LogPosition, CheckError> {
    let result = conn
        .query(SLAVE_STATUS_QUERY)
        .await
        .map_err(|source| CheckError::SlaveQuery {
            addr: addr.to_string(),
            query: SLAVE_STATUS_QUERY.to_string(),
            source,
        })?;

    if result.is_empty() {
        return Err(CheckError::SlaveReply {
            addr: addr.to_string(),
            reason: "SHOW SLAVE STATUS returned no rows (not configured as a slave?)"
                .to_string(),
        });
    }

    let file = result
        .value(0, "Master_Log_File")
        .ok_or_else(|| CheckError::SlaveReply {
            addr: addr.to_string(),
            reason: "missing Master_Log_File column".to_string(),
        })?
        .to_string();

    let offset = result
        .value(0, "Read_Master_Log_Pos")
        .ok_or_else(|| CheckError::SlaveReply {
            addr: addr.to_string(),
            reason: "missing Read_Master_Log_Pos column".to_string(),
        })?
        .parse::<u64>()
        .map_err(|_| CheckError::SlaveReply {
            addr: addr.to_string(),
            reason: "Read_Master_Log_Pos is not an integer".to_string(),
        })?;

    let position = LogPosition { file, offset };
    debug!(slave = addr, position = %position, "read slave log position");
    Ok(position)
}
