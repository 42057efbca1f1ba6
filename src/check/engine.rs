//! Orchestration of the master and slave readers into one verdict

use tracing::{debug, info};

use crate::config::MasterConfig;
use crate::status::{status_line, Perf, Status};

use super::{master, slave, CheckError, Connector, LogPosition, Querier};

/// The replication consistency check
///
/// Strictly sequential: one connection to the master, then one connection per
/// slave in configuration order, each closed before the next is opened.
pub struct ReplicationCheck<C> {
    connector: C,
    tolerance: u64,
}

impl<C: Connector> ReplicationCheck<C> {
    pub fn new(connector: C, tolerance: u64) -> Self {
        Self {
            connector,
            tolerance,
        }
    }

    /// Run the check against one configured master
    ///
    /// Returns a verdict (OK or CRITICAL) when every configured slave could
    /// be judged, and an error for anything that prevented a complete
    /// observation. A slave with no binlog-dump connection on the master is
    /// judged (failing) without being queried; an unreachable slave is not
    /// judged and aborts the run.
    pub async fn run(&self, master_config: &MasterConfig) -> Result<ReplicationVerdict, CheckError> {
        let endpoint = master_config.endpoint();
        let mut conn = self.connector.connect(&endpoint).await.map_err(|source| {
            CheckError::MasterConnection {
                addr: endpoint.addr(),
                user: endpoint.user.clone(),
                source,
            }
        })?;

        // Both master observations ride the same connection; the master may
        // still advance between the two queries (accepted race).
        let streams = master::active_stream_hosts(&mut conn).await?;
        let master_position = master::current_position(&mut conn).await?;
        conn.quit().await;

        let mut slaves = Vec::with_capacity(master_config.slaves.len());
        for slave_config in &master_config.slaves {
            if !streams.contains(&slave_config.host) {
                info!(
                    slave = %slave_config.name,
                    host = %slave_config.host,
                    "no binlog dump connection on master"
                );
                slaves.push(SlaveReport::not_streaming(slave_config.name.clone()));
                continue;
            }

            let slave_endpoint = slave_config.endpoint();
            let mut slave_conn =
                self.connector
                    .connect(&slave_endpoint)
                    .await
                    .map_err(|source| CheckError::SlaveConnection {
                        addr: slave_endpoint.addr(),
                        user: slave_endpoint.user.clone(),
                        source,
                    })?;

            let applied = slave::applied_position(&mut slave_conn, &slave_endpoint.addr()).await?;
            slave_conn.quit().await;

            let byte_diff = master_position.offset_diff(&applied);
            let in_sync = master_position.byte_diff(&applied).is_some_and(|d| d <= self.tolerance);
            debug!(
                slave = %slave_config.name,
                position = %applied,
                byte_diff,
                in_sync,
                "compared slave position"
            );

            slaves.push(SlaveReport {
                name: slave_config.name.clone(),
                streaming: true,
                position: Some(applied),
                byte_diff: Some(byte_diff),
                in_sync,
            });
        }

        let status = if slaves.iter().any(|s| !s.in_sync) {
            Status::Critical
        } else {
            Status::Ok
        };

        Ok(ReplicationVerdict {
            status,
            master: master_position,
            tolerance: self.tolerance,
            slaves,
        })
    }
}

/// How one slave compared against the master position
#[derive(Debug, Clone)]
pub struct SlaveReport {
    pub name: String,
    /// Whether the master holds a live binlog-dump connection for this slave
    pub streaming: bool,
    /// Position the slave reported; `None` when it was never queried
    pub position: Option<LogPosition>,
    /// Distance to the master offset; informational when log files differ
    pub byte_diff: Option<u64>,
    pub in_sync: bool,
}

impl SlaveReport {
    fn not_streaming(name: String) -> Self {
        Self {
            name,
            streaming: false,
            position: None,
            byte_diff: None,
            in_sync: false,
        }
    }

    fn render(&self, tolerance: u64) -> String {
        match (&self.position, self.byte_diff) {
            (Some(position), Some(diff)) => format!(
                "{}={}, off by {}B ({} {})",
                self.name,
                position,
                diff,
                if self.in_sync { '<' } else { '>' },
                tolerance
            ),
            _ => format!("{}=no binlog dump process on master", self.name),
        }
    }
}

/// Aggregate verdict for one invocation, rendered once then discarded
#[derive(Debug, Clone)]
pub struct ReplicationVerdict {
    pub status: Status,
    pub master: LogPosition,
    pub tolerance: u64,
    pub slaves: Vec<SlaveReport>,
}

impl ReplicationVerdict {
    /// Human-readable summary naming the master and every slave in
    /// configuration order
    pub fn summary(&self) -> String {
        let total = self.slaves.len();
        let in_sync = self.slaves.iter().filter(|s| s.in_sync).count();
        let broken = total - in_sync;

        let details: Vec<String> = self
            .slaves
            .iter()
            .map(|s| s.render(self.tolerance))
            .collect();
        let detail = if details.is_empty() {
            format!("master={}", self.master)
        } else {
            format!("master={} {}", self.master, details.join("; "))
        };

        if broken > 0 {
            format!(
                "MySQL replication to {} of {} slaves broken ({})",
                broken, total, detail
            )
        } else {
            format!(
                "MySQL replication to {} of {} slaves up-to-date ({})",
                in_sync, total, detail
            )
        }
    }

    /// Per-slave byte lag as performance data
    pub fn perf_data(&self) -> Vec<Perf> {
        self.slaves
            .iter()
            .filter_map(|s| {
                s.byte_diff.map(|diff| {
                    Perf::new(&s.name, diff as f64)
                        .unit("B")
                        .crit(self.tolerance as f64)
                })
            })
            .collect()
    }

    /// The full monitoring-contract output line
    pub fn render(&self) -> String {
        status_line(self.status, &self.summary(), &self.perf_data())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use crate::client::{ConnectionError, QueryError};
    use crate::config::{MasterConfig, ServerEndpoint, SlaveConfig};
    use crate::protocol::ResultSet;

    use super::*;

    #[derive(Debug, Default)]
    struct CallLog {
        connects: Vec<String>,
        queries: Vec<(String, String)>,
    }

    impl CallLog {
        fn connects_to(&self, host: &str) -> usize {
            self.connects.iter().filter(|a| a.starts_with(host)).count()
        }

        fn queries_to(&self, host: &str) -> usize {
            self.queries.iter().filter(|(a, _)| a.starts_with(host)).count()
        }
    }

    #[derive(Clone)]
    enum FakeServer {
        Unreachable,
        Up(HashMap<String, ResultSet>),
    }

    struct FakeConnector {
        servers: HashMap<String, FakeServer>,
        log: Arc<Mutex<CallLog>>,
    }

    impl FakeConnector {
        fn new(servers: Vec<(&str, FakeServer)>) -> Self {
            Self {
                servers: servers
                    .into_iter()
                    .map(|(host, server)| (host.to_string(), server))
                    .collect(),
                log: Arc::new(Mutex::new(CallLog::default())),
            }
        }

        fn log(&self) -> std::sync::MutexGuard<'_, CallLog> {
            self.log.lock().unwrap()
        }
    }

    struct FakeConn {
        addr: String,
        responses: HashMap<String, ResultSet>,
        log: Arc<Mutex<CallLog>>,
    }

    impl Connector for &FakeConnector {
        type Conn = FakeConn;

        async fn connect(&self, endpoint: &ServerEndpoint) -> Result<FakeConn, ConnectionError> {
            self.log.lock().unwrap().connects.push(endpoint.addr());
            match self.servers.get(&endpoint.host) {
                Some(FakeServer::Up(responses)) => Ok(FakeConn {
                    addr: endpoint.addr(),
                    responses: responses.clone(),
                    log: self.log.clone(),
                }),
                _ => Err(ConnectionError::Connect("connection refused".to_string())),
            }
        }
    }

    impl Querier for FakeConn {
        async fn query(&mut self, sql: &str) -> Result<ResultSet, QueryError> {
            self.log
                .lock()
                .unwrap()
                .queries
                .push((self.addr.clone(), sql.to_string()));
            self.responses
                .get(sql)
                .cloned()
                .ok_or_else(|| QueryError::Protocol(format!("unscripted query: {sql}")))
        }

        async fn quit(self) {}
    }

    fn processlist(streaming_hosts: &[&str]) -> ResultSet {
        let columns = vec![
            "Id".to_string(),
            "User".to_string(),
            "Host".to_string(),
            "db".to_string(),
            "Command".to_string(),
            "Time".to_string(),
            "State".to_string(),
            "Info".to_string(),
        ];
        let mut rows = vec![
            // Unrelated connection, must never count as streaming
            vec![
                Some("3".to_string()),
                Some("app".to_string()),
                Some("app-host:50001".to_string()),
                None,
                Some("Sleep".to_string()),
                Some("12".to_string()),
                Some(String::new()),
                None,
            ],
        ];
        for (i, host) in streaming_hosts.iter().enumerate() {
            rows.push(vec![
                Some(format!("{}", 10 + i)),
                Some("repl".to_string()),
                Some(format!("{host}:51234")),
                None,
                Some("Binlog Dump".to_string()),
                Some("86400".to_string()),
                Some("Master has sent all binlog to slave".to_string()),
                None,
            ]);
        }
        ResultSet::new(columns, rows)
    }

    fn master_status(file: &str, position: u64) -> ResultSet {
        ResultSet::new(
            vec![
                "File".to_string(),
                "Position".to_string(),
                "Binlog_Do_DB".to_string(),
                "Binlog_Ignore_DB".to_string(),
            ],
            vec![vec![
                Some(file.to_string()),
                Some(position.to_string()),
                Some(String::new()),
                Some(String::new()),
            ]],
        )
    }

    fn slave_status(file: &str, position: u64) -> ResultSet {
        ResultSet::new(
            vec![
                "Slave_IO_State".to_string(),
                "Master_Host".to_string(),
                "Master_Log_File".to_string(),
                "Read_Master_Log_Pos".to_string(),
            ],
            vec![vec![
                Some("Waiting for master to send event".to_string()),
                Some("master1".to_string()),
                Some(file.to_string()),
                Some(position.to_string()),
            ]],
        )
    }

    fn master_server(streaming: &[&str], file: &str, position: u64) -> FakeServer {
        FakeServer::Up(HashMap::from([
            ("SHOW PROCESSLIST".to_string(), processlist(streaming)),
            ("SHOW MASTER STATUS".to_string(), master_status(file, position)),
        ]))
    }

    fn slave_server(file: &str, position: u64) -> FakeServer {
        FakeServer::Up(HashMap::from([(
            "SHOW SLAVE STATUS".to_string(),
            slave_status(file, position),
        )]))
    }

    fn config(slaves: &[&str]) -> MasterConfig {
        MasterConfig {
            name: "db1".to_string(),
            host: "master1".to_string(),
            port: 3306,
            user: "nagios".to_string(),
            password: "secret".to_string(),
            slaves: slaves
                .iter()
                .map(|name| SlaveConfig {
                    name: name.to_string(),
                    host: format!("{name}-host"),
                    port: 3306,
                    user: "nagios".to_string(),
                    password: "secret".to_string(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_single_slave_in_sync() {
        let connector = FakeConnector::new(vec![
            ("master1", master_server(&["slaveOne-host"], "bin.001", 5000)),
            ("slaveOne-host", slave_server("bin.001", 5000)),
        ]);

        let verdict = ReplicationCheck::new(&connector, 5000)
            .run(&config(&["slaveOne"]))
            .await
            .unwrap();

        assert_eq!(verdict.status, Status::Ok);
        assert_eq!(verdict.status.exit_code(), 0);
        assert!(verdict.slaves[0].in_sync);
        let summary = verdict.summary();
        assert!(summary.contains("1 of 1 slaves up-to-date"), "{summary}");
        assert!(summary.contains("master=bin.001:5000"), "{summary}");
        assert!(summary.contains("slaveOne=bin.001:5000, off by 0B (< 5000)"), "{summary}");
    }

    #[tokio::test]
    async fn test_slave_beyond_tolerance_is_critical() {
        let connector = FakeConnector::new(vec![
            ("master1", master_server(&["slaveOne-host"], "bin.001", 10_000)),
            ("slaveOne-host", slave_server("bin.001", 3_000)),
        ]);

        let verdict = ReplicationCheck::new(&connector, 5000)
            .run(&config(&["slaveOne"]))
            .await
            .unwrap();

        assert_eq!(verdict.status, Status::Critical);
        assert_eq!(verdict.status.exit_code(), 2);
        let summary = verdict.summary();
        assert!(summary.contains("1 of 1 slaves broken"), "{summary}");
        assert!(summary.contains("off by 7000B (> 5000)"), "{summary}");
    }

    #[tokio::test]
    async fn test_diff_at_tolerance_is_still_in_sync() {
        let connector = FakeConnector::new(vec![
            ("master1", master_server(&["slaveOne-host"], "bin.001", 10_000)),
            ("slaveOne-host", slave_server("bin.001", 5_000)),
        ]);

        let verdict = ReplicationCheck::new(&connector, 5000)
            .run(&config(&["slaveOne"]))
            .await
            .unwrap();

        assert_eq!(verdict.status, Status::Ok);
        assert!(verdict.summary().contains("off by 5000B (< 5000)"));
    }

    #[tokio::test]
    async fn test_file_mismatch_is_critical_regardless_of_offset() {
        let connector = FakeConnector::new(vec![
            ("master1", master_server(&["slaveOne-host"], "bin.002", 100)),
            ("slaveOne-host", slave_server("bin.001", 100)),
        ]);

        let verdict = ReplicationCheck::new(&connector, 5000)
            .run(&config(&["slaveOne"]))
            .await
            .unwrap();

        assert_eq!(verdict.status, Status::Critical);
        assert!(!verdict.slaves[0].in_sync);
        // Offset distance is reported as informational only
        assert_eq!(verdict.slaves[0].byte_diff, Some(0));
    }

    #[tokio::test]
    async fn test_not_streaming_slave_is_critical_and_never_queried() {
        let connector = FakeConnector::new(vec![
            // slaveTwo-host has no binlog dump connection
            (
                "master1",
                master_server(&["slaveOne-host"], "bin.001", 5000),
            ),
            ("slaveOne-host", slave_server("bin.001", 5000)),
            ("slaveTwo-host", slave_server("bin.001", 5000)),
        ]);

        let verdict = ReplicationCheck::new(&connector, 5000)
            .run(&config(&["slaveOne", "slaveTwo"]))
            .await
            .unwrap();

        assert_eq!(verdict.status, Status::Critical);
        let summary = verdict.summary();
        assert!(summary.contains("1 of 2 slaves broken"), "{summary}");
        assert!(
            summary.contains("slaveTwo=no binlog dump process on master"),
            "{summary}"
        );

        let log = connector.log();
        assert_eq!(log.connects_to("slaveTwo-host"), 0);
        assert_eq!(log.queries_to("slaveTwo-host"), 0);
        // The streaming slave was still evaluated
        assert_eq!(log.connects_to("slaveOne-host"), 1);
    }

    #[tokio::test]
    async fn test_unreachable_slave_aborts_whole_check() {
        let connector = FakeConnector::new(vec![
            (
                "master1",
                master_server(&["slaveOne-host", "slaveTwo-host"], "bin.001", 5000),
            ),
            ("slaveOne-host", slave_server("bin.001", 5000)),
            ("slaveTwo-host", FakeServer::Unreachable),
        ]);

        let result = ReplicationCheck::new(&connector, 5000)
            .run(&config(&["slaveOne", "slaveTwo"]))
            .await;

        // One healthy slave never turns an unobservable run into a verdict
        assert!(matches!(result, Err(CheckError::SlaveConnection { .. })));
    }

    #[tokio::test]
    async fn test_master_unreachable_queries_no_slave() {
        let connector = FakeConnector::new(vec![
            ("master1", FakeServer::Unreachable),
            ("slaveOne-host", slave_server("bin.001", 5000)),
        ]);

        let result = ReplicationCheck::new(&connector, 5000)
            .run(&config(&["slaveOne"]))
            .await;

        assert!(matches!(result, Err(CheckError::MasterConnection { .. })));
        let log = connector.log();
        assert_eq!(log.connects.len(), 1);
        assert_eq!(log.queries.len(), 0);
    }

    #[tokio::test]
    async fn test_master_observations_share_one_connection() {
        let connector = FakeConnector::new(vec![
            ("master1", master_server(&[], "bin.001", 5000)),
        ]);

        ReplicationCheck::new(&connector, 5000)
            .run(&config(&[]))
            .await
            .unwrap();

        let log = connector.log();
        assert_eq!(log.connects_to("master1"), 1);
        assert_eq!(
            log.queries
                .iter()
                .map(|(_, q)| q.as_str())
                .collect::<Vec<_>>(),
            vec!["SHOW PROCESSLIST", "SHOW MASTER STATUS"]
        );
    }

    #[tokio::test]
    async fn test_repeated_runs_render_identically() {
        let connector = FakeConnector::new(vec![
            (
                "master1",
                master_server(&["slaveOne-host", "slaveTwo-host"], "bin.001", 9000),
            ),
            ("slaveOne-host", slave_server("bin.001", 9000)),
            ("slaveTwo-host", slave_server("bin.001", 1000)),
        ]);

        let check = ReplicationCheck::new(&connector, 5000);
        let first = check.run(&config(&["slaveOne", "slaveTwo"])).await.unwrap();
        let second = check.run(&config(&["slaveOne", "slaveTwo"])).await.unwrap();

        assert_eq!(first.render(), second.render());
        // Slave order follows configuration order
        let summary = first.summary();
        let one = summary.find("slaveOne=").unwrap();
        let two = summary.find("slaveTwo=").unwrap();
        assert!(one < two);
    }

    #[tokio::test]
    async fn test_perf_data_reports_byte_lag() {
        let connector = FakeConnector::new(vec![
            ("master1", master_server(&["slaveOne-host"], "bin.001", 10_000)),
            ("slaveOne-host", slave_server("bin.001", 3_000)),
        ]);

        let verdict = ReplicationCheck::new(&connector, 5000)
            .run(&config(&["slaveOne"]))
            .await
            .unwrap();

        let line = verdict.render();
        assert!(line.starts_with("CRITICAL: "), "{line}");
        assert!(line.contains(" | 'slaveOne'=7000B;;5000"), "{line}");
    }

    #[tokio::test]
    async fn test_no_slaves_configured_is_ok() {
        let connector = FakeConnector::new(vec![
            ("master1", master_server(&[], "bin.001", 5000)),
        ]);

        let verdict = ReplicationCheck::new(&connector, 5000)
            .run(&config(&[]))
            .await
            .unwrap();

        assert_eq!(verdict.status, Status::Ok);
        assert_eq!(
            verdict.summary(),
            "MySQL replication to 0 of 0 slaves up-to-date (master=bin.001:5000)"
        );
    }
}
