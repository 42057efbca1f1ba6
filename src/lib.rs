//! replcheck — monitoring probe for MySQL master/slave replication
//!
//! Verifies that replication is *actually* flowing: the master must hold a
//! live binlog-dump connection for every configured slave, and every slave's
//! read position must sit within a byte tolerance of the master's current
//! log position. Results are reported through the fixed monitoring-scheduler
//! contract (exit codes 0/1/2/3, one line on stdout).
//!
//! The verdict is binary — replication either is or is not caught up — so
//! the check returns OK or CRITICAL; UNKNOWN covers anything that prevented
//! a complete observation (configuration, connection, or query failures).

pub mod check;
pub mod cli;
pub mod client;
pub mod config;
pub mod protocol;
pub mod status;
