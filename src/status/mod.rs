//! Monitoring scheduler contract
//!
//! Shared by every probe of this family: the four service states with their
//! fixed exit codes, the single-line output format
//! `LEVEL: summary [| perfdata]`, and threshold evaluation for probes that
//! compare a numeric reading against warning/critical bounds.

mod output;
mod thresholds;

pub use output::{status_line, Perf};
pub use thresholds::{Bounds, Thresholds};

use std::fmt;

/// Service state reported to the scheduler
///
/// Exit codes are part of the contract and must never change. UNKNOWN is not
/// a severity level but the "could not observe" state; threshold evaluation
/// never produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Status {
    /// Process exit code consumed by the scheduler
    pub fn exit_code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Warning => 1,
            Status::Critical => 2,
            Status::Unknown => 3,
        }
    }

    /// Level label leading the output line
    pub fn label(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Critical => "CRITICAL",
            Status::Unknown => "UNKNOWN",
        }
    }

    /// The more severe of two states, for folding multiple observations
    pub fn worst(self, other: Self) -> Self {
        if self.severity() >= other.severity() {
            self
        } else {
            other
        }
    }

    fn severity(self) -> u8 {
        match self {
            Status::Ok => 0,
            Status::Unknown => 1,
            Status::Warning => 2,
            Status::Critical => 3,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
