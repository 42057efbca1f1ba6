//! Threshold evaluation for numeric probe readings
//!
//! Pure: observations plus bounds in, OK/WARNING/CRITICAL out. Probes of this
//! family express bounds as optional low/high pairs (a reading can be too
//! cold as well as too hot); a missing bound never triggers.

use super::Status;

/// Inclusive-inside low/high bounds; a value outside either bound violates
#[derive(Debug, Clone, Copy, Default)]
pub struct Bounds {
    pub low: Option<f64>,
    pub high: Option<f64>,
}

impl Bounds {
    pub fn low(low: f64) -> Self {
        Self {
            low: Some(low),
            high: None,
        }
    }

    pub fn high(high: f64) -> Self {
        Self {
            low: None,
            high: Some(high),
        }
    }

    pub fn range(low: f64, high: f64) -> Self {
        Self {
            low: Some(low),
            high: Some(high),
        }
    }

    fn violated_by(&self, value: f64) -> bool {
        self.low.is_some_and(|low| value < low) || self.high.is_some_and(|high| value > high)
    }
}

/// Warning and critical bounds for one reading
#[derive(Debug, Clone, Copy, Default)]
pub struct Thresholds {
    pub warning: Bounds,
    pub critical: Bounds,
}

impl Thresholds {
    pub fn new(warning: Bounds, critical: Bounds) -> Self {
        Self { warning, critical }
    }

    /// Judge a single observation
    pub fn evaluate(&self, value: f64) -> Status {
        if self.critical.violated_by(value) {
            Status::Critical
        } else if self.warning.violated_by(value) {
            Status::Warning
        } else {
            Status::Ok
        }
    }

    /// Judge several observations, reporting the worst
    pub fn evaluate_all(&self, values: impl IntoIterator<Item = f64>) -> Status {
        values
            .into_iter()
            .map(|v| self.evaluate(v))
            .fold(Status::Ok, Status::worst)
    }
}
