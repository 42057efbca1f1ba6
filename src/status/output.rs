//! Output-line and performance-data rendering

use std::fmt;

use super::Status;

/// One performance-data token: `'label'=value[unit][;warn[;crit[;min[;max]]]]`
#[derive(Debug, Clone)]
pub struct Perf {
    label: String,
    value: f64,
    unit: Option<String>,
    warn: Option<f64>,
    crit: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
}

impl Perf {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
            unit: None,
            warn: None,
            crit: None,
            min: None,
            max: None,
        }
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn warn(mut self, warn: f64) -> Self {
        self.warn = Some(warn);
        self
    }

    pub fn crit(mut self, crit: f64) -> Self {
        self.crit = Some(crit);
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }
}

/// Format a value without a trailing `.0` for whole numbers
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

impl fmt::Display for Perf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'={}", self.label, format_value(self.value))?;
        if let Some(unit) = &self.unit {
            f.write_str(unit)?;
        }

        // Trailing empty fields are dropped, interior ones kept
        let fields = [self.warn, self.crit, self.min, self.max];
        let last = fields.iter().rposition(|v| v.is_some());
        if let Some(last) = last {
            for field in &fields[..=last] {
                f.write_str(";")?;
                if let Some(value) = field {
                    f.write_str(&format_value(*value))?;
                }
            }
        }
        Ok(())
    }
}

/// Render the single output line the scheduler parses
pub fn status_line(status: Status, summary: &str, perf: &[Perf]) -> String {
    if perf.is_empty() {
        format!("{}: {}", status.label(), summary)
    } else {
        let tokens: Vec<String> = perf.iter().map(|p| p.to_string()).collect();
        format!("{}: {} | {}", status.label(), summary, tokens.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_line_without_perf() {
        assert_eq!(
            status_line(Status::Ok, "all quiet", &[]),
            "OK: all quiet"
        );
    }

    #[test]
    fn test_line_with_perf_tokens() {
        let perf = vec![
            Perf::new("slaveOne", 0.0).unit("B").crit(5000.0),
            Perf::new("slaveTwo", 7000.0).unit("B").crit(5000.0),
        ];
        assert_eq!(
            status_line(Status::Critical, "broken", &perf),
            "CRITICAL: broken | 'slaveOne'=0B;;5000 'slaveTwo'=7000B;;5000"
        );
    }

    #[test]
    fn test_perf_full_fields() {
        let perf = Perf::new("temp", 21.5)
            .unit("C")
            .warn(30.0)
            .crit(40.0)
            .min(0.0)
            .max(50.0);
        assert_eq!(perf.to_string(), "'temp'=21.5C;30;40;0;50");
    }

    #[test]
    fn test_perf_trailing_fields_dropped() {
        let perf = Perf::new("load", 3.0).warn(5.0);
        assert_eq!(perf.to_string(), "'load'=3;5");

        let bare = Perf::new("load", 3.0);
        assert_eq!(bare.to_string(), "'load'=3");
    }
}
