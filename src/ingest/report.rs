//! Ingestion run report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A warning or failure keyed by the dataset or collection it concerns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub key: String,
    pub reason: String,
}

/// Statistics, warnings and failures of one ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionReport {
    /// Run ID
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    /// Total duration in milliseconds
    pub duration_ms: u64,
    pub databases_scanned: usize,
    pub collections_attempted: usize,
    pub collections_succeeded: usize,
    pub work_units: usize,
    /// Values the classifier rejected, over all collections
    pub values_rejected: usize,
    /// Databases and datasets dropped by the configured patterns
    pub filtered: Vec<String>,
    pub warnings: Vec<ReportEntry>,
    pub failures: Vec<ReportEntry>,
}

impl Default for IngestionReport {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestionReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            duration_ms: 0,
            databases_scanned: 0,
            collections_attempted: 0,
            collections_succeeded: 0,
            work_units: 0,
            values_rejected: 0,
            filtered: Vec::new(),
            warnings: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn report_dropped(&mut self, name: impl Into<String>) {
        self.filtered.push(name.into());
    }

    pub fn report_warning(&mut self, key: impl Into<String>, reason: impl Into<String>) {
        self.warnings.push(ReportEntry {
            key: key.into(),
            reason: reason.into(),
        });
    }

    pub fn report_failure(&mut self, key: impl Into<String>, reason: impl Into<String>) {
        self.failures.push(ReportEntry {
            key: key.into(),
            reason: reason.into(),
        });
    }

    pub fn report_work_unit(&mut self) {
        self.work_units += 1;
    }

    /// Stamp the duration since `started_at`
    pub fn finish(&mut self) {
        let elapsed = Utc::now() - self.started_at;
        self.duration_ms = elapsed.num_milliseconds().max(0) as u64;
    }

    /// No collection failed
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Get formatted duration
    pub fn duration_formatted(&self) -> String {
        let secs = self.duration_ms / 1000;
        let mins = secs / 60;
        let remaining_secs = secs % 60;

        if mins > 0 {
            format!("{}m {}s", mins, remaining_secs)
        } else {
            format!("{}.{:03}s", secs, self.duration_ms % 1000)
        }
    }

    /// Print summary to stderr
    pub fn print_summary(&self) {
        let status = if self.is_success() {
            "completed"
        } else {
            "completed with failures"
        };
        eprintln!();
        eprintln!("Ingestion {} - {}", self.run_id, status);
        eprintln!("Duration: {}", self.duration_formatted());
        eprintln!("Databases scanned: {}", self.databases_scanned);
        eprintln!(
            "Collections: {}/{} succeeded",
            self.collections_succeeded, self.collections_attempted
        );
        eprintln!("Work units: {}", self.work_units);
        if self.values_rejected > 0 {
            eprintln!("Rejected values: {}", self.values_rejected);
        }
        if !self.filtered.is_empty() {
            eprintln!("Filtered: {}", self.filtered.join(", "));
        }
        for warning in &self.warnings {
            eprintln!("  warning {}: {}", warning.key, warning.reason);
        }
        for failure in &self.failures {
            eprintln!("  failed  {}: {}", failure.key, failure.reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_defaults() {
        let report = IngestionReport::new();
        assert!(report.is_success());
        assert!(Uuid::parse_str(&report.run_id).is_ok());
        assert_ne!(report.run_id, IngestionReport::new().run_id);
    }

    #[test]
    fn test_failures_mark_unsuccessful() {
        let mut report = IngestionReport::new();
        report.report_warning("shop.Products", "downsampled");
        assert!(report.is_success());
        report.report_failure("shop.Orders", "unavailable");
        assert!(!report.is_success());
    }

    #[test]
    fn test_duration_formatted() {
        let mut report = IngestionReport::new();
        report.duration_ms = 65_000;
        assert_eq!(report.duration_formatted(), "1m 5s");
        report.duration_ms = 1_250;
        assert_eq!(report.duration_formatted(), "1.250s");
    }
}
