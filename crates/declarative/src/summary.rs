//! Run summary tracker
//!
//! One [`RunSummary`] lives for the whole run. The orchestrator moves each
//! service through its lifecycle and the summary renders the final report
//! and decides the exit status.

use crate::types::{ServiceRecord, Status, StatusCounts};
use indexmap::IndexMap;
use serde::Serialize;

const RULE_WIDTH: usize = 60;

/// Per-service outcomes for one run, in first-reference order
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    services: IndexMap<String, ServiceRecord>,
}

/// Machine-readable form of a finished run
#[derive(Debug, Serialize)]
pub struct SummaryReport<'a> {
    pub services: &'a IndexMap<String, ServiceRecord>,
    pub counts: StatusCounts,
    pub failed: Vec<&'a str>,
    /// `--services` value that re-runs only the failures
    pub rerun: Option<String>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, service: &str) -> &mut ServiceRecord {
        self.services.entry(service.to_string()).or_default()
    }

    /// Record one applied change
    pub fn record_change(&mut self, service: &str, message: &str) {
        self.entry(service).changes.push(message.to_string());
        log::info!("[{service}] {message}");
    }

    /// Mark a service as skipped
    pub fn record_skip(&mut self, service: &str, reason: &str) {
        let record = self.entry(service);
        record.status = Status::Skipped;
        record.changes.push(format!("Skipped: {reason}"));
        log::info!("[{service}] Skipped: {reason}");
    }

    /// Record an error without changing status
    pub fn record_error(&mut self, service: &str, error: &str) {
        self.entry(service).errors.push(error.to_string());
        log::error!("[{service}] ERROR: {error}");
    }

    pub fn mark_in_progress(&mut self, service: &str) {
        self.entry(service).status = Status::InProgress;
    }

    /// Mark success and append the reconciler's changes
    pub fn mark_success(&mut self, service: &str, changes: Vec<String>) {
        let record = self.entry(service);
        record.status = Status::Success;
        record.changes.extend(changes);
    }

    pub fn mark_failed(&mut self, service: &str, error: &str) {
        let record = self.entry(service);
        record.status = Status::Failed;
        record.errors.push(error.to_string());
        log::error!("[{service}] FAILED: {error}");
    }

    pub fn get(&self, service: &str) -> Option<&ServiceRecord> {
        self.services.get(service)
    }

    pub fn services(&self) -> impl Iterator<Item = (&str, &ServiceRecord)> {
        self.services.iter().map(|(name, record)| (name.as_str(), record))
    }

    pub fn has_failures(&self) -> bool {
        self.services.values().any(|r| r.status == Status::Failed)
    }

    /// Names of failed services, in run order
    pub fn failed_services(&self) -> Vec<&str> {
        self.services
            .iter()
            .filter(|(_, r)| r.status == Status::Failed)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for record in self.services.values() {
            counts.add(record.status);
        }
        counts
    }

    /// `--services` argument covering only the failed services
    pub fn rerun_services(&self) -> Option<String> {
        let failed = self.failed_services();
        if failed.is_empty() {
            None
        } else {
            Some(failed.join(","))
        }
    }

    pub fn report(&self) -> SummaryReport<'_> {
        SummaryReport {
            services: &self.services,
            counts: self.counts(),
            failed: self.failed_services(),
            rerun: self.rerun_services(),
        }
    }

    /// Pretty-printed JSON of [`RunSummary::report`]
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.report())
    }

    /// Plain-text report suitable for CI logs
    pub fn render(&self) -> String {
        let heavy = "=".repeat(RULE_WIDTH);
        let mut out = String::new();

        out.push('\n');
        out.push_str(&heavy);
        out.push_str("\n  SETUP SUMMARY\n");
        out.push_str(&heavy);
        out.push('\n');

        for (name, record) in &self.services {
            out.push_str(&format!("\n  [{}] {}\n", record.status.icon(), name));
            for change in &record.changes {
                out.push_str(&format!("        + {change}\n"));
            }
            for error in &record.errors {
                out.push_str(&format!("        ! {error}\n"));
            }
        }

        out.push('\n');
        out.push_str(&"-".repeat(RULE_WIDTH));
        out.push_str(&format!("\n  Result: {}\n", self.counts().describe()));
        if let Some(services) = self.rerun_services() {
            out.push_str(&format!("  Re-run with: --services {services}\n"));
        }
        out.push_str(&heavy);
        out.push('\n');
        out
    }
}
