//! Run summary tallies

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::app::catalog::UpsertAction;
use crate::app::ingest::IngestStats;

/// Outcome of one load run
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished, once it has
    pub finished_at: Option<DateTime<Utc>>,
    /// Collections created
    pub datasets_created: usize,
    /// Collections updated
    pub datasets_updated: usize,
    /// Datasets whose reconciliation failed
    pub datasets_failed: usize,
    /// Resource streams drained to the end
    pub resources_streamed: usize,
    /// Resource streams that ended with an error
    pub resources_failed: usize,
    /// Resource streams handed out but not consumed
    pub resources_skipped: usize,
    /// Entities accepted by the store
    pub entities_written: usize,
    /// Whether the run stopped early on cancellation or deadline
    pub interrupted: bool,
    /// One line per failure, in the order they happened
    pub failures: Vec<String>,
}

impl Default for LoadSummary {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadSummary {
    /// Start a summary at the current time
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            datasets_created: 0,
            datasets_updated: 0,
            datasets_failed: 0,
            resources_streamed: 0,
            resources_failed: 0,
            resources_skipped: 0,
            entities_written: 0,
            interrupted: false,
            failures: Vec::new(),
        }
    }

    pub fn record_reconciled(&mut self, action: UpsertAction) {
        match action {
            UpsertAction::Created => self.datasets_created += 1,
            UpsertAction::Updated => self.datasets_updated += 1,
        }
    }

    pub fn record_dataset_failure(&mut self, message: impl Into<String>) {
        self.datasets_failed += 1;
        self.failures.push(message.into());
    }

    pub fn record_resource(&mut self, stats: &IngestStats) {
        self.resources_streamed += 1;
        self.entities_written += stats.entities_written;
    }

    /// A stream that failed part-way; entities written before the failure
    /// still count
    pub fn record_resource_failure(&mut self, stats: &IngestStats, message: impl Into<String>) {
        self.resources_failed += 1;
        self.entities_written += stats.entities_written;
        self.failures.push(message.into());
    }

    pub fn record_resource_skipped(&mut self) {
        self.resources_skipped += 1;
    }

    pub fn mark_interrupted(&mut self) {
        self.interrupted = true;
    }

    /// Stamp the finish time
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Datasets whose collection was created or updated
    pub fn datasets_reconciled(&self) -> usize {
        self.datasets_created + self.datasets_updated
    }

    /// Whether any dataset or stream failed, or the run was cut short
    pub fn has_failures(&self) -> bool {
        self.datasets_failed > 0 || self.resources_failed > 0 || self.interrupted
    }

    /// Wall-clock duration of the run so far
    pub fn duration(&self) -> Duration {
        self.finished_at
            .unwrap_or_else(Utc::now)
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Write the summary to the log
    pub fn log(&self) {
        info!(
            "Reconciled {} datasets ({} created, {} updated) in {:.1}s",
            self.datasets_reconciled(),
            self.datasets_created,
            self.datasets_updated,
            self.duration().as_secs_f64()
        );
        info!(
            "Streamed {} resources, wrote {} entities",
            self.resources_streamed, self.entities_written
        );
        if self.resources_skipped > 0 {
            info!("Left {} resources unread", self.resources_skipped);
        }
        for failure in &self.failures {
            warn!("{}", failure);
        }
        if self.interrupted {
            warn!("Run was interrupted before the catalog was fully processed");
        }
    }
}
