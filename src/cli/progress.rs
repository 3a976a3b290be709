//! Terminal progress display for load runs
//!
//! One spinner tracks the current dataset and its entity count. Spinners are
//! only drawn when stderr is a terminal; otherwise progress goes to the log
//! alone.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::app::catalog::{ReconciledDataset, ResourceLoad, UpsertAction};
use crate::app::ingest::IngestStats;
use crate::app::runner::RunObserver;
use crate::errors::{IngestError, ReconcileError};

const TICK: Duration = Duration::from_millis(120);

/// Build a steadily ticking spinner, or a hidden one off-terminal
pub fn spinner(message: impl Into<String>, enabled: bool) -> ProgressBar {
    if !enabled || !atty::is(atty::Stream::Stderr) {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style.tick_strings(&["◐", "◓", "◑", "◒", "●"]));
    }
    spinner.set_message(message.into());
    spinner.enable_steady_tick(TICK);
    spinner
}

/// Run observer that drives a spinner
#[derive(Debug)]
pub struct LoadProgress {
    bar: ProgressBar,
    datasets: usize,
}

impl LoadProgress {
    pub fn new(enabled: bool) -> Self {
        Self {
            bar: spinner("Fetching catalog...", enabled),
            datasets: 0,
        }
    }

    /// Remove the spinner from the terminal
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl RunObserver for LoadProgress {
    fn dataset_reconciled(&mut self, dataset: &ReconciledDataset) {
        self.datasets += 1;
        let verb = match dataset.action {
            UpsertAction::Created => "created",
            UpsertAction::Updated => "updated",
        };
        self.bar.set_message(format!(
            "[{}] {} ({})",
            self.datasets, dataset.foreign_id, verb
        ));
    }

    fn dataset_failed(&mut self, error: &ReconcileError) {
        self.bar
            .println(format!("✗ {}: {}", error.foreign_id, error.source));
    }

    fn resource_started(&mut self, load: &ResourceLoad) {
        self.bar
            .set_message(format!("[{}] {}: streaming entities", self.datasets, load.foreign_id));
    }

    fn entities_written(&mut self, foreign_id: &str, stats: &IngestStats) {
        self.bar.set_message(format!(
            "[{}] {}: {} entities written",
            self.datasets, foreign_id, stats.entities_written
        ));
    }

    fn resource_finished(&mut self, foreign_id: &str, result: Result<&IngestStats, &IngestError>) {
        if let Err(e) = result {
            self.bar.println(format!("✗ {foreign_id}: {e}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_spinner_is_hidden() {
        let bar = spinner("working", false);
        assert!(bar.is_hidden());
    }

    #[test]
    fn test_progress_counts_datasets() {
        let mut progress = LoadProgress::new(false);
        let dataset = ReconciledDataset {
            foreign_id: "ds-a".to_string(),
            collection: crate::app::store::CollectionRef {
                collection_id: "1".to_string(),
                foreign_id: Some("ds-a".to_string()),
                label: None,
            },
            action: UpsertAction::Created,
            metadata: crate::app::catalog::DerivedMetadata::derive(
                &serde_json::from_value(serde_json::json!({"name": "ds-a"})).unwrap(),
                None,
            ),
        };
        progress.dataset_reconciled(&dataset);
        progress.dataset_reconciled(&dataset);
        assert_eq!(progress.datasets, 2);
        progress.finish();
    }
}
