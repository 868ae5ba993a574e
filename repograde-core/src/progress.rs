//! Live progress of running repository analyses.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

/// Where a repository analysis currently is.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    /// Waiting to start.
    Unanalyzed,
    /// Walking the tree and picking files.
    Sampling,
    /// Sending files to the evaluator.
    Evaluating,
    /// Finished with a result.
    Aggregated,
    /// Finished with sentinel scores after a failure.
    Failed,
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unanalyzed => "unanalyzed",
            Self::Sampling => "sampling",
            Self::Evaluating => "evaluating",
            Self::Aggregated => "aggregated",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Point-in-time view of one analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    /// Current stage.
    pub stage: AnalysisStage,
    /// File most recently handed to the evaluator and not yet finished.
    pub current_file: Option<String>,
    /// Every file under evaluation, oldest first.
    pub files_in_flight: Vec<String>,
    /// Files fully evaluated.
    pub files_done: usize,
    /// Files selected for evaluation.
    pub files_total: usize,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            stage: AnalysisStage::Unanalyzed,
            current_file: None,
            files_in_flight: Vec::new(),
            files_done: 0,
            files_total: 0,
        }
    }
}

type Key = (String, String);

/// Shared table of per-repository progress.
///
/// Entries are kept for the life of the tracker, one per repository ever
/// analysed, so the last snapshot stays readable after a run ends.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    entries: Mutex<HashMap<Key, ProgressSnapshot>>,
}

impl ProgressTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Key, ProgressSnapshot>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, key: &Key, apply: impl FnOnce(&mut ProgressSnapshot)) {
        let mut entries = self.entries();
        apply(entries.entry(key.clone()).or_default());
    }

    /// Snapshot for `username/repo`, if an analysis has been started.
    pub fn snapshot(&self, username: &str, repo: &str) -> Option<ProgressSnapshot> {
        self.entries()
            .get(&(username.to_string(), repo.to_string()))
            .cloned()
    }

    /// File currently being evaluated for `username/repo`.
    pub fn current_file(&self, username: &str, repo: &str) -> Option<String> {
        self.snapshot(username, repo)
            .and_then(|snapshot| snapshot.current_file)
    }

    /// Handle for reporting progress of one repository.
    pub fn scope(self: &Arc<Self>, username: &str, repo: &str) -> RepoProgress {
        RepoProgress {
            tracker: Arc::clone(self),
            key: (username.to_string(), repo.to_string()),
        }
    }
}

/// Progress reporter bound to one repository.
#[derive(Debug, Clone)]
pub struct RepoProgress {
    tracker: Arc<ProgressTracker>,
    key: Key,
}

impl RepoProgress {
    /// Move to `stage`, resetting file state when a new run starts.
    pub fn stage(&self, stage: AnalysisStage) {
        self.tracker.update(&self.key, |snapshot| {
            if stage == AnalysisStage::Sampling {
                *snapshot = ProgressSnapshot::default();
            }
            if matches!(stage, AnalysisStage::Aggregated | AnalysisStage::Failed) {
                snapshot.files_in_flight.clear();
                snapshot.current_file = None;
            }
            snapshot.stage = stage;
        });
    }

    /// Record how many files were selected.
    pub fn files_selected(&self, total: usize) {
        self.tracker
            .update(&self.key, |snapshot| snapshot.files_total = total);
    }

    /// Record that `path` is being evaluated.
    pub fn file_started(&self, path: &str) {
        self.tracker.update(&self.key, |snapshot| {
            snapshot.files_in_flight.push(path.to_string());
            snapshot.current_file = Some(path.to_string());
        });
    }

    /// Record that `path` is done.
    pub fn file_finished(&self, path: &str) {
        self.tracker.update(&self.key, |snapshot| {
            snapshot.files_done += 1;
            if let Some(index) = snapshot.files_in_flight.iter().position(|file| file == path) {
                snapshot.files_in_flight.remove(index);
            }
            snapshot.current_file = snapshot.files_in_flight.last().cloned();
        });
    }
}
