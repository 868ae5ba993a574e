//! Breadth-first traversal of a remote repository tree.

use std::collections::VecDeque;

use log::{debug, warn};

use crate::domain::{Entry, RepoSummary};
use crate::error::{RepoGradeError, Result};
use crate::host::SourceHost;

/// Bounds applied to a single traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkLimits {
    /// Directories that may be listed, the starting directory included.
    pub max_directories_explored: usize,
    /// Hard cap on queue pops for the whole traversal.
    pub max_iterations: usize,
}

impl Default for WalkLimits {
    fn default() -> Self {
        Self {
            max_directories_explored: 10,
            max_iterations: 2000,
        }
    }
}

/// Lazy breadth-first walker over a [`SourceHost`] tree.
///
/// Entries are produced one at a time; a directory is listed only when it is
/// popped from the queue and the expansion budget allows it. Directories past
/// the budget are still yielded, just never descended into.
pub struct TreeWalker<'a, H: SourceHost + ?Sized> {
    host: &'a H,
    repo: &'a RepoSummary,
    start_path: String,
    limits: WalkLimits,
    queue: VecDeque<Entry>,
    started: bool,
    expanded: usize,
    iterations: usize,
    empty_repository: bool,
    truncated: bool,
}

impl<'a, H: SourceHost + ?Sized> TreeWalker<'a, H> {
    /// Create a walker rooted at `start_path` (empty string for the repository root).
    pub fn new(
        host: &'a H,
        repo: &'a RepoSummary,
        start_path: impl Into<String>,
        limits: WalkLimits,
    ) -> Self {
        Self {
            host,
            repo,
            start_path: start_path.into(),
            limits,
            queue: VecDeque::new(),
            started: false,
            expanded: 0,
            iterations: 0,
            empty_repository: false,
            truncated: false,
        }
    }

    /// Produce the next entry, or `None` once the traversal is exhausted or cut off.
    ///
    /// An empty repository ends the walk without error; any other failure to
    /// list the starting directory is returned. Failures on nested directories
    /// are logged and the directory is skipped.
    pub async fn next_entry(&mut self) -> Result<Option<Entry>> {
        if !self.started {
            self.started = true;
            match self.host.get_directory(self.repo, &self.start_path).await {
                Ok(entries) => {
                    self.expanded += 1;
                    self.queue.extend(entries);
                }
                Err(RepoGradeError::EmptyRepository) => {
                    debug!("{} is empty", self.repo.full_name());
                    self.empty_repository = true;
                    return Ok(None);
                }
                Err(err) => return Err(err),
            }
        }

        if self.iterations >= self.limits.max_iterations {
            if !self.truncated && !self.queue.is_empty() {
                warn!(
                    "walk of {} stopped after {} iterations with {} entries pending",
                    self.repo.full_name(),
                    self.iterations,
                    self.queue.len()
                );
                self.truncated = true;
            }
            return Ok(None);
        }

        let Some(entry) = self.queue.pop_front() else {
            return Ok(None);
        };
        self.iterations += 1;

        if entry.is_dir() && self.expanded < self.limits.max_directories_explored {
            match self.host.get_directory(self.repo, &entry.path).await {
                Ok(children) => {
                    self.expanded += 1;
                    self.queue.extend(children);
                }
                Err(err) => warn!(
                    "skipping directory {} in {}: {err}",
                    entry.path,
                    self.repo.full_name()
                ),
            }
        }

        Ok(Some(entry))
    }

    /// Drain the walker into a vector.
    pub async fn collect_entries(&mut self) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next_entry().await? {
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Whether the host reported the repository as empty.
    pub fn is_empty_repository(&self) -> bool {
        self.empty_repository
    }

    /// Whether the iteration cap cut the traversal short.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Number of directories listed so far.
    pub fn directories_expanded(&self) -> usize {
        self.expanded
    }
}
