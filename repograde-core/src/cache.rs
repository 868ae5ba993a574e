//! Repository list and analysis caching.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::domain::{RepoAnalysis, RepoSummary};

/// Storage for repository lists and analyses, keyed by user and repository.
#[cfg_attr(test, mockall::automock)]
pub trait AnalysisCache {
    /// Cached repository list for a user.
    fn repositories(&self, username: &str) -> Option<Vec<RepoSummary>>;
    /// Replace the cached repository list for a user.
    fn store_repositories(&self, username: &str, repositories: Vec<RepoSummary>);
    /// Cached analysis for one repository.
    fn analysis(&self, username: &str, repo: &str) -> Option<Arc<RepoAnalysis>>;
    /// Store an analysis and return the entry now cached under its key.
    ///
    /// An analysed entry is never replaced, and an unanalysed one never
    /// replaces anything.
    fn store_analysis(&self, username: &str, analysis: RepoAnalysis) -> Arc<RepoAnalysis>;
    /// Every cached analysis for a user, ordered by repository name.
    fn analyses(&self, username: &str) -> Vec<Arc<RepoAnalysis>>;
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Process-lifetime cache backed by hash maps.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    repositories: RwLock<HashMap<String, Vec<RepoSummary>>>,
    analyses: RwLock<HashMap<String, BTreeMap<String, Arc<RepoAnalysis>>>>,
}

impl InMemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnalysisCache for InMemoryCache {
    fn repositories(&self, username: &str) -> Option<Vec<RepoSummary>> {
        read(&self.repositories).get(username).cloned()
    }

    fn store_repositories(&self, username: &str, repositories: Vec<RepoSummary>) {
        write(&self.repositories).insert(username.to_string(), repositories);
    }

    fn analysis(&self, username: &str, repo: &str) -> Option<Arc<RepoAnalysis>> {
        read(&self.analyses)
            .get(username)
            .and_then(|repos| repos.get(repo))
            .cloned()
    }

    fn store_analysis(&self, username: &str, analysis: RepoAnalysis) -> Arc<RepoAnalysis> {
        let mut analyses = write(&self.analyses);
        let repos = analyses.entry(username.to_string()).or_default();
        if let Some(existing) = repos.get(&analysis.name) {
            if existing.analyzed || !analysis.analyzed {
                return Arc::clone(existing);
            }
        }
        let stored = Arc::new(analysis);
        repos.insert(stored.name.clone(), Arc::clone(&stored));
        stored
    }

    fn analyses(&self, username: &str) -> Vec<Arc<RepoAnalysis>> {
        read(&self.analyses)
            .get(username)
            .map(|repos| repos.values().cloned().collect())
            .unwrap_or_default()
    }
}

/// One async mutex per (user, repository) key.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<(String, String), Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex guarding `username/repo`, created on first use.
    ///
    /// Entries no caller still holds are dropped first, so the table only
    /// grows with the number of analyses in progress.
    pub fn lock_for(&self, username: &str, repo: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.table();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(
            locks
                .entry((username.to_string(), repo.to_string()))
                .or_default(),
        )
    }

    /// Number of keys currently in the table.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    /// Whether no key is in the table.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn table(&self) -> MutexGuard<'_, HashMap<(String, String), Arc<tokio::sync::Mutex<()>>>> {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
