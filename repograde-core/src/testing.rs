//! In-memory collaborators for unit tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::completion::{CompletionClient, CompletionRequest};
use crate::domain::{Entry, RepoSummary};
use crate::error::{RepoGradeError, Result};
use crate::host::{BoxFuture, SourceHost};

pub(crate) fn summary(name: &str) -> RepoSummary {
    RepoSummary {
        owner: "octo".to_string(),
        name: name.to_string(),
        description: Some(format!("{name} description")),
        url: format!("https://github.com/octo/{name}"),
        languages: BTreeMap::from([("Rust".to_string(), 2048)]),
        size: 10,
        star_count: 1,
        is_fork: false,
    }
}

/// Host serving a single fixed tree for every repository.
#[derive(Default)]
pub(crate) struct FakeHost {
    pub(crate) repos: HashMap<String, Vec<RepoSummary>>,
    pub(crate) dirs: HashMap<String, Vec<Entry>>,
    pub(crate) files: HashMap<String, Vec<u8>>,
    pub(crate) empty: bool,
    pub(crate) broken_dirs: HashSet<String>,
    pub(crate) directory_calls: AtomicUsize,
    pub(crate) file_calls: AtomicUsize,
}

impl FakeHost {
    pub(crate) fn with_files(files: &[(&str, &str)]) -> Self {
        let mut host = Self::default();
        for (path, content) in files {
            host.add_file(path, content.as_bytes().to_vec());
        }
        host
    }

    pub(crate) fn add_file(&mut self, path: &str, content: Vec<u8>) {
        let mut parent = String::new();
        let segments: Vec<&str> = path.split('/').collect();
        for segment in &segments[..segments.len() - 1] {
            let dir = if parent.is_empty() {
                segment.to_string()
            } else {
                format!("{parent}/{segment}")
            };
            let listing = self.dirs.entry(parent.clone()).or_default();
            if !listing.iter().any(|entry| entry.path == dir) {
                listing.push(Entry::dir(dir.clone()));
            }
            parent = dir;
        }
        self.dirs
            .entry(parent)
            .or_default()
            .push(Entry::file(path, content.len() as u64));
        self.files.insert(path.to_string(), content);
    }

    pub(crate) fn directory_calls(&self) -> usize {
        self.directory_calls.load(Ordering::SeqCst)
    }
}

impl SourceHost for FakeHost {
    fn list_repositories<'a>(&'a self, username: &'a str) -> BoxFuture<'a, Vec<RepoSummary>> {
        Box::pin(async move {
            self.repos
                .get(username)
                .cloned()
                .ok_or_else(|| RepoGradeError::NotFound(username.to_string()))
        })
    }

    fn get_directory<'a>(
        &'a self,
        _repo: &'a RepoSummary,
        path: &'a str,
    ) -> BoxFuture<'a, Vec<Entry>> {
        Box::pin(async move {
            self.directory_calls.fetch_add(1, Ordering::SeqCst);
            if self.empty {
                return Err(RepoGradeError::EmptyRepository);
            }
            if self.broken_dirs.contains(path) {
                return Err(RepoGradeError::Upstream(format!("cannot list {path}")));
            }
            self.dirs
                .get(path)
                .cloned()
                .ok_or_else(|| RepoGradeError::NotFound(path.to_string()))
        })
    }

    fn get_file_content<'a>(
        &'a self,
        _repo: &'a RepoSummary,
        path: &'a str,
    ) -> BoxFuture<'a, Vec<u8>> {
        Box::pin(async move {
            self.file_calls.fetch_add(1, Ordering::SeqCst);
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| RepoGradeError::NotFound(path.to_string()))
        })
    }
}

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String> + Send + Sync>;

/// Completion client answering every prompt through a closure.
pub(crate) struct FnCompletion {
    responder: Responder,
    prompts: Mutex<Vec<String>>,
}

impl FnCompletion {
    pub(crate) fn new(
        responder: impl Fn(&CompletionRequest) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn answering(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub(crate) fn calls(&self) -> usize {
        self.prompts.lock().expect("prompts").len()
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts").clone()
    }
}

impl CompletionClient for FnCompletion {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> BoxFuture<'a, String> {
        Box::pin(async move {
            self.prompts
                .lock()
                .expect("prompts")
                .push(request.prompt.clone());
            (self.responder)(request)
        })
    }
}
