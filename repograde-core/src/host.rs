//! Source host abstraction used to list repositories and read their trees.

use std::future::Future;
use std::pin::Pin;

use crate::domain::{Entry, RepoSummary};
use crate::error::Result;

/// Boxed future returned by host and completion clients.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Remote code host (GitHub or a test double).
///
/// Implementations report an empty repository with
/// [`RepoGradeError::EmptyRepository`](crate::RepoGradeError::EmptyRepository)
/// so callers can tell it apart from ordinary failures.
pub trait SourceHost {
    /// List every repository owned by `username`.
    fn list_repositories<'a>(&'a self, username: &'a str) -> BoxFuture<'a, Vec<RepoSummary>>;

    /// List the direct children of `path` (empty string for the root).
    fn get_directory<'a>(
        &'a self,
        repo: &'a RepoSummary,
        path: &'a str,
    ) -> BoxFuture<'a, Vec<Entry>>;

    /// Fetch the raw bytes of a file.
    fn get_file_content<'a>(
        &'a self,
        repo: &'a RepoSummary,
        path: &'a str,
    ) -> BoxFuture<'a, Vec<u8>>;
}
