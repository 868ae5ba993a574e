//! Language model completion abstraction.

use serde::{Deserialize, Serialize};

use crate::host::BoxFuture;

/// A single prompt with its sampling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Full prompt text.
    pub prompt: String,
    /// Model identifier understood by the backend.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling cutoff.
    pub top_p: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

/// Backend that turns a prompt into text.
///
/// Implementations fail with
/// [`RepoGradeError::RateLimited`](crate::RepoGradeError::RateLimited) when the
/// backend throttles the caller and
/// [`RepoGradeError::Upstream`](crate::RepoGradeError::Upstream) otherwise.
pub trait CompletionClient {
    /// Run one completion and return the generated text.
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> BoxFuture<'a, String>;
}
