#![deny(missing_docs)]
//! repograde core library.
//!
//! Walks a user's remote repositories, samples and trims source files, has
//! an evaluator score them for security, efficiency and quality, and folds
//! the results into repository and user reports. Remote access is behind
//! the [`SourceHost`] and [`CompletionClient`] traits.

pub mod aggregator;
pub mod cache;
pub mod completion;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod host;
pub mod parse;
pub mod pipeline;
pub mod progress;
pub mod prompt;
pub mod report;
pub mod resources;
pub mod retry;
pub mod sampler;
pub mod service;
pub mod trimmer;
pub mod walker;

#[cfg(test)]
mod testing;

pub use aggregator::{NEUTRAL_SCORE, aggregate_metric, build_user_report, overall_score};
pub use cache::{AnalysisCache, InMemoryCache, KeyedLocks};
pub use completion::{CompletionClient, CompletionRequest};
pub use config::AnalysisConfig;
pub use domain::{
    ConcernCount, Confidence, Entry, EntryKind, FileSample, LanguageBytes, MetricKind,
    MetricResult, RepoAnalysis, RepoSummary, Resource, Score, TopConcerns, UserReport,
};
pub use error::{RepoGradeError, Result};
pub use gateway::{DEFAULT_MODEL, EvaluatorGateway, GatewaySettings};
pub use host::{BoxFuture, SourceHost};
pub use parse::{ParsedResponse, parse_response};
pub use pipeline::RepositoryOrchestrator;
pub use progress::{AnalysisStage, ProgressSnapshot, ProgressTracker};
pub use report::{
    format_language_stats, render_json, render_repo_markdown, render_user_markdown, score_label,
    title_case,
};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use sampler::{FileSampler, SampleLimits};
pub use service::{AnalysisMode, AnalysisService, select_targets};
pub use trimmer::{TRUNCATION_MARKER, TrimLimits, trim_content};
pub use walker::{TreeWalker, WalkLimits};
