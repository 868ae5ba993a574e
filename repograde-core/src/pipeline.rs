//! Per-repository analysis: walk, sample, trim, evaluate, aggregate.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::task::JoinSet;

use crate::aggregator::{aggregate_metric, overall_score};
use crate::config::AnalysisConfig;
use crate::domain::{FileSample, MetricKind, MetricResult, RepoAnalysis, RepoSummary};
use crate::error::Result;
use crate::gateway::EvaluatorGateway;
use crate::host::SourceHost;
use crate::progress::{AnalysisStage, RepoProgress};
use crate::retry::Sleeper;
use crate::sampler::{FileSampler, fetch_samples};
use crate::trimmer::trim_content;
use crate::walker::TreeWalker;

/// Results for one file, in [`MetricKind::ALL`] order.
type FileResults = [MetricResult; 3];

/// Runs the full analysis of a single repository.
///
/// [`analyze`](Self::analyze) always returns an analysed [`RepoAnalysis`];
/// failures surface as `Error` sentinel scores.
#[derive(Clone)]
pub struct RepositoryOrchestrator {
    host: Arc<dyn SourceHost + Send + Sync>,
    gateway: Arc<EvaluatorGateway>,
    sleeper: Arc<dyn Sleeper + Send + Sync>,
    config: Arc<AnalysisConfig>,
}

impl RepositoryOrchestrator {
    /// Assemble an orchestrator from its collaborators.
    pub fn new(
        host: Arc<dyn SourceHost + Send + Sync>,
        gateway: Arc<EvaluatorGateway>,
        sleeper: Arc<dyn Sleeper + Send + Sync>,
        config: Arc<AnalysisConfig>,
    ) -> Self {
        Self {
            host,
            gateway,
            sleeper,
            config,
        }
    }

    /// Analyse `repo`, reporting stages and files through `progress`.
    pub async fn analyze(&self, repo: &RepoSummary, progress: &RepoProgress) -> RepoAnalysis {
        info!("analyzing {}", repo.full_name());
        progress.stage(AnalysisStage::Sampling);
        match self.run(repo, progress).await {
            Ok(analysis) => {
                progress.stage(AnalysisStage::Aggregated);
                info!(
                    "finished {} with overall score {}",
                    repo.full_name(),
                    analysis.overall_score
                );
                analysis
            }
            Err(err) => {
                progress.stage(AnalysisStage::Failed);
                warn!("analysis of {} failed: {err}", repo.full_name());
                RepoAnalysis::failed(repo, &format!("Analysis failed: {err}"))
            }
        }
    }

    async fn run(&self, repo: &RepoSummary, progress: &RepoProgress) -> Result<RepoAnalysis> {
        let mut walker = TreeWalker::new(&*self.host, repo, "", self.config.walk);
        let entries = walker.collect_entries().await?;
        if walker.is_empty_repository() {
            info!("{} is empty; nothing to evaluate", repo.full_name());
            return Ok(RepoAnalysis::empty(repo));
        }

        let selected = {
            let mut rng = rand::thread_rng();
            FileSampler::new(self.config.sample).select(entries, &mut rng)
        };
        debug!("selected {} files from {}", selected.len(), repo.full_name());

        let samples = fetch_samples(&*self.host, repo, selected).await;
        if samples.is_empty() {
            info!("{} has no sampleable files", repo.full_name());
            return Ok(RepoAnalysis::empty(repo));
        }

        progress.files_selected(samples.len());
        progress.stage(AnalysisStage::Evaluating);
        let per_file = self.evaluate_samples(samples, progress).await;
        Ok(assemble(repo, &per_file))
    }

    /// Evaluate samples in fixed-size batches with a pause between batches.
    async fn evaluate_samples(
        &self,
        samples: Vec<FileSample>,
        progress: &RepoProgress,
    ) -> Vec<FileResults> {
        let batch_size = self.config.file_concurrency.max(1);
        let mut remaining = samples.into_iter().peekable();
        let mut per_file = Vec::new();

        while remaining.peek().is_some() {
            let mut tasks = JoinSet::new();
            for sample in remaining.by_ref().take(batch_size) {
                let gateway = Arc::clone(&self.gateway);
                let progress = progress.clone();
                let limits = self.config.trim;
                tasks.spawn(async move {
                    progress.file_started(&sample.path);
                    let content = trim_content(&sample.raw_content, &sample.extension, &limits);
                    let security = gateway
                        .evaluate(&content, &sample.path, MetricKind::Security)
                        .await;
                    let efficiency = gateway
                        .evaluate(&content, &sample.path, MetricKind::Efficiency)
                        .await;
                    let quality = gateway
                        .evaluate(&content, &sample.path, MetricKind::Quality)
                        .await;
                    progress.file_finished(&sample.path);
                    debug!("evaluated {}", sample.path);
                    [security, efficiency, quality]
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(results) => per_file.push(results),
                    Err(err) => warn!("file evaluation task failed: {err}"),
                }
            }

            if remaining.peek().is_some() && !self.config.batch_pause.is_zero() {
                debug!("pausing {:?} between batches", self.config.batch_pause);
                self.sleeper.sleep(self.config.batch_pause).await;
            }
        }

        per_file
    }
}

fn assemble(repo: &RepoSummary, per_file: &[FileResults]) -> RepoAnalysis {
    let metric = |index: usize| {
        let results: Vec<MetricResult> = per_file.iter().map(|file| file[index].clone()).collect();
        aggregate_metric(MetricKind::ALL[index], &results)
    };
    let security = metric(0);
    let efficiency = metric(1);
    let quality = metric(2);
    let overall_score = overall_score(security.score, efficiency.score, quality.score);

    RepoAnalysis {
        name: repo.name.clone(),
        security,
        efficiency,
        quality,
        overall_score,
        analyzed: true,
        description: repo.description.clone(),
        languages: repo.languages.clone(),
        url: repo.url.clone(),
    }
}
