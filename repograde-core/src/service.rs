//! User-level orchestration over the cache and the repository pipeline.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::aggregator::build_user_report;
use crate::cache::{AnalysisCache, InMemoryCache, KeyedLocks};
use crate::completion::CompletionClient;
use crate::config::AnalysisConfig;
use crate::domain::{RepoAnalysis, RepoSummary, UserReport};
use crate::error::Result;
use crate::gateway::EvaluatorGateway;
use crate::host::SourceHost;
use crate::pipeline::RepositoryOrchestrator;
use crate::progress::{ProgressSnapshot, ProgressTracker};
use crate::retry::{Sleeper, TokioSleeper};

/// When repositories are analysed.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum AnalysisMode {
    /// Analyse every selected repository before reporting.
    #[default]
    Eager,
    /// Only report; repositories are analysed on first request.
    Lazy,
}

/// Entry point for hosts: repository listing, analysis and reports.
///
/// Cloning is cheap and every clone shares the same cache.
#[derive(Clone)]
pub struct AnalysisService {
    host: Arc<dyn SourceHost + Send + Sync>,
    cache: Arc<dyn AnalysisCache + Send + Sync>,
    orchestrator: RepositoryOrchestrator,
    locks: Arc<KeyedLocks>,
    progress: Arc<ProgressTracker>,
    config: Arc<AnalysisConfig>,
}

impl AnalysisService {
    /// Service with an in-memory cache and real sleeps.
    pub fn new(
        host: Arc<dyn SourceHost + Send + Sync>,
        client: Arc<dyn CompletionClient + Send + Sync>,
        config: AnalysisConfig,
    ) -> Self {
        Self::with_parts(
            host,
            client,
            Arc::new(InMemoryCache::new()),
            Arc::new(TokioSleeper),
            config,
        )
    }

    /// Service with every collaborator supplied by the caller.
    pub fn with_parts(
        host: Arc<dyn SourceHost + Send + Sync>,
        client: Arc<dyn CompletionClient + Send + Sync>,
        cache: Arc<dyn AnalysisCache + Send + Sync>,
        sleeper: Arc<dyn Sleeper + Send + Sync>,
        config: AnalysisConfig,
    ) -> Self {
        let config = Arc::new(config);
        let gateway = Arc::new(EvaluatorGateway::new(
            client,
            Arc::clone(&sleeper),
            config.gateway.clone(),
        ));
        let orchestrator = RepositoryOrchestrator::new(
            Arc::clone(&host),
            gateway,
            sleeper,
            Arc::clone(&config),
        );
        Self {
            host,
            cache,
            orchestrator,
            locks: Arc::new(KeyedLocks::new()),
            progress: Arc::new(ProgressTracker::new()),
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// List a user's repositories, fetching them once and seeding placeholders.
    pub async fn get_user_repos(&self, username: &str) -> Result<Vec<RepoSummary>> {
        if let Some(cached) = self.cache.repositories(username) {
            debug!("repository list for {username} served from cache");
            return Ok(cached);
        }

        let repos = self.host.list_repositories(username).await?;
        info!("{username} has {} repositories", repos.len());
        self.cache.store_repositories(username, repos.clone());
        for repo in &repos {
            self.cache
                .store_analysis(username, RepoAnalysis::placeholder(repo));
        }
        Ok(repos)
    }

    /// Analyse one repository, or return the cached analysis.
    ///
    /// Concurrent calls for the same repository run the pipeline once. A
    /// repository that cannot be found comes back as an uncached `Error`
    /// analysis.
    pub async fn analyze_repository(&self, username: &str, repo_name: &str) -> Arc<RepoAnalysis> {
        if let Some(hit) = self.completed(username, repo_name) {
            return hit;
        }

        let summary = match self.get_user_repos(username).await {
            Ok(repos) => repos.into_iter().find(|repo| repo.name == repo_name),
            Err(err) => {
                warn!("cannot list repositories of {username}: {err}");
                return Arc::new(RepoAnalysis::failed(
                    &unlisted(username, repo_name),
                    &format!("Repository list unavailable: {err}"),
                ));
            }
        };
        let Some(summary) = summary else {
            warn!("{username}/{repo_name} is not among the user's repositories");
            return Arc::new(RepoAnalysis::failed(
                &unlisted(username, repo_name),
                "Repository not found",
            ));
        };

        let lock = self.locks.lock_for(username, repo_name);
        let _guard = lock.lock().await;
        if let Some(hit) = self.completed(username, repo_name) {
            return hit;
        }

        let progress = self.progress.scope(username, repo_name);
        let analysis = self.orchestrator.analyze(&summary, &progress).await;
        self.cache.store_analysis(username, analysis)
    }

    /// Fetch the repository list and, in eager mode, analyse the selected
    /// repositories with bounded concurrency before reporting.
    pub async fn analyze_all_repositories(&self, username: &str, mode: AnalysisMode) -> UserReport {
        match self.get_user_repos(username).await {
            Ok(repos) if mode == AnalysisMode::Eager => {
                let targets = select_targets(repos, &self.config);
                self.analyze_targets(username, targets).await;
            }
            Ok(_) => debug!("lazy mode: leaving {username}'s repositories for on-demand analysis"),
            Err(err) => warn!("cannot list repositories of {username}: {err}"),
        }
        self.user_report(username)
    }

    async fn analyze_targets(&self, username: &str, targets: Vec<RepoSummary>) {
        let pending: Vec<RepoSummary> = targets
            .into_iter()
            .filter(|repo| self.completed(username, &repo.name).is_none())
            .collect();
        if pending.is_empty() {
            return;
        }
        info!("analyzing {} repositories of {username}", pending.len());

        let semaphore = Arc::new(Semaphore::new(self.config.repo_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for repo in pending {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(err) => {
                    warn!("repository scheduling stopped: {err}");
                    break;
                }
            };
            let service = self.clone();
            let username = username.to_string();
            tasks.spawn(async move {
                let _permit = permit;
                service.analyze_repository(&username, &repo.name).await
            });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(err) = result {
                warn!("repository analysis task failed: {err}");
            }
        }
    }

    /// Report over everything currently cached for the user.
    pub fn user_report(&self, username: &str) -> UserReport {
        let analyses = self.cache.analyses(username);
        build_user_report(username, analyses.iter().map(Arc::as_ref))
    }

    /// Cached analyses for the user, ordered by repository name.
    pub fn cached_analyses(&self, username: &str) -> Vec<Arc<RepoAnalysis>> {
        self.cache.analyses(username)
    }

    /// Cached analysis for one repository, analysed or not.
    pub fn cached_analysis(&self, username: &str, repo_name: &str) -> Option<Arc<RepoAnalysis>> {
        self.cache.analysis(username, repo_name)
    }

    /// File currently being evaluated for `username/repo_name`.
    pub fn get_analysis_progress(&self, username: &str, repo_name: &str) -> Option<String> {
        self.progress.current_file(username, repo_name)
    }

    /// Full progress snapshot for `username/repo_name`.
    pub fn progress_snapshot(&self, username: &str, repo_name: &str) -> Option<ProgressSnapshot> {
        self.progress.snapshot(username, repo_name)
    }

    /// Blocking form of [`get_user_repos`](Self::get_user_repos).
    ///
    /// Must not be called from inside an async runtime.
    pub fn blocking_get_user_repos(&self, username: &str) -> Result<Vec<RepoSummary>> {
        current_thread()?.block_on(self.get_user_repos(username))
    }

    /// Blocking form of [`analyze_repository`](Self::analyze_repository).
    ///
    /// Must not be called from inside an async runtime.
    pub fn blocking_analyze_repository(
        &self,
        username: &str,
        repo_name: &str,
    ) -> Result<Arc<RepoAnalysis>> {
        Ok(current_thread()?.block_on(self.analyze_repository(username, repo_name)))
    }

    /// Blocking form of [`analyze_all_repositories`](Self::analyze_all_repositories).
    ///
    /// Must not be called from inside an async runtime.
    pub fn blocking_analyze_all_repositories(
        &self,
        username: &str,
        mode: AnalysisMode,
    ) -> Result<UserReport> {
        Ok(current_thread()?.block_on(self.analyze_all_repositories(username, mode)))
    }

    fn completed(&self, username: &str, repo_name: &str) -> Option<Arc<RepoAnalysis>> {
        self.cache
            .analysis(username, repo_name)
            .filter(|analysis| analysis.analyzed)
    }
}

fn current_thread() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

fn unlisted(username: &str, repo_name: &str) -> RepoSummary {
    RepoSummary {
        owner: username.to_string(),
        name: repo_name.to_string(),
        description: None,
        url: String::new(),
        languages: Default::default(),
        size: 0,
        star_count: 0,
        is_fork: false,
    }
}

/// Repositories picked for eager analysis: forks dropped when configured,
/// ranked by stars then size, cut to `max_repositories`.
pub fn select_targets(mut repos: Vec<RepoSummary>, config: &AnalysisConfig) -> Vec<RepoSummary> {
    if config.skip_forks {
        repos.retain(|repo| !repo.is_fork);
    }
    repos.sort_by(|a, b| {
        b.star_count
            .cmp(&a.star_count)
            .then_with(|| b.size.cmp(&a.size))
            .then_with(|| a.name.cmp(&b.name))
    });
    if let Some(limit) = config.max_repositories {
        repos.truncate(limit);
    }
    repos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MockAnalysisCache;
    use crate::domain::Score;
    use crate::retry::tests::RecordingSleeper;
    use crate::completion::CompletionRequest;
    use crate::host::BoxFuture;
    use crate::testing::{FakeHost, FnCompletion, summary};
    use mockall::predicate::eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const ANSWER: &str = "{\"score\": 80, \"concerns\": [\"Line 1: minor issue\"]}";

    fn ranked(name: &str, stars: u64, size: u64, fork: bool) -> RepoSummary {
        RepoSummary {
            star_count: stars,
            size,
            is_fork: fork,
            ..summary(name)
        }
    }

    fn host_with(repos: Vec<RepoSummary>) -> FakeHost {
        let mut host = FakeHost::with_files(&[("src/lib.rs", "pub fn f() {}")]);
        host.repos.insert("octo".to_string(), repos);
        host
    }

    fn service(host: Arc<FakeHost>, client: Arc<FnCompletion>, config: AnalysisConfig) -> AnalysisService {
        AnalysisService::with_parts(
            host,
            client,
            Arc::new(InMemoryCache::new()),
            Arc::new(RecordingSleeper::new()),
            config,
        )
    }

    #[test]
    fn targets_are_ranked_filtered_and_limited() {
        let repos = vec![
            ranked("small", 5, 10, false),
            ranked("forked", 50, 10, true),
            ranked("big", 5, 900, false),
            ranked("star", 40, 1, false),
        ];
        let config = AnalysisConfig {
            skip_forks: true,
            max_repositories: Some(2),
            ..AnalysisConfig::default()
        };

        let names: Vec<String> = select_targets(repos, &config)
            .into_iter()
            .map(|repo| repo.name)
            .collect();

        assert_eq!(names, vec!["star".to_string(), "big".to_string()]);
    }

    #[tokio::test]
    async fn listing_seeds_placeholders_once() {
        let host = Arc::new(host_with(vec![summary("a"), summary("b")]));
        let client = Arc::new(FnCompletion::answering(ANSWER));
        let service = service(host.clone(), client, AnalysisConfig::without_delays());

        let repos = service.get_user_repos("octo").await.expect("listing");
        assert_eq!(repos.len(), 2);
        let again = service.get_user_repos("octo").await.expect("cached listing");
        assert_eq!(again, repos);

        let report = service.user_report("octo");
        assert_eq!(report.repo_count, 2);
        assert_eq!(report.analyzed_count, 0);
        assert_eq!(
            service.cached_analysis("octo", "a").map(|a| a.security.score),
            Some(Score::Pending)
        );
    }

    #[tokio::test]
    async fn unknown_user_surfaces_listing_error() {
        let host = Arc::new(FakeHost::default());
        let client = Arc::new(FnCompletion::answering(ANSWER));
        let service = service(host, client, AnalysisConfig::without_delays());

        assert!(service.get_user_repos("nobody").await.is_err());

        let report = service.analyze_all_repositories("nobody", AnalysisMode::Eager).await;
        assert_eq!(report.repo_count, 0);
        assert_eq!(report.overall_average, Score::NotAvailable);
    }

    #[tokio::test]
    async fn repeated_analysis_returns_the_cached_allocation() {
        let host = Arc::new(host_with(vec![summary("a")]));
        let client = Arc::new(FnCompletion::answering(ANSWER));
        let service = service(host, client.clone(), AnalysisConfig::without_delays());

        let first = service.analyze_repository("octo", "a").await;
        let second = service.analyze_repository("octo", "a").await;

        assert!(first.analyzed);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn concurrent_requests_run_the_pipeline_once() {
        let host = Arc::new(host_with(vec![summary("a")]));
        let client = Arc::new(FnCompletion::answering(ANSWER));
        let service = service(host, client.clone(), AnalysisConfig::without_delays());

        let (left, right) = tokio::join!(
            service.analyze_repository("octo", "a"),
            service.analyze_repository("octo", "a")
        );

        assert!(Arc::ptr_eq(&left, &right));
        assert_eq!(client.calls(), 3);
    }

    /// Holds every call open briefly and records the peak overlap.
    #[derive(Default)]
    struct OverlapClient {
        current: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl CompletionClient for OverlapClient {
        fn complete<'a>(&'a self, _request: &'a CompletionRequest) -> BoxFuture<'a, String> {
            Box::pin(async move {
                let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                self.current.fetch_sub(1, Ordering::SeqCst);
                Ok(ANSWER.to_string())
            })
        }
    }

    #[tokio::test]
    async fn eager_run_caps_evaluator_calls_in_flight() {
        let mut host = FakeHost::with_files(&[
            ("src/a.rs", "fn a() {}"),
            ("src/b.py", "def b(): pass"),
            ("src/c.js", "function c() {}"),
            ("src/d.go", "func d() {}"),
        ]);
        host.repos.insert(
            "octo".to_string(),
            vec![summary("a"), summary("b"), summary("c"), summary("d")],
        );
        let client = Arc::new(OverlapClient::default());
        let config = AnalysisConfig::without_delays();
        let ceiling = config.gateway.max_in_flight;
        assert!(config.repo_concurrency * config.file_concurrency > ceiling);
        let service = AnalysisService::with_parts(
            Arc::new(host),
            client.clone(),
            Arc::new(InMemoryCache::new()),
            Arc::new(RecordingSleeper::new()),
            config,
        );

        let report = service.analyze_all_repositories("octo", AnalysisMode::Eager).await;

        assert_eq!(report.analyzed_count, 4);
        assert_eq!(client.calls.load(Ordering::SeqCst), 4 * 4 * 3);
        let peak = client.peak.load(Ordering::SeqCst);
        assert!(peak >= 2, "calls never overlapped");
        assert!(peak <= ceiling, "{peak} calls in flight, ceiling is {ceiling}");
    }

    #[tokio::test]
    async fn unlisted_repository_is_reported_but_not_cached() {
        let host = Arc::new(host_with(vec![summary("a")]));
        let client = Arc::new(FnCompletion::answering(ANSWER));
        let service = service(host, client.clone(), AnalysisConfig::without_delays());

        let ghost = service.analyze_repository("octo", "ghost").await;

        assert!(ghost.analyzed);
        assert_eq!(ghost.security.score, Score::Error);
        assert_eq!(ghost.overall_score, Score::NotAvailable);
        assert!(service.cached_analysis("octo", "ghost").is_none());
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn eager_mode_respects_repository_limit() {
        let host = Arc::new(host_with(vec![
            ranked("popular", 10, 1, false),
            ranked("quiet", 0, 1, false),
        ]));
        let client = Arc::new(FnCompletion::answering(ANSWER));
        let config = AnalysisConfig {
            max_repositories: Some(1),
            ..AnalysisConfig::without_delays()
        };
        let service = service(host, client, config);

        let report = service.analyze_all_repositories("octo", AnalysisMode::Eager).await;

        assert_eq!(report.repo_count, 2);
        assert_eq!(report.analyzed_count, 1);
        assert_eq!(report.security_average, Score::Value(80.0));
        assert!(service.cached_analysis("octo", "popular").map(|a| a.analyzed).unwrap_or(false));
        assert!(!service.cached_analysis("octo", "quiet").map(|a| a.analyzed).unwrap_or(true));
    }

    #[tokio::test]
    async fn lazy_mode_defers_analysis() {
        let host = Arc::new(host_with(vec![summary("a"), summary("b")]));
        let client = Arc::new(FnCompletion::answering(ANSWER));
        let service = service(host, client.clone(), AnalysisConfig::without_delays());

        let report = service.analyze_all_repositories("octo", AnalysisMode::Lazy).await;
        assert_eq!(report.repo_count, 2);
        assert_eq!(report.analyzed_count, 0);
        assert_eq!(client.calls(), 0);

        service.analyze_repository("octo", "b").await;
        let report = service.user_report("octo");
        assert_eq!(report.analyzed_count, 1);
        assert_eq!(report.top_concerns.quality[0].concern, "Line 1: minor issue");
    }

    #[tokio::test]
    async fn cache_hit_never_touches_the_host() {
        let mut done = RepoAnalysis::empty(&summary("a"));
        done.overall_score = Score::Value(91.0);
        let done = Arc::new(done);
        let returned = Arc::clone(&done);

        let mut cache = MockAnalysisCache::new();
        cache
            .expect_analysis()
            .with(eq("octo"), eq("a"))
            .times(1)
            .returning(move |_, _| Some(Arc::clone(&returned)));
        cache.expect_store_analysis().times(0);
        cache.expect_repositories().times(0);

        let host = Arc::new(FakeHost::default());
        let client = Arc::new(FnCompletion::answering(ANSWER));
        let service = AnalysisService::with_parts(
            host.clone(),
            client.clone(),
            Arc::new(cache),
            Arc::new(RecordingSleeper::new()),
            AnalysisConfig::without_delays(),
        );

        let analysis = service.analyze_repository("octo", "a").await;

        assert!(Arc::ptr_eq(&analysis, &done));
        assert_eq!(host.directory_calls(), 0);
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn blocking_entry_points_share_the_async_core() {
        let host = Arc::new(host_with(vec![summary("a")]));
        let client = Arc::new(FnCompletion::answering(ANSWER));
        let service = service(host, client, AnalysisConfig::without_delays());

        let repos = service.blocking_get_user_repos("octo").expect("listing");
        assert_eq!(repos.len(), 1);

        let report = service
            .blocking_analyze_all_repositories("octo", AnalysisMode::Eager)
            .expect("runtime");
        assert_eq!(report.analyzed_count, 1);

        let analysis = service
            .blocking_analyze_repository("octo", "a")
            .expect("runtime");
        assert!(analysis.analyzed);
    }
}
