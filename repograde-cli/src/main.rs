#![deny(missing_docs)]
//! repograde command-line interface.
//!
//! Lists a GitHub user's repositories and grades them for security,
//! efficiency and quality with a chat-completion model.

mod github;
mod llm;

use clap::{Args, Parser, Subcommand, ValueEnum};
use github::{DEFAULT_GITHUB_API_URL, GitHubHost};
use llm::{ChatCompletionClient, DEFAULT_LLM_BASE_URL};
use log::info;
use repograde_core::{
    AnalysisConfig, AnalysisMode, AnalysisService, DEFAULT_MODEL, MetricKind, RepoAnalysis,
    RepoSummary, UserReport, format_language_stats, render_json, render_repo_markdown,
    render_user_markdown, score_label, title_case,
};
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub(crate) type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[cfg_attr(test, allow(dead_code))]
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "repograde", version, about = "Grade a GitHub user's repositories")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Debug)]
struct ConnectionArgs {
    /// GitHub token used for API requests.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,
    /// Base URL of the GitHub REST API.
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_GITHUB_API_URL)]
    github_api_url: String,
    /// API key for the chat completion endpoint.
    #[arg(long, env = "REPOGRADE_LLM_API_KEY", hide_env_values = true)]
    llm_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible completion API.
    #[arg(long, env = "REPOGRADE_LLM_BASE_URL", default_value = DEFAULT_LLM_BASE_URL)]
    llm_base_url: String,
    /// Model used to grade files.
    #[arg(long, env = "REPOGRADE_LLM_MODEL", default_value = DEFAULT_MODEL)]
    model: String,
    /// Seconds to wait before each evaluator call.
    #[arg(long, env = "REPOGRADE_PACING_SECS")]
    pacing_secs: Option<u64>,
    /// Seconds to pause between file batches.
    #[arg(long, env = "REPOGRADE_BATCH_PAUSE_SECS")]
    batch_pause_secs: Option<u64>,
}

#[derive(Args, Clone)]
struct OutputArgs {
    /// Output format for report data.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Write the report to a file instead of stdout.
    #[arg(long = "report-output")]
    report_output: Option<PathBuf>,
}

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum OutputFormat {
    Text,
    Json,
    Markdown,
}

#[derive(Subcommand)]
enum Commands {
    /// List a user's repositories.
    Repos {
        /// GitHub username.
        username: String,
        /// Also write the repository list as JSON to this path.
        #[arg(long)]
        snapshot: Option<PathBuf>,
        #[command(flatten)]
        connection: ConnectionArgs,
        #[command(flatten)]
        report: OutputArgs,
    },
    /// Analyse a single repository.
    Analyze {
        /// GitHub username.
        username: String,
        /// Repository name.
        repo: String,
        #[command(flatten)]
        connection: ConnectionArgs,
        #[command(flatten)]
        report: OutputArgs,
    },
    /// Analyse a user's repositories and print the user report.
    AnalyzeAll {
        /// GitHub username.
        username: String,
        /// Report without analysing repositories that are not cached yet.
        #[arg(long)]
        lazy: bool,
        /// Only analyse the N highest-ranked repositories.
        #[arg(long = "max-repos")]
        max_repos: Option<usize>,
        /// Leave forks out of the analysis.
        #[arg(long)]
        skip_forks: bool,
        #[command(flatten)]
        connection: ConnectionArgs,
        #[command(flatten)]
        report: OutputArgs,
    },
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> CliResult<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Repos {
            username,
            snapshot,
            connection,
            report,
        } => {
            let service = build_service(&connection, AnalysisConfig::default())?;
            run_repos(&service, &username, snapshot.as_deref(), &report).await?;
        }
        Commands::Analyze {
            username,
            repo,
            connection,
            report,
        } => {
            let service = build_service(&connection, AnalysisConfig::default())?;
            run_analyze(&service, &username, &repo, &report).await?;
        }
        Commands::AnalyzeAll {
            username,
            lazy,
            max_repos,
            skip_forks,
            connection,
            report,
        } => {
            let mut config = AnalysisConfig::default();
            config.max_repositories = max_repos;
            config.skip_forks = skip_forks;
            let service = build_service(&connection, config)?;
            let mode = if lazy {
                AnalysisMode::Lazy
            } else {
                AnalysisMode::Eager
            };
            run_analyze_all(&service, &username, mode, &report).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
fn main() {}

#[cfg_attr(test, allow(dead_code))]
fn build_service(connection: &ConnectionArgs, config: AnalysisConfig) -> CliResult<AnalysisService> {
    let config = apply_connection(config, connection);
    let host = GitHubHost::new(&connection.github_api_url, connection.github_token.clone())?;
    let client = ChatCompletionClient::new(&connection.llm_base_url, connection.llm_api_key.clone())?;
    Ok(AnalysisService::new(Arc::new(host), Arc::new(client), config))
}

fn apply_connection(mut config: AnalysisConfig, connection: &ConnectionArgs) -> AnalysisConfig {
    config.gateway.model = connection.model.clone();
    if let Some(secs) = connection.pacing_secs {
        config.gateway.pacing = Duration::from_secs(secs);
    }
    if let Some(secs) = connection.batch_pause_secs {
        config.batch_pause = Duration::from_secs(secs);
    }
    config
}

#[cfg_attr(test, allow(dead_code))]
async fn run_repos(
    service: &AnalysisService,
    username: &str,
    snapshot: Option<&std::path::Path>,
    output: &OutputArgs,
) -> CliResult<()> {
    let repos = service.get_user_repos(username).await?;
    if let Some(path) = snapshot {
        write_file(path, render_json(&repos)?).await?;
        info!("wrote repository snapshot to {}", path.display());
    }
    let contents = match output.format {
        OutputFormat::Text => render_repos_text(&repos),
        OutputFormat::Markdown => render_repos_markdown(username, &repos),
        OutputFormat::Json => render_json(&repos)?,
    };
    emit_output(output, contents).await
}

#[cfg_attr(test, allow(dead_code))]
async fn run_analyze(
    service: &AnalysisService,
    username: &str,
    repo: &str,
    output: &OutputArgs,
) -> CliResult<()> {
    let ticker = spawn_progress_ticker(service.clone(), username, vec![repo.to_string()]);
    let analysis = service.analyze_repository(username, repo).await;
    ticker.abort();

    let contents = match output.format {
        OutputFormat::Text => render_repo_text(&[&*analysis]),
        OutputFormat::Markdown => render_repo_markdown(&[&*analysis]),
        OutputFormat::Json => render_json(&*analysis)?,
    };
    emit_output(output, contents).await
}

#[cfg_attr(test, allow(dead_code))]
async fn run_analyze_all(
    service: &AnalysisService,
    username: &str,
    mode: AnalysisMode,
    output: &OutputArgs,
) -> CliResult<()> {
    let repos = service.get_user_repos(username).await?;
    let names = repos.iter().map(|repo| repo.name.clone()).collect();
    let ticker = spawn_progress_ticker(service.clone(), username, names);
    let report = service.analyze_all_repositories(username, mode).await;
    ticker.abort();

    let analyses = service.cached_analyses(username);
    let analyses: Vec<&RepoAnalysis> = analyses.iter().map(Arc::as_ref).collect();
    let contents = match output.format {
        OutputFormat::Text => render_user_text(&report, &analyses),
        OutputFormat::Markdown => render_user_markdown(&report, &analyses),
        OutputFormat::Json => render_json(&UserPayload {
            report: &report,
            repositories: &analyses,
        })?,
    };
    emit_output(output, contents).await
}

#[derive(serde::Serialize)]
struct UserPayload<'a> {
    report: &'a UserReport,
    repositories: &'a [&'a RepoAnalysis],
}

#[cfg_attr(test, allow(dead_code))]
/// Log the file under evaluation for each repository until aborted.
fn spawn_progress_ticker(
    service: AnalysisService,
    username: &str,
    repos: Vec<String>,
) -> JoinHandle<()> {
    let username = username.to_string();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PROGRESS_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            for line in progress_lines(&service, &username, &repos) {
                info!("{line}");
            }
        }
    })
}

#[cfg_attr(test, allow(dead_code))]
fn progress_lines(service: &AnalysisService, username: &str, repos: &[String]) -> Vec<String> {
    repos
        .iter()
        .filter_map(|repo| {
            let file = service.get_analysis_progress(username, repo)?;
            let line = match service.progress_snapshot(username, repo) {
                Some(snapshot) => format!(
                    "{repo}: {file} ({}/{} files)",
                    snapshot.files_done, snapshot.files_total
                ),
                None => format!("{repo}: {file}"),
            };
            Some(line)
        })
        .collect()
}

async fn emit_output(output: &OutputArgs, contents: String) -> CliResult<()> {
    if let Some(path) = &output.report_output {
        write_file(path, contents).await?;
    } else {
        print!("{contents}");
    }
    Ok(())
}

async fn write_file(path: &std::path::Path, contents: String) -> CliResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    Ok(())
}

fn render_repos_text(repos: &[RepoSummary]) -> String {
    let mut output = String::new();
    if repos.is_empty() {
        let _ = writeln!(output, "No repositories found.");
        return output;
    }
    for repo in repos {
        let fork = if repo.is_fork { " (fork)" } else { "" };
        let _ = writeln!(output, "{}{fork}", repo.full_name());
        if let Some(description) = repo.description.as_deref() {
            let _ = writeln!(output, "  {description}");
        }
        let _ = writeln!(output, "  Stars: {}  Size: {}", repo.star_count, repo.size);
        let languages: Vec<String> = format_language_stats(&repo.languages)
            .into_iter()
            .map(|(language, percent)| format!("{language} {percent:.1}%"))
            .collect();
        if languages.is_empty() {
            let _ = writeln!(output, "  Languages: none detected");
        } else {
            let _ = writeln!(output, "  Languages: {}", languages.join(", "));
        }
    }
    output
}

fn render_repos_markdown(username: &str, repos: &[RepoSummary]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Repositories for {username}\n");
    if repos.is_empty() {
        let _ = writeln!(output, "No repositories found.");
        return output;
    }
    let _ = writeln!(output, "| Repository | Stars | Fork |");
    let _ = writeln!(output, "| --- | --- | --- |");
    for repo in repos {
        let fork = if repo.is_fork { "yes" } else { "no" };
        let _ = writeln!(
            output,
            "| [{}]({}) | {} | {fork} |",
            repo.name, repo.url, repo.star_count
        );
    }
    output
}

fn render_repo_text(analyses: &[&RepoAnalysis]) -> String {
    let mut output = String::new();
    for analysis in analyses {
        append_repo_text(&mut output, analysis);
    }
    output
}

fn append_repo_text(output: &mut String, analysis: &RepoAnalysis) {
    let _ = writeln!(output, "Repository: {}", analysis.name);
    if !analysis.url.is_empty() {
        let _ = writeln!(output, "URL: {}", analysis.url);
    }
    if !analysis.analyzed {
        let _ = writeln!(output, "Status: pending");
        let _ = writeln!(output);
        return;
    }
    let _ = writeln!(output, "Overall: {}", score_label(analysis.overall_score));
    for kind in MetricKind::ALL {
        let result = analysis.metric(kind);
        let _ = writeln!(
            output,
            "{}: {}",
            title_case(kind),
            score_label(result.score)
        );
        for concern in &result.concerns {
            let _ = writeln!(output, "  - {concern}");
        }
    }
    let _ = writeln!(output);
}

fn render_user_text(report: &UserReport, analyses: &[&RepoAnalysis]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "User: {}", report.username);
    let _ = writeln!(
        output,
        "Repositories: {} ({} analyzed)",
        report.repo_count, report.analyzed_count
    );
    let _ = writeln!(output, "Overall: {}", score_label(report.overall_average));
    for kind in MetricKind::ALL {
        let _ = writeln!(
            output,
            "{}: {}",
            title_case(kind),
            score_label(report.metric_average(kind))
        );
        for entry in report.top_concerns.metric(kind) {
            let _ = writeln!(output, "  - {} ({} repos)", entry.concern, entry.count);
        }
    }
    let _ = writeln!(output);
    for analysis in analyses {
        append_repo_text(&mut output, analysis);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use repograde_core::{Confidence, MetricResult, Score, build_user_report};
    use std::collections::BTreeMap;

    fn summary(name: &str) -> RepoSummary {
        RepoSummary {
            owner: "octo".to_string(),
            name: name.to_string(),
            description: Some("Demo project".to_string()),
            url: format!("https://github.com/octo/{name}"),
            languages: BTreeMap::from([("Rust".to_string(), 300), ("Shell".to_string(), 100)]),
            size: 12,
            star_count: 4,
            is_fork: false,
        }
    }

    fn analysed(name: &str) -> RepoAnalysis {
        let mut analysis = RepoAnalysis::empty(&summary(name));
        analysis.security = MetricResult {
            score: Score::Value(90.0),
            concerns: vec!["Line 3: hardcoded secret".to_string()],
            resources: Vec::new(),
            confidence: Confidence::Evaluated,
        };
        analysis.overall_score = Score::Value(90.0);
        analysis
    }

    fn connection() -> ConnectionArgs {
        ConnectionArgs {
            github_token: None,
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            llm_api_key: None,
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: "custom-model".to_string(),
            pacing_secs: Some(1),
            batch_pause_secs: None,
        }
    }

    fn unique_path(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time")
            .as_nanos();
        std::env::temp_dir().join(format!("repograde_cli_test_{nanos}")).join(name)
    }

    #[test]
    fn parses_analyze_all_flags() {
        let cli = Cli::try_parse_from([
            "repograde",
            "analyze-all",
            "octo",
            "--lazy",
            "--max-repos",
            "5",
            "--skip-forks",
            "--format",
            "markdown",
        ])
        .expect("parse");

        match cli.command {
            Commands::AnalyzeAll {
                username,
                lazy,
                max_repos,
                skip_forks,
                report,
                ..
            } => {
                assert_eq!(username, "octo");
                assert!(lazy);
                assert_eq!(max_repos, Some(5));
                assert!(skip_forks);
                assert_eq!(report.format, OutputFormat::Markdown);
            }
            _ => panic!("expected analyze-all"),
        }
    }

    #[test]
    fn parses_analyze_with_defaults() {
        let cli = Cli::try_parse_from(["repograde", "analyze", "octo", "demo"]).expect("parse");
        match cli.command {
            Commands::Analyze { repo, report, .. } => {
                assert_eq!(repo, "demo");
                assert_eq!(report.format, OutputFormat::Text);
                assert!(report.report_output.is_none());
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn connection_overrides_config() {
        let config = apply_connection(AnalysisConfig::default(), &connection());
        assert_eq!(config.gateway.model, "custom-model");
        assert_eq!(config.gateway.pacing, Duration::from_secs(1));
        assert_eq!(config.batch_pause, Duration::from_secs(10));
    }

    #[test]
    fn renders_repository_list() {
        let mut fork = summary("copy");
        fork.is_fork = true;
        fork.description = None;
        let output = render_repos_text(&[summary("demo"), fork]);

        assert!(output.contains("octo/demo\n  Demo project"));
        assert!(output.contains("Languages: Rust 75.0%, Shell 25.0%"));
        assert!(output.contains("octo/copy (fork)"));
        assert_eq!(render_repos_text(&[]), "No repositories found.\n");

        let markdown = render_repos_markdown("octo", &[summary("demo")]);
        assert!(markdown.contains("| [demo](https://github.com/octo/demo) | 4 | no |"));
    }

    #[test]
    fn renders_analysis_text() {
        let analysis = analysed("demo");
        let pending = RepoAnalysis::placeholder(&summary("later"));
        let output = render_repo_text(&[&analysis, &pending]);

        assert!(output.contains("Repository: demo\n"));
        assert!(output.contains("Security: 90/100\n  - Line 3: hardcoded secret"));
        assert!(output.contains("Efficiency: N/A"));
        assert!(output.contains("Repository: later\nURL: https://github.com/octo/later\nStatus: pending"));
    }

    #[test]
    fn renders_user_text() {
        let analysis = analysed("demo");
        let pending = RepoAnalysis::placeholder(&summary("later"));
        let report = build_user_report("octo", [&analysis, &pending]);

        let output = render_user_text(&report, &[&analysis, &pending]);

        assert!(output.starts_with("User: octo\nRepositories: 2 (1 analyzed)"));
        assert!(output.contains("Security: 90/100\n  - Line 3: hardcoded secret (1 repos)"));
    }

    #[tokio::test]
    async fn emit_output_writes_report_file() {
        let path = unique_path("report.txt");
        let output = OutputArgs {
            format: OutputFormat::Text,
            report_output: Some(path.clone()),
        };

        emit_output(&output, "hello\n".to_string()).await.expect("emit");

        let written = tokio::fs::read_to_string(&path).await.expect("read");
        assert_eq!(written, "hello\n");
        if let Some(parent) = path.parent() {
            std::fs::remove_dir_all(parent).expect("cleanup");
        }
    }

    #[tokio::test]
    async fn user_payload_serializes_report_and_repositories() {
        let analysis = analysed("demo");
        let report = build_user_report("octo", [&analysis]);
        let payload = UserPayload {
            report: &report,
            repositories: &[&analysis],
        };

        let json = render_json(&payload).expect("json");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("parse");

        assert_eq!(parsed["repositories"][0]["name"], "demo");
        assert_eq!(parsed["report"]["analyzedCount"], 1);
    }
}
