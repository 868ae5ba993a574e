//! GitHub REST source host.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, warn};
use repograde_core::{
    BoxFuture, Entry, LanguageBytes, RepoGradeError, RepoSummary, Result, SourceHost,
};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;

/// Default GitHub API base URL.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
const PER_PAGE: usize = 100;
const USER_AGENT: &str = concat!("repograde/", env!("CARGO_PKG_VERSION"));

/// [`SourceHost`] backed by the GitHub REST API.
pub struct GitHubHost {
    client: Client,
    api_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepoPayload {
    name: String,
    owner: OwnerPayload,
    description: Option<String>,
    html_url: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    fork: bool,
}

#[derive(Debug, Deserialize)]
struct OwnerPayload {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
struct FilePayload {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    message: String,
}

impl GitHubHost {
    /// Build a host for `api_url`, authenticating with `token` when given.
    pub fn new(api_url: &str, token: Option<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.filter(|token| !token.trim().is_empty()),
        })
    }

    fn get(&self, url: Url) -> RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.api_url)
            .map_err(|err| RepoGradeError::Other(format!("invalid GitHub API URL: {err}")))?;
        url.path_segments_mut()
            .map_err(|_| RepoGradeError::Other("GitHub API URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments.iter().filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    fn contents_url(&self, repo: &RepoSummary, path: &str) -> Result<Url> {
        let mut segments = vec!["repos", repo.owner.as_str(), repo.name.as_str(), "contents"];
        segments.extend(path.split('/'));
        self.endpoint(&segments)
    }

    async fn list_page(&self, username: &str, page: usize) -> Result<Vec<RepoPayload>> {
        let mut url = self.endpoint(&["users", username, "repos"])?;
        url.query_pairs_mut()
            .append_pair("per_page", &PER_PAGE.to_string())
            .append_pair("page", &page.to_string());
        let response = self.get(url).send().await.map_err(transport)?;
        let response = check(response, username).await?;
        response.json().await.map_err(transport)
    }

    async fn languages(&self, owner: &str, name: &str) -> Result<LanguageBytes> {
        let url = self.endpoint(&["repos", owner, name, "languages"])?;
        let response = self.get(url).send().await.map_err(transport)?;
        let response = check(response, name).await?;
        response.json().await.map_err(transport)
    }

    async fn summarize(&self, payload: RepoPayload) -> RepoSummary {
        let languages = match self.languages(&payload.owner.login, &payload.name).await {
            Ok(languages) => languages,
            Err(err) => {
                warn!("language lookup for {} failed: {err}", payload.name);
                LanguageBytes::new()
            }
        };
        RepoSummary {
            owner: payload.owner.login,
            name: payload.name,
            description: payload.description,
            url: payload.html_url,
            languages,
            size: payload.size,
            star_count: payload.stargazers_count,
            is_fork: payload.fork,
        }
    }
}

impl SourceHost for GitHubHost {
    fn list_repositories<'a>(&'a self, username: &'a str) -> BoxFuture<'a, Vec<RepoSummary>> {
        Box::pin(async move {
            let mut repos = Vec::new();
            let mut page = 1;
            loop {
                let batch = self.list_page(username, page).await?;
                let last = batch.len() < PER_PAGE;
                for payload in batch {
                    repos.push(self.summarize(payload).await);
                }
                if last {
                    break;
                }
                page += 1;
            }
            debug!("listed {} repositories for {username}", repos.len());
            Ok(repos)
        })
    }

    fn get_directory<'a>(
        &'a self,
        repo: &'a RepoSummary,
        path: &'a str,
    ) -> BoxFuture<'a, Vec<Entry>> {
        Box::pin(async move {
            let url = self.contents_url(repo, path)?;
            let response = self.get(url).send().await.map_err(transport)?;
            let subject = format!("{}/{path}", repo.full_name());
            let response = check(response, &subject).await?;
            let items: Vec<ContentItem> = response.json().await.map_err(transport)?;
            Ok(items
                .into_iter()
                .filter_map(|item| match item.kind.as_str() {
                    "file" => Some(Entry::file(item.path, item.size)),
                    "dir" => Some(Entry::dir(item.path)),
                    // symlinks and submodules
                    _ => None,
                })
                .collect())
        })
    }

    fn get_file_content<'a>(
        &'a self,
        repo: &'a RepoSummary,
        path: &'a str,
    ) -> BoxFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let url = self.contents_url(repo, path)?;
            let response = self.get(url).send().await.map_err(transport)?;
            let subject = format!("{}/{path}", repo.full_name());
            let response = check(response, &subject).await?;
            let payload: FilePayload = response.json().await.map_err(transport)?;
            decode_content(&payload, path)
        })
    }
}

fn decode_content(payload: &FilePayload, path: &str) -> Result<Vec<u8>> {
    if payload.encoding != "base64" {
        return Err(RepoGradeError::Decode(format!(
            "{path}: unsupported encoding '{}'",
            payload.encoding
        )));
    }
    let compact: String = payload
        .content
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(compact)
        .map_err(|err| RepoGradeError::Decode(format!("{path}: {err}")))
}

async fn check(response: Response, subject: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify(status, &body, subject))
}

fn classify(status: StatusCode, body: &str, subject: &str) -> RepoGradeError {
    let message = serde_json::from_str::<ErrorPayload>(body)
        .map(|payload| payload.message)
        .unwrap_or_else(|_| body.trim().to_string());
    let lowered = message.to_lowercase();
    match status.as_u16() {
        404 | 409 if lowered.contains("empty") => RepoGradeError::EmptyRepository,
        404 => RepoGradeError::NotFound(subject.to_string()),
        429 => RepoGradeError::RateLimited(message),
        403 if lowered.contains("rate limit") => RepoGradeError::RateLimited(message),
        _ => RepoGradeError::Upstream(format!("GitHub returned {status}: {message}")),
    }
}

fn transport(err: reqwest::Error) -> RepoGradeError {
    RepoGradeError::Upstream(format!("GitHub request failed: {err}"))
}
