//! Domain entities for repograde.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A mapping of language names to the number of bytes written in them.
pub type LanguageBytes = BTreeMap<String, u64>;

/// A repository as listed by the source host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoSummary {
    /// Account that owns the repository.
    pub owner: String,
    /// Repository name.
    pub name: String,
    /// Free-form description, if the owner set one.
    pub description: Option<String>,
    /// Browser URL of the repository.
    pub url: String,
    /// Language byte counts reported by the host.
    pub languages: LanguageBytes,
    /// Repository size as reported by the host.
    pub size: u64,
    /// Number of stars.
    pub star_count: u64,
    /// Whether the repository is a fork.
    pub is_fork: bool,
}

impl RepoSummary {
    /// `owner/name` form used in log lines and host requests.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Kind of node returned by a directory listing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A regular file.
    File,
    /// A directory that can be listed further.
    Dir,
}

/// A single node in a remote repository tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Path relative to the repository root.
    pub path: String,
    /// Node kind.
    pub kind: EntryKind,
    /// Size in bytes; zero for directories.
    pub size: u64,
}

impl Entry {
    /// Build a file entry.
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
            size,
        }
    }

    /// Build a directory entry.
    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Dir,
            size: 0,
        }
    }

    /// Whether this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    /// Lowercased extension of the file name, if any.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.path)
    }
}

/// Lowercased extension of the last path segment, if any.
pub fn extension_of(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// A file selected for evaluation together with its decoded content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSample {
    /// Path relative to the repository root.
    pub path: String,
    /// Decoded file content.
    pub raw_content: String,
    /// Size reported by the host listing.
    pub size_bytes: u64,
    /// Lowercased file extension.
    pub extension: String,
}

/// The three independent evaluation axes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Vulnerabilities and unsafe practices.
    Security,
    /// Time and space efficiency.
    Efficiency,
    /// Readability and maintainability.
    Quality,
}

impl MetricKind {
    /// All metrics in report order.
    pub const ALL: [MetricKind; 3] = [Self::Security, Self::Efficiency, Self::Quality];

    /// Stable lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Efficiency => "efficiency",
            Self::Quality => "quality",
        }
    }

    /// Placeholder concern used when an evaluation found nothing to report.
    pub fn no_concerns_placeholder(self) -> String {
        format!("No {} concerns detected", self.as_str())
    }

    /// Placeholder concern used when only a bare score could be recovered.
    pub fn unspecified_placeholder(self) -> String {
        format!("No specific {} concerns identified", self.as_str())
    }

    /// Whether a concern is one of the boilerplate placeholders.
    pub fn is_placeholder(self, concern: &str) -> bool {
        concern == self.no_concerns_placeholder() || concern == self.unspecified_placeholder()
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A score value or one of the sentinel tokens standing in for it.
///
/// Serialized as a string so numbers and sentinels share one representation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Score {
    /// A numeric score.
    Value(f64),
    /// No data to score (`N/A`).
    NotAvailable,
    /// Scoring failed entirely (`Error`).
    Error,
    /// Not analysed yet (`pending`).
    Pending,
}

impl Score {
    /// Normalize a raw token; anything unrecognised becomes `N/A`.
    pub fn parse(raw: &str) -> Self {
        let token = raw.trim();
        if token.eq_ignore_ascii_case("n/a") {
            return Self::NotAvailable;
        }
        if token.eq_ignore_ascii_case("error") {
            return Self::Error;
        }
        if token.eq_ignore_ascii_case("pending") {
            return Self::Pending;
        }
        match token.parse::<f64>() {
            Ok(value) if value.is_finite() => Self::Value(value),
            _ => Self::NotAvailable,
        }
    }

    /// Build a numeric score rounded to one decimal place.
    pub fn rounded(value: f64) -> Self {
        Self::Value((value * 10.0).round() / 10.0)
    }

    /// Numeric value, if this is not a sentinel.
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Whether the score carries a number.
    pub fn is_numeric(self) -> bool {
        self.value().is_some()
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) if value.fract() == 0.0 => write!(f, "{value:.0}"),
            Self::Value(value) => write!(f, "{value:.1}"),
            Self::NotAvailable => f.write_str("N/A"),
            Self::Error => f.write_str("Error"),
            Self::Pending => f.write_str("pending"),
        }
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// How much a score can be trusted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Produced from an actual evaluator answer.
    Evaluated,
    /// Synthesized locally because the evaluator was unreachable or unparseable.
    Fallback,
}

/// A "learn more" link attached to a metric result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Link title.
    pub title: String,
    /// Link target.
    pub url: String,
}

/// Outcome of evaluating one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    /// Score or sentinel.
    pub score: Score,
    /// Concerns in discovery order.
    pub concerns: Vec<String>,
    /// Related reading.
    pub resources: Vec<Resource>,
    /// Whether the score came from the evaluator or a local fallback.
    pub confidence: Confidence,
}

impl MetricResult {
    /// A result carrying only a sentinel score.
    pub fn sentinel(score: Score) -> Self {
        Self {
            score,
            concerns: Vec::new(),
            resources: Vec::new(),
            confidence: Confidence::Evaluated,
        }
    }

    /// A failed result with the failure recorded as its only concern.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            concerns: vec![message.into()],
            ..Self::sentinel(Score::Error)
        }
    }
}

/// Analysis state of one repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoAnalysis {
    /// Repository name.
    pub name: String,
    /// Aggregated security result.
    pub security: MetricResult,
    /// Aggregated efficiency result.
    pub efficiency: MetricResult,
    /// Aggregated quality result.
    pub quality: MetricResult,
    /// Mean of the numeric metric scores.
    pub overall_score: Score,
    /// Whether analysis has completed.
    pub analyzed: bool,
    /// Repository description.
    pub description: Option<String>,
    /// Language byte counts.
    pub languages: LanguageBytes,
    /// Browser URL.
    pub url: String,
}

impl RepoAnalysis {
    /// Unanalysed placeholder created when the repository list is fetched.
    pub fn placeholder(summary: &RepoSummary) -> Self {
        Self::with_metrics(
            summary,
            MetricResult::sentinel(Score::Pending),
            Score::Pending,
            false,
        )
    }

    /// Analysed marker for a repository with nothing to evaluate.
    pub fn empty(summary: &RepoSummary) -> Self {
        Self::with_metrics(
            summary,
            MetricResult::sentinel(Score::NotAvailable),
            Score::NotAvailable,
            true,
        )
    }

    /// Analysed marker for a repository whose analysis failed outright.
    ///
    /// Every metric carries `Error`; with no numeric metric the overall
    /// score is `N/A`.
    pub fn failed(summary: &RepoSummary, message: &str) -> Self {
        Self::with_metrics(summary, MetricResult::error(message), Score::NotAvailable, true)
    }

    fn with_metrics(
        summary: &RepoSummary,
        metric: MetricResult,
        overall_score: Score,
        analyzed: bool,
    ) -> Self {
        Self {
            name: summary.name.clone(),
            security: metric.clone(),
            efficiency: metric.clone(),
            quality: metric,
            overall_score,
            analyzed,
            description: summary.description.clone(),
            languages: summary.languages.clone(),
            url: summary.url.clone(),
        }
    }

    /// Result for a single metric.
    pub fn metric(&self, kind: MetricKind) -> &MetricResult {
        match kind {
            MetricKind::Security => &self.security,
            MetricKind::Efficiency => &self.efficiency,
            MetricKind::Quality => &self.quality,
        }
    }
}

/// A concern and how many repositories raised it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcernCount {
    /// Concern text.
    pub concern: String,
    /// Number of analysed repositories listing it.
    pub count: usize,
}

/// Frequency-ranked concerns per metric.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopConcerns {
    /// Security concerns.
    pub security: Vec<ConcernCount>,
    /// Efficiency concerns.
    pub efficiency: Vec<ConcernCount>,
    /// Quality concerns.
    pub quality: Vec<ConcernCount>,
}

impl TopConcerns {
    /// Concerns for a single metric.
    pub fn metric(&self, kind: MetricKind) -> &[ConcernCount] {
        match kind {
            MetricKind::Security => &self.security,
            MetricKind::Efficiency => &self.efficiency,
            MetricKind::Quality => &self.quality,
        }
    }
}

/// User-level statistics derived from the cached analyses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReport {
    /// Account the report covers.
    pub username: String,
    /// Average security score over analysed repositories.
    pub security_average: Score,
    /// Average efficiency score over analysed repositories.
    pub efficiency_average: Score,
    /// Average quality score over analysed repositories.
    pub quality_average: Score,
    /// Average overall score over analysed repositories.
    pub overall_average: Score,
    /// Top five concerns per metric.
    pub top_concerns: TopConcerns,
    /// Number of known repositories, analysed or not.
    pub repo_count: usize,
    /// Number of analysed repositories.
    pub analyzed_count: usize,
}

impl UserReport {
    /// Average for a single metric.
    pub fn metric_average(&self, kind: MetricKind) -> Score {
        match kind {
            MetricKind::Security => self.security_average,
            MetricKind::Efficiency => self.efficiency_average,
            MetricKind::Quality => self.quality_average,
        }
    }
}
