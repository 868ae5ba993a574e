//! Folds per-file results into repository and user level figures.

use std::collections::{HashMap, HashSet};

use crate::domain::{
    ConcernCount, Confidence, MetricKind, MetricResult, RepoAnalysis, Resource, Score, TopConcerns,
    UserReport,
};
use crate::resources::{MAX_RESOURCES, resources_for};

/// Repository score used when no file produced a numeric score.
pub const NEUTRAL_SCORE: f64 = 50.0;
/// Concerns kept per repository metric.
pub const MAX_CONCERNS: usize = 5;
/// Concerns kept per user metric.
pub const TOP_CONCERNS: usize = 5;

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Combine the per-file results of one metric into a repository result.
///
/// Sentinel scores are left out of the average; with no numeric score at all
/// the result carries [`NEUTRAL_SCORE`]. Concerns keep their first-seen order,
/// without duplicates or placeholders, capped at [`MAX_CONCERNS`].
pub fn aggregate_metric(metric: MetricKind, results: &[MetricResult]) -> MetricResult {
    let score = match mean(results.iter().filter_map(|result| result.score.value())) {
        Some(average) => Score::rounded(average),
        None => Score::Value(NEUTRAL_SCORE),
    };

    let mut seen = HashSet::new();
    let concerns: Vec<String> = results
        .iter()
        .flat_map(|result| result.concerns.iter())
        .filter(|concern| !metric.is_placeholder(concern))
        .filter(|concern| seen.insert(concern.as_str()))
        .take(MAX_CONCERNS)
        .cloned()
        .collect();

    let mut resources: Vec<Resource> = Vec::new();
    for resource in results.iter().flat_map(|result| result.resources.iter()) {
        if resources.len() >= MAX_RESOURCES {
            break;
        }
        if !resources.iter().any(|existing| existing.url == resource.url) {
            resources.push(resource.clone());
        }
    }
    if resources.is_empty() {
        resources = resources_for(metric, &concerns);
    }

    let evaluated = results
        .iter()
        .any(|result| result.score.is_numeric() && result.confidence == Confidence::Evaluated);

    MetricResult {
        score,
        concerns,
        resources,
        confidence: if evaluated {
            Confidence::Evaluated
        } else {
            Confidence::Fallback
        },
    }
}

/// Mean of the numeric metric scores, or `N/A` when none is numeric.
pub fn overall_score(security: Score, efficiency: Score, quality: Score) -> Score {
    mean([security, efficiency, quality].into_iter().filter_map(Score::value))
        .map(Score::rounded)
        .unwrap_or(Score::NotAvailable)
}

/// Build a user report from every cached analysis of that user.
///
/// Unanalysed entries count towards `repo_count` only.
pub fn build_user_report<'a>(
    username: &str,
    analyses: impl IntoIterator<Item = &'a RepoAnalysis>,
) -> UserReport {
    let all: Vec<&RepoAnalysis> = analyses.into_iter().collect();
    let analyzed: Vec<&RepoAnalysis> = all.iter().copied().filter(|a| a.analyzed).collect();

    let average = |scores: Vec<Score>| {
        mean(scores.into_iter().filter_map(Score::value))
            .map(Score::rounded)
            .unwrap_or(Score::NotAvailable)
    };
    let metric_average = |kind: MetricKind| {
        average(analyzed.iter().map(|analysis| analysis.metric(kind).score).collect())
    };

    UserReport {
        username: username.to_string(),
        security_average: metric_average(MetricKind::Security),
        efficiency_average: metric_average(MetricKind::Efficiency),
        quality_average: metric_average(MetricKind::Quality),
        overall_average: average(analyzed.iter().map(|analysis| analysis.overall_score).collect()),
        top_concerns: TopConcerns {
            security: rank_concerns(MetricKind::Security, &analyzed),
            efficiency: rank_concerns(MetricKind::Efficiency, &analyzed),
            quality: rank_concerns(MetricKind::Quality, &analyzed),
        },
        repo_count: all.len(),
        analyzed_count: analyzed.len(),
    }
}

/// Concerns ranked by how many repositories raise them; ties keep first-seen order.
fn rank_concerns(metric: MetricKind, analyzed: &[&RepoAnalysis]) -> Vec<ConcernCount> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for analysis in analyzed {
        let result = analysis.metric(metric);
        if !result.score.is_numeric() {
            continue;
        }
        let mut in_repo = HashSet::new();
        for concern in &result.concerns {
            if metric.is_placeholder(concern) || !in_repo.insert(concern.as_str()) {
                continue;
            }
            let count = counts.entry(concern.as_str()).or_insert(0);
            if *count == 0 {
                order.push(concern.as_str());
            }
            *count += 1;
        }
    }

    let mut ranked: Vec<ConcernCount> = order
        .into_iter()
        .map(|concern| ConcernCount {
            concern: concern.to_string(),
            count: counts.get(concern).copied().unwrap_or(0),
        })
        .collect();
    // stable sort keeps first-seen order among equal counts
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(TOP_CONCERNS);
    ranked
}
