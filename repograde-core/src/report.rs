//! Report formatting utilities for repograde outputs.

use std::fmt::Write;

use serde::Serialize;

use crate::domain::{
    Confidence, LanguageBytes, MetricKind, MetricResult, RepoAnalysis, Score, UserReport,
};

/// Render repository analyses as Markdown.
pub fn render_repo_markdown(analyses: &[&RepoAnalysis]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Repository Analysis\n");
    for analysis in analyses {
        append_repo_section(&mut output, analysis, "##");
    }
    output
}

/// Render a user report followed by one section per repository.
pub fn render_user_markdown(report: &UserReport, analyses: &[&RepoAnalysis]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Analysis for {}\n", report.username);
    let _ = writeln!(
        output,
        "- Repositories: {} ({} analyzed)",
        report.repo_count, report.analyzed_count
    );
    let _ = writeln!(output, "- Overall: {}", score_label(report.overall_average));
    for kind in MetricKind::ALL {
        let _ = writeln!(
            output,
            "- {}: {}",
            title_case(kind),
            score_label(report.metric_average(kind))
        );
    }
    let _ = writeln!(output);

    for kind in MetricKind::ALL {
        let concerns: Vec<String> = report
            .top_concerns
            .metric(kind)
            .iter()
            .map(|entry| format!("{} ({}×)", entry.concern, entry.count))
            .collect();
        append_list(
            &mut output,
            &format!("Top {kind} concerns"),
            &concerns,
            "No concerns reported.",
        );
    }

    for analysis in analyses {
        append_repo_section(&mut output, analysis, "##");
    }
    output
}

/// Render any serializable report payload as JSON.
pub fn render_json<T: Serialize + ?Sized>(payload: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(payload)
}

/// Language shares in percent, largest first.
pub fn format_language_stats(languages: &LanguageBytes) -> Vec<(String, f64)> {
    let total: u64 = languages.values().sum();
    if total == 0 {
        return Vec::new();
    }
    let mut items: Vec<(String, f64)> = languages
        .iter()
        .map(|(language, bytes)| (language.clone(), *bytes as f64 * 100.0 / total as f64))
        .collect();
    items.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    items
}

/// Score with a `/100` suffix for numbers.
pub fn score_label(score: Score) -> String {
    match score {
        Score::Value(_) => format!("{score}/100"),
        other => other.to_string(),
    }
}

/// Capitalised metric name.
pub fn title_case(kind: MetricKind) -> String {
    let label = kind.as_str();
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn append_repo_section(output: &mut String, analysis: &RepoAnalysis, level: &str) {
    let _ = writeln!(output, "{level} {}\n", analysis.name);
    if let Some(description) = analysis.description.as_deref() {
        if !description.is_empty() {
            let _ = writeln!(output, "{description}\n");
        }
    }
    if !analysis.url.is_empty() {
        let _ = writeln!(output, "- URL: {}", analysis.url);
    }
    let status = if analysis.analyzed { "analyzed" } else { "pending" };
    let _ = writeln!(output, "- Status: {status}");
    let _ = writeln!(output, "- Overall: {}\n", score_label(analysis.overall_score));

    append_language_stats(output, &analysis.languages);
    if analysis.analyzed {
        for kind in MetricKind::ALL {
            append_metric(output, kind, analysis.metric(kind));
        }
    }
}

fn append_language_stats(output: &mut String, languages: &LanguageBytes) {
    let stats = format_language_stats(languages);
    if stats.is_empty() {
        let _ = writeln!(output, "### Languages\nNo languages detected.\n");
        return;
    }
    let _ = writeln!(output, "### Languages");
    for (language, percent) in stats {
        let _ = writeln!(output, "- {language}: {percent:.2}%");
    }
    let _ = writeln!(output);
}

fn append_metric(output: &mut String, kind: MetricKind, result: &MetricResult) {
    let confidence = match result.confidence {
        Confidence::Evaluated => "",
        Confidence::Fallback => " (estimated)",
    };
    let _ = writeln!(
        output,
        "### {}: {}{confidence}",
        title_case(kind),
        score_label(result.score)
    );
    if result.concerns.is_empty() {
        let _ = writeln!(output, "No concerns reported.");
    }
    for concern in &result.concerns {
        let _ = writeln!(output, "- {concern}");
    }
    if !result.resources.is_empty() {
        let _ = writeln!(output, "\nLearn more:");
        for resource in &result.resources {
            let _ = writeln!(output, "- [{}]({})", resource.title, resource.url);
        }
    }
    let _ = writeln!(output);
}

fn append_list(output: &mut String, title: &str, items: &[String], empty_message: &str) {
    if items.is_empty() {
        let _ = writeln!(output, "### {title}\n{empty_message}\n");
        return;
    }
    let _ = writeln!(output, "### {title}");
    for item in items {
        let _ = writeln!(output, "- {item}");
    }
    let _ = writeln!(output);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::build_user_report;
    use crate::domain::Resource;
    use crate::testing::summary;
    use std::collections::BTreeMap;

    fn sample_analysis() -> RepoAnalysis {
        let mut analysis = RepoAnalysis::empty(&summary("demo"));
        analysis.security = MetricResult {
            score: Score::Value(85.0),
            concerns: vec!["Line 4: unchecked input".to_string()],
            resources: vec![Resource {
                title: "OWASP Top Ten".to_string(),
                url: "https://owasp.org/www-project-top-ten/".to_string(),
            }],
            confidence: Confidence::Evaluated,
        };
        analysis.efficiency = MetricResult {
            score: Score::Value(62.0),
            concerns: vec!["Consider caching".to_string()],
            resources: Vec::new(),
            confidence: Confidence::Fallback,
        };
        analysis.overall_score = Score::Value(73.5);
        analysis
    }

    #[test]
    fn renders_repository_markdown() {
        let analysis = sample_analysis();
        let output = render_repo_markdown(&[&analysis]);

        assert!(output.contains("## demo"));
        assert!(output.contains("- Overall: 73.5/100"));
        assert!(output.contains("### Security: 85/100"));
        assert!(output.contains("### Efficiency: 62/100 (estimated)"));
        assert!(output.contains("### Quality: N/A"));
        assert!(output.contains("- [OWASP Top Ten](https://owasp.org/www-project-top-ten/)"));
        assert!(output.contains("- Rust: 100.00%"));
    }

    #[test]
    fn pending_repositories_skip_metric_sections() {
        let pending = RepoAnalysis::placeholder(&summary("later"));
        let output = render_repo_markdown(&[&pending]);

        assert!(output.contains("- Status: pending"));
        assert!(!output.contains("### Security"));
    }

    #[test]
    fn renders_user_markdown() {
        let analysis = sample_analysis();
        let pending = RepoAnalysis::placeholder(&summary("later"));
        let report = build_user_report("octo", [&analysis, &pending]);

        let output = render_user_markdown(&report, &[&analysis, &pending]);

        assert!(output.contains("# Analysis for octo"));
        assert!(output.contains("- Repositories: 2 (1 analyzed)"));
        assert!(output.contains("- Security: 85/100"));
        assert!(output.contains("- Line 4: unchecked input (1×)"));
        assert!(output.contains("### Top quality concerns\nNo concerns reported."));
    }

    #[test]
    fn renders_json_payload() {
        let analysis = sample_analysis();
        let json = render_json(&vec![analysis]).expect("json");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("parse");
        assert!(parsed.is_array());
        assert_eq!(parsed[0]["overallScore"], "73.5");
        assert_eq!(parsed[0]["security"]["score"], "85");
        assert_eq!(parsed[0]["efficiency"]["confidence"], "fallback");
    }

    #[test]
    fn formats_language_stats_sorted() {
        let mut stats = BTreeMap::new();
        stats.insert("Go".to_string(), 250);
        stats.insert("Rust".to_string(), 750);
        let ordered = format_language_stats(&stats);
        assert_eq!(ordered[0], ("Rust".to_string(), 75.0));
        assert_eq!(ordered[1], ("Go".to_string(), 25.0));
        assert!(format_language_stats(&BTreeMap::new()).is_empty());
    }
}
