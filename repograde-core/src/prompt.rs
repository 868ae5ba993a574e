//! Evaluator prompt construction.

use std::fmt::Write;

use crate::domain::MetricKind;

fn metric_brief(metric: MetricKind) -> (&'static str, &'static str, &'static str) {
    match metric {
        MetricKind::Security => (
            "completely insecure, with major vulnerabilities",
            "secure, with no room for improvement",
            "suggested fix",
        ),
        MetricKind::Efficiency => (
            "completely inefficient",
            "optimal in time and space",
            "more efficient approach",
        ),
        MetricKind::Quality => (
            "unreadable and unmaintainable",
            "clean, well structured and well documented",
            "suggested improvement",
        ),
    }
}

/// Build the evaluation prompt for one metric over one (already trimmed) file.
pub fn build_prompt(metric: MetricKind, file_path: &str, content: &str) -> String {
    let (worst, best, remedy) = metric_brief(metric);
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Rate the {metric} of the code below from 0 to 100, where 0 is {worst} and 100 is {best}."
    );
    let _ = writeln!(prompt, "Use multiples of 5. Average code scores around 50.");
    let _ = writeln!(
        prompt,
        "List the most important {metric} concerns, citing line numbers and a {remedy} for each."
    );
    let _ = writeln!(
        prompt,
        "Answer with a JSON object only: {{\"score\": <0-100>, \"concerns\": [\"Line <n>: <issue> - <{remedy}>\"]}}."
    );
    let _ = writeln!(
        prompt,
        "If there are no {metric} concerns, return an empty concerns array and score 100."
    );
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "File: {file_path}");
    let _ = writeln!(prompt);
    let _ = write!(prompt, "Code to analyze:\n{content}");
    prompt
}
