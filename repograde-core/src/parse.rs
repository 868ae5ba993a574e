//! Tiered parsing of evaluator responses.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::domain::MetricKind;

static JSON_OBJECT_RE: OnceLock<Regex> = OnceLock::new();
static BARE_SCORE_RE: OnceLock<Regex> = OnceLock::new();

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// What could be recovered from an evaluator answer.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    /// A JSON object with a usable score and its concern list.
    Structured {
        /// Score in `0..=100`.
        score: f64,
        /// Concerns as listed by the evaluator, blanks removed.
        concerns: Vec<String>,
    },
    /// Only a bare integer score could be found.
    ScoreOnly {
        /// Score in `0..=100`.
        score: u8,
        /// Whether the text claims there is nothing to report.
        no_concerns: bool,
    },
    /// Nothing usable.
    Unparseable,
}

/// Remove `<think>...</think>` reasoning blocks. An unclosed block swallows
/// the rest of the text.
pub fn strip_reasoning(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(THINK_OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + THINK_OPEN.len()..];
        match after_open.find(THINK_CLOSE) {
            Some(end) => rest = &after_open[end + THINK_CLOSE.len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Parse an evaluator answer for `metric`, trying the structured tier first
/// and the bare-score tier second.
pub fn parse_response(raw: &str, metric: MetricKind) -> ParsedResponse {
    let text = strip_reasoning(raw);
    let no_concerns = claims_no_concerns(&text, metric);

    if let Some((score, concerns)) = parse_structured(&text) {
        let score = if score == 0.0 && no_concerns { 100.0 } else { score };
        return ParsedResponse::Structured { score, concerns };
    }

    if let Some(score) = parse_bare_score(&text) {
        return ParsedResponse::ScoreOnly { score, no_concerns };
    }

    ParsedResponse::Unparseable
}

fn parse_structured(text: &str) -> Option<(f64, Vec<String>)> {
    let re = JSON_OBJECT_RE.get_or_init(|| Regex::new(r"\{[\s\S]*\}").expect("valid json regex"));
    let candidate = re.find(text)?.as_str();
    let value: Value = serde_json::from_str(candidate).ok()?;
    let object = value.as_object()?;

    let score = match object.get("score")? {
        Value::Number(number) => number.as_f64()?,
        Value::String(raw) => raw.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !score.is_finite() || !(0.0..=100.0).contains(&score) {
        return None;
    }

    let concerns = match object.get("concerns") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|text| !text.is_empty())
            .collect(),
        Some(Value::String(single)) if !single.trim().is_empty() => {
            vec![single.trim().to_string()]
        }
        _ => Vec::new(),
    };

    Some((score, concerns))
}

fn parse_bare_score(text: &str) -> Option<u8> {
    let re = BARE_SCORE_RE.get_or_init(|| Regex::new(r"\b(\d{1,3})\b").expect("valid score regex"));
    let digits = re.captures(text)?.get(1)?.as_str();
    let score: u16 = digits.parse().ok()?;
    if score > 100 {
        return None;
    }
    u8::try_from(score).ok()
}

fn claims_no_concerns(text: &str, metric: MetricKind) -> bool {
    let lowered = text.to_lowercase();
    ["no concern", "no issue", "no problem"]
        .iter()
        .any(|needle| lowered.contains(needle))
        || lowered.contains(&format!("no {}", metric.as_str()))
}
