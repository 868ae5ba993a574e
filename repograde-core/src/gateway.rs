//! Paced, retrying evaluator client producing normalized metric results.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::sync::Semaphore;

use crate::completion::{CompletionClient, CompletionRequest};
use crate::domain::{Confidence, MetricKind, MetricResult, Score};
use crate::error::RepoGradeError;
use crate::parse::{ParsedResponse, parse_response};
use crate::prompt::build_prompt;
use crate::resources::resources_for;
use crate::retry::{RetryPolicy, Sleeper, retry_with_backoff, with_timeout};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "deepseek-ai/deepseek-r1-distill-qwen-7b";

/// Lowest score a fallback result can carry.
pub const FALLBACK_SCORE_MIN: u8 = 50;
/// Highest score a fallback result can carry.
pub const FALLBACK_SCORE_MAX: u8 = 80;

const SECURITY_POOL: &[&str] = &[
    "Validate and sanitize all external input before use",
    "Avoid hardcoding credentials or secrets in source files",
    "Review error handling so internal details are not exposed",
    "Check that authentication and authorization are enforced consistently",
    "Use parameterized queries instead of building queries from strings",
];

const EFFICIENCY_POOL: &[&str] = &[
    "Consider optimizing loop structures to reduce time complexity",
    "Review data structure choices for better space and time efficiency",
    "Evaluate algorithm complexity and look for more efficient alternatives",
    "Check for redundant calculations that could be optimized",
    "Consider using caching or memoization for repeated operations",
];

const QUALITY_POOL: &[&str] = &[
    "Break long functions into smaller, focused units",
    "Use descriptive names for variables and functions",
    "Add documentation comments for public interfaces",
    "Remove duplicated code by extracting shared helpers",
    "Replace magic numbers with named constants",
];

/// Generic concerns used by fallback results.
pub fn fallback_pool(metric: MetricKind) -> &'static [&'static str] {
    match metric {
        MetricKind::Security => SECURITY_POOL,
        MetricKind::Efficiency => EFFICIENCY_POOL,
        MetricKind::Quality => QUALITY_POOL,
    }
}

/// Sampling, pacing and retry settings for evaluator calls.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewaySettings {
    /// Model identifier sent with every request.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling cutoff.
    pub top_p: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Delay before every outbound call.
    pub pacing: Duration,
    /// Budget for a single call.
    pub call_timeout: Duration,
    /// Backoff for rate-limited or timed-out calls.
    pub retry: RetryPolicy,
    /// Outbound calls allowed in flight at once, across every repository
    /// sharing this gateway.
    pub max_in_flight: usize,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.6,
            top_p: 0.7,
            max_tokens: 1024,
            pacing: Duration::from_secs(4),
            call_timeout: Duration::from_secs(120),
            retry: RetryPolicy::default(),
            max_in_flight: 4,
        }
    }
}

/// Turns file content into a [`MetricResult`] through a [`CompletionClient`].
///
/// `evaluate` never fails: rate limits are retried with backoff, and any
/// call that still fails or cannot be parsed degrades to a fallback result
/// marked [`Confidence::Fallback`].
///
/// At most [`GatewaySettings::max_in_flight`] calls reach the client at a
/// time. Pacing and backoff sleeps do not hold a slot.
pub struct EvaluatorGateway {
    client: Arc<dyn CompletionClient + Send + Sync>,
    sleeper: Arc<dyn Sleeper + Send + Sync>,
    in_flight: Semaphore,
    settings: GatewaySettings,
    rng: Mutex<StdRng>,
}

impl EvaluatorGateway {
    /// Create a gateway with an entropy-seeded fallback generator.
    pub fn new(
        client: Arc<dyn CompletionClient + Send + Sync>,
        sleeper: Arc<dyn Sleeper + Send + Sync>,
        settings: GatewaySettings,
    ) -> Self {
        Self::with_rng(client, sleeper, settings, StdRng::from_entropy())
    }

    /// Create a gateway whose fallback results are reproducible.
    pub fn with_seed(
        client: Arc<dyn CompletionClient + Send + Sync>,
        sleeper: Arc<dyn Sleeper + Send + Sync>,
        settings: GatewaySettings,
        seed: u64,
    ) -> Self {
        Self::with_rng(client, sleeper, settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        client: Arc<dyn CompletionClient + Send + Sync>,
        sleeper: Arc<dyn Sleeper + Send + Sync>,
        settings: GatewaySettings,
        rng: StdRng,
    ) -> Self {
        Self {
            client,
            sleeper,
            in_flight: Semaphore::new(settings.max_in_flight.max(1)),
            settings,
            rng: Mutex::new(rng),
        }
    }

    /// Active settings.
    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Evaluate one file for one metric.
    pub async fn evaluate(&self, content: &str, file_path: &str, metric: MetricKind) -> MetricResult {
        let request = CompletionRequest {
            prompt: build_prompt(metric, file_path, content),
            model: self.settings.model.clone(),
            temperature: self.settings.temperature,
            top_p: self.settings.top_p,
            max_tokens: self.settings.max_tokens,
        };
        let request = &request;
        let client = &*self.client;
        let in_flight = &self.in_flight;
        let budget = self.settings.call_timeout;

        let outcome = retry_with_backoff(
            self.settings.retry,
            self.settings.pacing,
            &*self.sleeper,
            move |attempt| {
                async move {
                    debug!("{metric} evaluation of {file_path}, attempt {attempt}");
                    let _permit = in_flight
                        .acquire()
                        .await
                        .map_err(|err| RepoGradeError::Other(err.to_string()))?;
                    with_timeout(budget, client.complete(request)).await
                }
            },
        )
        .await;

        match outcome {
            Ok(text) => self.interpret(&text, file_path, metric),
            Err(err) => {
                warn!("{metric} evaluation of {file_path} degraded to fallback: {err}");
                self.fallback(metric)
            }
        }
    }

    fn interpret(&self, text: &str, file_path: &str, metric: MetricKind) -> MetricResult {
        match parse_response(text, metric) {
            ParsedResponse::Structured { score, concerns } => {
                normalized(metric, Score::Value(score), concerns)
            }
            ParsedResponse::ScoreOnly {
                no_concerns: true, ..
            } => normalized(metric, Score::Value(100.0), vec![metric.no_concerns_placeholder()]),
            ParsedResponse::ScoreOnly { score, .. } => normalized(
                metric,
                Score::Value(f64::from(score)),
                vec![metric.unspecified_placeholder()],
            ),
            ParsedResponse::Unparseable => {
                warn!("{metric} answer for {file_path} could not be parsed; using fallback");
                self.fallback(metric)
            }
        }
    }

    /// Synthesize a low-confidence result from the generic concern pool.
    pub fn fallback(&self, metric: MetricKind) -> MetricResult {
        let (score, concerns) = {
            let mut rng = self.lock_rng();
            let score = rng.gen_range(FALLBACK_SCORE_MIN..=FALLBACK_SCORE_MAX);
            let count = rng.gen_range(1..=3usize);
            let concerns: Vec<String> = fallback_pool(metric)
                .choose_multiple(&mut *rng, count)
                .map(|concern| concern.to_string())
                .collect();
            (score, concerns)
        };
        MetricResult {
            score: Score::Value(f64::from(score)),
            resources: resources_for(metric, &concerns),
            concerns,
            confidence: Confidence::Fallback,
        }
    }

    fn lock_rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn normalized(metric: MetricKind, score: Score, concerns: Vec<String>) -> MetricResult {
    let (score, concerns) = if concerns.is_empty() {
        (Score::Value(100.0), vec![metric.no_concerns_placeholder()])
    } else {
        (score, concerns)
    };
    MetricResult {
        score,
        resources: resources_for(metric, &concerns),
        concerns,
        confidence: Confidence::Evaluated,
    }
}
