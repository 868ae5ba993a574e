//! Tunables for the analysis pipeline.

use std::time::Duration;

use crate::gateway::GatewaySettings;
use crate::sampler::SampleLimits;
use crate::trimmer::TrimLimits;
use crate::walker::WalkLimits;

/// Every limit and delay used by the orchestrators.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Tree traversal bounds.
    pub walk: WalkLimits,
    /// Sample size caps.
    pub sample: SampleLimits,
    /// Content budget per file.
    pub trim: TrimLimits,
    /// Evaluator call settings.
    pub gateway: GatewaySettings,
    /// Files evaluated at once within one repository.
    pub file_concurrency: usize,
    /// Pause between file batches.
    pub batch_pause: Duration,
    /// Repositories analysed at once in eager mode.
    pub repo_concurrency: usize,
    /// Only the highest-ranked repositories are analysed eagerly when set.
    pub max_repositories: Option<usize>,
    /// Leave forks out of eager analysis.
    pub skip_forks: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            walk: WalkLimits::default(),
            sample: SampleLimits::default(),
            trim: TrimLimits::default(),
            gateway: GatewaySettings::default(),
            file_concurrency: 2,
            batch_pause: Duration::from_secs(10),
            repo_concurrency: 3,
            max_repositories: None,
            skip_forks: false,
        }
    }
}

impl AnalysisConfig {
    /// Configuration with every delay removed, for tests and dry runs.
    pub fn without_delays() -> Self {
        let mut config = Self::default();
        config.batch_pause = Duration::ZERO;
        config.gateway.pacing = Duration::ZERO;
        config.gateway.retry.min_wait = Duration::ZERO;
        config.gateway.retry.max_wait = Duration::ZERO;
        config
    }
}
