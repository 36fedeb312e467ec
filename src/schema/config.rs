//! Configuration types for architecture evolution runs.

use serde::{Deserialize, Serialize};

use super::{CellKind, GenomeError, SegmentSchema, decode_layout};

/// Top-level configuration for an evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Segment schemas, in genome order.
    #[serde(default = "default_layout")]
    pub layout: Vec<SegmentSchema>,
    /// Population and epoch settings.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Mutation probability schedule.
    #[serde(default)]
    pub mutation: MutationSchedule,
    /// Fitness evaluation settings.
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            layout: default_layout(),
            population: PopulationConfig::default(),
            mutation: MutationSchedule::default(),
            evaluation: EvaluationConfig::default(),
            random_seed: None,
        }
    }
}

/// Generator layout: three cells with growing skip connectivity.
pub fn default_layout() -> Vec<SegmentSchema> {
    vec![
        SegmentSchema::separate(CellKind::First),
        SegmentSchema::separate(CellKind::Second),
        SegmentSchema::separate(CellKind::Third),
    ]
}

/// Population settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of genomes.
    #[serde(default = "default_population_size")]
    pub size: usize,
    /// Number of evolve/mutate epochs.
    #[serde(default = "default_epochs")]
    pub epochs: usize,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            epochs: default_epochs(),
        }
    }
}

fn default_population_size() -> usize {
    10
}
fn default_epochs() -> usize {
    20
}

/// Per-epoch mutation configuration applied to every genome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MutationConfig {
    /// Per-field probability of resampling during mutation.
    pub probability: f64,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self { probability: 0.2 }
    }
}

/// Mutation probability decay across epochs.
///
/// The probability at epoch `e` is
/// `initial * decay_factor ^ ceil(e / decay_every)`, i.e. it drops after
/// epochs `0, decay_every, 2 * decay_every, ...`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationSchedule {
    #[serde(default = "default_initial_probability")]
    pub initial: f64,
    #[serde(default = "default_decay_factor")]
    pub decay_factor: f64,
    /// Epoch interval between decays; 0 disables decay.
    #[serde(default = "default_decay_every")]
    pub decay_every: usize,
}

impl Default for MutationSchedule {
    fn default() -> Self {
        Self {
            initial: default_initial_probability(),
            decay_factor: default_decay_factor(),
            decay_every: default_decay_every(),
        }
    }
}

fn default_initial_probability() -> f64 {
    0.05
}
fn default_decay_factor() -> f64 {
    0.5
}
fn default_decay_every() -> usize {
    2
}

impl MutationSchedule {
    /// Mutation configuration for an epoch.
    pub fn at(&self, epoch: usize) -> MutationConfig {
        let decays = if self.decay_every == 0 {
            0
        } else {
            epoch.div_ceil(self.decay_every)
        };
        MutationConfig {
            probability: self.initial * self.decay_factor.powi(decays as i32),
        }
    }
}

/// Fitness evaluation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Evaluation budget handed to the evaluator (e.g. training epochs).
    #[serde(default = "default_budget")]
    pub budget: u64,
    /// What to do with individuals whose evaluation fails.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Evaluate individuals in parallel.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// Evaluator used by the command-line runner.
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            budget: default_budget(),
            failure_policy: FailurePolicy::default(),
            parallel: default_parallel(),
            evaluator: EvaluatorConfig::default(),
        }
    }
}

fn default_budget() -> u64 {
    1
}
fn default_parallel() -> bool {
    true
}

/// Handling of individuals whose evaluation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Count the individual with a score of zero.
    #[default]
    ScoreZero,
    /// Leave the individual out of distribution estimation.
    Exclude,
}

/// Evaluator selection for the command-line runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EvaluatorConfig {
    /// Score = number of loci equal to a target genome.
    TargetMatch { target: Vec<u32> },
    /// External program invoked once per genome.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self::TargetMatch {
            target: vec![1, 1, 2, 1, 1, 1, 2, 1, 1, 1, 1, 2, 1, 1, 1],
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be at least 2")]
    PopulationTooSmall,
    #[error("Layout must contain at least one segment")]
    EmptyLayout,
    #[error("Mutation probability {0} must lie in [0, 1]")]
    InvalidProbability(f64),
    #[error("Decay factor {0} must lie in [0, 1]")]
    InvalidDecayFactor(f64),
    #[error("Evaluator command must not be empty")]
    EmptyCommand,
    #[error("Target genome does not fit the layout: {0}")]
    InvalidTarget(#[from] GenomeError),
}

impl EvolutionConfig {
    /// Validate evolution configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population.size < 2 {
            return Err(ConfigError::PopulationTooSmall);
        }

        if self.layout.is_empty() {
            return Err(ConfigError::EmptyLayout);
        }

        if !(0.0..=1.0).contains(&self.mutation.initial) {
            return Err(ConfigError::InvalidProbability(self.mutation.initial));
        }
        if !(0.0..=1.0).contains(&self.mutation.decay_factor) {
            return Err(ConfigError::InvalidDecayFactor(self.mutation.decay_factor));
        }

        match &self.evaluation.evaluator {
            EvaluatorConfig::TargetMatch { target } => {
                decode_layout(&self.layout, target)?;
            }
            EvaluatorConfig::Command { program, .. } => {
                if program.trim().is_empty() {
                    return Err(ConfigError::EmptyCommand);
                }
            }
        }

        Ok(())
    }
}
