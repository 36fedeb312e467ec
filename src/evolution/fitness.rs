//! Fitness evaluation boundary.
//!
//! Training a candidate network and scoring it happens outside this crate.
//! Evaluators receive a serialized genome plus a budget and return one
//! non-negative score, or an [`EvaluationError`] the engine turns into a
//! per-individual policy decision.

use std::process::Command;

use rayon::prelude::*;

use crate::schema::EvaluatorConfig;

use super::dna::Dna;

/// Failure reported by an evaluator for a single genome.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("genome rejected: {0}")]
    Rejected(String),
    #[error("evaluator I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("evaluator exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("could not parse a score from {0:?}")]
    Parse(String),
    #[error("score {0} is not a finite non-negative number")]
    InvalidScore(f64),
}

/// Scores one serialized genome.
pub trait FitnessEvaluator: Send + Sync {
    fn evaluate(&self, genome: &[u32], budget: u64) -> Result<f64, EvaluationError>;
}

impl<F> FitnessEvaluator for F
where
    F: Fn(&[u32], u64) -> Result<f64, EvaluationError> + Send + Sync,
{
    fn evaluate(&self, genome: &[u32], budget: u64) -> Result<f64, EvaluationError> {
        self(genome, budget)
    }
}

/// Build the evaluator described by a configuration.
pub fn build_evaluator(config: &EvaluatorConfig) -> Box<dyn FitnessEvaluator> {
    match config {
        EvaluatorConfig::TargetMatch { target } => {
            Box::new(TargetMatchEvaluator::new(target.clone()))
        }
        EvaluatorConfig::Command { program, args } => {
            Box::new(CommandEvaluator::new(program.clone(), args.clone()))
        }
    }
}

/// Synthetic objective: the number of loci equal to a target genome.
#[derive(Debug, Clone)]
pub struct TargetMatchEvaluator {
    target: Vec<u32>,
}

impl TargetMatchEvaluator {
    pub fn new(target: Vec<u32>) -> Self {
        Self { target }
    }
}

impl FitnessEvaluator for TargetMatchEvaluator {
    fn evaluate(&self, genome: &[u32], _budget: u64) -> Result<f64, EvaluationError> {
        if genome.len() != self.target.len() {
            return Err(EvaluationError::Rejected(format!(
                "expected {} loci, got {}",
                self.target.len(),
                genome.len()
            )));
        }
        let matches = genome
            .iter()
            .zip(&self.target)
            .filter(|(a, b)| a == b)
            .count();
        Ok(matches as f64)
    }
}

/// Runs an external program once per genome.
///
/// The program is called as `program [args...] <genome> <budget>`, with the
/// genome written as comma-separated integers. The score is read from the
/// last non-empty line of its standard output.
#[derive(Debug, Clone)]
pub struct CommandEvaluator {
    program: String,
    args: Vec<String>,
}

impl CommandEvaluator {
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

impl FitnessEvaluator for CommandEvaluator {
    fn evaluate(&self, genome: &[u32], budget: u64) -> Result<f64, EvaluationError> {
        let encoded: Vec<String> = genome.iter().map(u32::to_string).collect();
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(encoded.join(","))
            .arg(budget.to_string())
            .output()?;

        if !output.status.success() {
            return Err(EvaluationError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or_default();
        line.parse::<f64>()
            .map_err(|_| EvaluationError::Parse(line.to_string()))
    }
}

fn checked(result: Result<f64, EvaluationError>) -> Result<f64, EvaluationError> {
    match result {
        Ok(score) if !score.is_finite() || score < 0.0 => Err(EvaluationError::InvalidScore(score)),
        other => other,
    }
}

/// Evaluate every genome; results stay index-aligned with `genomes`.
pub fn evaluate_population(
    evaluator: &dyn FitnessEvaluator,
    genomes: &[Dna],
    budget: u64,
    parallel: bool,
) -> Vec<Result<f64, EvaluationError>> {
    if parallel {
        genomes
            .par_iter()
            .map(|g| checked(evaluator.evaluate(&g.serialize(), budget)))
            .collect()
    } else {
        genomes
            .iter()
            .map(|g| checked(evaluator.evaluate(&g.serialize(), budget)))
            .collect()
    }
}
