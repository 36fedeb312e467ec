//! Epoch driver: evaluate, report, estimate, evolve, mutate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{info, warn};

use crate::schema::{EvolutionConfig, FailurePolicy, GenomeError, MutationConfig};

use super::dna::Dna;
use super::estimator::{EvolutionMatrix, apply_matrix, evolution_matrix};
use super::fitness::{FitnessEvaluator, evaluate_population};
use super::report::{
    EvolutionHistory, EvolutionResult, EvolutionStats, IndividualRecord, PopulationSnapshot,
    StopReason,
};
use super::rng::GenomeRng;

/// Evolution engine that runs the search.
pub struct EvolutionEngine {
    config: EvolutionConfig,
    rng: GenomeRng,
    evaluator: Box<dyn FitnessEvaluator>,
    population: Vec<Dna>,
    history: EvolutionHistory,
    best: Option<IndividualRecord>,
    epoch: usize,
    evaluations: u64,
    cancelled: Arc<AtomicBool>,
}

impl EvolutionEngine {
    /// Create a new evolution engine.
    pub fn new(config: EvolutionConfig, evaluator: Box<dyn FitnessEvaluator>) -> Self {
        let rng = config
            .random_seed
            .map_or_else(GenomeRng::random, GenomeRng::new);
        Self {
            config,
            rng,
            evaluator,
            population: Vec::new(),
            history: EvolutionHistory::default(),
            best: None,
            epoch: 0,
            evaluations: 0,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Fill the population with uniformly random genomes.
    pub fn initialize(&mut self) {
        let config = self.config.mutation.at(0);
        self.population = (0..self.config.population.size)
            .map(|_| Dna::random(&self.config.layout, config, &mut self.rng))
            .collect();
        self.epoch = 0;
    }

    /// Start from a given population instead of a random one.
    pub fn with_population(mut self, population: Vec<Dna>) -> Self {
        self.population = population;
        self
    }

    pub fn population(&self) -> &[Dna] {
        &self.population
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Score the current population.
    pub fn evaluate(&mut self, mutation: MutationConfig) -> PopulationSnapshot {
        let results = evaluate_population(
            self.evaluator.as_ref(),
            &self.population,
            self.config.evaluation.budget,
            self.config.evaluation.parallel,
        );
        self.evaluations += results.len() as u64;

        for (individual, result) in results.iter().enumerate() {
            if let Err(e) = result {
                warn!(
                    "epoch {}: evaluation of individual {} failed: {}",
                    self.epoch, individual, e
                );
            }
        }

        let snapshot =
            PopulationSnapshot::new(self.epoch, mutation.probability, &self.population, &results);
        self.record(&snapshot);
        snapshot
    }

    fn record(&mut self, snapshot: &PopulationSnapshot) {
        self.history.record(snapshot);
        if let Some(candidate) = snapshot.best() {
            let improves = match &self.best {
                Some(best) => candidate.score > best.score,
                None => true,
            };
            if improves {
                self.best = Some(candidate.clone());
            }
        }
    }

    /// Advance the population one generation from an evaluated snapshot.
    pub fn step_generation(
        &mut self,
        snapshot: &PopulationSnapshot,
        mutation: MutationConfig,
    ) -> Result<EvolutionMatrix, GenomeError> {
        if snapshot.individuals.len() != self.population.len() {
            return Err(GenomeError::PopulationMismatch {
                genomes: self.population.len(),
                scores: snapshot.individuals.len(),
            });
        }

        let policy = self.config.evaluation.failure_policy;
        let mut indices = Vec::with_capacity(self.population.len());
        let mut members = Vec::with_capacity(self.population.len());
        let mut scores = Vec::with_capacity(self.population.len());
        for (individual, (genome, record)) in
            self.population.iter().zip(&snapshot.individuals).enumerate()
        {
            let score = match (record.score, policy) {
                (Some(score), _) => score,
                (None, FailurePolicy::ScoreZero) => 0.0,
                (None, FailurePolicy::Exclude) => continue,
            };
            indices.push(individual);
            members.push(genome);
            scores.push(score);
        }

        // Errors from the estimator index into `members`; report population indices.
        let matrix = evolution_matrix(&members, &scores).map_err(|e| match e {
            GenomeError::LayoutMismatch { individual } => GenomeError::LayoutMismatch {
                individual: indices[individual],
            },
            GenomeError::InvalidScore { individual, score } => GenomeError::InvalidScore {
                individual: indices[individual],
                score,
            },
            other => other,
        })?;
        apply_matrix(&mut self.population, &matrix, mutation, &mut self.rng)?;
        self.epoch += 1;
        Ok(matrix)
    }

    /// Run evolution with a callback receiving every evaluated population.
    pub fn run_with_callback<F>(&mut self, mut callback: F) -> Result<EvolutionResult, GenomeError>
    where
        F: FnMut(&PopulationSnapshot),
    {
        let start_time = Instant::now();

        if self.population.is_empty() {
            self.initialize();
        }

        let mut stop_reason = StopReason::Completed;
        while self.epoch < self.config.population.epochs {
            if self.cancelled.load(Ordering::Relaxed) {
                stop_reason = StopReason::Cancelled;
                break;
            }

            let mutation = self.config.mutation.at(self.epoch);
            info!(
                "epoch {}: evaluating {} genomes (mutation p={:.4})",
                self.epoch,
                self.population.len(),
                mutation.probability
            );
            let snapshot = self.evaluate(mutation);
            log_snapshot(&snapshot);
            callback(&snapshot);

            self.step_generation(&snapshot, mutation)?;
        }

        let mutation = self.config.mutation.at(self.epoch);
        info!("final population after {} epochs", self.epoch);
        let final_population = self.evaluate(mutation);
        log_snapshot(&final_population);
        callback(&final_population);

        let elapsed = start_time.elapsed().as_secs_f64();
        Ok(EvolutionResult {
            best: self.best.clone(),
            final_population,
            history: self.history.clone(),
            stats: EvolutionStats {
                epochs: self.epoch,
                total_evaluations: self.evaluations,
                elapsed_seconds: elapsed,
                stop_reason,
            },
        })
    }

    /// Run evolution (blocking).
    pub fn run(&mut self) -> Result<EvolutionResult, GenomeError> {
        self.run_with_callback(|_| {})
    }
}

fn log_snapshot(snapshot: &PopulationSnapshot) {
    for individual in &snapshot.individuals {
        info!("{individual}");
    }
}
