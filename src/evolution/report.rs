//! Per-epoch population snapshots and run results.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::dna::Dna;
use super::fitness::EvaluationError;

/// One evaluated individual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualRecord {
    /// Serialized genome.
    pub genome: Vec<u32>,
    /// Score, if evaluation succeeded.
    pub score: Option<f64>,
    /// Evaluation failure message, if it failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The population as evaluated at one epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationSnapshot {
    pub epoch: usize,
    pub mutation_probability: f64,
    pub individuals: Vec<IndividualRecord>,
}

impl PopulationSnapshot {
    /// Pair genomes with their evaluation results.
    pub fn new(
        epoch: usize,
        mutation_probability: f64,
        genomes: &[Dna],
        results: &[Result<f64, EvaluationError>],
    ) -> Self {
        let individuals = genomes
            .iter()
            .zip(results)
            .map(|(genome, result)| IndividualRecord {
                genome: genome.serialize(),
                score: result.as_ref().ok().copied(),
                error: result.as_ref().err().map(ToString::to_string),
            })
            .collect();
        Self {
            epoch,
            mutation_probability,
            individuals,
        }
    }

    /// Highest-scoring individual.
    pub fn best(&self) -> Option<&IndividualRecord> {
        self.individuals
            .iter()
            .filter(|i| i.score.is_some())
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Mean over successfully evaluated individuals.
    pub fn mean_score(&self) -> Option<f64> {
        let scores: Vec<f64> = self.individuals.iter().filter_map(|i| i.score).collect();
        if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        }
    }

    /// Number of failed evaluations.
    pub fn failures(&self) -> usize {
        self.individuals.iter().filter(|i| i.score.is_none()).count()
    }
}

impl fmt::Display for IndividualRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.score, &self.error) {
            (Some(score), _) => write!(f, "{:?} : {}", self.genome, score),
            (None, Some(error)) => write!(f, "{:?} : failed ({})", self.genome, error),
            (None, None) => write!(f, "{:?} : failed", self.genome),
        }
    }
}

impl fmt::Display for PopulationSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for individual in &self.individuals {
            writeln!(f, "{individual}")?;
        }
        Ok(())
    }
}

/// Fitness trajectory across epochs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvolutionHistory {
    pub best_fitness: Vec<f64>,
    pub mean_fitness: Vec<f64>,
    pub failures: Vec<usize>,
}

impl EvolutionHistory {
    pub fn record(&mut self, snapshot: &PopulationSnapshot) {
        self.best_fitness
            .push(snapshot.best().and_then(|b| b.score).unwrap_or(0.0));
        self.mean_fitness.push(snapshot.mean_score().unwrap_or(0.0));
        self.failures.push(snapshot.failures());
    }
}

/// Reason evolution stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// All configured epochs ran.
    Completed,
    /// User cancelled.
    Cancelled,
}

/// Summary statistics for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    pub epochs: usize,
    pub total_evaluations: u64,
    pub elapsed_seconds: f64,
    pub stop_reason: StopReason,
}

/// Outcome of an evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Best individual seen in any epoch.
    pub best: Option<IndividualRecord>,
    /// The last evaluated population.
    pub final_population: PopulationSnapshot,
    pub history: EvolutionHistory,
    pub stats: EvolutionStats,
}

impl EvolutionResult {
    /// Write the result as pretty-printed JSON.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Load a result written by [`EvolutionResult::save_json`].
    pub fn load_json<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(io::BufReader::new(file))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::GenomeRng;
    use crate::schema::{CellKind, MutationConfig, SegmentSchema};

    fn snapshot() -> PopulationSnapshot {
        let layout = [SegmentSchema::separate(CellKind::First)];
        let genomes = vec![
            Dna::decode(&layout, &[0, 1, 2, 1], MutationConfig::default()).unwrap(),
            Dna::decode(&layout, &[1, 1, 0, 0], MutationConfig::default()).unwrap(),
            Dna::random(&layout, MutationConfig::default(), &mut GenomeRng::new(0)),
        ];
        let results = vec![
            Ok(2.0),
            Ok(4.0),
            Err(EvaluationError::Rejected("unsupported".to_string())),
        ];
        PopulationSnapshot::new(3, 0.05, &genomes, &results)
    }

    #[test]
    fn test_snapshot_summary() {
        let snapshot = snapshot();
        assert_eq!(snapshot.best().unwrap().genome, vec![1, 1, 0, 0]);
        assert_eq!(snapshot.mean_score(), Some(3.0));
        assert_eq!(snapshot.failures(), 1);

        let mut history = EvolutionHistory::default();
        history.record(&snapshot);
        assert_eq!(history.best_fitness, vec![4.0]);
        assert_eq!(history.failures, vec![1]);
    }

    #[test]
    fn test_snapshot_lines() {
        let text = snapshot().to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "[0, 1, 2, 1] : 2");
        assert!(lines[2].ends_with(": failed (genome rejected: unsupported)"));
    }

    #[test]
    fn test_result_json_roundtrip() {
        let snapshot = snapshot();
        let result = EvolutionResult {
            best: snapshot.best().cloned(),
            final_population: snapshot,
            history: EvolutionHistory::default(),
            stats: EvolutionStats {
                epochs: 3,
                total_evaluations: 12,
                elapsed_seconds: 0.5,
                stop_reason: StopReason::Completed,
            },
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.json");
        result.save_json(&path).unwrap();

        let loaded = EvolutionResult::load_json(&path).unwrap();
        assert_eq!(loaded.best, result.best);
        assert_eq!(loaded.final_population.individuals.len(), 3);
        assert_eq!(loaded.stats.stop_reason, StopReason::Completed);
    }
}
