//! Evolutionary search over categorical architecture genomes.
//!
//! # Overview
//!
//! - **Random source** (`rng`): seedable generator shared by all operators
//! - **Cells** (`cell`): one genome segment with mutate/evolve and history
//! - **Genomes** (`dna`): ordered cells with aggregate serialize/mutate/evolve
//! - **Estimation** (`estimator`): per-locus distributions from scored populations
//! - **Fitness** (`fitness`): evaluator boundary and bundled evaluators
//! - **Search** (`search`): the epoch loop
//! - **Reporting** (`report`): population snapshots and run results
//!
//! # Example
//!
//! ```rust,no_run
//! use arch_evo::evolution::{EvolutionEngine, TargetMatchEvaluator};
//! use arch_evo::schema::EvolutionConfig;
//!
//! let config = EvolutionConfig::default();
//! let evaluator = TargetMatchEvaluator::new(vec![1; 15]);
//!
//! let mut engine = EvolutionEngine::new(config, Box::new(evaluator));
//! let result = engine
//!     .run_with_callback(|snapshot| {
//!         println!("epoch {}:\n{}", snapshot.epoch, snapshot);
//!     })
//!     .expect("evolution failed");
//!
//! println!("best: {:?}", result.best);
//! ```

mod cell;
mod dna;
mod estimator;
mod fitness;
mod report;
mod rng;
mod search;

pub use cell::CellDna;
pub use dna::Dna;
pub use estimator::{EvolutionMatrix, apply_matrix, evolution_matrix, population_step};
pub use fitness::{
    CommandEvaluator, EvaluationError, FitnessEvaluator, TargetMatchEvaluator, build_evaluator,
    evaluate_population,
};
pub use report::{
    EvolutionHistory, EvolutionResult, EvolutionStats, IndividualRecord, PopulationSnapshot,
    StopReason,
};
pub use rng::GenomeRng;
pub use search::EvolutionEngine;
