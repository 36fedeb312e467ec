//! Architecture evolution over categorical cell genomes.
//!
//! A generator architecture is encoded as a fixed sequence of cells, each a
//! selection of categorical design choices (convolution block order,
//! normalization, upsampling, shortcuts and skip connections). Populations of
//! such genomes are evolved by estimating, per locus, which categories are
//! carried by high-fitness individuals and resampling from that distribution,
//! followed by mutation.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Cell schemas, the integer encoding, errors and run configuration
//! - `evolution`: Genomes, distribution estimation and the search loop
//!
//! # Example
//!
//! ```rust
//! use arch_evo::evolution::{Dna, GenomeRng, population_step};
//! use arch_evo::schema::{MutationConfig, default_layout};
//!
//! let mut rng = GenomeRng::new(7);
//! let mut population: Vec<Dna> = (0..4)
//!     .map(|_| Dna::random(&default_layout(), MutationConfig::default(), &mut rng))
//!     .collect();
//! let scores = vec![1.0, 2.0, 3.0, 4.0];
//!
//! let matrix = population_step(
//!     &mut population,
//!     &scores,
//!     MutationConfig { probability: 0.05 },
//!     &mut rng,
//! )
//! .unwrap();
//! assert_eq!(matrix.len(), population[0].serialize().len());
//! ```

pub mod evolution;
pub mod schema;

// Re-export commonly used types
pub use evolution::{Dna, EvolutionEngine, FitnessEvaluator};
pub use schema::{EvolutionConfig, GenomeError, SegmentSchema};
