//! Per-locus distribution estimation over a scored population.
//!
//! For every global locus, the fitness of all individuals is accumulated on
//! the category they carry there and normalized into a probability vector.
//! Categories shared by high-scoring individuals become more likely in the
//! next generation.

use std::borrow::Borrow;

use log::debug;

use crate::schema::{GenomeError, MutationConfig};

use super::dna::Dna;
use super::rng::GenomeRng;

/// One probability vector per global locus, in serialization order.
pub type EvolutionMatrix = Vec<Vec<f64>>;

/// Build the evolution matrix from genomes and their scores.
///
/// `scores[i]` belongs to `genomes[i]`. All genomes must share a layout. A
/// locus whose accumulated fitness is zero is an error rather than a uniform
/// fallback.
pub fn evolution_matrix<G: Borrow<Dna>>(
    genomes: &[G],
    scores: &[f64],
) -> Result<EvolutionMatrix, GenomeError> {
    if genomes.len() != scores.len() {
        return Err(GenomeError::PopulationMismatch {
            genomes: genomes.len(),
            scores: scores.len(),
        });
    }
    let Some(first) = genomes.first() else {
        return Err(GenomeError::EmptyPopulation);
    };
    let first: &Dna = first.borrow();

    let layout = first.layout();
    let mut matrix: EvolutionMatrix = first
        .locus_domains()
        .into_iter()
        .map(|size| vec![0.0; size])
        .collect();

    for (individual, (genome, &score)) in genomes.iter().zip(scores).enumerate() {
        let genome: &Dna = genome.borrow();
        if genome.layout() != layout {
            return Err(GenomeError::LayoutMismatch { individual });
        }
        if !score.is_finite() || score < 0.0 {
            return Err(GenomeError::InvalidScore { individual, score });
        }
        for (row, category) in matrix.iter_mut().zip(genome.categories()) {
            row[category] += score;
        }
    }

    for (locus, row) in matrix.iter_mut().enumerate() {
        let total: f64 = row.iter().sum();
        if total == 0.0 {
            return Err(GenomeError::ZeroFitness { locus });
        }
        for p in row.iter_mut() {
            *p /= total;
        }
    }

    Ok(matrix)
}

/// Advance a population by one generation in place.
///
/// Applies `config` to every genome, builds the evolution matrix from
/// `scores`, evolves every genome from it and then mutates every genome.
/// Returns the matrix that was used.
pub fn population_step(
    genomes: &mut [Dna],
    scores: &[f64],
    config: MutationConfig,
    rng: &mut GenomeRng,
) -> Result<EvolutionMatrix, GenomeError> {
    let matrix = evolution_matrix(&*genomes, scores)?;
    apply_matrix(genomes, &matrix, config, rng)?;
    Ok(matrix)
}

/// Evolve then mutate every genome from an already estimated matrix.
///
/// The matrix is checked against every genome first; on error no genome
/// has changed.
pub fn apply_matrix(
    genomes: &mut [Dna],
    matrix: &[Vec<f64>],
    config: MutationConfig,
    rng: &mut GenomeRng,
) -> Result<(), GenomeError> {
    debug!(
        "evolving {} genomes over {} loci (mutation p={:.4})",
        genomes.len(),
        matrix.len(),
        config.probability
    );

    for (individual, genome) in genomes.iter().enumerate() {
        genome
            .check_matrix(matrix)
            .map_err(|e| e.in_individual(individual))?;
    }

    for genome in genomes.iter_mut() {
        genome.set_config(config);
    }
    for (individual, genome) in genomes.iter_mut().enumerate() {
        genome
            .evolve(matrix, rng)
            .map_err(|e| e.in_individual(individual))?;
    }
    for genome in genomes.iter_mut() {
        genome.mutate(rng);
    }

    Ok(())
}
