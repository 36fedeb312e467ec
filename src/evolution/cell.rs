//! A single genome segment with its mutation settings and history.

use crate::schema::{CellParameters, GenomeError, MutationConfig, SegmentSchema};

use super::rng::GenomeRng;

/// Tolerance for probability vectors summing to one.
const DISTRIBUTION_TOLERANCE: f64 = 1e-6;

/// One cell of a genome.
///
/// Every state the cell has held, starting from the initial one, is kept in
/// an append-only history.
#[derive(Debug, Clone)]
pub struct CellDna {
    parameters: CellParameters,
    config: MutationConfig,
    history: Vec<CellParameters>,
}

impl CellDna {
    /// Wrap initial parameters.
    pub fn new(parameters: CellParameters, config: MutationConfig) -> Self {
        let history = vec![parameters.clone()];
        Self {
            parameters,
            config,
            history,
        }
    }

    /// Uniformly random cell of the given schema.
    pub fn random(schema: SegmentSchema, config: MutationConfig, rng: &mut GenomeRng) -> Self {
        Self::new(schema.random(rng.inner()), config)
    }

    pub fn parameters(&self) -> &CellParameters {
        &self.parameters
    }

    pub fn schema(&self) -> SegmentSchema {
        self.parameters.schema()
    }

    pub fn config(&self) -> MutationConfig {
        self.config
    }

    /// Encoded form of the current state.
    pub fn serialize(&self) -> Vec<u32> {
        self.parameters.encode()
    }

    /// Replace the configuration used by later mutations.
    pub fn set_config(&mut self, config: MutationConfig) {
        self.config = config;
    }

    /// Resample each field with the configured probability.
    ///
    /// An accepted draw always moves the field to a different value.
    pub fn mutate(&mut self, rng: &mut GenomeRng) {
        let schema = self.schema();
        for (field, descriptor) in schema.kind().fields().iter().enumerate() {
            if rng.uniform() < self.config.probability {
                let current = self.parameters.codes()[field];
                if let Some(code) = rng.choose_other(descriptor.kind.labels().len(), current) {
                    self.parameters.set_code(field, code);
                }
            }
        }
        self.history.push(self.parameters.clone());
    }

    /// Redraw every locus independently from its distribution.
    ///
    /// `distributions` holds one probability vector per encoded locus. All
    /// vectors are checked before any field changes.
    pub fn evolve(
        &mut self,
        distributions: &[Vec<f64>],
        rng: &mut GenomeRng,
    ) -> Result<(), GenomeError> {
        self.check_distributions(distributions)?;

        for (locus, distribution) in distributions.iter().enumerate() {
            let category = rng
                .sample(distribution)
                .map_err(|e| GenomeError::InvalidDistribution {
                    locus,
                    reason: e.to_string(),
                })?;
            self.parameters.set_category(locus, category);
        }
        self.history.push(self.parameters.clone());
        Ok(())
    }

    /// Check that `distributions` could evolve this cell, without touching it.
    pub fn check_distributions(&self, distributions: &[Vec<f64>]) -> Result<(), GenomeError> {
        let domains = self.schema().locus_domains();
        if distributions.len() != domains.len() {
            return Err(GenomeError::Arity {
                expected: domains.len(),
                actual: distributions.len(),
            });
        }
        for (locus, (distribution, &size)) in distributions.iter().zip(&domains).enumerate() {
            check_distribution(locus, size, distribution)?;
        }
        Ok(())
    }

    /// Every state held so far, oldest first.
    pub fn history(&self) -> Vec<CellParameters> {
        self.history.clone()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

fn check_distribution(locus: usize, size: usize, distribution: &[f64]) -> Result<(), GenomeError> {
    if distribution.len() != size {
        return Err(GenomeError::SchemaMismatch {
            locus,
            expected: size,
            actual: distribution.len(),
        });
    }
    if distribution.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return Err(GenomeError::InvalidDistribution {
            locus,
            reason: "entries must be finite and non-negative".to_string(),
        });
    }
    let total: f64 = distribution.iter().sum();
    if (total - 1.0).abs() > DISTRIBUTION_TOLERANCE {
        return Err(GenomeError::InvalidDistribution {
            locus,
            reason: format!("entries sum to {total}"),
        });
    }
    Ok(())
}
