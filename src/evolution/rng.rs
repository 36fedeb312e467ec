//! Seedable random source for mutation and distribution sampling.

use rand::distributions::{WeightedError, WeightedIndex};
use rand::prelude::*;

/// Random number generator wrapper for genome operations.
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seed from the operating system, for runs without a configured seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Uniform draw in `[0, 1)` for mutation accept/reject tests.
    pub fn uniform(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }

    /// Uniform choice among `0..domain` excluding `current`.
    ///
    /// Returns `None` when the domain has no other option.
    pub fn choose_other(&mut self, domain: usize, current: u8) -> Option<u8> {
        if domain < 2 {
            return None;
        }
        let pick = self.rng.gen_range(0..domain - 1) as u8;
        Some(if pick >= current { pick + 1 } else { pick })
    }

    /// Draw a category index according to a probability vector.
    pub fn sample(&mut self, distribution: &[f64]) -> Result<usize, WeightedError> {
        let index = WeightedIndex::<f64>::new(distribution)?;
        Ok(index.sample(&mut self.rng))
    }

    /// Underlying generator, for APIs taking any [`Rng`].
    pub fn inner(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}
