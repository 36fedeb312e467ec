//! Whole-architecture genomes built from an ordered list of cells.

use crate::schema::{
    CellParameters, FieldKind, GenomeError, MutationConfig, SegmentSchema, SkipEncoding,
    decode_layout,
};

use super::cell::CellDna;
use super::rng::GenomeRng;

/// An architecture genome: cells in generator order.
///
/// The number of cells and each cell's schema never change; only field
/// values inside the cells do.
#[derive(Debug, Clone)]
pub struct Dna {
    cells: Vec<CellDna>,
}

impl Dna {
    /// Build from initial cell parameters.
    pub fn new(parameters: Vec<CellParameters>, config: MutationConfig) -> Self {
        Self {
            cells: parameters
                .into_iter()
                .map(|p| CellDna::new(p, config))
                .collect(),
        }
    }

    /// Uniformly random genome with the given layout.
    pub fn random(layout: &[SegmentSchema], config: MutationConfig, rng: &mut GenomeRng) -> Self {
        Self {
            cells: layout
                .iter()
                .map(|&schema| CellDna::random(schema, config, rng))
                .collect(),
        }
    }

    /// Decode a serialized genome against a layout.
    pub fn decode(
        layout: &[SegmentSchema],
        serialized: &[u32],
        config: MutationConfig,
    ) -> Result<Self, GenomeError> {
        Ok(Self::new(decode_layout(layout, serialized)?, config))
    }

    pub fn cells(&self) -> &[CellDna] {
        &self.cells
    }

    /// Schema of each cell, in order.
    pub fn layout(&self) -> Vec<SegmentSchema> {
        self.cells.iter().map(|c| c.schema()).collect()
    }

    /// Canonical integer form: every cell's encoding, concatenated.
    pub fn serialize(&self) -> Vec<u32> {
        self.cells.iter().flat_map(|c| c.serialize()).collect()
    }

    /// Category index at each global locus.
    pub fn categories(&self) -> Vec<usize> {
        self.cells
            .iter()
            .flat_map(|c| c.parameters().categories())
            .collect()
    }

    /// Number of categories at each global locus.
    pub fn locus_domains(&self) -> Vec<usize> {
        self.cells
            .iter()
            .flat_map(|c| c.schema().locus_domains())
            .collect()
    }

    /// Architecture vector for a GAN trainer.
    ///
    /// Like [`Dna::serialize`], except the trailing skip pair of the last
    /// cell becomes a single value `2 * skip_from_1 + skip_from_2`.
    pub fn to_arch(&self) -> Vec<u32> {
        let mut arch = self.serialize();
        let Some(last) = self.cells.last() else {
            return arch;
        };
        let schema = last.schema();
        if !schema.kind().has_skip_pair() {
            return arch;
        }
        let codes = last.parameters().codes();
        let pair = &codes[codes.len() - 2..];
        let skip = 2 * pair[0] as u32 + pair[1] as u32;
        match schema.encoding() {
            SkipEncoding::Separate => {
                arch.truncate(arch.len() - 2);
            }
            SkipEncoding::Merged => {
                arch.pop();
            }
        }
        arch.push(skip);
        arch
    }

    /// Number of skip connections switched on across all cells.
    pub fn skip_count(&self) -> usize {
        self.cells
            .iter()
            .map(|c| {
                let parameters = c.parameters();
                c.schema()
                    .kind()
                    .fields()
                    .iter()
                    .zip(parameters.codes())
                    .filter(|(f, code)| f.kind == FieldKind::Skip && **code == 1)
                    .count()
            })
            .sum()
    }

    /// Mutate every cell with its own configuration.
    pub fn mutate(&mut self, rng: &mut GenomeRng) {
        for cell in &mut self.cells {
            cell.mutate(rng);
        }
    }

    /// Give every cell the same mutation configuration.
    pub fn set_config(&mut self, config: MutationConfig) {
        for cell in &mut self.cells {
            cell.set_config(config);
        }
    }

    /// Check that `evolution_matrix` could evolve this genome, without
    /// touching any cell.
    pub fn check_matrix(&self, evolution_matrix: &[Vec<f64>]) -> Result<(), GenomeError> {
        let expected: usize = self.cells.iter().map(|c| c.schema().encoded_len()).sum();
        if evolution_matrix.len() != expected {
            return Err(GenomeError::Arity {
                expected,
                actual: evolution_matrix.len(),
            });
        }
        for (segment, (cell, rows)) in self.segments(evolution_matrix).enumerate() {
            cell.check_distributions(rows)
                .map_err(|e| e.in_segment(segment))?;
        }
        Ok(())
    }

    /// Evolve every cell from a matrix with one distribution per global locus.
    ///
    /// The matrix is split at cell boundaries given by each cell's own
    /// encoded length. Nothing changes unless every segment's slice is valid.
    pub fn evolve(
        &mut self,
        evolution_matrix: &[Vec<f64>],
        rng: &mut GenomeRng,
    ) -> Result<(), GenomeError> {
        self.check_matrix(evolution_matrix)?;

        let mut position = 0;
        for (segment, cell) in self.cells.iter_mut().enumerate() {
            let end = position + cell.schema().encoded_len();
            cell.evolve(&evolution_matrix[position..end], rng)
                .map_err(|e| e.in_segment(segment))?;
            position = end;
        }
        Ok(())
    }

    fn segments<'a>(
        &'a self,
        evolution_matrix: &'a [Vec<f64>],
    ) -> impl Iterator<Item = (&'a CellDna, &'a [Vec<f64>])> {
        self.cells.iter().scan(0, move |position, cell| {
            let start = *position;
            *position += cell.schema().encoded_len();
            Some((cell, &evolution_matrix[start..*position]))
        })
    }
}

impl std::fmt::Display for Dna {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, cell) in self.cells.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            let labels: Vec<String> = cell
                .parameters()
                .labels()
                .into_iter()
                .map(|(name, label)| format!("{name}={label}"))
                .collect();
            write!(f, "{}", labels.join(","))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CellKind, default_layout};

    fn one_hot(size: usize, hot: usize) -> Vec<f64> {
        (0..size).map(|i| if i == hot { 1.0 } else { 0.0 }).collect()
    }

    #[test]
    fn test_serialize_concatenates_cells() {
        let genome = Dna::decode(
            &default_layout(),
            &[0, 1, 2, 1, 1, 0, 1, 0, 1, 1, 0, 2, 1, 0, 1],
            MutationConfig::default(),
        )
        .unwrap();

        assert_eq!(genome.cells().len(), 3);
        assert_eq!(genome.cells()[1].serialize(), vec![1, 0, 1, 0, 1]);
        assert_eq!(
            genome.serialize(),
            vec![0, 1, 2, 1, 1, 0, 1, 0, 1, 1, 0, 2, 1, 0, 1]
        );
        assert_eq!(genome.skip_count(), 2);
    }

    #[test]
    fn test_decode_reports_segment() {
        let err = Dna::decode(
            &default_layout(),
            &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2, 0],
            MutationConfig::default(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            GenomeError::Domain {
                field: 4,
                name: "skip_from_1",
                code: 2,
                size: 2
            }
            .in_segment(2)
        );
    }

    #[test]
    fn test_evolve_partitions_by_cell_length() {
        let mut rng = GenomeRng::new(4);
        let mut genome = Dna::random(&default_layout(), MutationConfig::default(), &mut rng);
        let domains = genome.locus_domains();
        assert_eq!(domains.len(), 15);

        // Locus i is forced to category (i % domain), so every cell must pick
        // up exactly its own slice [0:4], [4:9], [9:15].
        let matrix: Vec<Vec<f64>> = domains
            .iter()
            .enumerate()
            .map(|(i, &size)| one_hot(size, i % size))
            .collect();
        genome.evolve(&matrix, &mut rng).unwrap();

        let expected: Vec<u32> = domains
            .iter()
            .enumerate()
            .map(|(i, &size)| (i % size) as u32)
            .collect();
        assert_eq!(genome.cells()[0].serialize(), &expected[0..4]);
        assert_eq!(genome.cells()[1].serialize(), &expected[4..9]);
        assert_eq!(genome.cells()[2].serialize(), &expected[9..15]);
        assert_eq!(genome.serialize(), expected);
    }

    #[test]
    fn test_evolve_matrix_length_must_match() {
        let mut rng = GenomeRng::new(4);
        let mut genome = Dna::random(&default_layout(), MutationConfig::default(), &mut rng);
        let matrix = vec![vec![0.5, 0.5]; 14];
        assert_eq!(
            genome.evolve(&matrix, &mut rng),
            Err(GenomeError::Arity {
                expected: 15,
                actual: 14
            })
        );
    }

    #[test]
    fn test_evolve_reports_failing_segment() {
        let mut rng = GenomeRng::new(4);
        let mut genome = Dna::random(&default_layout(), MutationConfig::default(), &mut rng);
        let mut matrix: Vec<Vec<f64>> = genome
            .locus_domains()
            .iter()
            .map(|&size| one_hot(size, 0))
            .collect();
        matrix[5] = vec![1.0];

        let err = genome.evolve(&matrix, &mut rng).unwrap_err();
        assert_eq!(
            err,
            GenomeError::SchemaMismatch {
                locus: 1,
                expected: 3,
                actual: 1
            }
            .in_segment(1)
        );
    }

    #[test]
    fn test_failed_evolve_leaves_every_segment_untouched() {
        let mut rng = GenomeRng::new(4);
        let mut genome = Dna::decode(&default_layout(), &[0; 15], MutationConfig::default()).unwrap();
        let mut matrix: Vec<Vec<f64>> = genome
            .locus_domains()
            .iter()
            .map(|&size| one_hot(size, size - 1))
            .collect();
        matrix[5] = vec![1.0];

        assert!(genome.evolve(&matrix, &mut rng).is_err());
        assert_eq!(genome.serialize(), vec![0; 15]);
        assert!(genome.cells().iter().all(|c| c.history_len() == 1));
    }

    #[test]
    fn test_set_config_broadcasts() {
        let mut rng = GenomeRng::new(4);
        let mut genome = Dna::random(&default_layout(), MutationConfig::default(), &mut rng);
        genome.set_config(MutationConfig { probability: 1.0 });
        assert!(genome.cells().iter().all(|c| c.config().probability == 1.0));

        let before = genome.serialize();
        genome.mutate(&mut rng);
        let after = genome.serialize();
        assert!(before.iter().zip(&after).all(|(b, a)| b != a));
        assert!(genome.cells().iter().all(|c| c.history_len() == 2));
    }

    #[test]
    fn test_to_arch_collapses_skip_pair() {
        let separate = Dna::decode(
            &default_layout(),
            &[0, 1, 2, 1, 1, 0, 1, 0, 1, 1, 0, 2, 1, 1, 0],
            MutationConfig::default(),
        )
        .unwrap();
        assert_eq!(
            separate.to_arch(),
            vec![0, 1, 2, 1, 1, 0, 1, 0, 1, 1, 0, 2, 1, 2]
        );

        let merged_layout = vec![
            SegmentSchema::separate(CellKind::First),
            SegmentSchema::merged(CellKind::Third).unwrap(),
        ];
        let merged = Dna::decode(
            &merged_layout,
            &[0, 1, 2, 1, 1, 0, 2, 0, 11],
            MutationConfig::default(),
        )
        .unwrap();
        assert_eq!(merged.serialize(), vec![0, 1, 2, 1, 1, 0, 2, 0, 11]);
        assert_eq!(merged.to_arch(), vec![0, 1, 2, 1, 1, 0, 2, 0, 3]);
        assert_eq!(merged.locus_domains(), vec![2, 3, 3, 2, 2, 3, 3, 2, 4]);
    }

    #[test]
    fn test_display_lists_labels() {
        let genome = Dna::decode(
            &[SegmentSchema::separate(CellKind::First)],
            &[0, 1, 2, 1],
            MutationConfig::default(),
        )
        .unwrap();
        assert_eq!(
            genome.to_string(),
            "conv_block=PRE_ACTIVATION,normalization=BATCH_NORMALIZATION,upsample=DECONV,shortcut=SHORTCUT"
        );
    }
}
