//! Error taxonomy for genome encoding and population updates.

use super::SegmentSchema;

/// Contract violations raised by schemas, genomes and the population step.
///
/// All of these indicate a corrupted genome or a caller bug and abort the
/// operation in progress. Evaluator failures live in
/// [`EvaluationError`](crate::evolution::EvaluationError) instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenomeError {
    #[error("field index {index} out of range ({count} fields)")]
    FieldIndex { index: usize, count: usize },
    #[error("expected {expected} codes, got {actual}")]
    Arity { expected: usize, actual: usize },
    #[error("code {code} is outside the domain of field {field} ({name}, {size} options)")]
    Domain {
        field: usize,
        name: &'static str,
        code: u32,
        size: usize,
    },
    #[error("locus {locus} expects {expected} entries, got {actual}")]
    SchemaMismatch {
        locus: usize,
        expected: usize,
        actual: usize,
    },
    #[error("cell of schema {actual:?} cannot be encoded as {expected:?}")]
    CellSchema {
        expected: SegmentSchema,
        actual: SegmentSchema,
    },
    #[error("invalid distribution at locus {locus}: {reason}")]
    InvalidDistribution { locus: usize, reason: String },
    #[error("merged skip value {value} is not one of 0, 1, 10, 11")]
    Decode { value: u32 },
    #[error("{kind} cell has no trailing skip pair to merge")]
    UnmergeableSchema { kind: &'static str },
    #[error("total fitness at locus {locus} is zero")]
    ZeroFitness { locus: usize },
    #[error("individual {individual} has invalid score {score}")]
    InvalidScore { individual: usize, score: f64 },
    #[error("population has {genomes} genomes but {scores} scores")]
    PopulationMismatch { genomes: usize, scores: usize },
    #[error("population is empty")]
    EmptyPopulation,
    #[error("individual {individual} does not share the population layout")]
    LayoutMismatch { individual: usize },
    #[error("segment {segment}: {source}")]
    InSegment {
        segment: usize,
        #[source]
        source: Box<GenomeError>,
    },
    #[error("individual {individual}: {source}")]
    InIndividual {
        individual: usize,
        #[source]
        source: Box<GenomeError>,
    },
}

impl GenomeError {
    /// Attach the segment position to an error raised inside a segment.
    pub fn in_segment(self, segment: usize) -> Self {
        Self::InSegment {
            segment,
            source: Box::new(self),
        }
    }

    /// Attach the population index to an error raised inside a genome.
    pub fn in_individual(self, individual: usize) -> Self {
        Self::InIndividual {
            individual,
            source: Box::new(self),
        }
    }

    /// Strip location wrappers and return the underlying violation.
    pub fn root(&self) -> &GenomeError {
        match self {
            Self::InSegment { source, .. } | Self::InIndividual { source, .. } => source.root(),
            other => other,
        }
    }
}
