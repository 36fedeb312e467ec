//! Categorical cell parameters and their integer encoding.
//!
//! Every cell of a generator architecture is described by a fixed, ordered
//! list of categorical fields. The position of a field defines where it lands
//! in the serialized genome, and the position of a label inside its field's
//! domain defines its integer code.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::GenomeError;

/// A closed enumeration usable as a cell field.
pub trait Categorical: Copy + Sized {
    /// Labels in code order.
    const LABELS: &'static [&'static str];

    /// Integer code (position in [`Self::LABELS`]).
    fn code(self) -> u8;

    /// Inverse of [`Categorical::code`].
    fn from_code(code: u8) -> Option<Self>;

    /// Label of this value.
    fn label(self) -> &'static str {
        Self::LABELS[self.code() as usize]
    }
}

macro_rules! categorical {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident = $code:literal => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($(#[$vmeta])* $variant = $code),+
        }

        impl Categorical for $name {
            const LABELS: &'static [&'static str] = &[$($label),+];

            fn code(self) -> u8 {
                self as u8
            }

            fn from_code(code: u8) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

categorical! {
    /// Order of activation and convolution inside a block.
    ConvolutionBlock {
        PreActivation = 0 => "PRE_ACTIVATION",
        PostActivation = 1 => "POST_ACTIVATION",
    }
}

categorical! {
    /// Normalization layer used by a cell.
    Normalization {
        NoNormalization = 0 => "NO_NORMALIZATION",
        BatchNormalization = 1 => "BATCH_NORMALIZATION",
        InstanceNormalization = 2 => "INSTANCE_NORMALIZATION",
    }
}

categorical! {
    /// Upsampling operator.
    Upsample {
        Bilinear = 0 => "BILINEAR",
        NearestNeighbor = 1 => "NEAREST_NEIGHBOR",
        Deconv = 2 => "DECONV",
    }
}

categorical! {
    /// In-cell residual shortcut.
    Shortcut {
        NoShortcut = 0 => "NO_SHORTCUT",
        Shortcut = 1 => "SHORTCUT",
    }
}

categorical! {
    /// Skip connection arriving from an earlier cell.
    Skip {
        NoSkipConnection = 0 => "NO_SKIP_CONNECTION",
        SkipConnection = 1 => "SKIP_CONNECTION",
    }
}

/// The categorical type held by a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    ConvolutionBlock,
    Normalization,
    Upsample,
    Shortcut,
    Skip,
}

impl FieldKind {
    /// Labels of this field's domain, in code order.
    pub fn labels(self) -> &'static [&'static str] {
        match self {
            Self::ConvolutionBlock => ConvolutionBlock::LABELS,
            Self::Normalization => Normalization::LABELS,
            Self::Upsample => Upsample::LABELS,
            Self::Shortcut => Shortcut::LABELS,
            Self::Skip => Skip::LABELS,
        }
    }
}

/// A named field of a cell schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

// Each cell kind uses a prefix of this list.
const CELL_FIELDS: [FieldSpec; 6] = [
    FieldSpec {
        name: "conv_block",
        kind: FieldKind::ConvolutionBlock,
    },
    FieldSpec {
        name: "normalization",
        kind: FieldKind::Normalization,
    },
    FieldSpec {
        name: "upsample",
        kind: FieldKind::Upsample,
    },
    FieldSpec {
        name: "shortcut",
        kind: FieldKind::Shortcut,
    },
    FieldSpec {
        name: "skip_from_1",
        kind: FieldKind::Skip,
    },
    FieldSpec {
        name: "skip_from_2",
        kind: FieldKind::Skip,
    },
];

/// The closed set of cell schemas a genome can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    /// Block layout only.
    First,
    /// Adds a skip connection from cell 1.
    Second,
    /// Adds skip connections from cells 1 and 2.
    Third,
}

impl CellKind {
    /// Schema name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Second => "second",
            Self::Third => "third",
        }
    }

    /// Ordered field descriptors.
    pub fn fields(self) -> &'static [FieldSpec] {
        let count = match self {
            Self::First => 4,
            Self::Second => 5,
            Self::Third => 6,
        };
        &CELL_FIELDS[..count]
    }

    /// Whether the two trailing fields are both skip connections.
    pub fn has_skip_pair(self) -> bool {
        matches!(
            self.fields(),
            [
                ..,
                FieldSpec {
                    kind: FieldKind::Skip,
                    ..
                },
                FieldSpec {
                    kind: FieldKind::Skip,
                    ..
                }
            ]
        )
    }
}

/// How the trailing skip pair of a cell is written to the genome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipEncoding {
    /// One integer per field.
    #[default]
    Separate,
    /// Both skip fields collapsed into a single decimal-concatenated value.
    Merged,
}

/// Merged skip values, indexed by category `2 * first + second`.
///
/// This is a fixed four-entry table for two binary fields, not a general
/// packing scheme: `(a, b)` is written as `10 * a + b`.
pub const MERGED_SKIP_VALUES: [u32; 4] = [0, 1, 10, 11];

/// Collapse a pair of skip codes into one merged value.
pub fn merge_skip(first: Skip, second: Skip) -> u32 {
    first.code() as u32 * 10 + second.code() as u32
}

/// Split a merged value back into its skip pair.
pub fn unmerge_skip(value: u32) -> Result<(Skip, Skip), GenomeError> {
    match value {
        0 => Ok((Skip::NoSkipConnection, Skip::NoSkipConnection)),
        1 => Ok((Skip::NoSkipConnection, Skip::SkipConnection)),
        10 => Ok((Skip::SkipConnection, Skip::NoSkipConnection)),
        11 => Ok((Skip::SkipConnection, Skip::SkipConnection)),
        value => Err(GenomeError::Decode { value }),
    }
}

/// Split a serialized genome at segment boundaries and decode every segment.
///
/// Errors raised inside a segment carry its position.
pub fn decode_layout(
    layout: &[SegmentSchema],
    serialized: &[u32],
) -> Result<Vec<CellParameters>, GenomeError> {
    let expected: usize = layout.iter().map(|s| s.encoded_len()).sum();
    if serialized.len() != expected {
        return Err(GenomeError::Arity {
            expected,
            actual: serialized.len(),
        });
    }

    let mut cells = Vec::with_capacity(layout.len());
    let mut position = 0;
    for (segment, schema) in layout.iter().enumerate() {
        let end = position + schema.encoded_len();
        cells.push(
            schema
                .decode(&serialized[position..end])
                .map_err(|e| e.in_segment(segment))?,
        );
        position = end;
    }
    Ok(cells)
}

#[derive(Deserialize)]
struct RawSegmentSchema {
    kind: CellKind,
    #[serde(default)]
    encoding: SkipEncoding,
}

impl TryFrom<RawSegmentSchema> for SegmentSchema {
    type Error = GenomeError;

    fn try_from(raw: RawSegmentSchema) -> Result<Self, Self::Error> {
        match raw.encoding {
            SkipEncoding::Separate => Ok(Self::separate(raw.kind)),
            SkipEncoding::Merged => Self::merged(raw.kind),
        }
    }
}

/// A cell kind together with its encoding: the unit a genome layout is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSegmentSchema")]
pub struct SegmentSchema {
    kind: CellKind,
    encoding: SkipEncoding,
}

impl SegmentSchema {
    /// Schema writing one integer per field.
    pub fn separate(kind: CellKind) -> Self {
        Self {
            kind,
            encoding: SkipEncoding::Separate,
        }
    }

    /// Schema collapsing the trailing skip pair into one integer.
    pub fn merged(kind: CellKind) -> Result<Self, GenomeError> {
        if !kind.has_skip_pair() {
            return Err(GenomeError::UnmergeableSchema { kind: kind.name() });
        }
        Ok(Self {
            kind,
            encoding: SkipEncoding::Merged,
        })
    }

    pub fn kind(&self) -> CellKind {
        self.kind
    }

    pub fn encoding(&self) -> SkipEncoding {
        self.encoding
    }

    /// Number of fields.
    pub fn field_count(&self) -> usize {
        self.kind.fields().len()
    }

    fn field(&self, index: usize) -> Result<&'static FieldSpec, GenomeError> {
        self.kind
            .fields()
            .get(index)
            .ok_or(GenomeError::FieldIndex {
                index,
                count: self.field_count(),
            })
    }

    /// Ordered labels valid for a field.
    pub fn domain(&self, field: usize) -> Result<&'static [&'static str], GenomeError> {
        Ok(self.field(field)?.kind.labels())
    }

    /// Name of a field.
    pub fn field_name(&self, field: usize) -> Result<&'static str, GenomeError> {
        Ok(self.field(field)?.name)
    }

    /// Number of integers this schema contributes to a serialized genome.
    pub fn encoded_len(&self) -> usize {
        match self.encoding {
            SkipEncoding::Separate => self.field_count(),
            SkipEncoding::Merged => self.field_count() - 1,
        }
    }

    fn is_merged_locus(&self, locus: usize) -> bool {
        self.encoding == SkipEncoding::Merged && locus + 1 == self.encoded_len()
    }

    /// Number of categories at each encoded locus.
    pub fn locus_domains(&self) -> Vec<usize> {
        let mut sizes: Vec<usize> = self
            .kind
            .fields()
            .iter()
            .map(|f| f.kind.labels().len())
            .collect();
        if self.encoding == SkipEncoding::Merged {
            sizes.truncate(self.encoded_len() - 1);
            sizes.push(MERGED_SKIP_VALUES.len());
        }
        sizes
    }

    /// Number of categories at an encoded locus.
    pub fn locus_domain_size(&self, locus: usize) -> Result<usize, GenomeError> {
        self.locus_domains()
            .get(locus)
            .copied()
            .ok_or(GenomeError::FieldIndex {
                index: locus,
                count: self.encoded_len(),
            })
    }

    /// Category index of an encoded value at a locus.
    pub fn category_of(&self, locus: usize, value: u32) -> Result<usize, GenomeError> {
        if self.is_merged_locus(locus) {
            let (first, second) = unmerge_skip(value)?;
            return Ok(2 * first.code() as usize + second.code() as usize);
        }
        let size = self.locus_domain_size(locus)?;
        if value as usize >= size {
            return Err(GenomeError::Domain {
                field: locus,
                name: self.field_name(locus)?,
                code: value,
                size,
            });
        }
        Ok(value as usize)
    }

    /// Build a cell from its encoded form.
    pub fn decode(&self, encoded: &[u32]) -> Result<CellParameters, GenomeError> {
        if encoded.len() != self.encoded_len() {
            return Err(GenomeError::Arity {
                expected: self.encoded_len(),
                actual: encoded.len(),
            });
        }

        let mut codes = Vec::with_capacity(self.field_count());
        for (locus, &value) in encoded.iter().enumerate() {
            if self.is_merged_locus(locus) {
                let (first, second) = unmerge_skip(value)?;
                codes.push(first.code());
                codes.push(second.code());
            } else {
                codes.push(self.category_of(locus, value)? as u8);
            }
        }

        Ok(CellParameters {
            schema: *self,
            codes,
        })
    }

    /// Encode a cell built from this schema.
    pub fn encode(&self, cell: &CellParameters) -> Result<Vec<u32>, GenomeError> {
        if cell.schema != *self {
            return Err(GenomeError::CellSchema {
                expected: *self,
                actual: cell.schema,
            });
        }
        Ok(cell.encode())
    }

    /// Uniformly random cell.
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> CellParameters {
        let codes = self
            .kind
            .fields()
            .iter()
            .map(|f| rng.gen_range(0..f.kind.labels().len()) as u8)
            .collect();
        CellParameters {
            schema: *self,
            codes,
        }
    }
}

/// One concrete selection of a value per field of a schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CellParameters {
    schema: SegmentSchema,
    codes: Vec<u8>,
}

impl CellParameters {
    pub fn schema(&self) -> SegmentSchema {
        self.schema
    }

    /// Field codes in field order.
    pub fn codes(&self) -> &[u8] {
        &self.codes
    }

    /// Code of a single field.
    pub fn code(&self, field: usize) -> Result<u8, GenomeError> {
        self.codes
            .get(field)
            .copied()
            .ok_or(GenomeError::FieldIndex {
                index: field,
                count: self.codes.len(),
            })
    }

    /// Label of a single field.
    pub fn label(&self, field: usize) -> Result<&'static str, GenomeError> {
        let code = self.code(field)?;
        Ok(self.schema.domain(field)?[code as usize])
    }

    /// Ordered `(field name, label)` pairs.
    pub fn labels(&self) -> Vec<(&'static str, &'static str)> {
        self.schema
            .kind
            .fields()
            .iter()
            .zip(&self.codes)
            .map(|(f, &code)| (f.name, f.kind.labels()[code as usize]))
            .collect()
    }

    /// Encoded form: one integer per locus.
    pub fn encode(&self) -> Vec<u32> {
        let mut encoded: Vec<u32> = self.codes.iter().map(|&c| c as u32).collect();
        if self.schema.encoding == SkipEncoding::Merged {
            let second = encoded.pop().unwrap_or_default();
            let first = encoded.pop().unwrap_or_default();
            encoded.push(first * 10 + second);
        }
        encoded
    }

    /// Category index at each encoded locus.
    pub fn categories(&self) -> Vec<usize> {
        let mut categories: Vec<usize> = self.codes.iter().map(|&c| c as usize).collect();
        if self.schema.encoding == SkipEncoding::Merged {
            let second = categories.pop().unwrap_or_default();
            let first = categories.pop().unwrap_or_default();
            categories.push(2 * first + second);
        }
        categories
    }

    /// Overwrite a field code; caller guarantees it is inside the domain.
    pub(crate) fn set_code(&mut self, field: usize, code: u8) {
        self.codes[field] = code;
    }

    /// Set the field(s) behind an encoded locus from a category index.
    pub(crate) fn set_category(&mut self, locus: usize, category: usize) {
        if self.schema.is_merged_locus(locus) {
            self.codes[locus] = (category / 2) as u8;
            self.codes[locus + 1] = (category % 2) as u8;
        } else {
            self.codes[locus] = category as u8;
        }
    }

    pub fn conv_block(&self) -> ConvolutionBlock {
        self.typed(0).unwrap_or(ConvolutionBlock::PreActivation)
    }

    pub fn normalization(&self) -> Normalization {
        self.typed(1).unwrap_or(Normalization::NoNormalization)
    }

    pub fn upsample(&self) -> Upsample {
        self.typed(2).unwrap_or(Upsample::Bilinear)
    }

    pub fn shortcut(&self) -> Shortcut {
        self.typed(3).unwrap_or(Shortcut::NoShortcut)
    }

    /// `None` for cells without this field.
    pub fn skip_from_1(&self) -> Option<Skip> {
        self.typed(4)
    }

    /// `None` for cells without this field.
    pub fn skip_from_2(&self) -> Option<Skip> {
        self.typed(5)
    }

    fn typed<C: Categorical>(&self, field: usize) -> Option<C> {
        self.codes.get(field).and_then(|&c| C::from_code(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn all_schemas() -> Vec<SegmentSchema> {
        vec![
            SegmentSchema::separate(CellKind::First),
            SegmentSchema::separate(CellKind::Second),
            SegmentSchema::separate(CellKind::Third),
            SegmentSchema::merged(CellKind::Third).unwrap(),
        ]
    }

    #[test]
    fn test_field_counts_and_domains() {
        let third = SegmentSchema::separate(CellKind::Third);
        assert_eq!(SegmentSchema::separate(CellKind::First).field_count(), 4);
        assert_eq!(SegmentSchema::separate(CellKind::Second).field_count(), 5);
        assert_eq!(third.field_count(), 6);
        assert_eq!(third.domain(0).unwrap(), ["PRE_ACTIVATION", "POST_ACTIVATION"]);
        assert_eq!(third.domain(2).unwrap().len(), 3);
        assert_eq!(third.field_name(5).unwrap(), "skip_from_2");
    }

    #[test]
    fn test_domain_out_of_range() {
        let first = SegmentSchema::separate(CellKind::First);
        assert_eq!(
            first.domain(4),
            Err(GenomeError::FieldIndex { index: 4, count: 4 })
        );
    }

    #[test]
    fn test_decode_arity() {
        let first = SegmentSchema::separate(CellKind::First);
        assert_eq!(
            first.decode(&[0, 0, 0]),
            Err(GenomeError::Arity {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn test_decode_domain() {
        let first = SegmentSchema::separate(CellKind::First);
        assert_eq!(
            first.decode(&[0, 3, 0, 0]),
            Err(GenomeError::Domain {
                field: 1,
                name: "normalization",
                code: 3,
                size: 3
            })
        );
    }

    #[test]
    fn test_typed_accessors() {
        let cell = SegmentSchema::separate(CellKind::Second)
            .decode(&[1, 2, 0, 1, 1])
            .unwrap();
        assert_eq!(cell.conv_block(), ConvolutionBlock::PostActivation);
        assert_eq!(cell.normalization(), Normalization::InstanceNormalization);
        assert_eq!(cell.upsample(), Upsample::Bilinear);
        assert_eq!(cell.shortcut(), Shortcut::Shortcut);
        assert_eq!(cell.skip_from_1(), Some(Skip::SkipConnection));
        assert_eq!(cell.skip_from_2(), None);
        assert_eq!(cell.labels()[1], ("normalization", "INSTANCE_NORMALIZATION"));
    }

    #[test]
    fn test_skip_merge_table() {
        let merged = SegmentSchema::merged(CellKind::Third).unwrap();
        let pairs = [(0, 0, 0), (0, 1, 1), (1, 1, 11), (1, 0, 10)];
        for (a, b, value) in pairs {
            let cell = merged.decode(&[0, 0, 0, 0, value]).unwrap();
            assert_eq!(&cell.codes()[4..], &[a, b]);
            assert_eq!(cell.encode(), vec![0, 0, 0, 0, value]);
            assert_eq!(
                merge_skip(Skip::from_code(a).unwrap(), Skip::from_code(b).unwrap()),
                value
            );
        }
    }

    #[test]
    fn test_skip_merge_rejects_other_values() {
        let merged = SegmentSchema::merged(CellKind::Third).unwrap();
        for value in [2, 9, 12, 100] {
            assert_eq!(
                merged.decode(&[0, 0, 0, 0, value]),
                Err(GenomeError::Decode { value })
            );
        }
    }

    #[test]
    fn test_merge_requires_skip_pair() {
        assert_eq!(
            SegmentSchema::merged(CellKind::Second),
            Err(GenomeError::UnmergeableSchema { kind: "second" })
        );
        let parsed: Result<SegmentSchema, _> =
            serde_json::from_str(r#"{"kind":"first","encoding":"merged"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_merged_categories() {
        let merged = SegmentSchema::merged(CellKind::Third).unwrap();
        assert_eq!(merged.encoded_len(), 5);
        assert_eq!(merged.locus_domain_size(4).unwrap(), 4);
        assert_eq!(merged.category_of(4, 10).unwrap(), 2);
        let cell = merged.decode(&[1, 0, 2, 1, 11]).unwrap();
        assert_eq!(cell.categories(), vec![1, 0, 2, 1, 3]);
    }

    #[test]
    fn test_locus_domains() {
        assert_eq!(
            SegmentSchema::separate(CellKind::Third).locus_domains(),
            vec![2, 3, 3, 2, 2, 2]
        );
        let merged = SegmentSchema::merged(CellKind::Third).unwrap();
        assert_eq!(merged.locus_domains(), vec![2, 3, 3, 2, 4]);
        assert_eq!(
            merged.locus_domain_size(5),
            Err(GenomeError::FieldIndex { index: 5, count: 5 })
        );
    }

    #[test]
    fn test_encode_rejects_foreign_cell() {
        let separate = SegmentSchema::separate(CellKind::Third);
        let merged = SegmentSchema::merged(CellKind::Third).unwrap();
        let cell = separate.decode(&[0, 0, 0, 0, 1, 1]).unwrap();

        assert_eq!(
            merged.encode(&cell),
            Err(GenomeError::CellSchema {
                expected: merged,
                actual: separate
            })
        );
        assert_eq!(separate.encode(&cell).unwrap(), vec![0, 0, 0, 0, 1, 1]);
    }

    #[test]
    fn test_decode_layout_partitions_segments() {
        let layout = [
            SegmentSchema::separate(CellKind::First),
            SegmentSchema::merged(CellKind::Third).unwrap(),
        ];
        let cells = decode_layout(&layout, &[0, 1, 2, 1, 1, 0, 2, 0, 10]).unwrap();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[1].codes(), &[1, 0, 2, 0, 1, 0]);

        assert_eq!(
            decode_layout(&layout, &[0, 1, 2, 1, 1, 0, 2, 0, 12]),
            Err(GenomeError::Decode { value: 12 }.in_segment(1))
        );
        assert_eq!(
            decode_layout(&layout, &[0, 1, 2, 1]),
            Err(GenomeError::Arity {
                expected: 9,
                actual: 4
            })
        );
    }

    #[test]
    fn test_random_cells_are_valid() {
        let mut rng = StdRng::seed_from_u64(7);
        for schema in all_schemas() {
            for _ in 0..50 {
                let cell = schema.random(&mut rng);
                assert_eq!(schema.decode(&cell.encode()).unwrap(), cell);
            }
        }
    }

    fn valid_encoding() -> impl Strategy<Value = (SegmentSchema, Vec<u32>)> {
        prop::sample::select(all_schemas()).prop_flat_map(|schema| {
            let loci: Vec<_> = (0..schema.encoded_len())
                .map(|locus| {
                    let size = schema.locus_domain_size(locus).unwrap();
                    if schema.encoding() == SkipEncoding::Merged && locus + 1 == schema.encoded_len()
                    {
                        prop::sample::select(MERGED_SKIP_VALUES.to_vec()).boxed()
                    } else {
                        (0..size as u32).boxed()
                    }
                })
                .collect();
            (Just(schema), loci)
        })
    }

    proptest! {
        #[test]
        fn prop_encode_decode_roundtrip((schema, encoded) in valid_encoding()) {
            let cell = schema.decode(&encoded).unwrap();
            prop_assert_eq!(schema.encode(&cell).unwrap(), encoded);
        }
    }
}
