//! Decoded scoring data for a multi-access key.

use std::collections::{BTreeSet, HashMap};

/// Score codes that match whichever state is selected for a character
pub const WILDCARD_CODES: [i32; 2] = [2, 4];

#[must_use]
pub fn is_wildcard(code: i32) -> bool {
    WILDCARD_CODES.contains(&code)
}

/// Taxon-by-character score codes.
///
/// Rows are indexed by taxon position and columns by character declaration order.
/// A row is `None` when the taxon has no usable score entry; such taxa never become
/// candidates.
#[derive(Debug, Clone, Default)]
pub struct ScoreMatrix {
    rows: Vec<Option<Vec<i32>>>,
}

impl ScoreMatrix {
    #[must_use]
    pub fn new(rows: Vec<Option<Vec<i32>>>) -> Self {
        Self { rows }
    }

    /// The score row of a taxon, if it has one
    #[must_use]
    pub fn row(&self, taxon: usize) -> Option<&[i32]> {
        self.rows.get(taxon)?.as_deref()
    }

    /// The code of a taxon at a character column. `None` when the row is absent or
    /// shorter than the column.
    #[must_use]
    pub fn code(&self, taxon: usize, column: usize) -> Option<i32> {
        self.row(taxon)?.get(column).copied()
    }

    #[must_use]
    pub fn is_scored(&self, taxon: usize) -> bool {
        self.row(taxon).is_some()
    }

    /// Indices of all taxa with a score row, ascending
    pub fn scored_taxa(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| row.as_ref().map(|_| i))
    }

    #[must_use]
    pub fn scored_count(&self) -> usize {
        self.rows.iter().filter(|row| row.is_some()).count()
    }

    /// Number of rows (one per taxon, scored or not)
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct codes present at a column among the given taxa. Missing cells are skipped.
    pub fn distinct_codes<I>(&self, taxa: I, column: usize) -> BTreeSet<i32>
    where
        I: IntoIterator<Item = usize>,
    {
        taxa.into_iter()
            .filter_map(|taxon| self.code(taxon, column))
            .collect()
    }
}

/// The observed numeric range of one taxon on one character
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
}

impl NumericRange {
    /// Range over a measurement entry. Element 0 is a label and is ignored, as are
    /// non-finite values. `None` when no usable value remains.
    #[must_use]
    pub fn from_measurement(values: &[f64]) -> Option<Self> {
        values
            .iter()
            .skip(1)
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |range, v| match range {
                None => Some(Self { min: v, max: v }),
                Some(Self { min, max }) => Some(Self {
                    min: min.min(v),
                    max: max.max(v),
                }),
            })
    }

    /// Inclusive at both ends
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Measurements keyed by (character column, taxon index)
#[derive(Debug, Clone, Default)]
pub struct MeasurementTable {
    cells: HashMap<(usize, usize), Vec<f64>>,
}

impl MeasurementTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: usize, taxon: usize, values: Vec<f64>) {
        self.cells.insert((column, taxon), values);
    }

    #[must_use]
    pub fn values(&self, column: usize, taxon: usize) -> Option<&[f64]> {
        self.cells.get(&(column, taxon)).map(Vec::as_slice)
    }

    #[must_use]
    pub fn range(&self, column: usize, taxon: usize) -> Option<NumericRange> {
        NumericRange::from_measurement(self.values(column, taxon)?)
    }

    /// Character columns with at least one measurement
    #[must_use]
    pub fn measured_columns(&self) -> BTreeSet<usize> {
        self.cells.keys().map(|&(column, _)| column).collect()
    }

    /// All cells of one column as (taxon index, values)
    pub fn column(&self, column: usize) -> impl Iterator<Item = (usize, &[f64])> + '_ {
        self.cells
            .iter()
            .filter(move |((c, _), _)| *c == column)
            .map(|(&(_, taxon), values)| (taxon, values.as_slice()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
