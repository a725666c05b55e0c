//! Price series and the raw-table normalizer
//!
//! Providers hand back loosely shaped tables: bulk downloads carry two-level
//! `(field, symbol)` column labels, field names vary in case, and columns may
//! repeat. [`RawTable::normalize`] turns any of these into a [`Series`] with
//! exactly Open, High, Low, Close and Volume.

use crate::{Bar, Error, Result};

/// Fields every normalized series carries, in canonical order
pub const REQUIRED_FIELDS: [&str; 5] = ["Open", "High", "Low", "Close", "Volume"];

// ============================================================
// SERIES
// ============================================================

/// Bars of one symbol with strictly increasing timestamps
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    bars: Vec<Bar>,
}

impl Series {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a series, rejecting timestamps that do not strictly increase
    pub fn from_bars(bars: Vec<Bar>) -> Result<Self> {
        if let Some(index) = bars
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(Error::NonMonotonicTimestamp { index: index + 1 });
        }
        Ok(Self { bars })
    }

    #[inline]
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// The two most recent bars as `(previous, current)`
    pub fn last_pair(&self) -> Option<(&Bar, &Bar)> {
        match self.bars.as_slice() {
            [.., prev, curr] => Some((prev, curr)),
            _ => None,
        }
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    /// Multiply every price by `factor`; volume and timestamps are kept
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            bars: self.bars.iter().map(|b| b.scaled(factor)).collect(),
        }
    }

    /// Single-level table view of this series
    pub fn to_table(&self) -> RawTable {
        let mut table = RawTable::new(self.bars.iter().map(|b| b.timestamp).collect());
        let fields: [fn(&Bar) -> f64; 5] = [
            |b| b.open,
            |b| b.high,
            |b| b.low,
            |b| b.close,
            |b| b.volume,
        ];
        for (name, field) in REQUIRED_FIELDS.iter().zip(fields) {
            table.push_column(
                ColumnLabel::single(*name),
                self.bars.iter().map(field).collect(),
            );
        }
        table
    }
}

// ============================================================
// RAW TABLE
// ============================================================

/// Column label as delivered by a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnLabel {
    Single(String),
    /// `(field, symbol)` label left over from a multi-symbol download
    Multi(String, String),
}

impl ColumnLabel {
    pub fn single(name: impl Into<String>) -> Self {
        ColumnLabel::Single(name.into())
    }

    pub fn multi(field: impl Into<String>, symbol: impl Into<String>) -> Self {
        ColumnLabel::Multi(field.into(), symbol.into())
    }

    /// First level of the label
    pub fn field(&self) -> &str {
        match self {
            ColumnLabel::Single(name) => name,
            ColumnLabel::Multi(field, _) => field,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub label: ColumnLabel,
    /// One value per index row, `NaN` for missing
    pub values: Vec<f64>,
}

/// Provider-shaped price table for one symbol
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub index: Vec<i64>,
    pub columns: Vec<Column>,
}

impl RawTable {
    pub fn new(index: Vec<i64>) -> Self {
        Self {
            index,
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, label: ColumnLabel, values: Vec<f64>) -> Self {
        self.push_column(label, values);
        self
    }

    pub fn push_column(&mut self, label: ColumnLabel, values: Vec<f64>) {
        self.columns.push(Column { label, values });
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Collapse, rename and deduplicate columns, then build a [`Series`].
    ///
    /// Missing required fields are zero-filled. Rows without a close are
    /// dropped, rows are sorted by timestamp and duplicate timestamps keep
    /// their first occurrence.
    pub fn normalize(&self) -> Series {
        if self.is_empty() {
            return Series::empty();
        }

        let mut kept: Vec<(String, &[f64])> = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let name = capitalize(column.label.field());
            if kept.iter().any(|(existing, _)| *existing == name) {
                continue;
            }
            kept.push((name, column.values.as_slice()));
        }

        let rows = self.index.len();
        let zeros = vec![0.0; rows];
        let [open, high, low, close, volume] =
            REQUIRED_FIELDS.map(|name| field_or_zeros(&kept, name, &zeros));

        let value = |column: &[f64], row: usize| -> f64 {
            column.get(row).copied().filter(|v| !v.is_nan()).unwrap_or(0.0)
        };

        let mut order: Vec<usize> = (0..rows)
            .filter(|&row| close.get(row).is_some_and(|c| !c.is_nan()))
            .collect();
        order.sort_by_key(|&row| self.index[row]);
        order.dedup_by_key(|row| self.index[*row]);

        let bars = order
            .into_iter()
            .map(|row| {
                Bar::new(
                    self.index[row],
                    value(open, row),
                    value(high, row),
                    value(low, row),
                    value(close, row),
                    value(volume, row),
                )
            })
            .collect();

        Series { bars }
    }
}

fn field_or_zeros<'a>(kept: &[(String, &'a [f64])], name: &str, zeros: &'a [f64]) -> &'a [f64] {
    match kept.iter().find(|(k, _)| k == name) {
        Some((_, values)) => *values,
        None => {
            log::debug!("normalize: synthesizing zero-filled {name} column");
            zeros
        }
    }
}

/// `"aDJ cLOSE"` -> `"Adj close"`
fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

// ============================================================
// TESTS
// ============================================================
