use crate::error::{ReconcilerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A single cell of a tabular dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(f64),
    #[default]
    Null,
}

impl CellValue {
    /// Builds a text cell, mapping empty strings to `Null`.
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            CellValue::Null
        } else {
            CellValue::Text(value)
        }
    }

    pub fn from_optional(value: Option<&str>) -> Self {
        value.map(CellValue::text).unwrap_or(CellValue::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn key(&self) -> CellKey {
        match self {
            CellValue::Text(s) => CellKey::Text(s.clone()),
            // -0.0 and 0.0 must hash alike
            CellValue::Number(n) if *n == 0.0 => CellKey::Number(0.0f64.to_bits()),
            CellValue::Number(n) => CellKey::Number(n.to_bits()),
            CellValue::Null => CellKey::Null,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Null => Ok(()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::text(value)
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Null)
    }
}

/// Hashable view of a cell, used for joins and de-duplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum CellKey {
    Text(String),
    Number(u64),
    Null,
}

/// A grid of optional strings as produced by page table detection.
/// Row 0 is the header row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn new(rows: Vec<Vec<Option<String>>>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn header(&self) -> Option<&[Option<String>]> {
        self.rows.first().map(Vec::as_slice)
    }

    pub fn data_rows(&self) -> &[Vec<Option<String>>] {
        if self.rows.is_empty() {
            &[]
        } else {
            &self.rows[1..]
        }
    }
}

impl<S: AsRef<str>> From<Vec<Vec<S>>> for RawTable {
    fn from(rows: Vec<Vec<S>>) -> Self {
        Self::new(
            rows.into_iter()
                .map(|row| row.into_iter().map(|c| Some(c.as_ref().to_string())).collect())
                .collect(),
        )
    }
}

/// Ordered, uniquely named columns over row-major cells.
///
/// Row order reflects source order (page/row order for PDFs, sheet order for
/// workbooks) and is preserved by every operation in this crate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "DatasetRepr")]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

#[derive(Deserialize)]
struct DatasetRepr {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl TryFrom<DatasetRepr> for Dataset {
    type Error = ReconcilerError;

    fn try_from(repr: DatasetRepr) -> Result<Self> {
        Dataset::from_rows(repr.columns, repr.rows)
    }
}

impl Dataset {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Result<Self> {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(ReconcilerError::DuplicateColumn(column.clone()));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: impl IntoIterator<Item = Vec<CellValue>>,
    ) -> Result<Self> {
        let mut dataset = Self::new(columns)?;
        for row in rows {
            dataset.push_row(row)?;
        }
        Ok(dataset)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Like [`Dataset::column_index`] but reports which dataset lacked the column.
    pub fn require_column(&self, name: &str, dataset: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| ReconcilerError::MissingColumn {
                column: name.to_string(),
                dataset: dataset.to_string(),
            })
    }

    /// Appends a row. Short rows are padded with `Null`; long rows are rejected.
    pub fn push_row(&mut self, mut row: Vec<CellValue>) -> Result<()> {
        if row.len() > self.columns.len() {
            return Err(ReconcilerError::RaggedRow {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        row.resize(self.columns.len(), CellValue::Null);
        self.rows.push(row);
        Ok(())
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&CellValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    pub fn column_values<'a>(
        &'a self,
        column: &str,
    ) -> Option<impl Iterator<Item = &'a CellValue> + 'a> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(move |r| &r[idx]))
    }

    /// Returns a new dataset with the same schema holding the rows that pass `keep`.
    pub fn filter_rows<F>(&self, mut keep: F) -> Dataset
    where
        F: FnMut(&[CellValue]) -> bool,
    {
        Dataset {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Builds a dataset from parts already known to be consistent.
    pub(crate) fn from_parts(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Dataset {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Dataset { columns, rows }
    }

    /// Removes rows that are exact duplicates of an earlier row.
    pub fn dedup_rows(&mut self) {
        let mut seen = HashSet::new();
        self.rows
            .retain(|row| seen.insert(row.iter().map(CellValue::key).collect::<Vec<_>>()));
    }

    /// Stacks datasets vertically.
    ///
    /// The result holds the union of all columns in first-seen order; cells for
    /// columns a dataset lacks are `Null`.
    pub fn concat(datasets: impl IntoIterator<Item = Dataset>) -> Dataset {
        let datasets: Vec<Dataset> = datasets.into_iter().collect();

        let mut columns: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for dataset in &datasets {
            for column in &dataset.columns {
                if !positions.contains_key(column) {
                    positions.insert(column.clone(), columns.len());
                    columns.push(column.clone());
                }
            }
        }

        let mut rows = Vec::new();
        for dataset in datasets {
            let mapping: Vec<usize> = dataset.columns.iter().map(|c| positions[c]).collect();
            for row in dataset.rows {
                let mut out = vec![CellValue::Null; columns.len()];
                for (value, &target) in row.into_iter().zip(&mapping) {
                    out[target] = value;
                }
                rows.push(out);
            }
        }

        Dataset { columns, rows }
    }
}
