//! # Tabular Dataset
//!
//! The in-memory table handed to the interpolator by the surrounding
//! pipeline. Rows are `IndexMap`s keyed by column name so that column order
//! survives every rewrite and output stays deterministic.

pub mod csv;
pub mod value;

use indexmap::IndexMap;

use crate::error::{Result, RowfillError};

pub use value::{Temporal, Value};

pub const ORDER_ID: &str = "order_id";
pub const ORDER_DATE: &str = "order_date";
pub const SHIP_DATE: &str = "ship_date";
pub const CATEGORY: &str = "category";
pub const SUB_CATEGORY: &str = "sub_category";
pub const DISCOUNT: &str = "discount";
pub const PROFIT: &str = "profit";
pub const SHIP_MODE: &str = "ship_mode";

/// Name of the dense index column in shard and compiled files.
pub const ID_COLUMN: &str = "id";

/// Columns the synthesizer reads from every source row.
pub const REQUIRED_COLUMNS: &[&str] = &[
    ORDER_ID,
    ORDER_DATE,
    SHIP_DATE,
    CATEGORY,
    SUB_CATEGORY,
    DISCOUNT,
];

pub type Row = IndexMap<String, Value>;

static NULL: Value = Value::Null;

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Dataset {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a dataset from rows, taking the column order from the first row.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let columns = rows
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Fail with `MissingColumn` for the first required column not present.
    pub fn require_columns(&self, required: &[&str]) -> Result<()> {
        for column in required {
            if !self.has_column(column) {
                return Err(RowfillError::MissingColumn {
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Values of `column` across all rows, in row order. Absent cells read as `Null`.
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.rows
            .iter()
            .map(move |row| row.get(column).unwrap_or(&NULL))
    }
}
