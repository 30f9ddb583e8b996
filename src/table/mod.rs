//! Tables of string cells and their binding to entities.
//!
//! A [`Table`] is the minimal shape the binding layer needs from a loaded
//! export: a row key column plus named columns of string cells. It is
//! generic over the key type so that a table re-keyed by
//! [`reindex_by_entity`] carries `EntityId` keys in its type.

pub mod binding;

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::error::TableError;

pub use binding::{
    candidate_values, derive_entity_column, reindex_by_entity, BindingOptions, ColumnRef,
    EntityColumnBuilder,
};

/// Default key column name for tables without a natural key.
pub const ROW_NUMBER_KEY: &str = "row";

/// Rows of string cells addressed by a row key and column names.
///
/// Every row has exactly one cell per column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table<K = String> {
    key_name: String,
    keys: Vec<K>,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl<K> Table<K> {
    /// Creates an empty table.
    ///
    /// # Errors
    /// `DuplicateColumn` if a column name repeats.
    pub fn new<I, S>(key_name: impl Into<String>, columns: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(TableError::DuplicateColumn {
                    column: column.clone(),
                });
            }
        }
        Ok(Self {
            key_name: key_name.into(),
            keys: Vec::new(),
            columns,
            rows: Vec::new(),
        })
    }

    /// Appends one row.
    ///
    /// # Errors
    /// `RaggedRow` if the cell count differs from the column count.
    pub fn push_row<I, S>(&mut self, key: K, cells: I) -> Result<(), TableError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cells: Vec<String> = cells.into_iter().map(Into::into).collect();
        if cells.len() != self.columns.len() {
            return Err(TableError::RaggedRow {
                row: self.rows.len(),
                expected: self.columns.len(),
                actual: cells.len(),
            });
        }
        self.keys.push(key);
        self.rows.push(cells);
        Ok(())
    }

    /// Appends a column; `cells` must hold one value per row.
    ///
    /// # Errors
    /// - `DuplicateColumn` if the name is taken
    /// - `MisalignedColumn` if the cell count differs from the row count
    pub fn push_column<I, S>(&mut self, name: impl Into<String>, cells: I) -> Result<(), TableError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        if self.column_index(&name).is_some() {
            return Err(TableError::DuplicateColumn { column: name });
        }
        let cells: Vec<String> = cells.into_iter().map(Into::into).collect();
        if cells.len() != self.rows.len() {
            return Err(TableError::MisalignedColumn {
                expected: self.rows.len(),
                actual: cells.len(),
            });
        }
        for (row, cell) in self.rows.iter_mut().zip(cells) {
            row.push(cell);
        }
        self.columns.push(name);
        Ok(())
    }

    /// Name of the row key column.
    #[must_use]
    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// Row keys in row order.
    #[must_use]
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Column names in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cells of one column in row order.
    ///
    /// # Errors
    /// `MissingColumn` if there is no such column.
    pub fn column(&self, name: &str) -> Result<Vec<&str>, TableError> {
        let index = self.column_index(name).ok_or_else(|| TableError::MissingColumn {
            column: name.to_string(),
        })?;
        Ok(self.rows.iter().map(|row| row[index].as_str()).collect())
    }

    /// One cell, if both row and column exist.
    #[must_use]
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|cells| cells[index].as_str())
    }

    /// Iterates `(key, cells)` pairs in row order.
    pub fn rows(&self) -> impl Iterator<Item = (&K, &[String])> + '_ {
        self.keys.iter().zip(self.rows.iter().map(Vec::as_slice))
    }

    /// Same cells under a new key column.
    pub(crate) fn with_keys<K2>(self, key_name: impl Into<String>, keys: Vec<K2>) -> Table<K2> {
        debug_assert_eq!(keys.len(), self.rows.len());
        Table {
            key_name: key_name.into(),
            keys,
            columns: self.columns,
            rows: self.rows,
        }
    }
}

impl<K: fmt::Display> Table<K> {
    /// Row keys rendered as strings.
    #[must_use]
    pub fn key_strings(&self) -> Vec<String> {
        self.keys.iter().map(ToString::to_string).collect()
    }
}

impl Table<String> {
    /// Table keyed by 1-based row number, for exports without a key column.
    ///
    /// # Errors
    /// See [`Table::new`] and [`Table::push_row`].
    pub fn from_rows<C, S, R, T>(columns: C, rows: R) -> Result<Self, TableError>
    where
        C: IntoIterator<Item = S>,
        S: Into<String>,
        R: IntoIterator<Item = Vec<T>>,
        T: Into<String>,
    {
        let mut table = Self::new(ROW_NUMBER_KEY, columns)?;
        for (index, cells) in rows.into_iter().enumerate() {
            table.push_row((index + 1).to_string(), cells)?;
        }
        Ok(table)
    }
}
