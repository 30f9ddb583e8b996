//! CSV import and export of [`Table`]s.

use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{LinkError, LinkResult, TableError};
use crate::table::{Table, ROW_NUMBER_KEY};

/// Reads a CSV with a header row.
///
/// With `key_column` the named column becomes the row key and is removed
/// from the cell columns; without it rows are keyed by 1-based row number
/// under [`ROW_NUMBER_KEY`]. A UTF-8 byte order mark on the first header is
/// dropped.
///
/// # Errors
/// - `Csv` for malformed input, including rows of the wrong width
/// - `Table(MissingColumn)` if `key_column` is not a header
/// - `Table(DuplicateColumn)` if a header repeats
pub fn read_table<R: Read>(reader: R, key_column: Option<&str>) -> LinkResult<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if i == 0 {
                h.trim_start_matches('\u{feff}').to_string()
            } else {
                h.to_string()
            }
        })
        .collect();

    let key_index = match key_column {
        Some(name) => Some(headers.iter().position(|h| h == name).ok_or_else(|| {
            TableError::MissingColumn {
                column: name.to_string(),
            }
        })?),
        None => None,
    };

    let columns = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != key_index)
        .map(|(_, h)| h.as_str());
    let mut table = Table::new(key_column.unwrap_or(ROW_NUMBER_KEY), columns)?;

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let key = match key_index {
            Some(index) => record.get(index).unwrap_or_default().to_string(),
            None => (row + 1).to_string(),
        };
        let cells = record
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != key_index)
            .map(|(_, cell)| cell);
        table.push_row(key, cells)?;
    }

    tracing::debug!(rows = table.len(), columns = table.columns().len(), "read table");
    Ok(table)
}

/// Opens and reads a CSV file; see [`read_table`].
///
/// # Errors
/// `Io` naming the path if it cannot be opened, otherwise as [`read_table`].
pub fn read_table_path(path: impl AsRef<Path>, key_column: Option<&str>) -> LinkResult<Table> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| LinkError::io(path, e))?;
    read_table(file, key_column)
}

/// Writes a table as CSV: the key column first, then every cell column.
///
/// # Errors
/// `Csv` if writing fails.
pub fn write_table<W: Write, K: fmt::Display>(writer: W, table: &Table<K>) -> LinkResult<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(
        std::iter::once(table.key_name()).chain(table.columns().iter().map(String::as_str)),
    )?;
    for (key, cells) in table.rows() {
        let key = key.to_string();
        writer.write_record(std::iter::once(key.as_str()).chain(cells.iter().map(String::as_str)))?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Creates (or truncates) a file and writes the table to it.
///
/// # Errors
/// `Io` naming the path if it cannot be created, otherwise as [`write_table`].
pub fn write_table_path<K: fmt::Display>(path: impl AsRef<Path>, table: &Table<K>) -> LinkResult<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| LinkError::io(path, e))?;
    write_table(file, table)
}
