//! In-memory tables and the register loader.
//!
//! A [`Table`] is a rectangular, typed snapshot of one CSV file (or of a
//! join of two). Column types are inferred once at load time from every
//! cell; null cells (see [`crate::data::NA_TOKENS`]) are stored as `None`.

use std::{collections::HashSet, path::Path};

use anyhow::{Context, Result, ensure};
use encoding_rs::Encoding;
use log::{debug, info};

use crate::{
    data::{ColumnType, Value, infer_column_type, parse_cell},
    io_utils,
};

pub type Row = Vec<Option<Value>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub types: Vec<ColumnType>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(headers: Vec<String>, types: Vec<ColumnType>, rows: Vec<Row>) -> Result<Self> {
        ensure!(
            headers.len() == types.len(),
            "Table has {} header(s) but {} column type(s)",
            headers.len(),
            types.len()
        );
        for (idx, row) in rows.iter().enumerate() {
            ensure!(
                row.len() == headers.len(),
                "Row {} has {} cell(s); expected {}",
                idx + 1,
                row.len(),
                headers.len()
            );
        }
        Ok(Self {
            headers,
            types,
            rows,
        })
    }

    /// Builds a table from raw text cells, inferring each column's type.
    pub fn from_text_rows(headers: Vec<String>, raw_rows: Vec<Vec<String>>) -> Result<Self> {
        let types = (0..headers.len())
            .map(|col| {
                infer_column_type(
                    raw_rows
                        .iter()
                        .map(|row| row.get(col).map(String::as_str).unwrap_or("")),
                )
            })
            .collect::<Vec<_>>();
        let rows = raw_rows
            .iter()
            .map(|raw| {
                raw.iter()
                    .zip(&types)
                    .map(|(cell, ty)| parse_cell(cell, *ty))
                    .collect()
            })
            .collect();
        Self::new(headers, types, rows)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn column_type(&self, idx: usize) -> ColumnType {
        self.types[idx]
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(col)).and_then(Option::as_ref)
    }

    /// Returns a copy whose headers carry `_<suffix>`.
    pub fn with_suffix(&self, suffix: &str) -> Table {
        Table {
            headers: self
                .headers
                .iter()
                .map(|h| format!("{h}_{suffix}"))
                .collect(),
            types: self.types.clone(),
            rows: self.rows.clone(),
        }
    }

    pub fn drop_columns(&mut self, names: &[String]) {
        let drop: HashSet<&str> = names.iter().map(String::as_str).collect();
        let keep = self
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !drop.contains(h.as_str()))
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();
        if keep.len() == self.headers.len() {
            return;
        }
        self.headers = keep.iter().map(|&idx| self.headers[idx].clone()).collect();
        self.types = keep.iter().map(|&idx| self.types[idx]).collect();
        for row in &mut self.rows {
            *row = keep.iter().map(|&idx| row[idx].take()).collect();
        }
    }
}

/// Location and parsing options for one register file.
#[derive(Debug, Clone)]
pub struct LoadOptions<'a> {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub drop_columns: &'a [String],
}

pub fn load_table(path: &Path, options: &LoadOptions<'_>) -> Result<Table> {
    let delimiter = io_utils::resolve_input_delimiter(path, options.delimiter);
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, options.encoding)
        .with_context(|| format!("Reading headers from {path:?}"))?;
    let mut seen = HashSet::new();
    for header in &headers {
        ensure!(
            seen.insert(header.as_str()),
            "Duplicate column '{header}' in {path:?}"
        );
    }

    let mut raw_rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {} of {path:?}", row_idx + 2))?;
        let decoded = io_utils::decode_record(&record, options.encoding)
            .with_context(|| format!("Decoding row {} of {path:?}", row_idx + 2))?;
        raw_rows.push(decoded);
    }

    let mut table = Table::from_text_rows(headers, raw_rows)
        .with_context(|| format!("Building table from {path:?}"))?;
    table.drop_columns(options.drop_columns);
    debug!(
        "Column types for {:?}: {:?}",
        path,
        table.headers.iter().zip(&table.types).collect::<Vec<_>>()
    );
    info!(
        "Loaded {} row(s) across {} column(s) from {:?}",
        table.row_count(),
        table.headers.len(),
        path
    );
    Ok(table)
}
