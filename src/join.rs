use std::collections::HashMap;

use anyhow::{Result, anyhow};
use log::info;

use crate::dataset::{Row, Table};

/// One side of a join: a loaded register, the suffix appended to its column
/// names, and the unsuffixed name of its key column.
#[derive(Debug, Clone, Copy)]
pub struct JoinSide<'a> {
    pub table: &'a Table,
    pub suffix: &'a str,
    pub key: &'a str,
}

/// Inner-joins two registers on their key columns.
///
/// Every output column is named `<column>_<suffix>`, both key columns
/// included. Rows whose key is null never match; rows without a counterpart
/// are dropped. Duplicate keys yield one row per combination, in left-then-
/// right order.
pub fn inner_join(left: JoinSide<'_>, right: JoinSide<'_>) -> Result<Table> {
    let left_key = key_index(left)?;
    let right_key = key_index(right)?;

    let right_lookup = build_right_lookup(right.table, right_key);

    let mut headers = left.table.with_suffix(left.suffix).headers;
    headers.extend(right.table.with_suffix(right.suffix).headers);
    let mut types = left.table.types.clone();
    types.extend(right.table.types.iter().copied());

    let mut rows: Vec<Row> = Vec::new();
    for row in &left.table.rows {
        let Some(key) = row[left_key].as_ref().map(|v| v.as_display()) else {
            continue;
        };
        if let Some(bucket) = right_lookup.get(&key) {
            for right_row in bucket {
                let mut combined = row.clone();
                combined.extend(right_row.iter().cloned());
                rows.push(combined);
            }
        }
    }

    info!(
        "Joined {} ({} row(s)) with {} ({} row(s)) on {}: {} matched row(s)",
        left.suffix,
        left.table.row_count(),
        right.suffix,
        right.table.row_count(),
        left.key,
        rows.len()
    );
    Table::new(headers, types, rows)
}

fn key_index(side: JoinSide<'_>) -> Result<usize> {
    side.table
        .column_index(side.key)
        .ok_or_else(|| anyhow!("Key column '{}' not found in register {}", side.key, side.suffix))
}

fn build_right_lookup(table: &Table, key_idx: usize) -> HashMap<String, Vec<&Row>> {
    let mut map: HashMap<String, Vec<&Row>> = HashMap::new();
    for row in &table.rows {
        if let Some(value) = &row[key_idx] {
            map.entry(value.as_display()).or_default().push(row);
        }
    }
    map
}
