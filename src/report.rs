//! Summary and error tables, and the merged report built from them.
//!
//! Each comparison yields one [`SummaryRow`] per column pair and one
//! [`ErrorRow`] per failing (pair, check, joined record). A [`Report`]
//! concatenates those across comparisons and left-joins summaries to their
//! errors on (comparison, left column, right column). All output is
//! ordered by construction, so identical inputs give byte-identical files.

use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::info;

use crate::{checks::CheckKind, config::ColumnSemantic, io_utils};

pub const SUMMARY_COLUMNS: &[&str] = &[
    "comparison_name",
    "table1_column",
    "table2_column",
    "semantic",
    "consistency_accurate_count",
    "consistency_total_count",
    "completeness_accurate_count",
    "completeness_incomplete_count",
    "completeness_total_count",
    "valid_count",
    "valid_total_count",
    "country_correctness",
    "country_count",
];

const ERROR_TAG_COLUMNS: &[&str] = &["comparison_name", "table1_column", "table2_column", "check"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub comparison_name: String,
    pub table1_column: String,
    pub table2_column: String,
    pub semantic: ColumnSemantic,
    pub consistency_accurate_count: Option<usize>,
    pub consistency_total_count: Option<usize>,
    pub completeness_accurate_count: usize,
    pub completeness_incomplete_count: usize,
    pub completeness_total_count: usize,
    pub valid_count: Option<usize>,
    pub valid_total_count: Option<usize>,
    pub country_correctness: Option<usize>,
    pub country_count: Option<usize>,
}

impl SummaryRow {
    pub fn to_record(&self) -> Vec<String> {
        vec![
            self.comparison_name.clone(),
            self.table1_column.clone(),
            self.table2_column.clone(),
            self.semantic.to_string(),
            count(self.consistency_accurate_count),
            count(self.consistency_total_count),
            self.completeness_accurate_count.to_string(),
            self.completeness_incomplete_count.to_string(),
            self.completeness_total_count.to_string(),
            count(self.valid_count),
            count(self.valid_total_count),
            count(self.country_correctness),
            count(self.country_count),
        ]
    }

    fn key(&self) -> (&str, &str, &str) {
        (
            &self.comparison_name,
            &self.table1_column,
            &self.table2_column,
        )
    }
}

fn count(value: Option<usize>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// A joined record that failed one check for one column pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRow {
    pub comparison_name: String,
    pub table1_column: String,
    pub table2_column: String,
    pub check: CheckKind,
    /// Every column of the joined record as (header, displayed value).
    pub record: Vec<(String, String)>,
}

impl ErrorRow {
    fn key(&self) -> (&str, &str, &str) {
        (
            &self.comparison_name,
            &self.table1_column,
            &self.table2_column,
        )
    }

    fn record_cells(&self, columns: &[String]) -> Vec<String> {
        let lookup: HashMap<&str, &str> = self
            .record
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        columns
            .iter()
            .map(|c| lookup.get(c.as_str()).copied().unwrap_or_default().to_string())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonReport {
    pub comparison_name: String,
    pub summaries: Vec<SummaryRow>,
    pub errors: Vec<ErrorRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub summaries: Vec<SummaryRow>,
    pub errors: Vec<ErrorRow>,
}

/// A rendered table ready for CSV output or terminal display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RenderedTable {
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        io_utils::write_csv(path, &self.headers, &self.rows)
    }
}

impl Report {
    pub fn from_comparisons<I>(comparisons: I) -> Self
    where
        I: IntoIterator<Item = ComparisonReport>,
    {
        let mut report = Report::default();
        for comparison in comparisons {
            report.summaries.extend(comparison.summaries);
            report.errors.extend(comparison.errors);
        }
        report
    }

    /// Union of every error record's columns, in first-seen order.
    pub fn record_columns(&self) -> Vec<String> {
        self.errors
            .iter()
            .flat_map(|e| e.record.iter().map(|(name, _)| name.clone()))
            .unique()
            .collect()
    }

    pub fn summary_table(&self) -> RenderedTable {
        RenderedTable {
            headers: SUMMARY_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: self.summaries.iter().map(SummaryRow::to_record).collect(),
        }
    }

    pub fn error_table(&self) -> RenderedTable {
        let columns = self.record_columns();
        let mut headers = ERROR_TAG_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>();
        headers.extend(columns.iter().cloned());
        let rows = self
            .errors
            .iter()
            .map(|e| {
                let mut row = vec![
                    e.comparison_name.clone(),
                    e.table1_column.clone(),
                    e.table2_column.clone(),
                    e.check.label().to_string(),
                ];
                row.extend(e.record_cells(&columns));
                row
            })
            .collect();
        RenderedTable { headers, rows }
    }

    /// Left join of summaries to errors on (comparison, table1 column,
    /// table2 column). A summary without errors appears once with empty
    /// error fields; otherwise once per error, in error order.
    pub fn merged_table(&self) -> RenderedTable {
        let columns = self.record_columns();
        let mut headers = SUMMARY_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>();
        headers.push("check".to_string());
        headers.extend(columns.iter().cloned());

        let mut by_key: HashMap<(&str, &str, &str), Vec<&ErrorRow>> = HashMap::new();
        for error in &self.errors {
            by_key.entry(error.key()).or_default().push(error);
        }

        let blank = vec![String::new(); columns.len() + 1];
        let mut rows = Vec::new();
        for summary in &self.summaries {
            let base = summary.to_record();
            match by_key.get(&summary.key()) {
                Some(errors) => {
                    for error in errors {
                        let mut row = base.clone();
                        row.push(error.check.label().to_string());
                        row.extend(error.record_cells(&columns));
                        rows.push(row);
                    }
                }
                None => {
                    let mut row = base;
                    row.extend(blank.iter().cloned());
                    rows.push(row);
                }
            }
        }
        RenderedTable { headers, rows }
    }

    pub fn write(&self, outputs: &ReportOutputs<'_>) -> Result<()> {
        if let Some(path) = outputs.merged {
            self.merged_table()
                .write_csv(path)
                .with_context(|| format!("Writing merged report to {path:?}"))?;
            info!("Merged report written to {:?}", path);
        }
        if let Some(path) = outputs.summary {
            self.summary_table()
                .write_csv(path)
                .with_context(|| format!("Writing summary report to {path:?}"))?;
            info!("Summary report written to {:?}", path);
        }
        if let Some(path) = outputs.errors {
            self.error_table()
                .write_csv(path)
                .with_context(|| format!("Writing error report to {path:?}"))?;
            info!("Error report written to {:?}", path);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOutputs<'a> {
    pub merged: Option<&'a Path>,
    pub summary: Option<&'a Path>,
    pub errors: Option<&'a Path>,
}
