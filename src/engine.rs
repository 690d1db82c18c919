//! Per-comparison driver.
//!
//! Given one joined table and its [`Comparison`], runs the checks that each
//! column pair's semantic tag calls for and turns their outcomes into one
//! summary row per pair plus one error row per failing record and check.
//! Country lookups are batched per pair through [`resolve_countries`].

use log::{debug, info, warn};

use crate::{
    checks::{
        self, CheckKind, CheckOutcome, ConsistencyRule, check_completeness, check_consistency,
        check_country, check_validity,
    },
    config::{ColumnPair, ColumnSemantic, Comparison},
    data::display_cell,
    dataset::Table,
    geocode::{CountryMap, Geocoder, resolve_countries},
    report::{ComparisonReport, ErrorRow, SummaryRow},
};

#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    /// Worker threads used to resolve place names for country checks.
    pub lookup_concurrency: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            lookup_concurrency: 1,
        }
    }
}

/// Runs every applicable check for every column pair of one comparison
/// over its joined table.
///
/// Pairs naming a column absent from `joined` are skipped with a warning.
/// Nothing here fails: unusable checks report null counts and lookup
/// failures count as mismatches.
pub fn run_comparison(
    joined: &Table,
    comparison: &Comparison,
    geocoder: &dyn Geocoder,
    options: &EngineOptions,
) -> ComparisonReport {
    let comparison_name = comparison.name();
    let mut summaries = Vec::new();
    let mut errors = Vec::new();

    for pair in &comparison.pairs {
        let table1_column = format!("{}_{}", pair.left, comparison.left);
        let table2_column = format!("{}_{}", pair.right, comparison.right);
        let (Some(left), Some(right)) = (
            joined.column_index(&table1_column),
            joined.column_index(&table2_column),
        ) else {
            warn!(
                "{comparison_name}: skipping pair ({table1_column}, {table2_column}); column not found"
            );
            continue;
        };
        debug!(
            "{comparison_name}: checking {table1_column} against {table2_column} as {}",
            pair.semantic
        );

        let rule = consistency_rule(joined, comparison, pair);
        let consistency = check_consistency(joined, left, right, rule);
        let completeness = check_completeness(joined, left, right);
        let validity = pair
            .semantic
            .checks_validity()
            .then(|| check_validity(joined, left, right));
        let country = pair.semantic.checks_country().then(|| {
            let places = checks::places_to_resolve(joined, left, right);
            let countries: CountryMap =
                resolve_countries(geocoder, &places, options.lookup_concurrency);
            check_country(joined, left, right, &countries)
        });

        let mut capture = |kind: CheckKind, outcome: &CheckOutcome| {
            errors.extend(outcome.failing_rows.iter().map(|&row| ErrorRow {
                comparison_name: comparison_name.clone(),
                table1_column: table1_column.clone(),
                table2_column: table2_column.clone(),
                check: kind,
                record: record_fields(joined, row),
            }));
        };
        if let Some(outcome) = &consistency {
            capture(CheckKind::Consistency, outcome);
        }
        capture(CheckKind::Completeness, &completeness);
        if let Some(outcome) = &validity {
            capture(CheckKind::Validity, outcome);
        }
        if let Some(outcome) = &country {
            capture(CheckKind::Country, outcome);
        }

        summaries.push(SummaryRow {
            comparison_name: comparison_name.clone(),
            table1_column,
            table2_column,
            semantic: pair.semantic,
            consistency_accurate_count: consistency.as_ref().map(|o| o.passed),
            consistency_total_count: consistency.as_ref().map(|o| o.total),
            completeness_accurate_count: completeness.passed,
            completeness_incomplete_count: completeness.failed(),
            completeness_total_count: completeness.total,
            valid_count: validity.as_ref().map(|o| o.passed),
            valid_total_count: validity.as_ref().map(|o| o.total),
            country_correctness: country.as_ref().map(|o| o.passed),
            country_count: country.as_ref().map(|o| o.total),
        });
    }

    info!(
        "{}: {} pair(s) checked over {} joined row(s), {} error row(s)",
        comparison_name,
        summaries.len(),
        joined.row_count(),
        errors.len()
    );
    ComparisonReport {
        comparison_name,
        summaries,
        errors,
    }
}

fn consistency_rule(joined: &Table, comparison: &Comparison, pair: &ColumnPair) -> ConsistencyRule {
    if pair.semantic != ColumnSemantic::RegulatedStatus {
        return ConsistencyRule::CaseInsensitive;
    }
    if !comparison.right_is_reference {
        return ConsistencyRule::DualRegulatedText;
    }
    let flag_column = format!("{}_{}", comparison.dual_regulated_flag, comparison.right);
    let flag = joined.column_index(&flag_column);
    if flag.is_none() {
        warn!(
            "{}: flag column {flag_column} not found; no row can be dual regulated",
            comparison.name()
        );
    }
    ConsistencyRule::DualRegulatedFlag { flag }
}

fn record_fields(joined: &Table, row: usize) -> Vec<(String, String)> {
    joined
        .headers
        .iter()
        .enumerate()
        .map(|(col, header)| (header.clone(), display_cell(joined.cell(row, col))))
        .collect()
}
