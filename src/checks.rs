//! The four column-pair checks.
//!
//! Every check reads two columns of a joined [`Table`] and reports how many
//! rows passed, how many rows were examined, and which rows failed. Checks
//! never mutate the table. A check that does not apply to a pair returns
//! `None`, which the reporter renders as null counts rather than zero.
//!
//! A null cell is never equal to anything, including another null. Two
//! empty values are therefore *inconsistent*, and two unresolvable places
//! are *not* country-equivalent.

use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;

use crate::{
    data::Value,
    dataset::Table,
    geocode::CountryMap,
};

pub const DUAL_REGULATED: &str = "Dual Regulated";

static LEI_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{20}$").expect("LEI pattern compiles"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CheckKind {
    Consistency,
    Completeness,
    Validity,
    Country,
}

impl CheckKind {
    pub fn label(&self) -> &'static str {
        match self {
            CheckKind::Consistency => "consistency",
            CheckKind::Completeness => "completeness",
            CheckKind::Validity => "validity",
            CheckKind::Country => "country",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckOutcome {
    pub passed: usize,
    pub total: usize,
    /// Row indexes into the joined table, ascending.
    pub failing_rows: Vec<usize>,
}

impl CheckOutcome {
    fn from_flags<I: IntoIterator<Item = bool>>(flags: I) -> Self {
        let mut outcome = CheckOutcome::default();
        for (row, passed) in flags.into_iter().enumerate() {
            outcome.total += 1;
            if passed {
                outcome.passed += 1;
            } else {
                outcome.failing_rows.push(row);
            }
        }
        outcome
    }

    pub fn failed(&self) -> usize {
        self.failing_rows.len()
    }
}

/// How two text values are judged consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyRule {
    /// Case-insensitive equality of the two values.
    CaseInsensitive,
    /// Both "Regulated Status" values must read "Dual Regulated".
    DualRegulatedText,
    /// Left must read "Dual Regulated" and the reference register's 0/1
    /// flag column (if present) must be 1.
    DualRegulatedFlag { flag: Option<usize> },
}

pub fn check_consistency(
    table: &Table,
    left: usize,
    right: usize,
    rule: ConsistencyRule,
) -> Option<CheckOutcome> {
    if !table.column_type(left).is_text() || !table.column_type(right).is_text() {
        return None;
    }
    let outcome = CheckOutcome::from_flags((0..table.row_count()).map(|row| {
        let a = table.cell(row, left);
        let b = table.cell(row, right);
        match rule {
            ConsistencyRule::CaseInsensitive => match (a, b) {
                (Some(a), Some(b)) => a.as_display().to_lowercase() == b.as_display().to_lowercase(),
                _ => false,
            },
            ConsistencyRule::DualRegulatedText => {
                is_dual_regulated_text(a) && is_dual_regulated_text(b)
            }
            ConsistencyRule::DualRegulatedFlag { flag } => {
                is_dual_regulated_text(a)
                    && flag.is_some_and(|idx| is_set_flag(table.cell(row, idx)))
            }
        }
    }));
    Some(outcome)
}

fn is_dual_regulated_text(value: Option<&Value>) -> bool {
    value.and_then(Value::as_str) == Some(DUAL_REGULATED)
}

fn is_set_flag(value: Option<&Value>) -> bool {
    value.and_then(Value::as_f64) == Some(1.0)
}

/// A row is complete when both sides hold a value. The failing rows are the
/// incomplete ones.
pub fn check_completeness(table: &Table, left: usize, right: usize) -> CheckOutcome {
    CheckOutcome::from_flags(
        (0..table.row_count())
            .map(|row| table.cell(row, left).is_some() && table.cell(row, right).is_some()),
    )
}

pub fn is_valid_lei(value: Option<&Value>) -> bool {
    value.is_some_and(|v| LEI_PATTERN.is_match(&v.as_display()))
}

/// A row is valid only when both sides are well-formed LEIs.
pub fn check_validity(table: &Table, left: usize, right: usize) -> CheckOutcome {
    CheckOutcome::from_flags((0..table.row_count()).map(|row| {
        is_valid_lei(table.cell(row, left)) && is_valid_lei(table.cell(row, right))
    }))
}

fn literally_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

/// Distinct place strings the country check will need resolved, sorted.
///
/// Rows that are literally equal, or have a null side, never consult the
/// geocoder, so their values are left out.
pub fn places_to_resolve(table: &Table, left: usize, right: usize) -> Vec<String> {
    (0..table.row_count())
        .filter_map(|row| {
            let a = table.cell(row, left)?;
            let b = table.cell(row, right)?;
            (a != b).then(|| [a.as_display(), b.as_display()])
        })
        .flatten()
        .unique()
        .sorted()
        .collect()
}

/// Two values are country-equivalent when they are literally equal or both
/// resolve to the same, known country.
pub fn check_country(
    table: &Table,
    left: usize,
    right: usize,
    countries: &CountryMap,
) -> CheckOutcome {
    CheckOutcome::from_flags((0..table.row_count()).map(|row| {
        let a = table.cell(row, left);
        let b = table.cell(row, right);
        if literally_equal(a, b) {
            return true;
        }
        match (resolved_country(countries, a), resolved_country(countries, b)) {
            (Some(ca), Some(cb)) => ca == cb,
            _ => false,
        }
    }))
}

fn resolved_country<'a>(countries: &'a CountryMap, value: Option<&Value>) -> Option<&'a str> {
    countries.get(&value?.as_display())?.as_deref()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table::from_text_rows(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
        .expect("table")
    }

    #[test]
    fn consistency_ignores_case_but_not_nulls() {
        let t = table(
            &["a", "b"],
            &[&["Acme Ltd", "ACME LTD"], &["Acme", "Other"], &["", ""], &["x", ""]],
        );
        let outcome = check_consistency(&t, 0, 1, ConsistencyRule::CaseInsensitive).unwrap();
        assert_eq!(outcome.passed, 1);
        assert_eq!(outcome.total, 4);
        assert_eq!(outcome.failing_rows, vec![1, 2, 3]);
    }

    #[test]
    fn consistency_skips_non_text_pairs() {
        let t = table(&["a", "b"], &[&["1", "1"]]);
        assert_eq!(check_consistency(&t, 0, 1, ConsistencyRule::CaseInsensitive), None);
    }

    #[test]
    fn dual_regulated_text_requires_both_sides() {
        let t = table(
            &["a", "b"],
            &[
                &["Dual Regulated", "Dual Regulated"],
                &["Dual Regulated", "Solely PRA"],
                &["Solely PRA", "Solely PRA"],
            ],
        );
        let outcome = check_consistency(&t, 0, 1, ConsistencyRule::DualRegulatedText).unwrap();
        assert_eq!(outcome.passed, 1);
        assert_eq!(outcome.failing_rows, vec![1, 2]);
    }

    #[test]
    fn dual_regulated_flag_reads_reference_flag() {
        let t = table(
            &["status", "ref_status", "flag"],
            &[
                &["Dual Regulated", "Dual", "1"],
                &["Dual Regulated", "Dual", "0"],
                &["Solely PRA", "Dual", "1"],
            ],
        );
        let rule = ConsistencyRule::DualRegulatedFlag { flag: Some(2) };
        let outcome = check_consistency(&t, 0, 1, rule).unwrap();
        assert_eq!(outcome.failing_rows, vec![1, 2]);

        let missing = ConsistencyRule::DualRegulatedFlag { flag: None };
        assert_eq!(check_consistency(&t, 0, 1, missing).unwrap().passed, 0);
    }

    #[test]
    fn completeness_fails_rows_missing_either_side() {
        let t = table(&["a", "b"], &[&["x", "y"], &["", "y"], &["x", "NA"], &["", ""]]);
        let outcome = check_completeness(&t, 0, 1);
        assert_eq!(outcome.passed, 1);
        assert_eq!(outcome.failed(), 3);
        assert_eq!(outcome.failing_rows, vec![1, 2, 3]);
    }

    #[test]
    fn lei_validity_matches_the_twenty_character_pattern() {
        let valid = Value::String("ABCDEFGHIJ1234567890".to_string());
        assert!(is_valid_lei(Some(&valid)));
        assert!(!is_valid_lei(Some(&Value::String("abcdefghij1234567890".to_string()))));
        assert!(!is_valid_lei(Some(&Value::String("ABCDEFGHIJ123456789".to_string()))));
        assert!(!is_valid_lei(Some(&Value::String("ABCDEFGHIJ1234567890X".to_string()))));
        assert!(!is_valid_lei(None));
    }

    #[test]
    fn all_digit_leis_keep_every_digit() {
        let t = table(
            &["LEI_A", "LEI_B"],
            &[&["12345678901234567890", "12345678901234567890"]],
        );
        assert!(t.column_type(0).is_text());
        assert_eq!(t.cell(0, 0).map(Value::as_display).as_deref(), Some("12345678901234567890"));
        let outcome = check_validity(&t, 0, 1);
        assert_eq!(outcome.passed, 1);
        assert!(outcome.failing_rows.is_empty());
    }

    #[test]
    fn places_to_resolve_skips_equal_and_null_rows() {
        let t = table(
            &["a", "b"],
            &[&["France", "France"], &["Paris", "Lyon"], &["Lyon", "Paris"], &["", "Rome"]],
        );
        assert_eq!(places_to_resolve(&t, 0, 1), vec!["Lyon", "Paris"]);
    }

    #[test]
    fn country_check_treats_unresolved_as_mismatch() {
        let t = table(
            &["a", "b"],
            &[&["France", "France"], &["Paris", "Lyon"], &["Paris", "Narnia"], &["Narnia", "Oz"]],
        );
        let mut countries = CountryMap::new();
        countries.insert("Paris".to_string(), Some("France".to_string()));
        countries.insert("Lyon".to_string(), Some("France".to_string()));
        countries.insert("Narnia".to_string(), None);
        countries.insert("Oz".to_string(), None);
        let outcome = check_country(&t, 0, 1, &countries);
        assert_eq!(outcome.passed, 2);
        assert_eq!(outcome.failing_rows, vec![2, 3]);
    }
}
