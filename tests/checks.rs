mod common;

use proptest::prelude::*;
use register_crosscheck::{
    checks::{
        ConsistencyRule, check_completeness, check_consistency, check_country, check_validity,
        is_valid_lei, places_to_resolve,
    },
    data::Value,
    geocode::{OfflineGazetteer, resolve_countries},
};

use common::{table, text};

#[test]
fn identical_text_columns_are_fully_consistent() {
    let t = table(
        &["Firm Name_RWM", "Firm Name_INTACT"],
        &[&["Acme", "Acme"], &["Beta Bank", "Beta Bank"]],
    );
    let outcome = check_consistency(&t, 0, 1, ConsistencyRule::CaseInsensitive).unwrap();
    assert_eq!(outcome.passed, outcome.total);
    assert!(outcome.failing_rows.is_empty());
}

#[test]
fn dual_regulated_with_reference_flag() {
    let t = table(
        &["Regulated Status_RWM", "Regulated Status_INTACT", "Dual Regulated_INTACT"],
        &[&["Dual Regulated", "PRA", "1"], &["Dual Regulated", "PRA", "0"]],
    );
    let outcome =
        check_consistency(&t, 0, 1, ConsistencyRule::DualRegulatedFlag { flag: Some(2) }).unwrap();
    assert_eq!(outcome.passed, 1);
    assert_eq!(outcome.failing_rows, vec![1]);
}

#[test]
fn null_against_null_is_not_consistent() {
    let t = table(&["a", "b"], &[&["", ""], &["x", "X"]]);
    let outcome = check_consistency(&t, 0, 1, ConsistencyRule::CaseInsensitive).unwrap();
    assert_eq!(outcome.failing_rows, vec![0]);
}

#[test]
fn completeness_reports_rows_missing_either_side() {
    let t = table(
        &["a", "b"],
        &[&["", "present"], &["present", ""], &["present", "present"]],
    );
    let outcome = check_completeness(&t, 0, 1);
    assert_eq!(outcome.failing_rows, vec![0, 1]);
    assert_eq!(outcome.passed, 1);
    assert_eq!(outcome.total, 3);
}

#[test]
fn validity_requires_both_sides_to_be_leis() {
    let t = table(
        &["LEI_RWM", "LEI Number_INTACT"],
        &[
            &["ABCDEFGHIJ1234567890", "ABCDEFGHIJ1234567890"],
            &["abcdefghij1234567890", "ABCDEFGHIJ1234567890"],
            &["ABCDEFGHIJ123456789", "ABCDEFGHIJ1234567890"],
            &["", "ABCDEFGHIJ1234567890"],
        ],
    );
    let outcome = check_validity(&t, 0, 1);
    assert_eq!(outcome.passed, 1);
    assert_eq!(outcome.failing_rows, vec![1, 2, 3]);
}

#[test]
fn country_equivalence_through_gazetteer() {
    let t = table(
        &["Country of Incorporation_RWM", "Country of Ownership_INTACT"],
        &[&["France", "France"], &["Paris", "Lyon"], &["Paris", "Narnia"]],
    );
    let gazetteer = OfflineGazetteer::from_entries([("Paris", "France"), ("Lyon", "France")]);
    let places = places_to_resolve(&t, 0, 1);
    assert_eq!(places, vec!["Lyon", "Narnia", "Paris"]);
    let countries = resolve_countries(&gazetteer, &places, 2);
    let outcome = check_country(&t, 0, 1, &countries);
    assert_eq!(outcome.passed, 2);
    assert_eq!(outcome.failing_rows, vec![2]);
}

#[test]
fn two_unresolvable_places_do_not_match() {
    let t = table(&["a", "b"], &[&["Narnia", "Oz"]]);
    let gazetteer = OfflineGazetteer::default();
    let countries = resolve_countries(&gazetteer, &places_to_resolve(&t, 0, 1), 1);
    assert_eq!(check_country(&t, 0, 1, &countries).failing_rows, vec![0]);
}

proptest! {
    #[test]
    fn identical_values_always_consistent(values in prop::collection::vec("[a-z]{1,8} [A-Z]{1,3}", 1..40)) {
        let rows = values.iter().map(|v| vec![v.clone(), v.to_uppercase()]).collect::<Vec<_>>();
        let t = register_crosscheck::dataset::Table::from_text_rows(
            vec!["a".to_string(), "b".to_string()],
            rows,
        ).unwrap();
        let outcome = check_consistency(&t, 0, 1, ConsistencyRule::CaseInsensitive).unwrap();
        prop_assert_eq!(outcome.passed, values.len());
        prop_assert!(outcome.failing_rows.is_empty());
    }

    #[test]
    fn uppercase_alphanumeric_twenty_is_valid(lei in "[A-Z0-9]{20}") {
        prop_assert!(is_valid_lei(Some(&text(&lei))));
    }

    #[test]
    fn wrong_length_is_invalid(lei in "[A-Z0-9]{0,19}|[A-Z0-9]{21,30}") {
        prop_assert!(!is_valid_lei(Some(&Value::String(lei))));
    }
}
