use criterion::{Criterion, criterion_group, criterion_main};
use register_crosscheck::{
    config::{ColumnPair, Comparison},
    dataset::Table,
    engine::{EngineOptions, run_comparison},
    geocode::OfflineGazetteer,
};

const CITIES: &[(&str, &str)] = &[
    ("Paris", "France"),
    ("Lyon", "France"),
    ("London", "United Kingdom"),
    ("Leeds", "United Kingdom"),
    ("Madrid", "Spain"),
];

fn synthetic_join(rows: usize) -> Table {
    let headers = [
        "Firm Name_RWM",
        "LEI_RWM",
        "Country of Incorporation_RWM",
        "Firm_INTACT",
        "LEI Number_INTACT",
        "Country of Ownership_INTACT",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect();
    let raw = (0..rows)
        .map(|i| {
            let (city, country) = CITIES[i % CITIES.len()];
            let lei = format!("LEI{i:017}");
            vec![
                format!("Firm {i}"),
                lei.clone(),
                city.to_string(),
                if i % 7 == 0 { format!("FIRM {i} LTD") } else { format!("firm {i}") },
                if i % 11 == 0 { lei.to_lowercase() } else { lei },
                country.to_string(),
            ]
        })
        .collect();
    Table::from_text_rows(headers, raw).expect("synthetic table")
}

fn bench_engine(c: &mut Criterion) {
    let joined = synthetic_join(10_000);
    let comparison = Comparison {
        left: "RWM".to_string(),
        right: "INTACT".to_string(),
        right_is_reference: true,
        dual_regulated_flag: "Dual Regulated".to_string(),
        pairs: vec![
            ColumnPair::new("Firm Name", "Firm"),
            ColumnPair::new("LEI", "LEI Number"),
            ColumnPair::new("Country of Incorporation", "Country of Ownership"),
        ],
    };
    let gazetteer = OfflineGazetteer::from_entries(CITIES.iter().copied());
    let options = EngineOptions::default();

    c.bench_function("run_comparison_10k_rows", |b| {
        b.iter(|| run_comparison(&joined, &comparison, &gazetteer, &options))
    });
}

criterion_group!(benches, bench_engine);
criterion_main!(benches);
