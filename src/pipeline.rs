//! End-to-end run: load registers, join each configured pairing, run the
//! engine, and collect one [`Report`].

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use log::info;

use crate::{
    config::{Comparison, Config, GeocoderConfig, GeocoderMode},
    dataset::{LoadOptions, Table, load_table},
    engine::{EngineOptions, run_comparison},
    geocode::{CachingGeocoder, DisabledGeocoder, Geocoder, NominatimGeocoder, OfflineGazetteer},
    io_utils,
    join::{JoinSide, inner_join},
    report::Report,
};

/// Loaded register tables keyed by register name.
pub type Registers = HashMap<String, Table>;

pub fn load_registers(config: &Config) -> Result<Registers> {
    let mut registers = Registers::new();
    for register in &config.registers {
        let encoding = io_utils::resolve_encoding(register.encoding.as_deref())?;
        let options = LoadOptions {
            delimiter: register.delimiter_byte()?,
            encoding,
            drop_columns: &register.drop_columns,
        };
        let table = load_table(&register.path, &options)
            .with_context(|| format!("Loading register {}", register.name))?;
        registers.insert(register.name.clone(), table);
    }
    Ok(registers)
}

/// Builds the configured geocoder behind a per-run cache.
pub fn build_geocoder(config: &GeocoderConfig) -> Result<CachingGeocoder<Box<dyn Geocoder>>> {
    let inner: Box<dyn Geocoder> = match config.mode {
        GeocoderMode::Nominatim => Box::new(NominatimGeocoder::new(config.nominatim_options())?),
        GeocoderMode::Offline => {
            let path = config
                .gazetteer
                .as_deref()
                .ok_or_else(|| anyhow!("Offline geocoding requires a gazetteer file"))?;
            let gazetteer = OfflineGazetteer::load(path)
                .with_context(|| format!("Loading gazetteer {path:?}"))?;
            info!("Offline gazetteer with {} place(s) loaded", gazetteer.len());
            Box::new(gazetteer)
        }
        GeocoderMode::Disabled => {
            info!("Geocoding disabled; country checks match literal values only");
            Box::new(DisabledGeocoder)
        }
    };
    Ok(CachingGeocoder::new(inner))
}

/// Joins and checks every comparison, in configuration order.
pub fn run(
    config: &Config,
    registers: &Registers,
    geocoder: &dyn Geocoder,
) -> Result<Report> {
    let options = EngineOptions {
        lookup_concurrency: config.geocoder.concurrency,
    };
    let comparisons = config.comparisons()?;
    let mut reports = Vec::with_capacity(comparisons.len());
    for comparison in &comparisons {
        let joined = join_for(config, registers, comparison)
            .with_context(|| format!("Joining {}", comparison.name()))?;
        reports.push(run_comparison(&joined, comparison, geocoder, &options));
    }
    let report = Report::from_comparisons(reports);
    info!(
        "{} comparison(s): {} summary row(s), {} error row(s)",
        comparisons.len(),
        report.summaries.len(),
        report.errors.len()
    );
    Ok(report)
}

fn join_for(config: &Config, registers: &Registers, comparison: &Comparison) -> Result<Table> {
    let (left_table, left_key) = register_side(config, registers, &comparison.left)?;
    let (right_table, right_key) = register_side(config, registers, &comparison.right)?;
    inner_join(
        JoinSide {
            table: left_table,
            suffix: &comparison.left,
            key: left_key,
        },
        JoinSide {
            table: right_table,
            suffix: &comparison.right,
            key: right_key,
        },
    )
}

fn register_side<'a>(
    config: &'a Config,
    registers: &'a Registers,
    name: &str,
) -> Result<(&'a Table, &'a str)> {
    let register = config
        .register(name)
        .ok_or_else(|| anyhow!("Unknown register '{name}'"))?;
    let table = registers
        .get(name)
        .ok_or_else(|| anyhow!("Register '{name}' was not loaded"))?;
    Ok((table, register.key.as_str()))
}
