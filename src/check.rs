use std::path::PathBuf;

use anyhow::{Context, Result, ensure};
use log::info;

use crate::{
    cli::{CheckArgs, GeocoderOverrides},
    config::{Config, GeocoderConfig, GeocoderMode},
    pipeline,
    report::ReportOutputs,
    table,
};

pub fn execute(args: &CheckArgs) -> Result<()> {
    let mut config = Config::load(&args.config)
        .with_context(|| format!("Loading config from {:?}", args.config))?;
    apply_geocoder_overrides(&mut config.geocoder, &args.geocoder)?;

    let registers = pipeline::load_registers(&config)?;
    let geocoder = pipeline::build_geocoder(&config.geocoder)?;
    let report = pipeline::run(&config, &registers, &geocoder)?;

    let merged = resolve_merged_output(args, &config);
    let summary = args
        .summary_output
        .as_deref()
        .or(config.output.summary.as_deref());
    let errors = args
        .errors_output
        .as_deref()
        .or(config.output.errors.as_deref());
    report.write(&ReportOutputs {
        merged: merged.as_deref(),
        summary,
        errors,
    })?;

    if args.table {
        let summary_table = report.summary_table();
        table::print_table(&summary_table.headers, &summary_table.rows);
    }
    info!(
        "Geocoder cache holds {} resolved place(s)",
        geocoder.cached_len()
    );
    Ok(())
}

/// CLI flag, then config, then stdout; with `--table` and nothing
/// configured, the merged report is not written at all.
fn resolve_merged_output(args: &CheckArgs, config: &Config) -> Option<PathBuf> {
    args.output
        .clone()
        .or_else(|| config.output.merged.clone())
        .or_else(|| (!args.table).then(|| PathBuf::from("-")))
}

pub(crate) fn apply_geocoder_overrides(
    geocoder: &mut GeocoderConfig,
    overrides: &GeocoderOverrides,
) -> Result<()> {
    if let Some(mode) = overrides.mode {
        geocoder.mode = mode;
    }
    if let Some(path) = &overrides.gazetteer {
        geocoder.gazetteer = Some(path.clone());
    }
    ensure!(
        geocoder.mode != GeocoderMode::Offline || geocoder.gazetteer.is_some(),
        "Offline geocoding requires a gazetteer (--gazetteer or geocoder.gazetteer)"
    );
    Ok(())
}
