pub mod check;
pub mod checks;
pub mod cli;
pub mod config;
pub mod data;
pub mod dataset;
pub mod engine;
pub mod geocode;
pub mod io_utils;
pub mod join;
pub mod pipeline;
pub mod report;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    cli::{Cli, Commands},
    config::{Config, GeocoderConfig},
    geocode::Geocoder,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("register_crosscheck", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Check(args) => check::execute(&args),
        Commands::Pairs(args) => handle_pairs(&args),
        Commands::Geocode(args) => handle_geocode(&args),
    }
}

fn handle_pairs(args: &cli::PairsArgs) -> Result<()> {
    let config = Config::load(&args.config)
        .with_context(|| format!("Loading config from {:?}", args.config))?;
    let headers = ["comparison_name", "table1_column", "table2_column", "semantic"]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    let mut rows = Vec::new();
    for comparison in config.comparisons()? {
        let name = comparison.name();
        debug!("{name}: {} pair(s)", comparison.pairs.len());
        for pair in &comparison.pairs {
            rows.push(vec![
                name.clone(),
                format!("{}_{}", pair.left, comparison.left),
                format!("{}_{}", pair.right, comparison.right),
                pair.semantic.to_string(),
            ]);
        }
    }
    table::print_table(&headers, &rows);
    info!("Listed {} column pair(s) from {:?}", rows.len(), args.config);
    Ok(())
}

fn handle_geocode(args: &cli::GeocodeArgs) -> Result<()> {
    let mut geocoder_config = match &args.config {
        Some(path) => {
            Config::load(path)
                .with_context(|| format!("Loading config from {path:?}"))?
                .geocoder
        }
        None => GeocoderConfig::default(),
    };
    check::apply_geocoder_overrides(&mut geocoder_config, &args.geocoder)?;

    let geocoder = pipeline::build_geocoder(&geocoder_config)?;
    let headers = vec!["place".to_string(), "country".to_string()];
    let mut rows = Vec::new();
    for place in &args.places {
        let country = match geocoder.lookup_country(place) {
            Ok(country) => country.unwrap_or_default(),
            Err(err) => {
                warn!("Lookup for '{place}' failed: {err}");
                String::new()
            }
        };
        rows.push(vec![place.clone(), country]);
    }
    table::print_table(&headers, &rows);
    Ok(())
}
