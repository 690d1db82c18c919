use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::GeocoderMode;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Cross-check regulatory registers for consistency, completeness, and validity",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Join the configured registers and report mismatching column pairs
    Check(CheckArgs),
    /// List the column pairs each comparison will check
    Pairs(PairsArgs),
    /// Resolve place names to countries with the configured geocoder
    Geocode(GeocodeArgs),
}

#[derive(Debug, Args)]
pub struct GeocoderOverrides {
    /// Geocoder to use instead of the one in the config
    #[arg(long = "geocoder", value_enum)]
    pub mode: Option<GeocoderMode>,
    /// Place/country CSV used by the offline geocoder
    #[arg(long)]
    pub gazetteer: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// YAML run configuration
    #[arg(short, long)]
    pub config: PathBuf,
    /// Merged summary/error CSV (stdout if omitted and not configured)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Also write the summary table on its own
    #[arg(long = "summary-output")]
    pub summary_output: Option<PathBuf>,
    /// Also write the error table on its own
    #[arg(long = "errors-output")]
    pub errors_output: Option<PathBuf>,
    #[command(flatten)]
    pub geocoder: GeocoderOverrides,
    /// Print the summary as an aligned table to stdout
    #[arg(long = "table")]
    pub table: bool,
}

#[derive(Debug, Args)]
pub struct PairsArgs {
    /// YAML run configuration
    #[arg(short, long)]
    pub config: PathBuf,
}

#[derive(Debug, Args)]
pub struct GeocodeArgs {
    /// YAML run configuration supplying geocoder settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Place name to resolve (repeatable)
    #[arg(short, long = "place", required = true, action = clap::ArgAction::Append)]
    pub places: Vec<String>,
    #[command(flatten)]
    pub geocoder: GeocoderOverrides,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
