//! YAML run configuration.
//!
//! A config names the registers (file, key column, suffix), the ordered
//! column pairs to compare for each register pairing, the geocoder to use,
//! and where reports go. Loading resolves everything the engine needs up
//! front: relative paths, the default comparison set, and the
//! [`ColumnSemantic`] tag of every pair.

use std::{
    collections::HashSet,
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, anyhow, bail, ensure};
use clap::ValueEnum;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    cli::parse_delimiter,
    geocode::{DEFAULT_ENDPOINT, DEFAULT_USER_AGENT, NominatimOptions},
};

pub const DEFAULT_DUAL_REGULATED_FLAG: &str = "Dual Regulated";
const REGULATED_STATUS_COLUMN: &str = "Regulated Status";
const COUNTRY_COLUMNS: &[&str] = &["Country of Ownership", "Country of Incorporation"];

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub registers: Vec<RegisterConfig>,
    #[serde(default)]
    pub comparisons: Option<Vec<ComparisonConfig>>,
    #[serde(default = "default_dual_regulated_flag")]
    pub dual_regulated_flag: String,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_dual_regulated_flag() -> String {
    DEFAULT_DUAL_REGULATED_FLAG.to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterConfig {
    pub name: String,
    pub path: PathBuf,
    pub key: String,
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub drop_columns: Vec<String>,
    #[serde(default)]
    pub reference: bool,
    /// Ordered column list zipped position-by-position with the other
    /// registers' lists when `comparisons` is omitted. `null` entries
    /// leave a gap.
    #[serde(default)]
    pub columns: Vec<Option<String>>,
}

impl RegisterConfig {
    pub fn delimiter_byte(&self) -> Result<Option<u8>> {
        self.delimiter
            .as_deref()
            .map(|raw| {
                parse_delimiter(raw)
                    .map_err(|err| anyhow!("Register {}: invalid delimiter: {err}", self.name))
            })
            .transpose()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComparisonConfig {
    pub left: String,
    pub right: String,
    #[serde(default)]
    pub pairs: Vec<PairConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PairConfig {
    Tuple(Option<String>, Option<String>),
    Spec(PairSpec),
}

/// Map form of a pair, which may also declare the semantic tag.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PairSpec {
    #[serde(default)]
    pub left: Option<String>,
    #[serde(default)]
    pub right: Option<String>,
    #[serde(default)]
    pub semantic: Option<ColumnSemantic>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "kebab-case")]
pub enum GeocoderMode {
    Nominatim,
    Offline,
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GeocoderConfig {
    pub mode: GeocoderMode,
    pub endpoint: String,
    pub user_agent: String,
    pub language: String,
    pub timeout_secs: u64,
    pub min_interval_ms: u64,
    pub concurrency: usize,
    pub gazetteer: Option<PathBuf>,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            mode: GeocoderMode::Nominatim,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            language: "en".to_string(),
            timeout_secs: 10,
            min_interval_ms: 1000,
            concurrency: 1,
            gazetteer: None,
        }
    }
}

impl GeocoderConfig {
    pub fn nominatim_options(&self) -> NominatimOptions {
        NominatimOptions {
            endpoint: self.endpoint.clone(),
            user_agent: self.user_agent.clone(),
            language: self.language.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            min_interval: Duration::from_millis(self.min_interval_ms),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default)]
    pub merged: Option<PathBuf>,
    #[serde(default)]
    pub summary: Option<PathBuf>,
    #[serde(default)]
    pub errors: Option<PathBuf>,
}

/// What a column pair carries, which decides the checks that apply to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnSemantic {
    General,
    RegulatedStatus,
    Lei,
    Country,
}

impl ColumnSemantic {
    /// Derives the tag from the unsuffixed column names.
    pub fn infer(left: &str, right: &str) -> Self {
        if left == REGULATED_STATUS_COLUMN {
            ColumnSemantic::RegulatedStatus
        } else if left.contains("LEI") || right.contains("LEI") {
            ColumnSemantic::Lei
        } else if COUNTRY_COLUMNS.contains(&left) || COUNTRY_COLUMNS.contains(&right) {
            ColumnSemantic::Country
        } else {
            ColumnSemantic::General
        }
    }

    pub fn checks_validity(&self) -> bool {
        matches!(self, ColumnSemantic::Lei)
    }

    pub fn checks_country(&self) -> bool {
        matches!(self, ColumnSemantic::Country)
    }
}

impl fmt::Display for ColumnSemantic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnSemantic::General => "general",
            ColumnSemantic::RegulatedStatus => "regulated_status",
            ColumnSemantic::Lei => "lei",
            ColumnSemantic::Country => "country",
        };
        f.write_str(label)
    }
}

/// A pair with both sides present and its semantic tag fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPair {
    pub left: String,
    pub right: String,
    pub semantic: ColumnSemantic,
}

impl ColumnPair {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        let left = left.into();
        let right = right.into();
        let semantic = ColumnSemantic::infer(&left, &right);
        Self {
            left,
            right,
            semantic,
        }
    }

    pub fn with_semantic(mut self, semantic: ColumnSemantic) -> Self {
        self.semantic = semantic;
        self
    }
}

/// One register pairing ready for the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub left: String,
    pub right: String,
    pub right_is_reference: bool,
    pub dual_regulated_flag: String,
    pub pairs: Vec<ColumnPair>,
}

impl Comparison {
    pub fn name(&self) -> String {
        comparison_name(&self.left, &self.right)
    }
}

pub fn comparison_name(left: &str, right: &str) -> String {
    format!("{left} VS {right}")
}

impl Config {
    /// Reads and validates a config file. Relative paths inside it resolve
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Reading config file {path:?}"))?;
        let mut config: Config = serde_yaml::from_str(&raw)
            .with_context(|| format!("Parsing config file {path:?}"))?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.resolve_paths(base);
        config.validate()?;
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() && !crate::io_utils::is_dash(p) {
                *p = base.join(&*p);
            }
        };
        for register in &mut self.registers {
            resolve(&mut register.path);
        }
        if let Some(gazetteer) = &mut self.geocoder.gazetteer {
            resolve(gazetteer);
        }
        for output in [
            &mut self.output.merged,
            &mut self.output.summary,
            &mut self.output.errors,
        ]
        .into_iter()
        .flatten()
        {
            resolve(output);
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.registers.is_empty(), "Config must name at least one register");
        let mut names = HashSet::new();
        for register in &self.registers {
            ensure!(
                !register.name.trim().is_empty(),
                "Register names cannot be empty"
            );
            ensure!(
                names.insert(register.name.as_str()),
                "Register '{}' is declared more than once",
                register.name
            );
            ensure!(
                !register.key.trim().is_empty(),
                "Register '{}' must name a key column",
                register.name
            );
            register.delimiter_byte()?;
            crate::io_utils::resolve_encoding(register.encoding.as_deref())
                .with_context(|| format!("Register '{}'", register.name))?;
        }
        let references = self.registers.iter().filter(|r| r.reference).count();
        ensure!(
            references <= 1,
            "At most one register may be marked as the reference; found {references}"
        );
        if let Some(comparisons) = &self.comparisons {
            for comparison in comparisons {
                for side in [&comparison.left, &comparison.right] {
                    ensure!(
                        names.contains(side.as_str()),
                        "Comparison {} refers to unknown register '{side}'",
                        comparison_name(&comparison.left, &comparison.right)
                    );
                }
                ensure!(
                    comparison.left != comparison.right,
                    "Comparison {} compares a register with itself",
                    comparison_name(&comparison.left, &comparison.right)
                );
            }
        }
        ensure!(
            self.geocoder.concurrency > 0,
            "geocoder.concurrency must be at least 1"
        );
        if self.geocoder.mode == GeocoderMode::Offline && self.geocoder.gazetteer.is_none() {
            bail!("geocoder.mode 'offline' requires geocoder.gazetteer");
        }
        Ok(())
    }

    pub fn register(&self, name: &str) -> Option<&RegisterConfig> {
        self.registers.iter().find(|r| r.name == name)
    }

    pub fn reference(&self) -> Option<&RegisterConfig> {
        self.registers.iter().find(|r| r.reference)
    }

    /// Returns the comparisons to run, with pairs resolved and tagged.
    pub fn comparisons(&self) -> Result<Vec<Comparison>> {
        let configured = match &self.comparisons {
            Some(list) => list.clone(),
            None => self.default_comparisons()?,
        };
        configured
            .iter()
            .map(|cfg| self.resolve_comparison(cfg))
            .collect()
    }

    /// Each non-reference register against the reference, followed by the
    /// non-reference registers against each other, with pairs zipped from
    /// the registers' `columns` lists.
    fn default_comparisons(&self) -> Result<Vec<ComparisonConfig>> {
        let reference = self
            .reference()
            .ok_or_else(|| anyhow!("Config has no comparisons and no reference register"))?;
        let others = self
            .registers
            .iter()
            .filter(|r| !r.reference)
            .collect::<Vec<_>>();
        let mut pairings = others
            .iter()
            .map(|r| (*r, reference))
            .collect::<Vec<_>>();
        for (idx, left) in others.iter().enumerate() {
            for right in &others[idx + 1..] {
                pairings.push((*left, *right));
            }
        }
        Ok(pairings
            .into_iter()
            .map(|(left, right)| ComparisonConfig {
                left: left.name.clone(),
                right: right.name.clone(),
                pairs: left
                    .columns
                    .iter()
                    .zip(&right.columns)
                    .map(|(l, r)| PairConfig::Tuple(l.clone(), r.clone()))
                    .collect(),
            })
            .collect())
    }

    fn resolve_comparison(&self, cfg: &ComparisonConfig) -> Result<Comparison> {
        let right = self
            .register(&cfg.right)
            .ok_or_else(|| anyhow!("Unknown register '{}'", cfg.right))?;
        let mut pairs = Vec::new();
        for pair in &cfg.pairs {
            let (left_col, right_col, semantic) = match pair {
                PairConfig::Tuple(l, r) => (l, r, None),
                PairConfig::Spec(spec) => (&spec.left, &spec.right, spec.semantic),
            };
            let (Some(left_col), Some(right_col)) = (left_col, right_col) else {
                debug!(
                    "Skipping incomplete pair ({:?}, {:?}) in {}",
                    left_col,
                    right_col,
                    comparison_name(&cfg.left, &cfg.right)
                );
                continue;
            };
            let mut resolved = ColumnPair::new(left_col.clone(), right_col.clone());
            if let Some(semantic) = semantic {
                resolved = resolved.with_semantic(semantic);
            }
            pairs.push(resolved);
        }
        Ok(Comparison {
            left: cfg.left.clone(),
            right: cfg.right.clone(),
            right_is_reference: right.reference,
            dual_regulated_flag: self.dual_regulated_flag.clone(),
            pairs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
registers:
  - name: RWM
    path: rwm.csv
    key: FRN
    drop_columns: ["Unnamed: 0"]
    columns: ["Firm Name", "LEI", "Regulated Status", "Country of Incorporation", "Trading Name"]
  - name: BSMR
    path: bsmr.csv
    key: FRN
    columns: ["Firm Name", "LEI Code", "Regulated Status", "Country of Incorporation", null]
  - name: INTACT
    path: /data/intact.csv
    key: FRN
    reference: true
    columns: ["Firm", "LEI Number", "Regulated Status", "Country of Ownership", "Trading Name"]
"#;

    fn sample() -> Config {
        let mut config: Config = serde_yaml::from_str(SAMPLE).expect("parse sample");
        config.resolve_paths(Path::new("/configs"));
        config.validate().expect("valid sample");
        config
    }

    #[test]
    fn semantic_inference_follows_column_names() {
        assert_eq!(
            ColumnSemantic::infer("Regulated Status", "Regulated Status"),
            ColumnSemantic::RegulatedStatus
        );
        assert_eq!(ColumnSemantic::infer("LEI", "Legal id"), ColumnSemantic::Lei);
        assert_eq!(
            ColumnSemantic::infer("Town", "Country of Ownership"),
            ColumnSemantic::Country
        );
        assert_eq!(ColumnSemantic::infer("Firm", "Firm"), ColumnSemantic::General);
        assert_eq!(
            ColumnSemantic::infer("Status", "Regulated Status"),
            ColumnSemantic::General
        );
    }

    #[test]
    fn default_comparisons_zip_register_columns() {
        let comparisons = sample().comparisons().expect("comparisons");
        let names = comparisons.iter().map(Comparison::name).collect::<Vec<_>>();
        assert_eq!(names, vec!["RWM VS INTACT", "BSMR VS INTACT", "RWM VS BSMR"]);

        assert!(comparisons[0].right_is_reference);
        assert!(!comparisons[2].right_is_reference);
        assert_eq!(comparisons[0].pairs.len(), 5);
        // BSMR's trailing null drops the Trading Name pair.
        assert_eq!(comparisons[1].pairs.len(), 4);
        assert_eq!(comparisons[0].pairs[1].semantic, ColumnSemantic::Lei);
        assert_eq!(comparisons[0].pairs[3].semantic, ColumnSemantic::Country);
    }

    #[test]
    fn relative_paths_resolve_against_config_directory() {
        let config = sample();
        assert_eq!(config.registers[0].path, PathBuf::from("/configs/rwm.csv"));
        assert_eq!(config.registers[2].path, PathBuf::from("/data/intact.csv"));
    }

    #[test]
    fn explicit_pairs_accept_tuples_specs_and_semantic_overrides() {
        let yaml = r#"
registers:
  - { name: A, path: a.csv, key: id }
  - { name: C, path: c.csv, key: id, reference: true }
comparisons:
  - left: A
    right: C
    pairs:
      - ["Name", "Name"]
      - { left: "Ident", right: "Ident", semantic: lei }
      - [null, "Orphan"]
"#;
        let config: Config = serde_yaml::from_str(yaml).expect("parse");
        config.validate().expect("valid");
        let comparisons = config.comparisons().expect("comparisons");
        assert_eq!(comparisons.len(), 1);
        let pairs = &comparisons[0].pairs;
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].semantic, ColumnSemantic::General);
        assert_eq!(pairs[1].semantic, ColumnSemantic::Lei);
    }

    #[test]
    fn misspelled_pair_keys_are_rejected() {
        let yaml = r#"
registers:
  - { name: A, path: a.csv, key: id }
  - { name: C, path: c.csv, key: id, reference: true }
comparisons:
  - left: A
    right: C
    pairs:
      - { left: "Ident", right: "Ident", semantc: lei }
"#;
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn validation_rejects_unknown_registers_and_double_reference() {
        let yaml = r#"
registers:
  - { name: A, path: a.csv, key: id, reference: true }
  - { name: C, path: c.csv, key: id, reference: true }
"#;
        let config: Config = serde_yaml::from_str(yaml).expect("parse");
        assert!(config.validate().unwrap_err().to_string().contains("reference"));

        let yaml = r#"
registers:
  - { name: A, path: a.csv, key: id }
comparisons:
  - { left: A, right: Z }
"#;
        let config: Config = serde_yaml::from_str(yaml).expect("parse");
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("unknown register 'Z'"));
    }

    #[test]
    fn offline_mode_requires_gazetteer() {
        let yaml = r#"
registers:
  - { name: A, path: a.csv, key: id }
geocoder:
  mode: offline
"#;
        let config: Config = serde_yaml::from_str(yaml).expect("parse");
        assert!(config.validate().is_err());
    }
}
