#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use register_crosscheck::{data::Value, dataset::Table};
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Builds a typed table from string cells; empty strings load as null.
pub fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
    Table::from_text_rows(
        headers.iter().map(|h| h.to_string()).collect(),
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect(),
    )
    .expect("build table")
}

pub fn text(value: &str) -> Value {
    Value::String(value.to_string())
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Copies the register fixtures and config into the workspace so a run
    /// can write next to them.
    pub fn with_register_fixtures(self) -> Self {
        for name in [
            "rwm.csv",
            "bsmr.csv",
            "intact.csv",
            "places.csv",
            "crosscheck.yaml",
        ] {
            std::fs::copy(fixture_path(name), self.path().join(name)).expect("copy fixture");
        }
        self
    }
}
