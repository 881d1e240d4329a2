// Loader configuration - explicit parameters instead of framework wiring

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::job::DEFAULT_CHUNK_SIZE;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Delimited input file: a header row plus (id, name, designation) rows.
    pub input_file: PathBuf,

    /// SQLite database holding the employees and the run ledger.
    pub database: PathBuf,

    /// Records per chunk commit.
    pub chunk_size: usize,

    /// Optional JSON file extending the designation alias table.
    pub designation_rules: Option<PathBuf>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig {
            input_file: PathBuf::from("data/employees.csv"),
            database: PathBuf::from("employees.db"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            designation_rules: None,
        }
    }
}

impl LoaderConfig {
    /// Load configuration from a JSON file. Missing keys take defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read config file {:?}", path.as_ref()))?;

        serde_json::from_str(&content).context("failed to parse config JSON")
    }

    /// Configuration from `path` when given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
