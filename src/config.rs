use std::path::{Path, PathBuf};

use clap::Args;

use crate::error::{Result, TrackerError};

/// Name of the persisted snapshot, kept from the browser storage key.
pub const STORAGE_KEY: &str = "OakTrackerData";

pub const DEFAULT_DATA_DIR: &str = "static/data";
pub const DEFAULT_TABLES: [&str; 2] = ["main", "postgame"];
pub const DEFAULT_SPECIAL_TABLE: &str = "hidden_grotto";
pub const DEFAULT_EXPORT_FILE: &str = "tracker-data.json";

/// Session configuration shared by the front ends.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Directory holding `{table}.json` documents.
    pub data_dir: PathBuf,
    /// Tables rendered, in display order.
    pub tables: Vec<String>,
    /// Auxiliary grouping document, matched into every table.
    pub special_table: Option<String>,
    pub state_file: PathBuf,
    pub collapsed_by_default: bool,
    pub log_file: Option<PathBuf>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            tables: DEFAULT_TABLES.iter().map(|t| t.to_string()).collect(),
            special_table: Some(DEFAULT_SPECIAL_TABLE.to_string()),
            state_file: default_state_file(),
            collapsed_by_default: true,
            log_file: None,
        }
    }
}

impl TrackerConfig {
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", table))
    }

    pub fn special_path(&self) -> Option<PathBuf> {
        self.special_table.as_deref().map(|t| self.table_path(t))
    }

    pub fn validate(&self) -> Result<()> {
        if self.tables.iter().all(|t| t.trim().is_empty()) {
            return Err(TrackerError::NoTables);
        }
        Ok(())
    }
}

/// Command line / environment overrides shared by the front ends.
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Directory holding the table documents
    #[arg(long, env = "OAKTRACKER_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Tables to show, in order
    #[arg(long = "table", env = "OAKTRACKER_TABLES", value_delimiter = ',', default_values_t = DEFAULT_TABLES.map(String::from))]
    pub tables: Vec<String>,

    /// Auxiliary grouping document matched into every table
    #[arg(long, env = "OAKTRACKER_SPECIAL_TABLE", default_value = DEFAULT_SPECIAL_TABLE)]
    pub special_table: String,

    /// Ignore the auxiliary grouping document
    #[arg(long)]
    pub no_special: bool,

    /// Persisted collected flags
    #[arg(long, env = "OAKTRACKER_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Start with every header expanded
    #[arg(long)]
    pub expanded: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, env = "OAKTRACKER_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn into_config(self) -> TrackerConfig {
        let defaults = TrackerConfig::default();
        TrackerConfig {
            data_dir: self.data_dir,
            tables: self.tables,
            special_table: (!self.no_special).then_some(self.special_table),
            state_file: self.state_file.unwrap_or(defaults.state_file),
            collapsed_by_default: !self.expanded,
            log_file: self.log_file.or(defaults.log_file),
        }
    }
}

/// `<platform data dir>/oaktracker/OakTrackerData.json`, falling back to the
/// working directory when the platform has no data dir.
pub fn default_state_file() -> PathBuf {
    let base = dirs::data_dir().unwrap_or_else(|| Path::new(".").to_path_buf());
    base.join("oaktracker").join(format!("{}.json", STORAGE_KEY))
}
