use serde::{Deserialize, Serialize};

use crate::parse::field_format::FieldFormat;

/// Configuration from `.dayplan.toml` at the vault root
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub tasks: TaskConfig,
    #[serde(default)]
    pub daily_notes: Option<DailyNoteConfig>,
    #[serde(default)]
    pub timeline: TimelineConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Regex over vault-relative paths; matching files are not scanned
    #[serde(default)]
    pub exclude: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Inline field dialect used when writing tasks back
    #[serde(default)]
    pub field_format: FieldFormat,
}

/// Where daily notes live and how their file names encode the date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyNoteConfig {
    /// Folder relative to the vault root (empty = anywhere)
    #[serde(default)]
    pub folder: String,
    /// chrono format string for the file stem
    #[serde(default = "default_daily_format")]
    pub format: String,
}

impl Default for DailyNoteConfig {
    fn default() -> Self {
        DailyNoteConfig {
            folder: String::new(),
            format: default_daily_format(),
        }
    }
}

fn default_daily_format() -> String {
    "%Y-%m-%d".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimelineConfig {
    /// Stretch length-less blocks to the next block
    #[serde(default)]
    pub extend_blocks: bool,
    /// Keep completed tasks visible on the current day
    #[serde(default)]
    pub show_completed: bool,
}
