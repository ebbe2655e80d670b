//! Configuration management for mend
//!
//! Stores settings in ~/.config/mend/config.json

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Concurrent fix workers
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Cap on fixes applied in one run; None means unlimited
    #[serde(default)]
    pub max_fixes_per_run: Option<usize>,
    /// Wall-clock budget per file batch, in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_lines_per_file")]
    pub max_lines_per_file: usize,
    #[serde(default = "default_max_functions_per_file")]
    pub max_functions_per_file: usize,
    #[serde(default = "default_max_classes_per_file")]
    pub max_classes_per_file: usize,
    #[serde(default = "default_max_cyclomatic_complexity")]
    pub max_cyclomatic_complexity: u32,
    #[serde(default = "default_max_file_size_bytes")]
    pub max_file_size_bytes: usize,
    /// Files longer than this (in chars) are skipped rather than fixed
    #[serde(default = "default_max_fix_file_chars")]
    pub max_fix_file_chars: usize,
    /// Consult the model for split decisions on oversized files
    #[serde(default = "default_use_ai_analysis")]
    pub use_ai_analysis: bool,
    /// Minimum confidence for an AI verdict to override the rules
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Snapshot files before their first mutation in a session
    #[serde(default = "default_create_backups")]
    pub create_backups: bool,
    /// Re-parse every split component before accepting a split
    #[serde(default = "default_validate_splits")]
    pub validate_splits: bool,
}

fn default_max_workers() -> usize {
    4
}

fn default_timeout_seconds() -> u64 {
    200
}

fn default_max_lines_per_file() -> usize {
    200
}

fn default_max_functions_per_file() -> usize {
    15
}

fn default_max_classes_per_file() -> usize {
    10
}

fn default_max_cyclomatic_complexity() -> u32 {
    10
}

fn default_max_file_size_bytes() -> usize {
    50_000
}

fn default_max_fix_file_chars() -> usize {
    20_000
}

fn default_use_ai_analysis() -> bool {
    true
}

fn default_confidence_threshold() -> f64 {
    0.7
}

fn default_create_backups() -> bool {
    true
}

fn default_validate_splits() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            max_fixes_per_run: None,
            timeout_seconds: default_timeout_seconds(),
            max_lines_per_file: default_max_lines_per_file(),
            max_functions_per_file: default_max_functions_per_file(),
            max_classes_per_file: default_max_classes_per_file(),
            max_cyclomatic_complexity: default_max_cyclomatic_complexity(),
            max_file_size_bytes: default_max_file_size_bytes(),
            max_fix_file_chars: default_max_fix_file_chars(),
            use_ai_analysis: default_use_ai_analysis(),
            confidence_threshold: default_confidence_threshold(),
            create_backups: default_create_backups(),
            validate_splits: default_validate_splits(),
        }
    }
}

impl Config {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("mend"))
    }

    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk, or return default
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if let Ok(content) = fs::read_to_string(&path) {
                match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(err) => {
                        preserve_corrupt_config(&path, &content);
                        eprintln!(
                            "  Warning: Config file was corrupted ({}). A backup was saved and defaults were loaded.",
                            err
                        );
                    }
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit file
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

}

fn preserve_corrupt_config(path: &std::path::Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}
