//! Program-wide settings, read from `settings.toml` in the user's config folder.
//!
//! These apply to every model run on this machine, unlike the parameters in a model's
//! `model.toml`.
use crate::get_techmix_config_dir;
use crate::input::read_toml;
use crate::log::{DEFAULT_LOG_LEVEL, parse_log_level};
use anyhow::{Context, Result};
use documented::DocumentedFields;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};

const SETTINGS_FILE_NAME: &str = "settings.toml";

const DEFAULT_SETTINGS_FILE_HEADER: &str = "# Program settings for techmix
# Every setting is commented out and so takes its default value. Uncomment a line to change it.
";

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// Get the path to where the settings file will be read from
pub fn get_settings_file_path() -> PathBuf {
    get_techmix_config_dir().join(SETTINGS_FILE_NAME)
}

/// Program settings from config file
#[derive(Debug, DocumentedFields, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// The default program log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Whether to overwrite output files by default
    #[serde(default)]
    pub overwrite: bool,
    /// Whether to write every evaluated portfolio to an extra CSV file
    #[serde(default)]
    pub debug_model: bool,
    /// Number of threads used to evaluate candidate portfolios (0 for one per CPU core)
    #[serde(default)]
    pub num_threads: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            overwrite: false,
            debug_model: false,
            num_threads: 0,
        }
    }
}

impl Settings {
    /// Read the settings file, falling back on defaults if there isn't one
    pub fn load() -> Result<Settings> {
        Self::load_from_path(&get_settings_file_path())
    }

    fn load_from_path(file_path: &Path) -> Result<Settings> {
        if !file_path.is_file() {
            return Ok(Settings::default());
        }

        let settings: Settings = read_toml(file_path)?;
        parse_log_level(&settings.log_level)
            .with_context(|| format!("Invalid log_level in {}", file_path.display()))?;

        Ok(settings)
    }

    /// The contents of a placeholder settings file.
    ///
    /// Each setting appears with its default value, commented out, below its documentation.
    pub fn default_file_contents() -> Result<String> {
        let defaults = toml::to_string(&Settings::default())?;
        let mut out = DEFAULT_SETTINGS_FILE_HEADER.to_string();
        for line in defaults.lines() {
            let Some((field, _)) = line.split_once('=') else {
                continue;
            };

            let docs = Settings::get_field_docs(field.trim())
                .with_context(|| format!("No documentation for setting {field}"))?;
            writeln!(out)?;
            for doc_line in docs.lines() {
                writeln!(out, "# # {}", doc_line.trim())?;
            }
            writeln!(out, "# {line}")?;
        }

        Ok(out)
    }
}
