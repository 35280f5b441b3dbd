//! Runtime settings, read from a TOML file.
//!
//! Every section and key is optional. A missing file gives the defaults.
use crate::{util, Result};
use qu::ick_use::*;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Where the tools look for their settings when `--config` isn't given.
pub const DEFAULT_CONFIG_PATH: &str = "../data/hms.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub analysis: AnalysisConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// The record file.
    pub path: PathBuf,
    /// Used when the store has to create or rewrite the record file.
    pub delimiter: char,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            path: "../data/patient_records.csv".into(),
            delimiter: ',',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Moving-average and growth-rate window, in data points.
    pub trend_window: usize,
    pub top_localities: usize,
    pub forecast_days: usize,
    /// How far back a disease case counts as recent.
    pub recent_days: i64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            trend_window: 7,
            top_localities: 10,
            forecast_days: 7,
            recent_days: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            dir: "../data/reports".into(),
        }
    }
}

impl Config {
    /// Load settings from `path`, or the defaults if there is no file there.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        fn inner(path: &Path) -> Result<Config> {
            if !util::path_exists(path)? {
                event!(
                    Level::DEBUG,
                    "no config at \"{}\", using defaults",
                    path.display()
                );
                return Ok(Config::default());
            }
            let text = fs::read_to_string(path)?;
            let config: Config = toml::from_str(&text)?;
            config.validate()?;
            Ok(config)
        }
        let path = path.as_ref();
        inner(path).with_context(|| format!("loading config \"{}\"", path.display()))
    }

    fn validate(&self) -> Result {
        ensure!(
            self.store.delimiter.is_ascii(),
            "store delimiter must be a single ASCII character, found {:?}",
            self.store.delimiter
        );
        ensure!(
            self.analysis.trend_window > 0,
            "analysis.trend_window must be at least 1"
        );
        ensure!(
            self.analysis.recent_days >= 0,
            "analysis.recent_days must not be negative"
        );
        Ok(())
    }

    /// The store delimiter as a byte. Validated on load, so non-ASCII only gets here if the
    /// struct was built by hand, in which case we fall back to a comma.
    pub fn delimiter(&self) -> u8 {
        u8::try_from(self.store.delimiter).unwrap_or(b',')
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("hms.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.analysis.trend_window, 7);
        assert_eq!(config.delimiter(), b',');
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hms.toml");
        fs::write(
            &path,
            "[store]\npath = \"records.tsv\"\ndelimiter = \"\\t\"\n\n[analysis]\ntop_localities = 3\n",
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.store.path, PathBuf::from("records.tsv"));
        assert_eq!(config.delimiter(), b'\t');
        assert_eq!(config.analysis.top_localities, 3);
        assert_eq!(config.analysis.forecast_days, 7);
        assert_eq!(config.export, ExportConfig::default());
    }

    #[test]
    fn bad_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hms.toml");
        fs::write(&path, "[analysis]\ntrend_window = 0\n").unwrap();
        assert!(Config::load(&path).is_err());
        fs::write(&path, "[store]\ndelimiter = \"é\"\n").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
