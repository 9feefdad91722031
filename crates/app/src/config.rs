use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.toml";
pub const HISTORY_FILE: &str = "history.json";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "tally", "Tally")
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub output_currency: String,
    pub history_path: Option<PathBuf>,
    pub reversal_match_category: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_currency: "RUB".to_string(),
            history_path: None,
            reversal_match_category: false,
        }
    }
}

impl Config {
    /// Reads `path`, or the platform config file when none is given.
    /// Only the implicit location may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::read(path),
            None => match project_dirs().map(|d| d.config_dir().join(CONFIG_FILE)) {
                Some(p) if p.exists() => Self::read(&p),
                _ => Ok(Self::default()),
            },
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        toml::from_str(&s).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn history_path(&self) -> Result<PathBuf> {
        match &self.history_path {
            Some(p) => Ok(p.clone()),
            None => project_dirs()
                .map(|d| d.data_dir().join(HISTORY_FILE))
                .context("no home directory to keep history in; pass --history"),
        }
    }
}
