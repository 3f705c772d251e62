//! Optional TOML configuration file
//!
//! Values from the file fill in whatever the command line left unset;
//! explicit flags and environment variables always win.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub ws_port: Option<u16>,
    pub bind: Option<String>,
    pub log_level: Option<String>,
    pub debounce_ms: Option<u64>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }
}
