use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use signage_sync::DEFAULT_CHUNK_SIZE;

use crate::state::ensure_signage_home;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub schedule: ScheduleSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// WebSocket endpoint of the "schedule" channel.
    pub url: String,
    pub response_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSection {
    /// Branches every push and pull is scoped to.
    pub branch_ids: Vec<String>,
    pub chunk_size: usize,
    /// IANA zone used to resolve "today".
    pub timezone: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080/schedule".to_string(),
            response_timeout_secs: 15,
        }
    }
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            branch_ids: Vec::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            timezone: "UTC".to_string(),
        }
    }
}

impl ServerSection {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs.max(1))
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_signage_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).context("parse config.toml")
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}
