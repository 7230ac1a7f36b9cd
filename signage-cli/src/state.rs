use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use signage_core::{Directory, SlotStore, ZoneModel};
use signage_sync::SyncClient;

/// `$SIGNAGE_HOME`, or `~/.signage`.
pub fn signage_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("SIGNAGE_HOME").filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".signage"))
}

pub fn ensure_signage_home() -> Result<PathBuf> {
    let dir = signage_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Everything a session keeps between invocations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub store: SlotStore,
    #[serde(default)]
    pub zones: ZoneModel,
    #[serde(default)]
    pub sync: SyncClient,
}

pub fn state_path() -> Result<PathBuf> {
    Ok(ensure_signage_home()?.join("state.json"))
}

pub fn directory_path() -> Result<PathBuf> {
    Ok(ensure_signage_home()?.join("directory.json"))
}

pub fn load_state() -> Result<SessionState> {
    read_state(&state_path()?)
}

pub fn save_state(state: &SessionState) -> Result<()> {
    write_state(&state_path()?, state)
}

pub fn read_state(path: &Path) -> Result<SessionState> {
    if !path.exists() {
        return Ok(SessionState::default());
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

pub fn write_state(path: &Path, state: &SessionState) -> Result<()> {
    let json = serde_json::to_string_pretty(state).context("serialize state")?;
    fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn load_directory() -> Result<Directory> {
    let p = directory_path()?;
    if !p.exists() {
        bail!(
            "No directory at {}. Export screens and playlists there first.",
            p.display()
        );
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))
}
