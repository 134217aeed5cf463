use std::path::PathBuf;

use anyhow::{Context, Result};

pub struct Config {
    pub base_url: String,

    /// Where the session token and user are kept between runs.
    pub state_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("BACKUPMONITOR_URL").context("BACKUPMONITOR_URL missing")?;
        let state_dir = std::env::var_os("BACKUPMONITOR_STATE_DIR")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".backupmonitor"))
            })
            .unwrap_or_else(|| PathBuf::from(".backupmonitor"));
        Ok(Self {
            base_url,
            state_dir,
        })
    }
}
