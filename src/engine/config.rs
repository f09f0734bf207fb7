//! Engine settings, loaded from TOML at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::engine::error::ConfigError;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineSettings {
    /// Side length of the square board.
    pub board_size: i32,
    /// Pause between a combat resolution and the next stack drain.
    pub combat_delay_ms: u64,
    /// Per-turn time budget reported to clients.
    pub turn_timer_secs: u32,
    /// Seed for corner draws and first-player selection. Random when absent.
    pub random_seed: Option<u64>,
    /// Leaving a running game hands the win to the remaining player.
    pub forfeit_on_leave: bool,
    /// Tribe catalog file.
    pub catalog: PathBuf,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            board_size: 6,
            combat_delay_ms: 5000,
            turn_timer_secs: 30,
            random_seed: None,
            forfeit_on_leave: false,
            catalog: PathBuf::from("data/tribes.toml"),
        }
    }
}

impl EngineSettings {
    pub fn combat_delay(&self) -> Duration {
        Duration::from_millis(self.combat_delay_ms)
    }
}

/// Load settings from a TOML file at the given path.
pub fn load_settings(path: &Path) -> Result<EngineSettings, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Try to load settings from well-known paths, returning defaults if none found.
pub fn load_default_settings() -> EngineSettings {
    let candidates = ["zoondo.toml", "../zoondo.toml", "/etc/zoondo/zoondo.toml"];
    for path in &candidates {
        let p = Path::new(path);
        if p.exists() {
            match load_settings(p) {
                Ok(settings) => {
                    tracing::info!(path = %p.display(), "loaded engine settings");
                    return settings;
                }
                Err(e) => {
                    tracing::warn!(path = %p.display(), error = %e, "failed to load engine settings");
                }
            }
        }
    }
    tracing::info!("no zoondo.toml found, using built-in defaults");
    EngineSettings::default()
}
