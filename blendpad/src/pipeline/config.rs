// Session settings, read once on startup from <project_dir>/.blendpad/config.json.
// Nothing is written back; patterns always start from the corner presets.
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::presets::DEFAULT_CORNERS;
use super::transport::{clamp_bars, clamp_bpm};
use crate::shared::{
    DEFAULT_BARS, DEFAULT_BPM, DEFAULT_THRESHOLD, DEFAULT_VOLUME_DB, MAX_VOLUME_DB, MIN_VOLUME_DB, NUM_CORNERS,
};

const BLENDPAD_DIR: &str = ".blendpad";
const CONFIG_FILE: &str = "config.json";
const LOG_FILE: &str = "blendpad.log";
const EXPORT_FILE: &str = "blendpad-export.wav";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub bpm: f32,
    pub bars: u16,
    pub volume_db: f32,
    pub latent_endpoint: Option<String>,
    pub latent_timeout_ms: u64,
    pub corners: [String; NUM_CORNERS],
    pub noise: bool,
    pub threshold: f32,
    pub max_decode_failures: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            bars: DEFAULT_BARS,
            volume_db: DEFAULT_VOLUME_DB,
            latent_endpoint: None,
            latent_timeout_ms: 5000,
            corners: DEFAULT_CORNERS.map(String::from),
            noise: true,
            threshold: DEFAULT_THRESHOLD,
            max_decode_failures: None,
        }
    }
}

impl SessionConfig {
    /// Same limits the transport and mixer apply at runtime.
    pub fn clamped(mut self) -> Self {
        self.bpm = clamp_bpm(self.bpm);
        self.bars = clamp_bars(self.bars as i32);
        self.volume_db = if self.volume_db.is_nan() {
            DEFAULT_VOLUME_DB
        } else {
            self.volume_db.clamp(MIN_VOLUME_DB, MAX_VOLUME_DB)
        };
        self.threshold = if self.threshold.is_nan() {
            DEFAULT_THRESHOLD
        } else {
            self.threshold.clamp(0.0, 1.0)
        };
        self.latent_timeout_ms = self.latent_timeout_ms.max(1);
        self.max_decode_failures = self.max_decode_failures.filter(|&n| n > 0);
        self
    }

    pub fn latent_timeout(&self) -> Duration {
        Duration::from_millis(self.latent_timeout_ms)
    }
}

// <project_dir>/.blendpad/
pub fn blendpad_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(BLENDPAD_DIR)
}

pub fn config_file_path(project_dir: &Path) -> PathBuf {
    blendpad_dir(project_dir).join(CONFIG_FILE)
}

pub fn log_file_path(project_dir: &Path) -> PathBuf {
    blendpad_dir(project_dir).join(LOG_FILE)
}

pub fn export_file_path(project_dir: &Path) -> PathBuf {
    project_dir.join(EXPORT_FILE)
}

fn read_config(path: &Path) -> anyhow::Result<SessionConfig> {
    let data = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let cfg: SessionConfig = serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    Ok(cfg)
}

/// Missing or unreadable config means defaults; either way the result is clamped.
pub fn load_config(project_dir: &Path) -> SessionConfig {
    let path = config_file_path(project_dir);
    if !path.exists() {
        log::info!("no config at {}, using defaults", path.display());
        return SessionConfig::default();
    }
    match read_config(&path) {
        Ok(cfg) => {
            log::info!("loaded config from {}", path.display());
            cfg.clamped()
        }
        Err(e) => {
            log::warn!("{e:#}; using defaults");
            SessionConfig::default()
        }
    }
}
