use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::anomaly::{AnomalyConfig, AnomalySettings};

/// On-disk settings: `$STREAMRANK_HOME/config.toml`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub anomaly: AnomalySettings,
    #[serde(default)]
    pub detector: DetectorSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorSettings {
    /// Streams scored in parallel per ranking run.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// How long a fetch may wait on a locked database.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_workers() -> usize {
    4
}
fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Config {
    /// Load config from the standard path, or return defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::path();
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to the standard path.
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))?;
            }
        }
        let contents = toml::to_string_pretty(self)?;

        #[cfg(unix)]
        {
            use std::fs::OpenOptions;
            use std::io::Write;
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&path)?;
            file.write_all(contents.as_bytes())?;

            // mode() only applies on creation
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }
        #[cfg(not(unix))]
        {
            std::fs::write(&path, contents)?;
        }

        Ok(())
    }

    /// The static detection config, before any stored overrides.
    pub fn anomaly_config(&self) -> anyhow::Result<AnomalyConfig> {
        Ok(self.anomaly.clone().build()?)
    }

    pub fn data_dir() -> PathBuf {
        if let Ok(home) = std::env::var("STREAMRANK_HOME") {
            return PathBuf::from(home);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".streamrank")
    }

    pub fn path() -> PathBuf {
        Self::data_dir().join("config.toml")
    }

    pub fn db_path() -> PathBuf {
        Self::data_dir().join("streams.db")
    }
}
