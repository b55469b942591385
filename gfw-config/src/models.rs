use std::path::{Path, PathBuf};
use std::time::Duration;

use gfw_core::{StabilityPolicy, TenantConfig};
use serde::{Deserialize, Serialize};

/// Default location of the record store, relative to the working directory.
pub const DEFAULT_DATABASE_PATH: &str = "./filewatcher.db";

/// Fully parsed service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub tenants: Vec<TenantConfig>,
    pub database: DatabaseConfig,
    pub stability: StabilitySettings,
}

impl Config {
    /// Anchor every relative tenant directory and the database path at
    /// `base`. Record keys are built from `watch_dir`, so this has to happen
    /// before anything touches the store.
    pub fn resolve_paths(&mut self, base: &Path) {
        for tenant in &mut self.tenants {
            tenant.watch_dir = anchor(base, &tenant.watch_dir);
            tenant.dest_dir = anchor(base, &tenant.dest_dir);
        }
        self.database.path = anchor(base, &self.database.path);
    }

    pub fn tenant(&self, name: &str) -> Option<&TenantConfig> {
        self.tenants.iter().find(|t| t.name == name)
    }
}

fn anchor(base: &Path, path: &Path) -> PathBuf {
    if path.as_os_str().is_empty() || path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path.strip_prefix(".").unwrap_or(path))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATABASE_PATH),
        }
    }
}

/// Stabilization timing in milliseconds, as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StabilitySettings {
    pub poll_interval_ms: u64,
    pub stable_for_ms: u64,
    pub max_wait_ms: u64,
}

impl Default for StabilitySettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            stable_for_ms: 3_000,
            max_wait_ms: 120_000,
        }
    }
}

impl From<StabilitySettings> for StabilityPolicy {
    fn from(settings: StabilitySettings) -> Self {
        StabilityPolicy {
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            stable_for: Duration::from_millis(settings.stable_for_ms),
            max_wait: Duration::from_millis(settings.max_wait_ms),
        }
    }
}
