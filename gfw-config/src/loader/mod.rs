pub mod error;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::models::Config;
use crate::validation::{self, ConfigWarnings};
use error::ConfigLoadError;

/// Config file used when no explicit path is given.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Default, Clone)]
struct ConfigLoaderOptions {
    config_path: Option<PathBuf>,
    /// Directory relative paths are resolved against. Defaults to the
    /// process working directory.
    base_dir: Option<PathBuf>,
}

/// A validated configuration and the non-fatal findings collected on the way.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
    pub path: PathBuf,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_base_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.options.base_dir = Some(dir.into());
        self
    }

    /// Read, parse, anchor and validate the config file. Warnings are logged
    /// and returned; guard-rail violations are errors.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let path = self
            .options
            .config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        if !path.exists() {
            return Err(ConfigLoadError::MissingConfig { path });
        }

        let contents = fs::read_to_string(&path).map_err(|source| {
            ConfigLoadError::Io {
                path: path.clone(),
                source,
            }
        })?;
        let mut config = Self::parse_str(&contents, &path)?;

        let base = match &self.options.base_dir {
            Some(dir) => dir.clone(),
            None => env::current_dir()
                .map_err(|source| ConfigLoadError::WorkingDirectory { source })?,
        };
        config.resolve_paths(&base);

        let warnings = validation::apply_guard_rails(&config)?;
        for warning in &warnings.items {
            match &warning.hint {
                Some(hint) => warn!(hint = %hint, "{}", warning.message),
                None => warn!("{}", warning.message),
            }
        }
        debug!(
            path = %path.display(),
            tenants = config.tenants.len(),
            "configuration loaded"
        );

        Ok(ConfigLoad {
            config,
            warnings,
            path,
        })
    }

    /// Parse a YAML document without touching the filesystem. `origin` only
    /// labels errors.
    pub fn parse_str(
        contents: &str,
        origin: &Path,
    ) -> Result<Config, ConfigLoadError> {
        // An empty file is a valid, all-defaults config.
        if contents.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(contents).map_err(|source| ConfigLoadError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }
}
