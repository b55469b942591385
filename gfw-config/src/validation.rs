use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::models::{Config, StabilitySettings};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigGuardRailError {
    #[error("tenant #{index} has an empty name")]
    EmptyTenantName { index: usize },
    #[error("tenant '{name}' is configured more than once")]
    DuplicateTenant { name: String },
    #[error("tenant '{tenant}' has an empty {field}")]
    EmptyDirectory {
        tenant: String,
        field: &'static str,
    },
    #[error("tenant '{tenant}' uses the same directory for watch_dir and dest_dir")]
    SameDirectory { tenant: String },
    #[error("stability.{field} must be greater than zero")]
    ZeroStabilityValue { field: &'static str },
    #[error("invalid stability settings: {reason}")]
    StabilityOrdering { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    if config.tenants.is_empty() {
        warnings.push_with_hint(
            "no tenants configured; the watcher will idle",
            "Add at least one entry under `tenants` with name, watch_dir and dest_dir",
        );
    }

    let mut seen = HashSet::new();
    let mut watch_owners: HashMap<_, Vec<&str>> = HashMap::new();
    for (index, tenant) in config.tenants.iter().enumerate() {
        let name = tenant.name.trim();
        if name.is_empty() {
            return Err(ConfigGuardRailError::EmptyTenantName { index });
        }
        if !seen.insert(name) {
            return Err(ConfigGuardRailError::DuplicateTenant {
                name: name.to_string(),
            });
        }
        if tenant.watch_dir.as_os_str().is_empty() {
            return Err(ConfigGuardRailError::EmptyDirectory {
                tenant: name.to_string(),
                field: "watch_dir",
            });
        }
        if tenant.dest_dir.as_os_str().is_empty() {
            return Err(ConfigGuardRailError::EmptyDirectory {
                tenant: name.to_string(),
                field: "dest_dir",
            });
        }
        // Copying a file onto itself truncates it.
        if tenant.watch_dir == tenant.dest_dir {
            return Err(ConfigGuardRailError::SameDirectory {
                tenant: name.to_string(),
            });
        }
        watch_owners
            .entry(tenant.watch_dir.as_path())
            .or_default()
            .push(name);
    }

    for (dir, owners) in watch_owners {
        if owners.len() > 1 {
            warnings.push(format!(
                "watch_dir {} is shared by tenants {}; each tenant copies every file",
                dir.display(),
                owners.join(", ")
            ));
        }
    }

    check_stability(&config.stability)?;

    Ok(warnings)
}

fn check_stability(
    settings: &StabilitySettings,
) -> Result<(), ConfigGuardRailError> {
    for (field, value) in [
        ("poll_interval_ms", settings.poll_interval_ms),
        ("stable_for_ms", settings.stable_for_ms),
        ("max_wait_ms", settings.max_wait_ms),
    ] {
        if value == 0 {
            return Err(ConfigGuardRailError::ZeroStabilityValue { field });
        }
    }

    if settings.stable_for_ms < settings.poll_interval_ms {
        return Err(ConfigGuardRailError::StabilityOrdering {
            reason: format!(
                "stable_for_ms ({}) is shorter than poll_interval_ms ({})",
                settings.stable_for_ms, settings.poll_interval_ms
            ),
        });
    }
    if settings.max_wait_ms < settings.stable_for_ms {
        return Err(ConfigGuardRailError::StabilityOrdering {
            reason: format!(
                "max_wait_ms ({}) is shorter than stable_for_ms ({})",
                settings.max_wait_ms, settings.stable_for_ms
            ),
        });
    }

    Ok(())
}
