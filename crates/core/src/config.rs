use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::naming::NamingPolicy;

const DEFAULT_SORT_KEY: i64 = 0;
const DEFAULT_FALLBACK_NAME: &str = "Variation";
const DEFAULT_NEW_VARIATION_NAME: &str = "New variation";
const DEFAULT_MAX_VARIATIONS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VarsyncConfig {
    /// First sort key handed out when an aggregate has no records yet.
    pub default_sort_key: i64,
    /// Replaces proposed names containing non-portable characters.
    pub fallback_name: String,
    /// Display name given to variations added in a session.
    pub new_variation_name: String,
    /// Hard cap on a session's stub count: adding is refused once the
    /// session holds this many.
    pub max_variations: usize,
    /// Skip the lock check on updates, as an administrator would.
    pub elevated: bool,
    pub naming: NamingPolicy,
}

impl Default for VarsyncConfig {
    fn default() -> Self {
        Self {
            default_sort_key: DEFAULT_SORT_KEY,
            fallback_name: DEFAULT_FALLBACK_NAME.to_string(),
            new_variation_name: DEFAULT_NEW_VARIATION_NAME.to_string(),
            max_variations: DEFAULT_MAX_VARIATIONS,
            elevated: false,
            naming: NamingPolicy::default(),
        }
    }
}

impl VarsyncConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, CoreError> {
        toml::from_str(contents).map_err(|e| CoreError::Config(format!("failed to parse config: {e}")))
    }

    /// Load from `path` if it exists, defaults otherwise, then apply
    /// `VARSYNC_*` environment overrides.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)
                .map_err(|e| CoreError::Config(format!("failed to read {}: {e}", path.display())))?;
            toml::from_str(&contents)
                .map_err(|e| CoreError::Config(format!("failed to parse {}: {e}", path.display())))?
        } else {
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, CoreError> {
        toml::to_string_pretty(self).map_err(|e| CoreError::Config(format!("failed to render config: {e}")))
    }

    /// Overrides are read through `lookup` so tests need not touch the
    /// process environment.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("VARSYNC_DEFAULT_SORT_KEY") {
            match raw.parse() {
                Ok(key) => self.default_sort_key = key,
                Err(e) => tracing::warn!("ignoring VARSYNC_DEFAULT_SORT_KEY={raw}: {e}"),
            }
        }
        if let Some(raw) = lookup("VARSYNC_MAX_VARIATIONS") {
            match raw.parse() {
                Ok(max) => self.max_variations = max,
                Err(e) => tracing::warn!("ignoring VARSYNC_MAX_VARIATIONS={raw}: {e}"),
            }
        }
        if let Some(raw) = lookup("VARSYNC_ELEVATED") {
            self.elevated = matches!(raw.as_str(), "1" | "true" | "yes");
        }
        if let Some(name) = lookup("VARSYNC_FALLBACK_NAME") {
            self.fallback_name = name;
        }
    }
}
