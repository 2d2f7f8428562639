//! Dispatch configuration, read from the `[dispatch]` section of `lumen.toml`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid dispatch config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Consult and fill the per-map absence cache on cacheable events.
    pub absence_cache: bool,
    /// Maximum nesting of calls made through the VM call primitive.
    pub max_call_depth: usize,
    /// Maximum number of evaluation stack slots.
    pub max_stack_slots: usize,
    /// Maximum hops followed along an `__index` / `__newindex` chain.
    pub max_tag_loop: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            absence_cache: true,
            max_call_depth: 200,
            max_stack_slots: 1_000_000,
            max_tag_loop: 2000,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    dispatch: DispatchConfig,
}

impl DispatchConfig {
    /// Parse a TOML document. Missing keys (or a missing `[dispatch]`
    /// section) take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(s)?;
        file.dispatch.validate()?;
        Ok(file.dispatch)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_call_depth == 0 {
            return Err(ConfigError::Invalid("max_call_depth must be positive".into()));
        }
        // A handler frame needs the function, three operands and one extra argument.
        if self.max_stack_slots < 5 {
            return Err(ConfigError::Invalid(
                "max_stack_slots must be at least 5".into(),
            ));
        }
        if self.max_tag_loop == 0 {
            return Err(ConfigError::Invalid("max_tag_loop must be positive".into()));
        }
        Ok(())
    }

    pub fn default_template() -> &'static str {
        r#"# Lumen dispatch configuration

[dispatch]
# Remember events a handler map lacks; later bindings for those events
# may go unnoticed until the map's cache is cleared.
absence_cache = true
max_call_depth = 200
max_stack_slots = 1000000
max_tag_loop = 2000
"#
    }
}
