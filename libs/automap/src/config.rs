use serde::Deserialize;

use crate::error::MapError;

/// Mapper configuration, parsed from TOML.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapperConfig {
    /// Install the timestamp / uuid identity routes on first registration.
    #[serde(default = "default_builtin_routes")]
    pub builtin_routes: bool,

    /// Maximum nesting of route calls and struct descents per dispatch.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_builtin_routes() -> bool {
    true
}

fn default_max_depth() -> usize {
    64
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            builtin_routes: default_builtin_routes(),
            max_depth: default_max_depth(),
        }
    }
}

impl MapperConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, MapError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| MapError::Config(format!("{path}: {e}")))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, MapError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| MapError::Config(e.to_string()))?;
        if config.max_depth == 0 {
            return Err(MapError::Config("max_depth must be at least 1".to_string()));
        }
        Ok(config)
    }
}
