//! Configuration loaded from YAML.
//!
//! ```yaml
//! logger:
//!   level: debug
//!   format: json
//! aggregator:
//!   vocabulary_token: "DCAT-AP profile"
//!   can_modify: true
//!   can_add_entities: true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{aggregator::ProfileAggregatorConfig, logger, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logger: logger::Config,
    pub aggregator: AggregatorSettings,
}

/// Capabilities and provenance token of an application profile aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorSettings {
    pub vocabulary_token: String,
    pub can_modify: bool,
    pub can_add_entities: bool,
    pub allow_only_profiled_entities: bool,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            vocabulary_token: String::from("application profile"),
            can_modify: true,
            can_add_entities: true,
            allow_only_profiled_entities: false,
        }
    }
}

impl From<&AggregatorSettings> for ProfileAggregatorConfig {
    fn from(settings: &AggregatorSettings) -> Self {
        Self {
            vocabulary_token: settings.vocabulary_token.clone(),
            can_modify: settings.can_modify,
            can_add_entities: settings.can_add_entities,
            allow_only_profiled_entities: settings.allow_only_profiled_entities,
        }
    }
}

impl Config {
    /// Parses configuration from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Reads and parses a YAML configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    #[must_use]
    pub fn profile_aggregator(&self) -> ProfileAggregatorConfig {
        ProfileAggregatorConfig::from(&self.aggregator)
    }
}
