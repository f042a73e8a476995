//! Interpreter configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Property keys read from scene nodes, before prefixing.
pub const WEIGHT_KEY: &str = "weight";
pub const LINK_KEY: &str = "link";
pub const INSTANCE_KEY: &str = "instance";

/// Errors raised while loading an [`InterpretConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid interpreter config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings for one generation run.
///
/// Missing fields take their defaults, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpretConfig {
    /// Prefix for custom node properties: links are tagged `<prefix>_link`.
    pub property_prefix: String,
    /// Seed for a fresh random stream.
    pub seed: u64,
    /// Maximum nesting of instance expansion (definitions and leaf
    /// instancers). Deeper requests are treated as misses.
    pub max_depth: usize,
    /// Remove the start link's children before generating.
    pub clear_children: bool,
    /// Record cursor-precondition violations as errors. When off they are
    /// logged and skipped.
    pub strict: bool,
}

impl Default for InterpretConfig {
    fn default() -> Self {
        Self {
            property_prefix: "gen".to_string(),
            seed: 0,
            max_depth: 10,
            clear_children: false,
            strict: true,
        }
    }
}

impl InterpretConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.property_prefix = prefix.into();
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_clear_children(mut self, clear: bool) -> Self {
        self.clear_children = clear;
        self
    }

    /// Full property key: `<prefix>_<key>`, or just `key` without a prefix.
    pub fn property_key(&self, key: &str) -> String {
        if self.property_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}_{}", self.property_prefix, key)
        }
    }
}
