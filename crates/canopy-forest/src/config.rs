use serde::{Deserialize, Serialize};

use crate::error::{ForestError, ForestResult};

/// Largest accepted `max_depth`.
///
/// Dropping, comparing or serializing a materialized tree recurses once per
/// level, so the read depth stays well inside a worker thread's stack.
pub const MAX_DEPTH_LIMIT: usize = 2_000;

/// Bounds applied by the forest engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Deepest level expanded on read. Top-level comments are level 1.
    pub max_depth: usize,
    /// Most comment records resolved by a single materialization.
    pub max_nodes: usize,
    /// Compare-and-swap attempts per parent append before giving up.
    pub max_append_retries: u32,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            max_depth: 200,
            max_nodes: 5000,
            max_append_retries: 64,
        }
    }
}

impl ForestConfig {
    /// Parse from TOML; absent keys take their defaults.
    pub fn from_toml_str(input: &str) -> ForestResult<Self> {
        let config: Self =
            toml::from_str(input).map_err(|e| ForestError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ForestResult<()> {
        if self.max_depth == 0 {
            return Err(ForestError::Config("max_depth must be at least 1".into()));
        }
        if self.max_depth > MAX_DEPTH_LIMIT {
            return Err(ForestError::Config(format!(
                "max_depth must be at most {MAX_DEPTH_LIMIT}"
            )));
        }
        if self.max_nodes == 0 {
            return Err(ForestError::Config("max_nodes must be at least 1".into()));
        }
        if self.max_append_retries == 0 {
            return Err(ForestError::Config(
                "max_append_retries must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ForestConfig::default();
        assert_eq!(c.max_depth, 200);
        assert_eq!(c.max_nodes, 5000);
        assert_eq!(c.max_append_retries, 64);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = ForestConfig::from_toml_str("max_depth = 12").unwrap();
        assert_eq!(c.max_depth, 12);
        assert_eq!(c.max_nodes, 5000);
    }

    #[test]
    fn zero_bounds_are_rejected() {
        let err = ForestConfig::from_toml_str("max_nodes = 0").unwrap_err();
        assert!(matches!(err, ForestError::Config(_)));
        assert!(ForestConfig::default().with_max_depth(0).validate().is_err());
    }

    #[test]
    fn depth_above_limit_is_rejected() {
        let at_limit = ForestConfig::default().with_max_depth(MAX_DEPTH_LIMIT);
        assert!(at_limit.validate().is_ok());

        let err = ForestConfig::from_toml_str("max_depth = 1000000").unwrap_err();
        assert!(matches!(err, ForestError::Config(_)));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = ForestConfig::from_toml_str("max_depth = \"deep\"").unwrap_err();
        assert!(matches!(err, ForestError::Config(_)));
    }
}
