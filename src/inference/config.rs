//! Configuration for schema inference

use serde::{Deserialize, Serialize};

/// Name of the per-document metadata object RavenDB attaches to every document
pub const METADATA_FIELD: &str = "@metadata";

/// Configuration for schema inference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfig {
    /// Maximum nesting depth to descend into; deeper values keep their type tag only
    pub max_depth: usize,

    /// Recognize ISO-8601 date and date-time strings as `datetime`
    pub detect_datetimes: bool,

    /// Skip the top-level `@metadata` object of every document
    pub remove_metadata: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            detect_datetimes: true,
            remove_metadata: true,
        }
    }
}

impl InferenceConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for custom configuration
    pub fn builder() -> InferenceConfigBuilder {
        InferenceConfigBuilder::default()
    }
}

/// Builder for InferenceConfig
#[derive(Debug, Default)]
pub struct InferenceConfigBuilder {
    config: InferenceConfig,
}

impl InferenceConfigBuilder {
    /// Set the maximum nesting depth (at least 1)
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth.max(1);
        self
    }

    /// Enable or disable datetime detection
    pub fn detect_datetimes(mut self, detect: bool) -> Self {
        self.config.detect_datetimes = detect;
        self
    }

    /// Keep or drop the `@metadata` object
    pub fn remove_metadata(mut self, remove: bool) -> Self {
        self.config.remove_metadata = remove;
        self
    }

    /// Build the configuration
    pub fn build(self) -> InferenceConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = InferenceConfig::default();
        assert_eq!(config.max_depth, 10);
        assert!(config.detect_datetimes);
        assert!(config.remove_metadata);
    }

    #[test]
    fn test_builder() {
        let config = InferenceConfig::builder()
            .max_depth(3)
            .detect_datetimes(false)
            .remove_metadata(false)
            .build();

        assert_eq!(config.max_depth, 3);
        assert!(!config.detect_datetimes);
        assert!(!config.remove_metadata);
    }

    #[test]
    fn test_depth_clamping() {
        let config = InferenceConfig::builder().max_depth(0).build();
        assert_eq!(config.max_depth, 1);
    }
}
