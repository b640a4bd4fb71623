//! Ingestion configuration types
//!
//! A run is described by a recipe file naming a source and a sink:
//!
//! ```yaml
//! source:
//!   type: ravendb
//!   config:
//!     connect_uri: "http://localhost:8080"
//!     collection_pattern:
//!       deny: ["^Temp"]
//!     schema_sampling_size: 500
//! sink:
//!   type: file
//!   config:
//!     filename: "./ravendb_mces.json"
//! ```

use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::emitter::MetadataEmitter;
use crate::inference::InferenceConfig;
use crate::sampling::{SampleLimit, Sampler, SamplingPolicy};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse recipe: {0}")]
    Parse(String),

    #[error("Unsupported recipe format: {0} (expected .yml, .yaml or .toml)")]
    UnsupportedFormat(PathBuf),

    #[error("Missing required setting: {0}")]
    Missing(String),

    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Regex allow/deny lists
///
/// A name passes when no deny pattern and at least one allow pattern match.
/// Patterns match at the start of the name; add `$` to match it entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AllowDenyPattern {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
    pub ignore_case: bool,
}

impl Default for AllowDenyPattern {
    fn default() -> Self {
        Self::allow_all()
    }
}

impl AllowDenyPattern {
    pub fn allow_all() -> Self {
        Self {
            allow: vec![".*".to_string()],
            deny: Vec::new(),
            ignore_case: true,
        }
    }

    pub fn with_allow(mut self, patterns: &[&str]) -> Self {
        self.allow = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_deny(mut self, patterns: &[&str]) -> Self {
        self.deny = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    /// Compile the patterns, failing on the first invalid one
    pub fn compile(&self) -> Result<PatternFilter, ConfigError> {
        let build = |patterns: &[String]| -> Result<Vec<Regex>, ConfigError> {
            patterns
                .iter()
                .map(|pattern| {
                    RegexBuilder::new(&format!("^(?:{})", pattern))
                        .case_insensitive(self.ignore_case)
                        .build()
                        .map_err(|source| ConfigError::InvalidPattern {
                            pattern: pattern.clone(),
                            source,
                        })
                })
                .collect()
        };
        Ok(PatternFilter {
            allow: build(&self.allow)?,
            deny: build(&self.deny)?,
        })
    }
}

/// Compiled [`AllowDenyPattern`]
#[derive(Debug, Clone)]
pub struct PatternFilter {
    allow: Vec<Regex>,
    deny: Vec<Regex>,
}

impl PatternFilter {
    pub fn allowed(&self, name: &str) -> bool {
        !self.deny.iter().any(|re| re.is_match(name))
            && self.allow.iter().any(|re| re.is_match(name))
    }
}

/// RavenDB source configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RavenDbConfig {
    /// Server URL, e.g. `http://localhost:8080`
    pub connect_uri: String,
    pub database_pattern: AllowDenyPattern,
    pub collection_pattern: AllowDenyPattern,
    pub enable_schema_inference: bool,
    /// Documents sampled per collection; `0` scans all documents
    pub schema_sampling_size: usize,
    pub sampling_policy: SamplingPolicy,
    pub sampling_seed: Option<u64>,
    pub remove_metadata_from_schema: bool,
    pub max_schema_size: usize,
    pub max_depth: usize,
    pub env: String,
    pub certificate_file_path: Option<PathBuf>,
    pub trust_store_file_path: Option<PathBuf>,
    pub request_timeout_secs: u64,
    pub max_concurrent_collections: usize,
}

impl Default for RavenDbConfig {
    fn default() -> Self {
        Self {
            connect_uri: String::new(),
            database_pattern: AllowDenyPattern::allow_all(),
            collection_pattern: AllowDenyPattern::allow_all(),
            enable_schema_inference: true,
            schema_sampling_size: 1000,
            sampling_policy: SamplingPolicy::Head,
            sampling_seed: None,
            remove_metadata_from_schema: true,
            max_schema_size: 300,
            max_depth: 10,
            env: "PROD".to_string(),
            certificate_file_path: None,
            trust_store_file_path: None,
            request_timeout_secs: 30,
            max_concurrent_collections: 4,
        }
    }
}

impl RavenDbConfig {
    pub fn new(connect_uri: impl Into<String>) -> Self {
        Self {
            connect_uri: connect_uri.into(),
            ..Default::default()
        }
    }

    pub fn with_collection_pattern(mut self, pattern: AllowDenyPattern) -> Self {
        self.collection_pattern = pattern;
        self
    }

    pub fn with_database_pattern(mut self, pattern: AllowDenyPattern) -> Self {
        self.database_pattern = pattern;
        self
    }

    pub fn with_sampling(mut self, size: usize, policy: SamplingPolicy) -> Self {
        self.schema_sampling_size = size;
        self.sampling_policy = policy;
        self
    }

    pub fn with_sampling_seed(mut self, seed: u64) -> Self {
        self.sampling_seed = Some(seed);
        self
    }

    pub fn with_schema_inference(mut self, enabled: bool) -> Self {
        self.enable_schema_inference = enabled;
        self
    }

    pub fn with_max_schema_size(mut self, size: usize) -> Self {
        self.max_schema_size = size;
        self
    }

    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = env.into();
        self
    }

    pub fn with_max_concurrent_collections(mut self, n: usize) -> Self {
        self.max_concurrent_collections = n;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connect_uri.trim().is_empty() {
            return Err(ConfigError::Missing("connect_uri".to_string()));
        }
        if !(self.connect_uri.starts_with("http://") || self.connect_uri.starts_with("https://"))
        {
            return Err(ConfigError::Invalid(format!(
                "connect_uri must start with http:// or https://, got '{}'",
                self.connect_uri
            )));
        }
        if self.max_schema_size == 0 {
            return Err(ConfigError::Invalid(
                "max_schema_size must be positive".to_string(),
            ));
        }
        if self.max_concurrent_collections == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_collections must be positive".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        self.database_pattern.compile()?;
        self.collection_pattern.compile()?;
        Ok(())
    }

    pub fn inference_config(&self) -> InferenceConfig {
        InferenceConfig::builder()
            .max_depth(self.max_depth)
            .remove_metadata(self.remove_metadata_from_schema)
            .build()
    }

    pub fn sample_limit(&self) -> SampleLimit {
        SampleLimit::from_config(self.schema_sampling_size)
    }

    pub fn sampler(&self) -> Sampler {
        Sampler::new(self.sampling_policy).with_seed(self.sampling_seed)
    }

    pub fn emitter(&self) -> MetadataEmitter {
        MetadataEmitter::new(self.env.clone()).with_max_schema_size(Some(self.max_schema_size))
    }

    #[cfg(feature = "http-client")]
    pub fn connection_settings(&self) -> crate::source::ConnectionSettings {
        let mut settings = crate::source::ConnectionSettings::new(self.connect_uri.clone())
            .with_timeout(self.request_timeout_secs);
        if let Some(path) = &self.certificate_file_path {
            settings = settings.with_certificate(path);
        }
        if let Some(path) = &self.trust_store_file_path {
            settings = settings.with_trust_store(path);
        }
        settings
    }
}

/// Source section of a recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub config: RavenDbConfig,
}

/// Sink section of a recipe
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "lowercase")]
pub enum SinkSpec {
    /// Pretty JSON array written to a file
    File { filename: PathBuf },
    /// Pretty JSON array printed to stdout
    #[default]
    Console,
}

/// A complete run description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub source: SourceSpec,
    #[serde(default)]
    pub sink: SinkSpec,
}

impl Recipe {
    /// Load a recipe; the format follows the file extension
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let recipe = match path.extension().and_then(|e| e.to_str()) {
            Some("yml" | "yaml") => Self::from_yaml_str(&content)?,
            Some("toml") => Self::from_toml_str(&content)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };
        Ok(recipe)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let recipe: Recipe =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        recipe.validate()?;
        Ok(recipe)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let recipe: Recipe =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        recipe.validate()?;
        Ok(recipe)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.source.kind.eq_ignore_ascii_case("ravendb") {
            return Err(ConfigError::Invalid(format!(
                "unknown source type '{}'",
                self.source.kind
            )));
        }
        self.source.config.validate()
    }
}
