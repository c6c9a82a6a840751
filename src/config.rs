//! Scan configuration
//!
//! All settings have defaults, so a JSON configuration only needs the values
//! it overrides:
//!
//! ```
//! use xsltxss::ScanConfig;
//!
//! let config = ScanConfig::from_json_str(r#"{"seed": 7, "values": {"fresh_value_probability": 0.5}}"#).unwrap();
//! assert_eq!(config.seed, 7);
//! assert_eq!(config.iterations, ScanConfig::default().iterations);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analyzer::AnalyzerConfig;
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::request::{GeneratorConfig, RawContentMode};
use crate::values::ValueConfig;

/// Configuration of one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Seed of plan generation. Iteration `i` uses `seed + i`.
    pub seed: u64,
    /// Number of generated plans
    pub iterations: usize,
    /// Timeout of one transform call in milliseconds
    pub transform_timeout_ms: u64,
    /// Confirmation cycles running at the same time
    pub max_concurrent_confirmations: usize,
    /// Whether mixed content may carry synthesized markup
    pub content_mode: RawContentMode,
    /// Plan generation
    pub generator: GeneratorConfig,
    /// Value synthesis
    pub values: ValueConfig,
    /// Analyzer rules
    pub analyzer: AnalyzerConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            iterations: 100,
            transform_timeout_ms: 10_000,
            max_concurrent_confirmations: 4,
            content_mode: RawContentMode::Full,
            generator: GeneratorConfig::default(),
            values: ValueConfig::default(),
            analyzer: AnalyzerConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ScanConfig = serde_json::from_str(json)?;
        config.check()?;
        Ok(config)
    }

    /// Read a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Reject settings a scan cannot run with
    pub fn check(&self) -> Result<()> {
        if self.max_concurrent_confirmations == 0 {
            return Err(Error::Other(
                "max_concurrent_confirmations must be at least 1".to_string(),
            ));
        }
        if self.transform_timeout_ms == 0 {
            return Err(Error::Other("transform_timeout_ms must be positive".to_string()));
        }
        for (name, p) in [
            (
                "optional_attribute_probability",
                self.generator.optional_attribute_probability,
            ),
            ("raw_content_probability", self.generator.raw_content_probability),
            ("fresh_value_probability", self.values.fresh_value_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::Other(format!("{} must be within [0, 1], got {}", name, p)));
            }
        }
        Ok(())
    }

    /// Set the seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the number of iterations
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the transform timeout
    pub fn with_transform_timeout(mut self, timeout: Duration) -> Self {
        self.transform_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the confirmation concurrency
    pub fn with_max_concurrent_confirmations(mut self, max: usize) -> Self {
        self.max_concurrent_confirmations = max;
        self
    }

    /// Set the content mode
    pub fn with_content_mode(mut self, mode: RawContentMode) -> Self {
        self.content_mode = mode;
        self
    }

    /// Set the generator configuration
    pub fn with_generator(mut self, generator: GeneratorConfig) -> Self {
        self.generator = generator;
        self
    }

    /// Set the value configuration
    pub fn with_values(mut self, values: ValueConfig) -> Self {
        self.values = values;
        self
    }

    /// Set the analyzer configuration
    pub fn with_analyzer(mut self, analyzer: AnalyzerConfig) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Transform timeout as a duration
    pub fn transform_timeout(&self) -> Duration {
        Duration::from_millis(self.transform_timeout_ms)
    }

    /// Generation and size limits
    pub fn limits(&self) -> &Limits {
        &self.generator.limits
    }
}
