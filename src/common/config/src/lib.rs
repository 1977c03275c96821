//! Configuration management for Basket.
//!
//! Provides runtime configuration for the pipeline: execution resources
//! and input/output locations. Values can come from a JSON file, with
//! command-line flags layered on top by the caller.

use std::path::Path;

use serde::{Deserialize, Serialize};

use common_error::BasketResult;

/// Global pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    /// Execution configuration.
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Input/output configuration.
    #[serde(default)]
    pub io: IoConfig,
}

impl PipelineConfig {
    /// Load configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> BasketResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        Ok(config)
    }
}

/// Execution resource configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutionConfig {
    /// Number of parallel workers for aggregation (None = single worker).
    pub parallelism: Option<usize>,
    /// Memory budget in bytes (None = unlimited).
    pub memory_limit: Option<usize>,
}

/// Input/output location configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoConfig {
    /// Directory holding the six cleaned input tables.
    pub input_dir: String,
    /// Directory the derived tables are written to.
    pub output_dir: String,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            input_dir: "./data/processed".to_string(),
            output_dir: "./data/output".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();

        assert_eq!(config.execution.parallelism, None);
        assert_eq!(config.execution.memory_limit, None);
        assert_eq!(config.io.input_dir, "./data/processed");
        assert_eq!(config.io.output_dir, "./data/output");
    }

    #[test]
    fn test_pipeline_config_roundtrip() {
        let mut config = PipelineConfig::default();
        config.execution.parallelism = Some(4);
        config.execution.memory_limit = Some(1024 * 1024 * 1024);
        config.io.input_dir = "/data/in".to_string();

        let json = serde_json::to_string(&config).unwrap();
        let parsed: PipelineConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.execution.parallelism, Some(4));
        assert_eq!(parsed.execution.memory_limit, Some(1024 * 1024 * 1024));
        assert_eq!(parsed.io.input_dir, "/data/in");
        assert_eq!(parsed.io.output_dir, "./data/output");
    }

    #[test]
    fn test_from_file_partial() {
        // Missing sections fall back to defaults.
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"execution": {{"parallelism": 2}}}}"#).unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.execution.parallelism, Some(2));
        assert_eq!(config.execution.memory_limit, None);
        assert_eq!(config.io.output_dir, "./data/output");
    }

    #[test]
    fn test_from_file_missing() {
        assert!(PipelineConfig::from_file("/nonexistent/config.json").is_err());
    }
}
