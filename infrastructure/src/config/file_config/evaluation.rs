//! Evaluation service configuration from TOML (`[evaluation]` section)
//!
//! Example configuration:
//!
//! ```toml
//! [evaluation]
//! base_url = "http://evaluation.internal:8088"
//! timeout_secs = 60
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for the remote evaluation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileEvaluationConfig {
    /// Base URL of the evaluation service
    pub base_url: String,
    /// Per-request timeout, in seconds
    pub timeout_secs: u64,
}

impl Default for FileEvaluationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8088".to_string(),
            timeout_secs: 60,
        }
    }
}

impl FileEvaluationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_config_default() {
        let config = FileEvaluationConfig::default();
        assert_eq!(config.base_url, "http://localhost:8088");
        assert_eq!(config.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_evaluation_config_deserialize() {
        let toml_str = r#"
[evaluation]
base_url = "http://evaluation.internal:8088"
"#;
        let config: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.evaluation.base_url, "http://evaluation.internal:8088");
        assert_eq!(config.evaluation.timeout_secs, 60);
    }
}
