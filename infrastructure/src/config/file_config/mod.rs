//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and use domain types where appropriate.

mod evaluation;
mod panel;
mod worker;

pub use evaluation::FileEvaluationConfig;
pub use panel::FilePanelConfig;
pub use worker::FileWorkerConfig;

use serde::{Deserialize, Serialize};

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Pipeline worker settings
    pub worker: FileWorkerConfig,
    /// Remote evaluation service settings
    pub evaluation: FileEvaluationConfig,
    /// Panel scoring overrides
    pub panel: FilePanelConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn test_sections_merge_independently() {
        let toml_str = r#"
[worker]
concurrency = 2

[evaluation]
timeout_secs = 15
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.worker.concurrency, 2);
        assert_eq!(config.evaluation.timeout_secs, 15);
        assert_eq!(config.panel, FilePanelConfig::default());
    }
}
