//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::PathBuf;

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. Environment: `CONCLAVE_<SECTION>__<KEY>` (e.g.
    ///    `CONCLAVE_WORKER__CONCURRENCY=8`)
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./conclave.toml` or `./.conclave.toml`
    /// 4. XDG config: `$XDG_CONFIG_HOME/conclave/config.toml`
    /// 5. Fallback: `~/.config/conclave/config.toml`
    /// 6. Default values
    pub fn load(config_path: Option<&PathBuf>) -> Result<FileConfig, Box<figment::Error>> {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        // Add global config (XDG or fallback)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(&global_path));
            }
        }

        // Add project-level config files (check both names)
        for filename in &["conclave.toml", ".conclave.toml"] {
            let path = PathBuf::from(filename);
            if path.exists() {
                figment = figment.merge(Toml::file(&path));
                break;
            }
        }

        // Add explicit config path (highest priority for files)
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Environment variables win over every file source.
        figment = figment.merge(Env::prefixed("CONCLAVE_").split("__"));

        figment.extract().map_err(Box::new)
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// Get the global config file path
    ///
    /// Returns XDG_CONFIG_HOME/conclave/config.toml if set, otherwise
    /// falls back to ~/.config/conclave/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("conclave").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        for filename in &["conclave.toml", ".conclave.toml"] {
            let path = PathBuf::from(filename);
            if path.exists() {
                return Some(path);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.worker.concurrency, 4);
        assert!(config.panel.weights.is_empty());
    }

    #[test]
    fn test_later_sources_override_earlier() {
        let figment = Figment::new()
            .merge(Serialized::defaults(FileConfig::default()))
            .merge(Toml::string("[worker]\nconcurrency = 2"))
            .merge(Toml::string("[worker]\nconcurrency = 9\njob_budget_secs = 60"));
        let config: FileConfig = figment.extract().unwrap();

        assert_eq!(config.worker.concurrency, 9);
        assert_eq!(config.worker.job_budget_secs, 60);
        // Sections untouched by any source keep their defaults.
        assert_eq!(config.evaluation.timeout_secs, 60);
    }

    #[test]
    fn test_global_config_path_returns_some() {
        // Should return a path (even if file doesn't exist)
        let path = ConfigLoader::global_config_path();
        assert!(path.is_some());
        assert!(path.unwrap().to_string_lossy().contains("conclave"));
    }
}
