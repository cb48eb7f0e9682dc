//! Curator configuration.
//!
//! Loaded from a versioned YAML file (`version: 1`). Every field except the
//! vault root has a default, and unknown fields are rejected:
//!
//! ```yaml
//! version: 1
//! vault: /home/me/notes
//! watch_document: Curator
//! cool_off_ms: 500
//! backlink_count_key: backlinks
//! ```

pub mod error;

pub use error::{ConfigError, ConfigResult};

use crate::watcher::{default_ignore_patterns, WatchConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_VERSION: u64 = 1;

const MAX_DELAY_MS: u64 = 10_000;
const MAX_WORKER_THREADS: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CuratorConfig {
    pub version: u64,

    /// Name used in logs. Defaults to the vault directory name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault: Option<PathBuf>,

    /// Document whose change forces a full refresh of everything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch_document: Option<String>,

    #[serde(default = "default_cool_off_ms")]
    pub cool_off_ms: u64,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "num_cpus::get")]
    pub worker_threads: usize,

    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// Front-matter key for the backlink count. Unset disables the stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backlink_count_key: Option<String>,
}

fn default_cool_off_ms() -> u64 {
    500
}

fn default_debounce_ms() -> u64 {
    100
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            name: None,
            vault: None,
            watch_document: None,
            cool_off_ms: default_cool_off_ms(),
            debounce_ms: default_debounce_ms(),
            worker_threads: num_cpus::get(),
            ignore_patterns: default_ignore_patterns(),
            backlink_count_key: None,
        }
    }
}

impl CuratorConfig {
    pub fn for_vault<P: Into<PathBuf>>(vault: P) -> Self {
        Self {
            vault: Some(vault.into()),
            ..Self::default()
        }
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parses and validates a configuration.
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        // The version is checked before the schema so that a future file
        // fails with a version error instead of an unknown field.
        let raw: serde_yaml::Value = serde_yaml::from_str(content)?;
        match raw.get("version") {
            None => return Err(ConfigError::MissingVersion),
            Some(version) => match version.as_u64() {
                Some(CONFIG_VERSION) => {}
                Some(found) => {
                    return Err(ConfigError::UnsupportedVersion {
                        found,
                        supported: vec![CONFIG_VERSION],
                    })
                }
                None => return Err(ConfigError::invalid("version", "expected an integer")),
            },
        }

        let config: Self = serde_yaml::from_value(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.cool_off_ms > MAX_DELAY_MS {
            return Err(ConfigError::range_with_hint(
                "cool_off_ms",
                self.cool_off_ms,
                0,
                MAX_DELAY_MS,
                "The pause before writing only needs to outlast an editor's save",
            ));
        }
        if self.debounce_ms > MAX_DELAY_MS {
            return Err(ConfigError::range_with_hint(
                "debounce_ms",
                self.debounce_ms,
                0,
                MAX_DELAY_MS,
                "Long debounce windows delay every update",
            ));
        }
        if !(1..=MAX_WORKER_THREADS).contains(&self.worker_threads) {
            return Err(ConfigError::range_with_hint(
                "worker_threads",
                self.worker_threads,
                1,
                MAX_WORKER_THREADS,
                "Queries need at least one worker thread",
            ));
        }
        if let Some(key) = &self.backlink_count_key {
            if key.trim().is_empty() {
                return Err(ConfigError::invalid("backlink_count_key", "must not be blank"));
            }
        }
        if let Some(document) = &self.watch_document {
            if document.trim().is_empty() {
                return Err(ConfigError::invalid("watch_document", "must not be blank"));
            }
        }
        Ok(())
    }

    /// The vault root, required before a curator can be built.
    pub fn vault_root(&self) -> ConfigResult<&Path> {
        self.vault.as_deref().ok_or(ConfigError::MissingVault)
    }

    pub fn cool_off(&self) -> Duration {
        Duration::from_millis(self.cool_off_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn watch_config(&self, root: &Path) -> WatchConfig {
        WatchConfig {
            root_path: root.to_path_buf(),
            debounce_duration: self.debounce(),
            ignore_patterns: self.ignore_patterns.clone(),
            ..WatchConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config = CuratorConfig::from_yaml_str("version: 1\nvault: /notes\n").unwrap();
        assert_eq!(config.vault_root().unwrap(), Path::new("/notes"));
        assert_eq!(config.cool_off(), Duration::from_millis(500));
        assert_eq!(config.debounce(), Duration::from_millis(100));
        assert_eq!(config.worker_threads, num_cpus::get());
        assert_eq!(config.ignore_patterns, default_ignore_patterns());
        assert!(config.backlink_count_key.is_none());
    }

    #[test]
    fn test_yaml_loading() {
        let yaml_content = r#"
version: 1
name: notes
vault: /notes
watch_document: Curator
cool_off_ms: 0
debounce_ms: 250
worker_threads: 2
backlink_count_key: backlinks
"#;
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = CuratorConfig::from_yaml_file(temp_file.path()).unwrap();
        assert_eq!(config.name.as_deref(), Some("notes"));
        assert_eq!(config.watch_document.as_deref(), Some("Curator"));
        assert_eq!(config.cool_off(), Duration::ZERO);
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.backlink_count_key.as_deref(), Some("backlinks"));

        let watch = config.watch_config(Path::new("/notes"));
        assert_eq!(watch.debounce_duration, Duration::from_millis(250));
        assert_eq!(watch.extensions, vec!["md".to_string()]);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = CuratorConfig {
            backlink_count_key: Some("backlinks".to_string()),
            ..CuratorConfig::for_vault("/notes")
        };
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("version: 1"));
        assert_eq!(CuratorConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn test_yaml_missing_version() {
        assert!(matches!(
            CuratorConfig::from_yaml_str("vault: /notes\n"),
            Err(ConfigError::MissingVersion)
        ));
    }

    #[test]
    fn test_yaml_unsupported_version() {
        assert!(matches!(
            CuratorConfig::from_yaml_str("version: 2\nfuture_field: true\n"),
            Err(ConfigError::UnsupportedVersion { found: 2, .. })
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            CuratorConfig::from_yaml_str("version: 1\ncooloff: 3\n"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_range_validation() {
        assert!(matches!(
            CuratorConfig::from_yaml_str("version: 1\ncool_off_ms: 20000\n"),
            Err(ConfigError::Range { .. })
        ));
        assert!(matches!(
            CuratorConfig::from_yaml_str("version: 1\nworker_threads: 0\n"),
            Err(ConfigError::Range { .. })
        ));
    }

    #[test]
    fn test_missing_vault() {
        assert!(matches!(
            CuratorConfig::default().vault_root(),
            Err(ConfigError::MissingVault)
        ));
    }
}
