use crate::change::{ChangeKind, PayloadSet};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CuratorError>;

#[derive(Error, Debug)]
pub enum CuratorError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("Stage '{stage}' failed: {message}")]
    StageExecutionFailed { stage: String, message: String },

    #[error("Vault error: {0}")]
    Vault(String),

    #[error("Watcher error: {0}")]
    Watcher(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error(transparent)]
    Change(#[from] ChangeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CuratorError {
    pub fn stage<S: Into<String>, E: std::fmt::Display>(stage: S, e: E) -> Self {
        Self::StageExecutionFailed {
            stage: stage.into(),
            message: e.to_string(),
        }
    }

    pub fn vault<E: std::fmt::Display>(e: E) -> Self {
        Self::Vault(e.to_string())
    }

    pub fn watcher<E: std::fmt::Display>(e: E) -> Self {
        Self::Watcher(e.to_string())
    }
}

/// Invalid stage wiring, detected once at startup. Always fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Stage '{stage}' does not consume any payload type")]
    NoConsumedTypes { stage: String },

    #[error("Stage '{stage}' produces reserved payload types {types}")]
    ReservedTypeProduced { stage: String, types: PayloadSet },

    #[error("Dependency cycle between stages: {}", stages.join(", "))]
    DependencyCycle { stages: Vec<String> },

    #[error("Stage '{stage}' consumes {missing}, which no stage produces")]
    UnsatisfiedConsumer { stage: String, missing: PayloadSet },
}

/// Reading a value that the change kind does not carry.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeError {
    #[error("A {0} change has no previous value")]
    NoPreviousValue(ChangeKind),

    #[error("A {0} change has no new value")]
    NoNewValue(ChangeKind),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::PayloadType;

    #[test]
    fn test_configuration_error_messages() {
        let err = ConfigurationError::ReservedTypeProduced {
            stage: "links".to_string(),
            types: PayloadSet::of(&[PayloadType::Document]),
        };
        assert_eq!(
            err.to_string(),
            "Stage 'links' produces reserved payload types {Document}"
        );

        let err = ConfigurationError::DependencyCycle {
            stages: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "Dependency cycle between stages: a, b");
    }

    #[test]
    fn test_stage_error_helper() {
        let err = CuratorError::stage("links", "boom");
        assert_eq!(err.to_string(), "Stage 'links' failed: boom");
    }
}
