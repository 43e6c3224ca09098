//! Error taxonomy for swiz-core.

use std::fmt;

use swiz_iac::IacError;

/// What kind of object a not-found or already-exists error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subject {
    Enclave,
    Provider,
    Environment,
    Stack,
    IacTechnology,
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Subject::Enclave => "enclave",
            Subject::Provider => "provider",
            Subject::Environment => "environment",
            Subject::Stack => "stack",
            Subject::IacTechnology => "iac technology",
        };
        f.write_str(s)
    }
}

/// Errors produced while loading configuration files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unsupported location: {0}")]
    Location(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Environment definitions that failed to load at bootstrap.
///
/// These are not fatal: the failing definitions are simply unavailable by
/// name while every other definition stays usable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadErrors {
    errors: Vec<(String, String)>,
}

impl LoadErrors {
    pub fn push(&mut self, env_def: impl Into<String>, err: impl fmt::Display) {
        self.errors.push((env_def.into(), err.to_string()));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Names of the environment definitions that failed.
    pub fn env_defs(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|(name, _)| name.as_str())
    }

    /// Failure message for `env_def`, if it failed to load.
    pub fn get(&self, env_def: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|(name, _)| name == env_def)
            .map(|(_, err)| err.as_str())
    }
}

impl fmt::Display for LoadErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|(name, err)| format!("{name}: {err}"))
            .collect();
        write!(f, "multiple errors: {}", parts.join(", "))
    }
}

impl std::error::Error for LoadErrors {}

/// Orchestration errors.
#[derive(Debug, thiserror::Error)]
pub enum SwizError {
    #[error("{kind} {name} not found")]
    NotFound { kind: Subject, name: String },

    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: Subject, name: String },

    #[error("usage error: {0}")]
    Usage(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("environment definitions failed to load: {0}")]
    EnvironmentLoad(LoadErrors),

    #[error(transparent)]
    Iac(#[from] IacError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("stacks {stacks:?} did not converge within {waited_secs}s")]
    ConvergenceTimeout { stacks: Vec<String>, waited_secs: u64 },
}

impl SwizError {
    pub fn not_found(kind: Subject, name: impl Into<String>) -> Self {
        SwizError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn already_exists(kind: Subject, name: impl Into<String>) -> Self {
        SwizError::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    /// True when this is a not-found error about `kind`, including ones
    /// reported by the backend.
    pub fn is_not_found(&self, kind: Subject) -> bool {
        match self {
            SwizError::NotFound { kind: k, .. } => *k == kind,
            SwizError::Iac(IacError::NotFound { kind: k, .. }) => *k == kind.to_string(),
            _ => false,
        }
    }
}

/// Result type for swiz-core operations.
pub type Result<T> = std::result::Result<T, SwizError>;
