//! Application configuration.
//!
//! The application config (`~/.swiz/appconfig.yaml` by default) lists the
//! environment definitions available to the CLI, application-wide enclaves and
//! polling behaviour. Every relative location found in it, or in the files it
//! points at, is resolved against the directory the config file lives in.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::Enclave;

/// Config location used when none is given.
pub const DEFAULT_LOCATION: &str = "~/.swiz/appconfig.yaml";

/// Environment variable overriding [`DEFAULT_LOCATION`].
pub const LOCATION_ENV_VAR: &str = "SWIZ_APPCONFIG";

/// One entry of the `env_def` list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvDef {
    pub name: String,
    pub env_def_file: String,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub version: u32,

    #[serde(default)]
    pub env_def: Vec<EnvDef>,

    /// Enclaves available to every environment
    #[serde(default)]
    pub enclave_def: Vec<Enclave>,

    #[serde(default)]
    pub default_enclave: String,

    /// Commands refused by the CLI, e.g. `env` or `env.delete`
    #[serde(default)]
    pub disabled_commands: Vec<String>,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Absent means poll until convergence or failure
    #[serde(default)]
    pub poll_timeout_secs: Option<u64>,

    /// Directory of the config file. Not serialized.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

fn default_poll_interval_secs() -> u64 {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            env_def: Vec::new(),
            enclave_def: Vec::new(),
            default_enclave: String::new(),
            disabled_commands: Vec::new(),
            poll_interval_secs: default_poll_interval_secs(),
            poll_timeout_secs: None,
            base_dir: PathBuf::from("."),
        }
    }
}

impl AppConfig {
    /// Parse configuration from YAML content. `base_dir` is left at `.`.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(content)?;
        config.base_dir = PathBuf::from(".");
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file; `base_dir` becomes its directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        config.base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(config)
    }

    /// Load from `location`, or from [`DEFAULT_LOCATION`] when `None`.
    ///
    /// Accepts plain paths, `~/` paths and `file://` URLs.
    pub fn load(location: Option<&str>) -> Result<Self, ConfigError> {
        let location = location.unwrap_or(DEFAULT_LOCATION);
        match resolve_location(Path::new("."), location)? {
            Location::Local(path) => Self::from_file(path),
            Location::Remote(url) => Err(ConfigError::Location(format!(
                "application config must be a local file: {url}"
            ))),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::BTreeSet::new();
        for def in &self.env_def {
            if def.name.is_empty() {
                return Err(ConfigError::Invalid("env_def entry without a name".to_string()));
            }
            if !seen.insert(def.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "env_def {} declared more than once",
                    def.name
                )));
            }
        }
        Ok(())
    }

    /// The `env_def` entry marked `default: true`, else the first entry.
    pub fn default_env_def(&self) -> Option<&EnvDef> {
        self.env_def
            .iter()
            .find(|d| d.default)
            .or_else(|| self.env_def.first())
    }

    /// True when `command` (e.g. `env`) or `command.sub` (e.g. `env.delete`)
    /// is listed in `disabled_commands`.
    pub fn is_command_disabled(&self, command: &str, sub: &str) -> bool {
        let qualified = format!("{command}.{sub}");
        self.disabled_commands
            .iter()
            .map(|c| c.trim())
            .any(|c| c.eq_ignore_ascii_case(command) || c.eq_ignore_ascii_case(&qualified))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_timeout(&self) -> Option<Duration> {
        self.poll_timeout_secs.map(Duration::from_secs)
    }
}

/// A resolved configuration location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    /// Non-file URL, passed through untouched
    Remote(String),
}

impl Location {
    /// String form handed to a backend as a template reference.
    pub fn into_reference(self) -> String {
        match self {
            Location::Local(path) => path.display().to_string(),
            Location::Remote(url) => url,
        }
    }
}

fn expand_home(path: &str) -> Result<PathBuf, ConfigError> {
    if path == "~" || path.starts_with("~/") {
        let home = dirs::home_dir().ok_or_else(|| {
            ConfigError::Location(format!("cannot expand {path}: no home directory"))
        })?;
        let rest = path.trim_start_matches('~').trim_start_matches('/');
        Ok(home.join(rest))
    } else {
        Ok(PathBuf::from(path))
    }
}

/// Resolve `location` against `base_dir`.
///
/// Relative paths and `file://` URLs are joined onto `base_dir`; absolute and
/// `~/` paths are used as-is; any other scheme is returned as
/// [`Location::Remote`].
pub fn resolve_location(base_dir: &Path, location: &str) -> Result<Location, ConfigError> {
    if location.trim().is_empty() {
        return Err(ConfigError::Location("empty location".to_string()));
    }

    let path = match location.split_once("://") {
        Some(("file", rest)) => rest,
        Some((scheme, _)) if !scheme.is_empty() => {
            return Ok(Location::Remote(location.to_string()))
        }
        _ => location,
    };

    let path = expand_home(path)?;
    if path.is_absolute() {
        Ok(Location::Local(path))
    } else {
        Ok(Location::Local(base_dir.join(path)))
    }
}

/// Read and parse a local YAML file at `location` relative to `base_dir`.
pub fn load_yaml<T: DeserializeOwned>(base_dir: &Path, location: &str) -> Result<T, ConfigError> {
    match resolve_location(base_dir, location)? {
        Location::Local(path) => {
            let content = fs::read_to_string(&path).map_err(|e| {
                ConfigError::Io(std::io::Error::new(
                    e.kind(),
                    format!("{}: {e}", path.display()),
                ))
            })?;
            Ok(serde_yaml::from_str(&content)?)
        }
        Location::Remote(url) => Err(ConfigError::Location(format!(
            "definition files must be local: {url}"
        ))),
    }
}
