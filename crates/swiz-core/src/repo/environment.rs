//! Environment and stack repository.
//!
//! Environment definitions are read once at construction. A definition that
//! fails to load is recorded and skipped; its siblings stay usable. Stack
//! definitions are read lazily on the first lookup of an environment and the
//! resolved result is cached for the life of the repository.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::config::{load_yaml, resolve_location, AppConfig};
use crate::error::{ConfigError, LoadErrors, Result, Subject, SwizError};
use crate::model::{EnvironmentConfig, StackConfig, StackDefinition};
use crate::obs::emit_environment_load_failed;

#[derive(Debug)]
pub struct EnvironmentRepo {
    definitions: BTreeMap<String, EnvironmentConfig>,
    resolved: Mutex<HashMap<String, Arc<EnvironmentConfig>>>,
    base_dir: PathBuf,
    default_name: String,
    load_errors: LoadErrors,
}

impl EnvironmentRepo {
    pub fn new(config: &AppConfig) -> Self {
        let mut definitions = BTreeMap::new();
        let mut load_errors = LoadErrors::default();

        for env_def in &config.env_def {
            match load_definition(&config.base_dir, &env_def.env_def_file) {
                Ok(mut env) => {
                    env.env_def_name = env_def.name.clone();
                    definitions.insert(env_def.name.clone(), env);
                }
                Err(err) => {
                    emit_environment_load_failed(&env_def.name, &err);
                    load_errors.push(env_def.name.clone(), err);
                }
            }
        }

        Self {
            definitions,
            resolved: Mutex::new(HashMap::new()),
            base_dir: config.base_dir.clone(),
            default_name: config
                .default_env_def()
                .map(|d| d.name.clone())
                .unwrap_or_default(),
            load_errors,
        }
    }

    /// Environment definitions that failed to load at construction.
    pub fn load_errors(&self) -> &LoadErrors {
        &self.load_errors
    }

    /// Fail with [`SwizError::EnvironmentLoad`] if any definition failed.
    pub fn ensure_loaded(&self) -> Result<()> {
        if self.load_errors.is_empty() {
            Ok(())
        } else {
            Err(SwizError::EnvironmentLoad(self.load_errors.clone()))
        }
    }

    /// Names of the successfully loaded environment definitions.
    pub fn env_def_names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    fn resolved(&self) -> MutexGuard<'_, HashMap<String, Arc<EnvironmentConfig>>> {
        self.resolved.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up an environment definition with its stacks resolved.
    ///
    /// An empty name selects the default definition. Any stack definition
    /// that fails to load fails the whole lookup.
    pub fn get_environment_by_def(&self, env_def: &str) -> Result<Arc<EnvironmentConfig>> {
        let name = if env_def.is_empty() {
            self.default_name.as_str()
        } else {
            env_def
        };

        if let Some(env) = self.resolved().get(name) {
            return Ok(Arc::clone(env));
        }

        let definition = self
            .definitions
            .get(name)
            .ok_or_else(|| SwizError::not_found(Subject::Environment, name))?;
        let env = Arc::new(resolve_stacks(&self.base_dir, definition)?);
        debug!(env_def = %name, stacks = env.stacks.len(), "resolved environment definition");

        Ok(Arc::clone(
            self.resolved().entry(name.to_string()).or_insert(env),
        ))
    }
}

fn load_definition(base_dir: &Path, location: &str) -> std::result::Result<EnvironmentConfig, ConfigError> {
    let env: EnvironmentConfig = load_yaml(base_dir, location)?;
    env.validate().map_err(ConfigError::Invalid)?;
    Ok(env)
}

fn resolve_stacks(base_dir: &Path, definition: &EnvironmentConfig) -> Result<EnvironmentConfig> {
    let mut env = definition.clone();
    let mut stacks = BTreeMap::new();

    for reference in &definition.stack_refs {
        let stack_def: StackDefinition = load_yaml(base_dir, &reference.config_file)?;
        if stack_def.template_file.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "stack {} has no template_file",
                reference.name
            ))
            .into());
        }
        let template = resolve_location(base_dir, &stack_def.template_file)?.into_reference();
        stacks.insert(
            reference.name.clone(),
            StackConfig::from_definition(reference, stack_def, template),
        );
    }

    env.stacks = stacks;
    Ok(env)
}
