//! Environment definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::enclave::Enclave;
use super::stack::{StackConfig, StackConfigDef};
use crate::template::parse_template_tokens;

/// Naming scheme used when an environment does not declare one.
pub const DEFAULT_NAMING_SCHEME: &str = "{{env_name:32}}-{{stack_name:32}}";

/// A named environment definition loaded from an environment definition file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Name of the `env_def` entry this was loaded from
    #[serde(skip)]
    pub env_def_name: String,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub default_enclave: String,
    #[serde(default)]
    pub naming_scheme: String,
    #[serde(default, rename = "enclave_def")]
    pub enclaves: Vec<Enclave>,
    #[serde(default, rename = "stack_cfg")]
    pub stack_refs: Vec<StackConfigDef>,
    /// Resolved stacks keyed by declared name. Filled once by the
    /// environment repository.
    #[serde(skip)]
    pub stacks: BTreeMap<String, StackConfig>,
}

impl EnvironmentConfig {
    pub fn naming_scheme(&self) -> &str {
        if self.naming_scheme.is_empty() {
            DEFAULT_NAMING_SCHEME
        } else {
            &self.naming_scheme
        }
    }

    /// Live (deployed) name for a declared stack in environment `env_name`.
    pub fn live_stack_name(&self, env_name: &str, stack_name: &str) -> String {
        let mut values = BTreeMap::new();
        values.insert("env_name", env_name);
        values.insert("stack_name", stack_name);
        parse_template_tokens(self.naming_scheme(), &values)
    }

    /// Reject definitions the orchestrator cannot schedule unambiguously.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::BTreeSet::new();
        for stack in &self.stack_refs {
            if stack.name.is_empty() {
                return Err("stack_cfg entry without a name".to_string());
            }
            if !seen.insert(stack.name.as_str()) {
                return Err(format!("stack {} declared more than once", stack.name));
            }
        }
        Ok(())
    }
}
