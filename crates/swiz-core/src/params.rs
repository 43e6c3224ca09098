//! Parameter namespace shared by the stacks of one deploy.
//!
//! Seeded from the enclave's `params`, then extended with every stack's
//! outputs under `stack.OutputKey` once that stack's wave has converged.

use swiz_iac::StringMap;

use crate::template::{clean_token, is_replace_token};

#[derive(Debug, Clone, Default)]
pub struct ParamStore {
    params: StringMap,
}

impl ParamStore {
    pub fn new(seed: StringMap) -> Self {
        Self { params: seed }
    }

    /// Namespace value for `name` (delimiters stripped), or `""` if unset.
    pub fn get_param(&self, name: &str) -> String {
        self.params
            .get(clean_token(name))
            .cloned()
            .unwrap_or_default()
    }

    /// Resolve declared parameters: literals pass through, replace tokens are
    /// looked up in the namespace.
    pub fn get_params(&self, declared: &StringMap) -> StringMap {
        declared
            .iter()
            .map(|(key, value)| {
                let resolved = if is_replace_token(value) {
                    self.get_param(value)
                } else {
                    value.clone()
                };
                (key.clone(), resolved)
            })
            .collect()
    }

    /// Store `value` under `stack.name`, or bare `name` when `stack` is empty.
    pub fn set_param(&mut self, stack: &str, name: &str, value: impl Into<String>) {
        let key = if stack.is_empty() {
            name.to_string()
        } else {
            format!("{stack}.{name}")
        };
        self.params.insert(key, value.into());
    }

    pub fn set_params(&mut self, stack: &str, values: &StringMap) {
        for (name, value) in values {
            self.set_param(stack, name, value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}
