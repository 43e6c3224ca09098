//! Deployment targets.

use serde::{Deserialize, Serialize};
use swiz_iac::StringMap;

/// One account/region target inside an enclave.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    #[serde(default)]
    pub name: String,
    /// Provider family, e.g. `AWS` or `DUMMY`
    #[serde(default)]
    pub provider_id: String,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub region: String,
}

/// Per-enclave defaults for the deploy/delete flags.
///
/// Unset fields defer to the caller's flag, which defaults to `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvBehavior {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_update_deploy: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_orphan_delete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_all_stacks: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fast_delete: Option<bool>,
}

/// An isolated deployment target an environment can be deployed into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enclave {
    pub name: String,
    #[serde(default)]
    pub default_provider: String,
    /// IaC technology used when none is requested explicitly
    #[serde(default)]
    pub default_iac: String,
    #[serde(default)]
    pub providers: Vec<Provider>,
    #[serde(default)]
    pub env_behavior: EnvBehavior,
    #[serde(default)]
    pub domain_name: String,
    /// Seed values for the parameter store
    #[serde(default, rename = "params")]
    pub parameters: StringMap,
}

impl Enclave {
    /// Look up a provider by name; an empty name means the default provider.
    ///
    /// Returns an owned copy. `None` when nothing matches, callers raise their
    /// own not-found error.
    pub fn get_provider(&self, name: &str) -> Option<Provider> {
        let name = if name.is_empty() {
            self.default_provider.as_str()
        } else {
            name
        };
        self.providers.iter().find(|p| p.name == name).cloned()
    }
}

/// Resolve a flag against an enclave default: an explicit `true` wins,
/// otherwise the configured value, otherwise `false`.
pub fn flag_or_config(flag: bool, config: Option<bool>) -> bool {
    flag || config.unwrap_or(false)
}
