//! Stack definitions.

use serde::{Deserialize, Serialize};
use swiz_iac::StringMap;

/// A stack reference inside an environment definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackConfigDef {
    pub name: String,
    /// Location of the stack definition file
    pub config_file: String,
    /// Wave index. Negative excludes the stack from scheduling.
    #[serde(default)]
    pub order: i32,
}

/// Contents of a stack definition file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDefinition {
    #[serde(default)]
    pub version: u32,
    /// Literal values or `{{token}}` placeholders
    #[serde(default)]
    pub params: StringMap,
    pub template_file: String,
}

/// A fully resolved stack: its definition file merged with the reference
/// entry that declared it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackConfig {
    pub version: u32,
    /// Name declared in the environment (not the live name)
    pub name: String,
    pub order: i32,
    pub parameters: StringMap,
    /// Template location, resolved against the config base directory
    /// unless it is a remote URL
    pub template_file: String,
}

impl StackConfig {
    pub fn from_definition(
        reference: &StackConfigDef,
        definition: StackDefinition,
        template_file: String,
    ) -> Self {
        Self {
            version: definition.version,
            name: reference.name.clone(),
            order: reference.order,
            parameters: definition.params,
            template_file,
        }
    }

    /// Whether the wave scheduler considers this stack at all.
    pub fn is_scheduled(&self) -> bool {
        self.order >= 0
    }
}
