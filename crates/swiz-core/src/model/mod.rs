//! Configuration-side data model: enclaves, environments and stacks.

pub mod enclave;
pub mod environment;
pub mod stack;

pub use enclave::{flag_or_config, Enclave, EnvBehavior, Provider};
pub use environment::{EnvironmentConfig, DEFAULT_NAMING_SCHEME};
pub use stack::{StackConfig, StackConfigDef, StackDefinition};
