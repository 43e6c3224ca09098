//! Swiz-IaC: Infrastructure-as-Code Backend Contract
//!
//! This crate defines what the orchestrator needs from an
//! infrastructure-as-code technology: create, update and delete stacks,
//! describe them, read their outputs and report convergence.
//!
//! ## Key Components
//!
//! - `IacDeployer`: The async backend trait
//! - `State`: Stack lifecycle states with a severity ranking
//! - `StackInfo` / `EnvironmentInfo`: Per-stack and aggregate status records
//! - `MemoryDeployer`: In-memory backend used for tests and the `Dummy` technology

pub mod deployer;
mod error;
pub mod fakes;
pub mod model;

pub use deployer::IacDeployer;
pub use error::{IacError, IacResult};
pub use fakes::{DeployerCall, MemoryDeployer};
pub use model::{
    DeployStatus, EnvironmentInfo, NextAction, StackInfo, StackRequest, State, StringMap,
    TAG_CREATE_DATE, TAG_CREATE_USER, TAG_ENCLAVE, TAG_ENV_DEF, TAG_ENV_NAME,
};
