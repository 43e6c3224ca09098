//! Swiz Core Library
//!
//! Configuration, scheduling and orchestration for deploying ordered sets of
//! infrastructure stacks ("environments") into enclaves.
//!
//! ## Key Components
//!
//! - `EnvService`: Deploy, delete, list and inspect environments
//! - `EnvironmentRepo` / `EnclaveRegistry`: Definitions loaded from YAML
//! - `ParamStore`: Parameter namespace carrying outputs between waves
//! - `ConvergencePoller`: Waits for a wave to reach its target state
//! - `DeployerRegistry`: Backend selection per enclave, provider and technology

pub mod cancel;
pub mod config;
mod error;
pub mod model;
pub mod obs;
pub mod params;
pub mod poller;
pub mod registry;
pub mod repo;
pub mod scheduler;
pub mod service;
pub mod telemetry;
pub mod template;

pub use cancel::{CancelHandle, CancelSignal};
pub use config::{AppConfig, EnvDef, Location};
pub use error::{ConfigError, LoadErrors, Result, Subject, SwizError};
pub use model::{
    Enclave, EnvBehavior, EnvironmentConfig, Provider, StackConfig, StackConfigDef,
    DEFAULT_NAMING_SCHEME,
};
pub use obs::{OperationKind, OperationSpan};
pub use params::ParamStore;
pub use poller::ConvergencePoller;
pub use registry::{DeployerRegistry, IAC_DUMMY};
pub use repo::{EnclaveRegistry, EnvironmentRepo};
pub use scheduler::build_dependency_order;
pub use service::{DeleteRequest, DeployRequest, EnvService};
pub use telemetry::init_tracing;
pub use template::parse_template_tokens;

/// Swiz version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
