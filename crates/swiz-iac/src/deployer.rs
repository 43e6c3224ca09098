//! The backend contract every infrastructure-as-code technology implements.
//!
//! A deployer is scoped to one enclave/provider/technology combination. The
//! orchestrator only ever talks to this trait, so new technologies plug in
//! without touching scheduling or convergence logic.

use async_trait::async_trait;

use crate::error::IacResult;
use crate::model::{EnvironmentInfo, StackInfo, StackRequest, State, StringMap};

/// Infrastructure-as-code backend.
///
/// Guarantees:
/// - `dry_run` requests never mutate live infrastructure and report
///   [`State::DryRun`].
/// - `get_stack_info` fails with `IacError::NotFound` when the stack is absent.
/// - `stacks_in_state` fails with `IacError::StackFailed` as soon as any
///   requested stack is in a terminal failure state.
#[async_trait]
pub trait IacDeployer: Send + Sync {
    /// Create a new stack.
    async fn create_stack(&self, request: &StackRequest) -> IacResult<StackInfo>;

    /// Update an existing stack in place.
    async fn update_stack(&self, request: &StackRequest) -> IacResult<StackInfo>;

    /// Delete a stack by live name.
    async fn delete_stack(&self, name: &str, dry_run: bool) -> IacResult<StackInfo>;

    /// Describe a stack by live name.
    async fn get_stack_info(&self, name: &str) -> IacResult<StackInfo>;

    /// Output key/value pairs published by a stack.
    async fn get_stack_outputs(&self, name: &str) -> IacResult<StringMap>;

    /// Live stacks tagged with `env_name`.
    async fn list_stacks(&self, env_name: &str) -> IacResult<Vec<StackInfo>>;

    /// Distinct environment names known to the backend.
    async fn list_environments(&self) -> IacResult<Vec<String>>;

    /// Aggregate status over every stack tagged with `env_name`.
    async fn get_environment(&self, env_name: &str) -> IacResult<EnvironmentInfo>;

    /// Which of `stacks` are currently in any of `states`.
    async fn stacks_in_state(
        &self,
        env_name: &str,
        stacks: &[String],
        states: &[State],
    ) -> IacResult<Vec<String>>;
}
