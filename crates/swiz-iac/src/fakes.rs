//! In-memory deployer (testing and the `Dummy` technology)
//!
//! Provides `MemoryDeployer`, which satisfies the [`IacDeployer`] contract
//! without any provider behind it. Stacks settle after a configurable number
//! of convergence polls, failures can be injected per stack, and every call
//! is journaled so tests can assert on the exact sequence of backend calls.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::deployer::IacDeployer;
use crate::error::{IacError, IacResult};
use crate::model::*;

/// A backend call recorded by [`MemoryDeployer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployerCall {
    Create { name: String, dry_run: bool },
    Update { name: String, dry_run: bool },
    Delete { name: String, dry_run: bool },
    GetStackInfo(String),
    GetStackOutputs(String),
    ListStacks(String),
    ListEnvironments,
    GetEnvironment(String),
    StacksInState(Vec<String>),
}

impl DeployerCall {
    /// True for calls that change live state.
    pub fn is_mutation(&self) -> bool {
        match self {
            DeployerCall::Create { dry_run, .. }
            | DeployerCall::Update { dry_run, .. }
            | DeployerCall::Delete { dry_run, .. } => !dry_run,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
struct MemoryStack {
    template: String,
    params: StringMap,
    tags: StringMap,
    state: State,
    settles_to: State,
    polls_left: u32,
    revision: u32,
}

#[derive(Debug, Default)]
struct Inner {
    stacks: BTreeMap<String, MemoryStack>,
    outputs: BTreeMap<String, StringMap>,
    failing: BTreeSet<String>,
    calls: Vec<DeployerCall>,
}

/// In-memory deployer backed by a `BTreeMap<live name, stack>`.
#[derive(Debug, Default)]
pub struct MemoryDeployer {
    inner: Mutex<Inner>,
    settle_polls: u32,
}

impl MemoryDeployer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of convergence polls a stack spends in progress before it
    /// settles. Zero settles on the first poll.
    pub fn with_settle_polls(mut self, polls: u32) -> Self {
        self.settle_polls = polls;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Preset outputs returned for `name` once it exists.
    pub fn set_outputs(&self, name: &str, outputs: StringMap) {
        self.lock().outputs.insert(name.to_string(), outputs);
    }

    /// Make `name` settle into `Failed` instead of its target state.
    pub fn fail_stack(&self, name: &str) {
        self.lock().failing.insert(name.to_string());
    }

    /// Insert a live stack directly, bypassing the create path.
    pub fn seed_stack(&self, name: &str, env_name: &str, state: State) {
        let mut tags = StringMap::new();
        tags.insert(TAG_ENV_NAME.to_string(), env_name.to_string());
        self.lock().stacks.insert(
            name.to_string(),
            MemoryStack {
                template: String::new(),
                params: StringMap::new(),
                tags,
                state,
                settles_to: state,
                polls_left: 0,
                revision: 0,
            },
        );
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<DeployerCall> {
        self.lock().calls.clone()
    }

    /// Live stack names, sorted.
    pub fn stack_names(&self) -> Vec<String> {
        self.lock().stacks.keys().cloned().collect()
    }

    pub fn state_of(&self, name: &str) -> Option<State> {
        self.lock().stacks.get(name).map(|s| s.state)
    }

    pub fn params_of(&self, name: &str) -> Option<StringMap> {
        self.lock().stacks.get(name).map(|s| s.params.clone())
    }

    pub fn tags_of(&self, name: &str) -> Option<StringMap> {
        self.lock().stacks.get(name).map(|s| s.tags.clone())
    }

    pub fn template_of(&self, name: &str) -> Option<String> {
        self.lock().stacks.get(name).map(|s| s.template.clone())
    }

    fn info(name: &str, action: NextAction, state: State, reason: &str) -> StackInfo {
        StackInfo {
            name: name.to_string(),
            next_action: action,
            deploy_status: DeployStatus::new(name, state, reason),
            resources: Vec::new(),
        }
    }

    fn dry_run_info(name: &str, action: NextAction) -> StackInfo {
        Self::info(name, action, State::DryRun, "Dry Run")
    }

    fn start_transition(&self, stack: &mut MemoryStack, state: State, settles_to: State) {
        stack.state = state;
        stack.settles_to = settles_to;
        stack.polls_left = self.settle_polls;
        stack.revision += 1;
    }
}

/// Advance one stack by one poll. Returns `false` once a delete has settled
/// and the stack should be dropped.
fn advance(name: &str, stack: &mut MemoryStack, failing: &BTreeSet<String>) -> bool {
    if stack.state == stack.settles_to {
        return true;
    }
    if stack.polls_left > 0 {
        stack.polls_left -= 1;
        return true;
    }
    if failing.contains(name) {
        stack.state = State::Failed;
        stack.settles_to = State::Failed;
        return true;
    }
    stack.state = stack.settles_to;
    stack.state != State::Deleted
}

#[async_trait]
impl IacDeployer for MemoryDeployer {
    async fn create_stack(&self, request: &StackRequest) -> IacResult<StackInfo> {
        let mut inner = self.lock();
        inner.calls.push(DeployerCall::Create {
            name: request.name.clone(),
            dry_run: request.dry_run,
        });
        debug!(stack = %request.name, template = %request.template, dry_run = request.dry_run, "memory create");

        if request.dry_run {
            return Ok(Self::dry_run_info(&request.name, NextAction::Create));
        }
        if inner.stacks.contains_key(&request.name) {
            return Err(IacError::InvalidRequest(format!(
                "stack {} already exists",
                request.name
            )));
        }

        let mut stack = MemoryStack {
            template: request.template.clone(),
            params: request.params.clone(),
            tags: request.metadata.clone(),
            state: State::Unknown,
            settles_to: State::Unknown,
            polls_left: 0,
            revision: 0,
        };
        self.start_transition(&mut stack, State::Creating, State::Complete);
        inner.stacks.insert(request.name.clone(), stack);

        Ok(Self::info(
            &request.name,
            NextAction::Create,
            State::Creating,
            "Memory CreateStack",
        ))
    }

    async fn update_stack(&self, request: &StackRequest) -> IacResult<StackInfo> {
        let mut inner = self.lock();
        inner.calls.push(DeployerCall::Update {
            name: request.name.clone(),
            dry_run: request.dry_run,
        });
        debug!(stack = %request.name, template = %request.template, dry_run = request.dry_run, "memory update");

        if !inner.stacks.contains_key(&request.name) {
            return Err(IacError::stack_not_found(&request.name));
        }
        if request.dry_run {
            return Ok(Self::dry_run_info(&request.name, NextAction::Update));
        }

        let stack = inner
            .stacks
            .get_mut(&request.name)
            .ok_or_else(|| IacError::stack_not_found(&request.name))?;
        stack.template = request.template.clone();
        stack.params = request.params.clone();
        stack.tags.extend(request.metadata.clone());
        self.start_transition(stack, State::Updating, State::Complete);

        let mut info = Self::info(
            &request.name,
            NextAction::Update,
            State::Updating,
            "Memory UpdateStack",
        );
        info.deploy_status.details = format!("revision-{}", stack.revision);
        Ok(info)
    }

    async fn delete_stack(&self, name: &str, dry_run: bool) -> IacResult<StackInfo> {
        let mut inner = self.lock();
        inner.calls.push(DeployerCall::Delete {
            name: name.to_string(),
            dry_run,
        });
        debug!(stack = %name, dry_run, "memory delete");

        if dry_run {
            return Ok(Self::dry_run_info(name, NextAction::Delete));
        }

        match inner.stacks.get_mut(name) {
            Some(stack) => {
                self.start_transition(stack, State::Deleting, State::Deleted);
                Ok(Self::info(
                    name,
                    NextAction::Delete,
                    State::Deleting,
                    "Memory DeleteStack",
                ))
            }
            None => Ok(Self::info(
                name,
                NextAction::Delete,
                State::Deleted,
                "Stack does not exist",
            )),
        }
    }

    async fn get_stack_info(&self, name: &str) -> IacResult<StackInfo> {
        let mut inner = self.lock();
        inner.calls.push(DeployerCall::GetStackInfo(name.to_string()));

        let stack = inner
            .stacks
            .get(name)
            .ok_or_else(|| IacError::stack_not_found(name))?;
        let mut info = Self::info(name, NextAction::Update, stack.state, stack.state.as_str());
        info.deploy_status.details = format!("revision-{}", stack.revision);
        Ok(info)
    }

    async fn get_stack_outputs(&self, name: &str) -> IacResult<StringMap> {
        let mut inner = self.lock();
        inner
            .calls
            .push(DeployerCall::GetStackOutputs(name.to_string()));

        if !inner.stacks.contains_key(name) {
            return Err(IacError::stack_not_found(name));
        }
        let mut outputs = inner.outputs.get(name).cloned().unwrap_or_default();
        outputs.insert("StackName".to_string(), name.to_string());
        Ok(outputs)
    }

    async fn list_stacks(&self, env_name: &str) -> IacResult<Vec<StackInfo>> {
        let mut inner = self.lock();
        inner.calls.push(DeployerCall::ListStacks(env_name.to_string()));

        Ok(inner
            .stacks
            .iter()
            .filter(|(_, s)| s.tags.get(TAG_ENV_NAME).map(String::as_str) == Some(env_name))
            .map(|(name, s)| Self::info(name, NextAction::Update, s.state, s.state.as_str()))
            .collect())
    }

    async fn list_environments(&self) -> IacResult<Vec<String>> {
        let mut inner = self.lock();
        inner.calls.push(DeployerCall::ListEnvironments);

        let names: BTreeSet<String> = inner
            .stacks
            .values()
            .filter_map(|s| s.tags.get(TAG_ENV_NAME).cloned())
            .collect();
        Ok(names.into_iter().collect())
    }

    async fn get_environment(&self, env_name: &str) -> IacResult<EnvironmentInfo> {
        self.lock()
            .calls
            .push(DeployerCall::GetEnvironment(env_name.to_string()));

        let stacks = self.list_stacks(env_name).await?;
        if stacks.is_empty() {
            return Err(IacError::NotFound {
                kind: "environment".to_string(),
                name: env_name.to_string(),
            });
        }
        Ok(EnvironmentInfo::aggregate(env_name, stacks))
    }

    async fn stacks_in_state(
        &self,
        _env_name: &str,
        stacks: &[String],
        states: &[State],
    ) -> IacResult<Vec<String>> {
        let mut inner = self.lock();
        inner.calls.push(DeployerCall::StacksInState(stacks.to_vec()));

        let Inner {
            stacks: live,
            failing,
            ..
        } = &mut *inner;

        let mut reached = Vec::new();
        for name in stacks {
            let (state, settled_away) = match live.get_mut(name) {
                Some(stack) => {
                    let keep = advance(name, stack, failing);
                    (stack.state, !keep)
                }
                None => (State::Deleted, false),
            };
            if settled_away {
                live.remove(name);
            }

            if state.is_failure() {
                return Err(IacError::StackFailed {
                    name: name.clone(),
                    reason: state.to_string(),
                });
            }
            if states.contains(&state) {
                reached.push(name.clone());
            }
        }
        Ok(reached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, env: &str) -> StackRequest {
        let mut metadata = StringMap::new();
        metadata.insert(TAG_ENV_NAME.to_string(), env.to_string());
        StackRequest {
            name: name.to_string(),
            template: "file://boot.yaml".to_string(),
            params: StringMap::new(),
            metadata,
            dry_run: false,
        }
    }

    #[tokio::test]
    async fn test_settle_polls_delay_convergence() {
        let deployer = MemoryDeployer::new().with_settle_polls(2);
        deployer.create_stack(&request("dev-boot", "dev")).await.unwrap();
        let names = vec!["dev-boot".to_string()];

        for _ in 0..2 {
            let reached = deployer
                .stacks_in_state("dev", &names, &[State::Complete])
                .await
                .unwrap();
            assert!(reached.is_empty());
        }
        let reached = deployer
            .stacks_in_state("dev", &names, &[State::Complete])
            .await
            .unwrap();
        assert_eq!(reached, names);
    }

    #[tokio::test]
    async fn test_delete_settles_by_removing_stack() {
        let deployer = MemoryDeployer::new();
        deployer.seed_stack("dev-boot", "dev", State::Complete);
        deployer.delete_stack("dev-boot", false).await.unwrap();
        assert_eq!(deployer.state_of("dev-boot"), Some(State::Deleting));

        let names = vec!["dev-boot".to_string()];
        let reached = deployer
            .stacks_in_state("dev", &names, &[State::Deleted])
            .await
            .unwrap();
        assert_eq!(reached, names);
        assert!(deployer.stack_names().is_empty());
    }

    #[test]
    fn test_dry_run_calls_are_not_mutations() {
        let call = DeployerCall::Create {
            name: "x".to_string(),
            dry_run: true,
        };
        assert!(!call.is_mutation());
        let call = DeployerCall::Delete {
            name: "x".to_string(),
            dry_run: false,
        };
        assert!(call.is_mutation());
    }
}
