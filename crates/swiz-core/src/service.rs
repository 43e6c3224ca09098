//! Environment lifecycle orchestration.
//!
//! [`EnvService`] deploys an environment wave by wave: every stack in a wave
//! is created or updated, the wave is polled until it converges, and the
//! wave's outputs are published into the parameter store for later waves.
//! Deletes walk the waves backwards and then remove orphaned stacks.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use swiz_iac::{
    EnvironmentInfo, IacDeployer, NextAction, StackInfo, StackRequest, State, StringMap,
    TAG_CREATE_DATE, TAG_CREATE_USER, TAG_ENCLAVE, TAG_ENV_DEF, TAG_ENV_NAME,
};
use tracing::{info, Instrument};

use crate::cancel::CancelSignal;
use crate::config::AppConfig;
use crate::error::{Result, Subject, SwizError};
use crate::model::{flag_or_config, Enclave, EnvironmentConfig, StackConfig};
use crate::obs::{
    emit_orphan_detected, emit_outputs_published, emit_stack_deleted, emit_stack_upserted,
    emit_wave_converged, emit_wave_started, OperationKind, OperationSpan,
};
use crate::params::ParamStore;
use crate::poller::ConvergencePoller;
use crate::registry::DeployerRegistry;
use crate::repo::{EnclaveRegistry, EnvironmentRepo};
use crate::scheduler::build_dependency_order;

/// Inputs for [`EnvService::deploy_environment`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployRequest {
    /// Empty selects the default enclave
    pub enclave: String,
    /// Empty selects the default environment definition
    pub env_def: String,
    pub env_name: String,
    pub deploy_all: bool,
    /// Declared stack names to deploy; empty means all
    pub stacks: Vec<String>,
    pub dry_run: bool,
    pub no_update: bool,
}

/// Inputs for [`EnvService::delete_environment`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteRequest {
    pub enclave: String,
    pub env_def: String,
    pub env_name: String,
    pub dry_run: bool,
    pub no_orphan_delete: bool,
    pub fast_delete: bool,
}

/// Everything resolved for one invocation.
struct Target {
    env: Arc<EnvironmentConfig>,
    enclave: Enclave,
    deployer: Arc<dyn IacDeployer>,
}

pub struct EnvService {
    env_repo: EnvironmentRepo,
    app_enclaves: Vec<Enclave>,
    default_enclave: String,
    registry: DeployerRegistry,
    poller: ConvergencePoller,
    create_user: String,
}

impl EnvService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_registry(config, DeployerRegistry::new())
    }

    pub fn with_registry(config: &AppConfig, registry: DeployerRegistry) -> Self {
        Self {
            env_repo: EnvironmentRepo::new(config),
            app_enclaves: config.enclave_def.clone(),
            default_enclave: config.default_enclave.clone(),
            registry,
            poller: ConvergencePoller::new(config.poll_interval(), config.poll_timeout()),
            create_user: std::env::var("USER").unwrap_or_default(),
        }
    }

    pub fn with_poller(mut self, poller: ConvergencePoller) -> Self {
        self.poller = poller;
        self
    }

    /// User recorded in the `SwzCreateUser` tag. Defaults to `$USER`.
    pub fn with_create_user(mut self, user: impl Into<String>) -> Self {
        self.create_user = user.into();
        self
    }

    pub fn env_repo(&self) -> &EnvironmentRepo {
        &self.env_repo
    }

    /// Backend the service would use for `enclave` under `env_def`.
    pub fn deployer(&self, enclave: &str, env_def: &str) -> Result<Arc<dyn IacDeployer>> {
        Ok(self.resolve(enclave, env_def)?.deployer)
    }

    fn resolve(&self, enclave_name: &str, env_def: &str) -> Result<Target> {
        let env = self.env_repo.get_environment_by_def(env_def)?;
        let enclaves =
            EnclaveRegistry::for_environment(&env, &self.app_enclaves, &self.default_enclave);
        let enclave = enclaves.get_enclave(enclave_name)?.clone();
        let deployer = self.registry.get_deployer(&enclave, "", "")?;
        Ok(Target {
            env,
            enclave,
            deployer,
        })
    }

    /// Create or update the selected stacks of an environment, wave by wave.
    ///
    /// Returns one [`StackInfo`] per issued stack, in wave order.
    pub async fn deploy_environment(
        &self,
        request: &DeployRequest,
        cancel: &CancelSignal,
    ) -> Result<Vec<StackInfo>> {
        let op = OperationSpan::new(OperationKind::Deploy, &request.env_name);
        self.deploy(request, cancel).instrument(op.span()).await
    }

    async fn deploy(&self, request: &DeployRequest, cancel: &CancelSignal) -> Result<Vec<StackInfo>> {
        require_env_name(&request.env_name)?;
        let target = self.resolve(&request.enclave, &request.env_def)?;
        let behavior = target.enclave.env_behavior;
        let no_update = flag_or_config(request.no_update, behavior.no_update_deploy);
        let deploy_all = flag_or_config(request.deploy_all, behavior.deploy_all_stacks);

        if !deploy_all && request.stacks.is_empty() {
            return Err(SwizError::Usage(
                "either name the stacks to deploy or request all stacks".to_string(),
            ));
        }
        check_live_names(&target.env, &request.env_name)?;
        let selected = select_stacks(&target.env, &request.stacks)?;

        let mut params = ParamStore::new(target.enclave.parameters.clone());
        let mut results = Vec::new();

        for (wave_idx, wave) in build_dependency_order(selected, false).into_iter().enumerate() {
            let live_names: Vec<String> = wave
                .iter()
                .map(|s| target.env.live_stack_name(&request.env_name, &s.name))
                .collect();
            emit_wave_started(wave_idx, &live_names);

            let mut wave_infos = Vec::with_capacity(wave.len());
            for (stack, live_name) in wave.iter().zip(&live_names) {
                let stack_request = StackRequest {
                    name: live_name.clone(),
                    template: stack.template_file.clone(),
                    params: params.get_params(&stack.parameters),
                    metadata: StringMap::new(),
                    dry_run: request.dry_run,
                };
                let info = self
                    .upsert_stack(&target, &request.env_name, stack_request, no_update, cancel)
                    .await?;
                emit_stack_upserted(&info);
                wave_infos.push(info);
            }

            if !request.dry_run {
                self.poller
                    .wait_for_stacks(
                        target.deployer.as_ref(),
                        &request.env_name,
                        &live_names,
                        State::Complete,
                        cancel,
                    )
                    .await?;
                emit_wave_converged(wave_idx, &State::Complete);
            }

            for ((stack, live_name), info) in wave.iter().zip(&live_names).zip(&wave_infos) {
                if request.dry_run && info.next_action != NextAction::Update {
                    continue;
                }
                let outputs = cancel
                    .guard(target.deployer.get_stack_outputs(live_name))
                    .await?;
                params.set_params(&stack.name, &outputs);
                emit_outputs_published(&stack.name, outputs.len());
            }

            results.extend(wave_infos);
        }

        info!(env = %request.env_name, stacks = results.len(), dry_run = request.dry_run, "deploy finished");
        Ok(results)
    }

    /// Create the stack if the backend does not know it, otherwise update it
    /// unless updates are suppressed.
    async fn upsert_stack(
        &self,
        target: &Target,
        env_name: &str,
        mut request: StackRequest,
        no_update: bool,
        cancel: &CancelSignal,
    ) -> Result<StackInfo> {
        let existing = cancel.guard(target.deployer.get_stack_info(&request.name)).await;
        match existing {
            Err(SwizError::Iac(err)) if err.is_not_found() => {
                request.metadata = self.stack_metadata(target, env_name, true);
                cancel.guard(target.deployer.create_stack(&request)).await
            }
            Err(err) => Err(err),
            Ok(_) if no_update => Err(SwizError::already_exists(Subject::Stack, request.name)),
            Ok(_) => {
                request.metadata = self.stack_metadata(target, env_name, false);
                cancel.guard(target.deployer.update_stack(&request)).await
            }
        }
    }

    fn stack_metadata(&self, target: &Target, env_name: &str, is_create: bool) -> StringMap {
        let mut tags = StringMap::new();
        tags.insert(TAG_ENV_NAME.to_string(), env_name.to_string());
        if is_create {
            tags.insert(TAG_CREATE_DATE.to_string(), chrono::Utc::now().to_rfc3339());
            tags.insert(TAG_CREATE_USER.to_string(), self.create_user.clone());
            tags.insert(TAG_ENV_DEF.to_string(), target.env.env_def_name.clone());
            tags.insert(TAG_ENCLAVE.to_string(), target.enclave.name.clone());
        }
        tags
    }

    /// Delete every declared stack in reverse wave order, then any orphaned
    /// stack still tagged with the environment.
    ///
    /// Returns the declared stacks' results followed by the orphans'.
    pub async fn delete_environment(
        &self,
        request: &DeleteRequest,
        cancel: &CancelSignal,
    ) -> Result<Vec<StackInfo>> {
        let op = OperationSpan::new(OperationKind::Delete, &request.env_name);
        self.delete(request, cancel).instrument(op.span()).await
    }

    async fn delete(&self, request: &DeleteRequest, cancel: &CancelSignal) -> Result<Vec<StackInfo>> {
        require_env_name(&request.env_name)?;
        let target = self.resolve(&request.enclave, &request.env_def)?;
        let behavior = target.enclave.env_behavior;
        let no_orphan_delete = flag_or_config(request.no_orphan_delete, behavior.no_orphan_delete);
        let fast_delete = flag_or_config(request.fast_delete, behavior.fast_delete);
        let wait = !fast_delete && !request.dry_run;
        check_live_names(&target.env, &request.env_name)?;

        let mut results = Vec::new();
        let mut deleted: HashSet<String> = HashSet::new();

        for (wave_idx, wave) in build_dependency_order(target.env.stacks.values(), true)
            .into_iter()
            .enumerate()
        {
            let live_names: Vec<String> = wave
                .iter()
                .map(|s| target.env.live_stack_name(&request.env_name, &s.name))
                .collect();
            emit_wave_started(wave_idx, &live_names);

            for live_name in &live_names {
                let info = cancel
                    .guard(target.deployer.delete_stack(live_name, request.dry_run))
                    .await?;
                emit_stack_deleted(&info, false);
                deleted.insert(live_name.clone());
                results.push(info);
            }

            if wait {
                self.poller
                    .wait_for_stacks(
                        target.deployer.as_ref(),
                        &request.env_name,
                        &live_names,
                        State::Deleted,
                        cancel,
                    )
                    .await?;
                emit_wave_converged(wave_idx, &State::Deleted);
            }
        }

        if !no_orphan_delete {
            let live = cancel
                .guard(target.deployer.list_stacks(&request.env_name))
                .await?;
            let orphans: BTreeSet<String> = live
                .into_iter()
                .map(|s| s.name)
                .filter(|name| !deleted.contains(name))
                .collect();

            for name in &orphans {
                emit_orphan_detected(&request.env_name, name);
                let info = cancel
                    .guard(target.deployer.delete_stack(name, request.dry_run))
                    .await?;
                emit_stack_deleted(&info, true);
                results.push(info);
            }

            if wait && !orphans.is_empty() {
                let names: Vec<String> = orphans.into_iter().collect();
                self.poller
                    .wait_for_stacks(
                        target.deployer.as_ref(),
                        &request.env_name,
                        &names,
                        State::Deleted,
                        cancel,
                    )
                    .await?;
            }
        }

        info!(env = %request.env_name, stacks = results.len(), dry_run = request.dry_run, "delete finished");
        Ok(results)
    }

    /// Environment names known to the enclave's backend, sorted.
    pub async fn list_environments(
        &self,
        enclave: &str,
        env_def: &str,
        cancel: &CancelSignal,
    ) -> Result<Vec<String>> {
        let target = self.resolve(enclave, env_def)?;
        let names = cancel.guard(target.deployer.list_environments()).await?;
        let sorted: BTreeSet<String> = names.into_iter().collect();
        Ok(sorted.into_iter().collect())
    }

    /// Aggregate status of every live stack tagged with `env_name`.
    pub async fn get_environment_info(
        &self,
        enclave: &str,
        env_def: &str,
        env_name: &str,
        cancel: &CancelSignal,
    ) -> Result<EnvironmentInfo> {
        require_env_name(env_name)?;
        let target = self.resolve(enclave, env_def)?;
        cancel.guard(target.deployer.get_environment(env_name)).await
    }
}

fn require_env_name(env_name: &str) -> Result<()> {
    if env_name.trim().is_empty() {
        return Err(SwizError::Usage("an environment name is required".to_string()));
    }
    Ok(())
}

/// Fail when two declared stacks map to the same live name in `env_name`.
fn check_live_names(env: &EnvironmentConfig, env_name: &str) -> Result<()> {
    let mut owners: BTreeMap<String, &str> = BTreeMap::new();
    for stack in env.stacks.values() {
        let live_name = env.live_stack_name(env_name, &stack.name);
        if let Some(other) = owners.insert(live_name.clone(), &stack.name) {
            return Err(SwizError::Usage(format!(
                "stacks {other} and {} both map to live name {live_name}",
                stack.name
            )));
        }
    }
    Ok(())
}

/// Declared stacks matching `names`, or every declared stack when empty.
///
/// A named stack must exist and carry a non-negative order.
fn select_stacks<'a>(env: &'a EnvironmentConfig, names: &[String]) -> Result<Vec<&'a StackConfig>> {
    if names.is_empty() {
        return Ok(env.stacks.values().collect());
    }
    let wanted: BTreeSet<&str> = names.iter().map(String::as_str).collect();
    wanted
        .into_iter()
        .map(|name| {
            let stack = env
                .stacks
                .get(name)
                .ok_or_else(|| SwizError::not_found(Subject::Stack, name))?;
            if !stack.is_scheduled() {
                return Err(SwizError::Usage(format!(
                    "stack {name} has order {} and is never deployed",
                    stack.order
                )));
            }
            Ok(stack)
        })
        .collect()
}
