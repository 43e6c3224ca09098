//! Contract tests for IacDeployer.
//!
//! These tests pin the behavior the orchestrator relies on from any
//! backend, exercised against the in-memory deployer.

use swiz_iac::fakes::{DeployerCall, MemoryDeployer};
use swiz_iac::*;

// ---- Helpers ----

fn request(name: &str, env: &str, dry_run: bool) -> StackRequest {
    let mut metadata = StringMap::new();
    metadata.insert(TAG_ENV_NAME.to_string(), env.to_string());
    metadata.insert(TAG_ENCLAVE.to_string(), "dev-enclave".to_string());
    let mut params = StringMap::new();
    params.insert("VpcCidr".to_string(), "10.0.0.0/16".to_string());
    StackRequest {
        name: name.to_string(),
        template: "/tmp/templates/boot.yaml".to_string(),
        params,
        metadata,
        dry_run,
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// ===========================================================================
// Create / update / delete
// ===========================================================================

#[tokio::test]
async fn create_reports_in_progress_then_converges() {
    let deployer = MemoryDeployer::new();
    let info = deployer
        .create_stack(&request("dev-boot", "dev", false))
        .await
        .unwrap();

    assert_eq!(info.name, "dev-boot");
    assert_eq!(info.next_action, NextAction::Create);
    assert_eq!(info.state(), State::Creating);

    let reached = deployer
        .stacks_in_state("dev", &names(&["dev-boot"]), &[State::Complete])
        .await
        .unwrap();
    assert_eq!(reached, names(&["dev-boot"]));
    assert_eq!(deployer.state_of("dev-boot"), Some(State::Complete));
}

#[tokio::test]
async fn create_twice_is_rejected() {
    let deployer = MemoryDeployer::new();
    deployer
        .create_stack(&request("dev-boot", "dev", false))
        .await
        .unwrap();
    let err = deployer
        .create_stack(&request("dev-boot", "dev", false))
        .await
        .unwrap_err();

    assert!(matches!(err, IacError::InvalidRequest(_)));
}

#[tokio::test]
async fn create_stores_params_and_tags() {
    let deployer = MemoryDeployer::new();
    deployer
        .create_stack(&request("dev-boot", "dev", false))
        .await
        .unwrap();

    let params = deployer.params_of("dev-boot").unwrap();
    assert_eq!(params.get("VpcCidr").unwrap(), "10.0.0.0/16");
    let tags = deployer.tags_of("dev-boot").unwrap();
    assert_eq!(tags.get(TAG_ENV_NAME).unwrap(), "dev");
    assert_eq!(
        deployer.template_of("dev-boot").unwrap(),
        "/tmp/templates/boot.yaml"
    );
}

#[tokio::test]
async fn update_missing_stack_is_not_found() {
    let deployer = MemoryDeployer::new();
    let err = deployer
        .update_stack(&request("dev-boot", "dev", false))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn update_merges_tags_and_replaces_params() {
    let deployer = MemoryDeployer::new();
    deployer.seed_stack("dev-boot", "dev", State::Complete);

    let mut req = request("dev-boot", "dev", false);
    req.params.clear();
    req.params.insert("Size".to_string(), "large".to_string());
    let info = deployer.update_stack(&req).await.unwrap();

    assert_eq!(info.state(), State::Updating);
    assert_eq!(info.next_action, NextAction::Update);
    let params = deployer.params_of("dev-boot").unwrap();
    assert_eq!(params.len(), 1);
    assert_eq!(params.get("Size").unwrap(), "large");
    let tags = deployer.tags_of("dev-boot").unwrap();
    assert_eq!(tags.get(TAG_ENCLAVE).unwrap(), "dev-enclave");
}

#[tokio::test]
async fn delete_missing_stack_reports_deleted() {
    let deployer = MemoryDeployer::new();
    let info = deployer.delete_stack("dev-ghost", false).await.unwrap();

    assert_eq!(info.state(), State::Deleted);
    assert_eq!(info.next_action, NextAction::Delete);
}

// ===========================================================================
// Dry run
// ===========================================================================

#[tokio::test]
async fn dry_run_never_mutates() {
    let deployer = MemoryDeployer::new();
    deployer.seed_stack("dev-web", "dev", State::Complete);

    let created = deployer
        .create_stack(&request("dev-boot", "dev", true))
        .await
        .unwrap();
    let updated = deployer
        .update_stack(&request("dev-web", "dev", true))
        .await
        .unwrap();
    let deleted = deployer.delete_stack("dev-web", true).await.unwrap();

    assert_eq!(created.state(), State::DryRun);
    assert_eq!(updated.state(), State::DryRun);
    assert_eq!(deleted.state(), State::DryRun);
    assert_eq!(deployer.stack_names(), names(&["dev-web"]));
    assert_eq!(deployer.state_of("dev-web"), Some(State::Complete));
    assert!(deployer.calls().iter().all(|c| !c.is_mutation()));
}

// ===========================================================================
// Describe / outputs
// ===========================================================================

#[tokio::test]
async fn get_stack_info_missing_is_not_found() {
    let deployer = MemoryDeployer::new();
    let err = deployer.get_stack_info("dev-boot").await.unwrap_err();

    assert!(matches!(err, IacError::NotFound { ref kind, .. } if kind == "stack"));
}

#[tokio::test]
async fn outputs_include_preset_values_and_stack_name() {
    let deployer = MemoryDeployer::new();
    deployer.seed_stack("dev-boot", "dev", State::Complete);
    let mut preset = StringMap::new();
    preset.insert("VpcId".to_string(), "vpc-123".to_string());
    deployer.set_outputs("dev-boot", preset);

    let outputs = deployer.get_stack_outputs("dev-boot").await.unwrap();
    assert_eq!(outputs.get("VpcId").unwrap(), "vpc-123");
    assert_eq!(outputs.get("StackName").unwrap(), "dev-boot");
}

#[tokio::test]
async fn outputs_of_missing_stack_is_not_found() {
    let deployer = MemoryDeployer::new();
    let err = deployer.get_stack_outputs("dev-boot").await.unwrap_err();

    assert!(err.is_not_found());
}

// ===========================================================================
// Listing / environment aggregation
// ===========================================================================

#[tokio::test]
async fn list_stacks_filters_by_env_tag() {
    let deployer = MemoryDeployer::new();
    deployer.seed_stack("dev-boot", "dev", State::Complete);
    deployer.seed_stack("prod-boot", "prod", State::Complete);

    let stacks = deployer.list_stacks("dev").await.unwrap();
    assert_eq!(stacks.len(), 1);
    assert_eq!(stacks[0].name, "dev-boot");
}

#[tokio::test]
async fn list_environments_sorted_and_distinct() {
    let deployer = MemoryDeployer::new();
    deployer.seed_stack("qa-web", "qa", State::Complete);
    deployer.seed_stack("dev-boot", "dev", State::Complete);
    deployer.seed_stack("dev-web", "dev", State::Complete);

    let envs = deployer.list_environments().await.unwrap();
    assert_eq!(envs, names(&["dev", "qa"]));
}

#[tokio::test]
async fn get_environment_aggregates_states() {
    let deployer = MemoryDeployer::new();
    deployer.seed_stack("dev-boot", "dev", State::Complete);
    deployer.seed_stack("dev-web", "dev", State::Updating);

    let env = deployer.get_environment("dev").await.unwrap();
    assert_eq!(env.environment_name, "dev");
    assert_eq!(env.deploy_status.state, State::Updating);
    assert_eq!(env.deploy_status.details, "dev-web[Updating]");
    assert_eq!(env.stacks.len(), 2);
}

#[tokio::test]
async fn get_environment_without_stacks_is_not_found() {
    let deployer = MemoryDeployer::new();
    let err = deployer.get_environment("dev").await.unwrap_err();

    assert!(matches!(err, IacError::NotFound { ref kind, .. } if kind == "environment"));
}

// ===========================================================================
// Convergence
// ===========================================================================

#[tokio::test]
async fn failed_stack_aborts_convergence_query() {
    let deployer = MemoryDeployer::new();
    deployer.fail_stack("dev-web");
    deployer
        .create_stack(&request("dev-boot", "dev", false))
        .await
        .unwrap();
    deployer
        .create_stack(&request("dev-web", "dev", false))
        .await
        .unwrap();

    let err = deployer
        .stacks_in_state("dev", &names(&["dev-boot", "dev-web"]), &[State::Complete])
        .await
        .unwrap_err();

    assert!(matches!(err, IacError::StackFailed { ref name, .. } if name == "dev-web"));
    assert_eq!(deployer.state_of("dev-web"), Some(State::Failed));
}

#[tokio::test]
async fn absent_stacks_count_as_deleted() {
    let deployer = MemoryDeployer::new();
    let reached = deployer
        .stacks_in_state("dev", &names(&["dev-ghost"]), &[State::Deleted])
        .await
        .unwrap();

    assert_eq!(reached, names(&["dev-ghost"]));
}

#[tokio::test]
async fn calls_are_journaled_in_order() {
    let deployer = MemoryDeployer::new();
    deployer
        .create_stack(&request("dev-boot", "dev", false))
        .await
        .unwrap();
    deployer.delete_stack("dev-boot", false).await.unwrap();

    assert_eq!(
        deployer.calls(),
        vec![
            DeployerCall::Create {
                name: "dev-boot".to_string(),
                dry_run: false
            },
            DeployerCall::Delete {
                name: "dev-boot".to_string(),
                dry_run: false
            },
        ]
    );
}
