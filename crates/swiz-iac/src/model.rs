//! Stack and environment state records shared by every backend.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag carrying the environment name. Set on every create and update.
pub const TAG_ENV_NAME: &str = "SwzEnv";
/// Tag carrying the RFC 3339 creation timestamp. Create only.
pub const TAG_CREATE_DATE: &str = "SwzCreateDate";
/// Tag carrying the user that created the stack. Create only.
pub const TAG_CREATE_USER: &str = "SwzCreateUser";
/// Tag carrying the environment definition name. Create only.
pub const TAG_ENV_DEF: &str = "SwzEnvDef";
/// Tag carrying the enclave name. Create only.
pub const TAG_ENCLAVE: &str = "SwzEnclave";

/// String key/value mapping used for parameters, outputs and tags.
pub type StringMap = BTreeMap<String, String>;

/// Lifecycle state of a stack or an environment.
///
/// States carry an explicit severity ranking (see [`State::priority`]).
/// Combining the states of many stacks with [`State::get_priority`] always
/// surfaces the most significant one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Unknown,
    DryRun,
    Complete,
    Deleted,
    Creating,
    Updating,
    Deleting,
    RollingBack,
    Failed,
}

impl State {
    /// Every state, lowest severity first.
    pub const ALL: [State; 9] = [
        State::Unknown,
        State::DryRun,
        State::Complete,
        State::Deleted,
        State::Creating,
        State::Updating,
        State::Deleting,
        State::RollingBack,
        State::Failed,
    ];

    /// Severity rank. Higher means more in-progress or more severe.
    pub fn priority(self) -> u8 {
        match self {
            State::Unknown => 0,
            State::DryRun => 1,
            State::Complete => 2,
            State::Deleted => 3,
            State::Creating => 4,
            State::Updating => 5,
            State::Deleting => 6,
            State::RollingBack => 7,
            State::Failed => 8,
        }
    }

    /// Return whichever of `self` and `other` has the higher priority.
    pub fn get_priority(self, other: State) -> State {
        if other.priority() > self.priority() {
            other
        } else {
            self
        }
    }

    /// Terminal failure; convergence waits abort when a stack reports it.
    pub fn is_failure(self) -> bool {
        matches!(self, State::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            State::Unknown => "Unknown",
            State::DryRun => "DryRun",
            State::Complete => "Complete",
            State::Deleted => "Deleted",
            State::Creating => "Creating",
            State::Updating => "Updating",
            State::Deleting => "Deleting",
            State::RollingBack => "RollingBack",
            State::Failed => "Failed",
        }
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority().cmp(&other.priority())
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the orchestrator asked the backend to do with a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    None,
    Create,
    Update,
    Delete,
}

impl fmt::Display for NextAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NextAction::None => "None",
            NextAction::Create => "Create",
            NextAction::Update => "Update",
            NextAction::Delete => "Delete",
        };
        f.write_str(s)
    }
}

/// Backend-reported status of a stack or environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployStatus {
    pub name: String,
    pub state: State,
    /// Human-readable reason
    pub reason: String,
    /// Free-form details, e.g. a backend stack id or change set name
    pub details: String,
}

impl DeployStatus {
    pub fn new(name: impl Into<String>, state: State, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state,
            reason: reason.into(),
            details: String::new(),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }
}

impl fmt::Display for DeployStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.state, self.reason)?;
        if !self.details.is_empty() {
            write!(f, ": {}", self.details)?;
        }
        Ok(())
    }
}

/// Result of one operation against one stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackInfo {
    /// Live (deployed) stack name
    pub name: String,
    pub next_action: NextAction,
    pub deploy_status: DeployStatus,
    /// Resource type names touched by the operation
    pub resources: Vec<String>,
}

impl StackInfo {
    pub fn state(&self) -> State {
        self.deploy_status.state
    }
}

/// Aggregate view of every live stack tagged with an environment name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub environment_name: String,
    pub deploy_status: DeployStatus,
    pub stacks: Vec<StackInfo>,
}

impl EnvironmentInfo {
    /// Fold stack states into one environment status.
    ///
    /// Starts from `Complete`; every stack not yet complete raises the
    /// environment state through [`State::get_priority`] and is listed in
    /// the details as `name[State]`.
    pub fn aggregate(environment_name: impl Into<String>, stacks: Vec<StackInfo>) -> Self {
        let environment_name = environment_name.into();
        let mut env_state = State::Complete;
        let mut pending = Vec::new();
        for stack in &stacks {
            if stack.state() != State::Complete {
                env_state = env_state.get_priority(stack.state());
                pending.push(format!("{}[{}]", stack.name, stack.state()));
            }
        }

        Self {
            deploy_status: DeployStatus::new(environment_name.clone(), env_state, env_state.as_str())
                .with_details(pending.join(", ")),
            environment_name,
            stacks,
        }
    }
}

/// Everything a backend needs to create or update one stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackRequest {
    /// Live stack name
    pub name: String,
    /// Template location (local path or remote URL)
    pub template: String,
    /// Fully resolved parameter values
    pub params: StringMap,
    /// Tags attached to the stack
    pub metadata: StringMap,
    /// Report what would happen without touching live infrastructure
    pub dry_run: bool,
}
