//! Swiz - stack lifecycle orchestration CLI
//!
//! The `swiz` command deploys and deletes environments made of ordered IaC
//! stacks.
//!
//! ## Commands
//!
//! - `env deploy`: Create or update the stacks of an environment
//! - `env delete`: Delete an environment's stacks, orphans included
//! - `env list`: List environments known to an enclave
//! - `env info`: Show an environment's aggregate status

use std::fmt::Write as _;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use swiz_core::config::LOCATION_ENV_VAR;
use swiz_core::{
    AppConfig, CancelHandle, CancelSignal, DeleteRequest, DeployRequest, EnvService,
};
use swiz_iac::{EnvironmentInfo, StackInfo};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "swiz")]
#[command(author = "Swiz Developers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Stack lifecycle orchestrator", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Application config location (default: ~/.swiz/appconfig.yaml)
    #[arg(long, global = true, env = LOCATION_ENV_VAR)]
    appconfig: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage environments
    Env {
        #[command(subcommand)]
        action: EnvAction,
    },
}

#[derive(Subcommand)]
enum EnvAction {
    /// Deploy an environment
    Deploy {
        /// Environment name
        #[arg(short, long)]
        name: String,

        /// Environment definition (default: the app config's default)
        #[arg(short = 'd', long, default_value = "")]
        env_def: String,

        /// Enclave to deploy into (default: the environment's default)
        #[arg(short, long, default_value = "")]
        enclave: String,

        /// Stacks to deploy; repeat or separate with commas
        #[arg(short, long = "stack", value_delimiter = ',')]
        stacks: Vec<String>,

        /// Deploy every declared stack when none are named
        #[arg(long)]
        deploy_all: bool,

        /// Report what would happen without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Leave existing stacks untouched
        #[arg(long)]
        no_update_deploy: bool,
    },

    /// Delete an environment
    Delete {
        /// Environment name
        #[arg(short, long)]
        name: String,

        /// Environment definition (default: the app config's default)
        #[arg(short = 'd', long, default_value = "")]
        env_def: String,

        /// Enclave the environment lives in
        #[arg(short, long, default_value = "")]
        enclave: String,

        /// Report what would happen without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Keep stacks tagged with the environment but not declared by it
        #[arg(long)]
        no_orphan_delete: bool,

        /// Issue every delete at once instead of wave by wave
        #[arg(long)]
        fast_delete: bool,
    },

    /// List environments
    List {
        /// Environment definition (default: the app config's default)
        #[arg(short = 'd', long, default_value = "")]
        env_def: String,

        /// Enclave to query
        #[arg(short, long, default_value = "")]
        enclave: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// Show environment status
    Info {
        /// Environment name
        #[arg(short, long)]
        name: String,

        /// Environment definition (default: the app config's default)
        #[arg(short = 'd', long, default_value = "")]
        env_def: String,

        /// Enclave to query
        #[arg(short, long, default_value = "")]
        enclave: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
}

impl EnvAction {
    fn name(&self) -> &'static str {
        match self {
            EnvAction::Deploy { .. } => "deploy",
            EnvAction::Delete { .. } => "delete",
            EnvAction::List { .. } => "list",
            EnvAction::Info { .. } => "info",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    swiz_core::init_tracing(cli.json, level);

    let config = AppConfig::load(cli.appconfig.as_deref())
        .context("Failed to load application config")?;

    let Commands::Env { action } = cli.command;
    if config.is_command_disabled("env", action.name()) {
        bail!("command 'env {}' is disabled by configuration", action.name());
    }

    let service = EnvService::new(&config);
    let load_errors = service.env_repo().load_errors();
    if !load_errors.is_empty() {
        warn!(errors = %load_errors, "some environment definitions are unavailable");
    }

    let cancel = CancelHandle::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });
    let signal = cancel.signal();

    match action {
        EnvAction::Deploy {
            name,
            env_def,
            enclave,
            stacks,
            deploy_all,
            dry_run,
            no_update_deploy,
        } => {
            let request = DeployRequest {
                enclave,
                env_def,
                env_name: name,
                deploy_all,
                stacks: normalize_stacks(stacks),
                dry_run,
                no_update: no_update_deploy,
            };
            cmd_env_deploy(&service, &request, &signal).await
        }
        EnvAction::Delete {
            name,
            env_def,
            enclave,
            dry_run,
            no_orphan_delete,
            fast_delete,
        } => {
            let request = DeleteRequest {
                enclave,
                env_def,
                env_name: name,
                dry_run,
                no_orphan_delete,
                fast_delete,
            };
            cmd_env_delete(&service, &request, &signal).await
        }
        EnvAction::List {
            env_def,
            enclave,
            output,
        } => cmd_env_list(&service, &enclave, &env_def, output, &signal).await,
        EnvAction::Info {
            name,
            env_def,
            enclave,
            output,
        } => cmd_env_info(&service, &enclave, &env_def, &name, output, &signal).await,
    }
}

/// Trim stack names and drop empties left by stray commas.
fn normalize_stacks(stacks: Vec<String>) -> Vec<String> {
    stacks
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn render_stacks(stacks: &[StackInfo]) -> String {
    let mut out = String::new();
    for stack in stacks {
        let _ = writeln!(
            out,
            "Stack: {} [{}] - {}",
            stack.name,
            stack.state(),
            stack.next_action
        );
    }
    out
}

fn render_env_list(names: &[String], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(names)?),
        OutputFormat::Text => Ok(names.join("\n")),
    }
}

fn render_env_info(env: &EnvironmentInfo, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(env)?);
    }

    let mut out = String::new();
    let _ = writeln!(out, "Name: {}", env.environment_name);
    let _ = writeln!(out, "Status: {}", env.deploy_status.state);
    let _ = writeln!(out, "Stacks [Status]:");
    for stack in &env.stacks {
        let _ = writeln!(out, "  {} [{}]", stack.name, stack.state());
    }
    Ok(out.trim_end().to_string())
}

async fn cmd_env_deploy(
    service: &EnvService,
    request: &DeployRequest,
    cancel: &CancelSignal,
) -> Result<()> {
    let results = service
        .deploy_environment(request, cancel)
        .await
        .with_context(|| format!("Failed to deploy environment {}", request.env_name))?;

    print!("{}", render_stacks(&results));
    info!(env = %request.env_name, stacks = results.len(), "environment deployed");
    Ok(())
}

async fn cmd_env_delete(
    service: &EnvService,
    request: &DeleteRequest,
    cancel: &CancelSignal,
) -> Result<()> {
    let results = service
        .delete_environment(request, cancel)
        .await
        .with_context(|| format!("Failed to delete environment {}", request.env_name))?;

    print!("{}", render_stacks(&results));
    info!(env = %request.env_name, stacks = results.len(), "environment deleted");
    Ok(())
}

async fn cmd_env_list(
    service: &EnvService,
    enclave: &str,
    env_def: &str,
    format: OutputFormat,
    cancel: &CancelSignal,
) -> Result<()> {
    let names = service
        .list_environments(enclave, env_def, cancel)
        .await
        .context("Failed to list environments")?;

    if names.is_empty() && format == OutputFormat::Text {
        println!("No environments found");
        return Ok(());
    }
    println!("{}", render_env_list(&names, format)?);
    Ok(())
}

async fn cmd_env_info(
    service: &EnvService,
    enclave: &str,
    env_def: &str,
    env_name: &str,
    format: OutputFormat,
    cancel: &CancelSignal,
) -> Result<()> {
    let env = service
        .get_environment_info(enclave, env_def, env_name, cancel)
        .await
        .with_context(|| format!("Failed to get environment {env_name}"))?;

    println!("{}", render_env_info(&env, format)?);
    Ok(())
}
