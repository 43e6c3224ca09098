//! Structured observability hooks for environment operations.
//!
//! This module provides:
//! - Operation-scoped tracing spans via [`OperationSpan`]
//! - Emission functions for stack, wave and reconciliation events
//!
//! Events are emitted at `info!` level (filter with `RUST_LOG`).

use std::fmt;

use swiz_iac::StackInfo;
use tracing::{info, warn, Span};

/// Kind of orchestration run a span belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Deploy,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Deploy => f.write_str("deploy"),
            OperationKind::Delete => f.write_str("delete"),
        }
    }
}

/// Span covering one deploy or delete, tagged with a fresh `operation_id`.
///
/// Attach it to the operation's future with `tracing::Instrument` so every
/// event emitted while the operation runs carries the id.
///
/// # Example
///
/// ```ignore
/// let op = OperationSpan::new(OperationKind::Deploy, "dev");
/// run_waves().instrument(op.span()).await
/// ```
pub struct OperationSpan {
    operation_id: String,
    span: Span,
}

impl OperationSpan {
    pub fn new(kind: OperationKind, env_name: &str) -> Self {
        let operation_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            "swiz.operation",
            operation_id = %operation_id,
            env = %env_name,
            kind = %kind,
        );
        Self { operation_id, span }
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    pub fn span(&self) -> Span {
        self.span.clone()
    }
}

/// Emit event: a wave is about to be issued.
pub fn emit_wave_started(wave: usize, stacks: &[String]) {
    info!(event = "wave.started", wave = wave, stacks = ?stacks);
}

/// Emit event: every stack of a wave reached its target state.
pub fn emit_wave_converged(wave: usize, target: &dyn fmt::Display) {
    info!(event = "wave.converged", wave = wave, target = %target);
}

/// Emit event: a stack was created or updated.
pub fn emit_stack_upserted(info: &StackInfo) {
    info!(
        event = "stack.upserted",
        stack = %info.name,
        action = %info.next_action,
        state = %info.state(),
    );
}

/// Emit event: a delete was issued for a stack.
pub fn emit_stack_deleted(info: &StackInfo, orphan: bool) {
    info!(
        event = "stack.deleted",
        stack = %info.name,
        state = %info.state(),
        orphan = orphan,
    );
}

/// Emit event: a stack's outputs were published into the parameter store.
pub fn emit_outputs_published(stack: &str, count: usize) {
    info!(event = "outputs.published", stack = %stack, count = count);
}

/// Emit event: a live stack is tagged with the environment but not declared.
pub fn emit_orphan_detected(env_name: &str, stack: &str) {
    warn!(event = "orphan.detected", env = %env_name, stack = %stack);
}

/// Emit event: an environment definition could not be loaded (warning level).
pub fn emit_environment_load_failed(env_def: &str, error: &dyn fmt::Display) {
    warn!(event = "environment.load_failed", env_def = %env_def, error = %error);
}
