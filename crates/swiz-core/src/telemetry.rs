//! Log output for swiz commands.
//!
//! Wave progress, stack upserts and convergence polls are emitted as tracing
//! events. This module decides where they are written and in which shape:
//! human-readable lines by default, or one JSON object per line with `--json`
//! so a pipeline can follow a deploy. Both go to stderr; stdout carries only
//! command results.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the process-wide subscriber.
///
/// `RUST_LOG` wins over `level` when set. Only the first call takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let lines = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let installed = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(lines.json())
            .try_init()
    } else {
        tracing_subscriber::registry().with(filter).with(lines).try_init()
    };
    // A subscriber set earlier in the process (tests, embedding tools) is kept.
    let _ = installed;
}
