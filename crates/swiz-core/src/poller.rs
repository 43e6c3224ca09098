//! Convergence polling.

use std::time::Duration;

use swiz_iac::{IacDeployer, State};
use tokio::time::Instant;
use tracing::debug;

use crate::cancel::CancelSignal;
use crate::error::{Result, SwizError};

/// Default delay between convergence polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Blocks until a set of stacks reaches a target state.
#[derive(Debug, Clone, Copy)]
pub struct ConvergencePoller {
    pub interval: Duration,
    /// `None` polls until convergence, failure or cancellation.
    pub timeout: Option<Duration>,
}

impl Default for ConvergencePoller {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }
}

impl ConvergencePoller {
    pub fn new(interval: Duration, timeout: Option<Duration>) -> Self {
        Self { interval, timeout }
    }

    /// Poll until every stack in `stacks` reports `target`.
    ///
    /// Converged names drop out of the outstanding list after each poll. A
    /// stack in a terminal failure state aborts the wait immediately with the
    /// backend's `StackFailed` error; nothing is retried. With a timeout the
    /// last sleep is cut short so one final poll lands on the deadline.
    pub async fn wait_for_stacks(
        &self,
        deployer: &dyn IacDeployer,
        env_name: &str,
        stacks: &[String],
        target: State,
        cancel: &CancelSignal,
    ) -> Result<()> {
        let started = Instant::now();
        let deadline = self.timeout.map(|timeout| started + timeout);
        let mut outstanding: Vec<String> = stacks.to_vec();
        let mut polls: u32 = 0;

        while !outstanding.is_empty() {
            polls += 1;
            let reached = cancel
                .guard(deployer.stacks_in_state(env_name, &outstanding, &[target]))
                .await?;
            outstanding.retain(|name| !reached.contains(name));
            debug!(
                env = %env_name,
                target = %target,
                poll = polls,
                outstanding = ?outstanding,
                "convergence poll"
            );
            if outstanding.is_empty() {
                break;
            }

            let mut pause = self.interval;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return Err(SwizError::ConvergenceTimeout {
                        stacks: outstanding,
                        waited_secs: (now - started).as_secs(),
                    });
                }
                pause = pause.min(deadline - now);
            }
            cancel.sleep(pause).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swiz_iac::fakes::{DeployerCall, MemoryDeployer};
    use swiz_iac::IacError;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn poll_count(deployer: &MemoryDeployer) -> usize {
        deployer
            .calls()
            .iter()
            .filter(|c| matches!(c, DeployerCall::StacksInState(_)))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_once_all_converged() {
        let deployer = MemoryDeployer::new().with_settle_polls(2);
        deployer.seed_stack("dev-boot", "dev", State::Complete);
        deployer.seed_stack("dev-web", "dev", State::Complete);
        // Restart both so they need polls to settle.
        deployer.delete_stack("dev-boot", false).await.unwrap();
        deployer.delete_stack("dev-web", false).await.unwrap();

        ConvergencePoller::default()
            .wait_for_stacks(
                &deployer,
                "dev",
                &names(&["dev-boot", "dev-web"]),
                State::Deleted,
                &CancelSignal::never(),
            )
            .await
            .unwrap();

        assert_eq!(poll_count(&deployer), 3);
        assert!(deployer.stack_names().is_empty());
    }

    #[tokio::test]
    async fn test_failure_aborts_without_further_polls() {
        let deployer = MemoryDeployer::new().with_settle_polls(1);
        deployer.fail_stack("dev-web");
        deployer.seed_stack("dev-web", "dev", State::Complete);
        deployer.delete_stack("dev-web", false).await.unwrap();

        let poller = ConvergencePoller::new(Duration::ZERO, None);
        let err = poller
            .wait_for_stacks(
                &deployer,
                "dev",
                &names(&["dev-web"]),
                State::Deleted,
                &CancelSignal::never(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SwizError::Iac(IacError::StackFailed { ref name, .. }) if name == "dev-web"
        ));
        assert_eq!(poll_count(&deployer), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_outstanding() {
        let deployer = MemoryDeployer::new().with_settle_polls(100);
        deployer.seed_stack("dev-boot", "dev", State::Complete);
        deployer.delete_stack("dev-boot", false).await.unwrap();

        let poller = ConvergencePoller::new(Duration::from_secs(5), Some(Duration::from_secs(12)));
        let err = poller
            .wait_for_stacks(
                &deployer,
                "dev",
                &names(&["dev-boot"]),
                State::Deleted,
                &CancelSignal::never(),
            )
            .await
            .unwrap_err();

        match err {
            SwizError::ConvergenceTimeout { stacks, waited_secs } => {
                assert_eq!(stacks, names(&["dev-boot"]));
                assert_eq!(waited_secs, 12);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Polls at 0s, 5s, 10s and one more at the 12s deadline.
        assert_eq!(poll_count(&deployer), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_converges_on_deadline_poll() {
        let deployer = MemoryDeployer::new().with_settle_polls(3);
        deployer.seed_stack("dev-boot", "dev", State::Complete);
        deployer.delete_stack("dev-boot", false).await.unwrap();

        let started = Instant::now();
        let poller = ConvergencePoller::new(Duration::from_secs(5), Some(Duration::from_secs(12)));
        poller
            .wait_for_stacks(
                &deployer,
                "dev",
                &names(&["dev-boot"]),
                State::Deleted,
                &CancelSignal::never(),
            )
            .await
            .unwrap();

        assert_eq!(poll_count(&deployer), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(12));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_poll() {
        let deployer = MemoryDeployer::new();
        let handle = crate::cancel::CancelHandle::new();
        handle.cancel();

        let err = ConvergencePoller::default()
            .wait_for_stacks(
                &deployer,
                "dev",
                &names(&["dev-boot"]),
                State::Complete,
                &handle.signal(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SwizError::Cancelled));
        assert_eq!(poll_count(&deployer), 0);
    }

    #[tokio::test]
    async fn test_empty_stack_list_never_polls() {
        let deployer = MemoryDeployer::new();
        ConvergencePoller::default()
            .wait_for_stacks(&deployer, "dev", &[], State::Complete, &CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(poll_count(&deployer), 0);
    }
}
