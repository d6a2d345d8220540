//! Idle shutdown monitor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::info;

use vox_core::ServiceState;

use crate::context::DaemonContext;

/// Background task that shuts the daemon down after a period with no
/// synthesis activity. Outside of an explicit termination signal, this is
/// the only path to process exit.
pub struct IdleMonitor {
    ctx: Arc<DaemonContext>,
    shutdown_tx: watch::Sender<bool>,
    check_interval: Duration,
}

impl IdleMonitor {
    pub fn new(ctx: Arc<DaemonContext>, shutdown_tx: watch::Sender<bool>) -> Self {
        let timeout = ctx.config.idle_timeout();
        let check_interval =
            (timeout / 10).clamp(Duration::from_millis(100), Duration::from_secs(60));
        Self {
            ctx,
            shutdown_tx,
            check_interval,
        }
    }

    /// Run until the idle timeout expires or shutdown is initiated
    /// elsewhere. On expiry, flips the service state to `ShuttingDown` and
    /// signals the watch channel; the server then drains in-flight requests
    /// and releases the endpoint.
    pub async fn run(self) {
        let timeout = self.ctx.config.idle_timeout();
        let mut ticker = time::interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if *self.shutdown_tx.borrow() {
                return;
            }
            let idle = self.ctx.activity.idle_for();
            if idle >= timeout {
                info!(
                    idle_secs = idle.as_secs(),
                    timeout_secs = timeout.as_secs(),
                    "idle timeout reached, shutting down"
                );
                self.ctx.set_state(ServiceState::ShuttingDown);
                let _ = self.shutdown_tx.send(true);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vox_core::DaemonConfig;
    use vox_engine::{MockEngine, SpeechEngine};

    fn context_with_timeout(mins: u64) -> Arc<DaemonContext> {
        let config = DaemonConfig {
            idle_timeout_mins: mins,
            ..Default::default()
        };
        let ctx = DaemonContext::new(config, Arc::new(MockEngine::new()) as Arc<dyn SpeechEngine>);
        ctx.set_state(ServiceState::Ready);
        Arc::new(ctx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_after_idle_timeout() {
        let ctx = context_with_timeout(1);
        let (tx, mut rx) = watch::channel(false);
        tokio::spawn(IdleMonitor::new(Arc::clone(&ctx), tx).run());

        rx.changed().await.unwrap();
        assert!(*rx.borrow());
        assert_eq!(ctx.state(), ServiceState::ShuttingDown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_defers_shutdown() {
        let ctx = context_with_timeout(1);
        let (tx, rx) = watch::channel(false);
        tokio::spawn(IdleMonitor::new(Arc::clone(&ctx), tx).run());

        // Touch at 30s; the 60s window restarts from there.
        time::sleep(Duration::from_secs(30)).await;
        ctx.activity.touch();

        time::sleep(Duration::from_secs(40)).await;
        assert!(!*rx.borrow(), "70s in, but only 40s idle");
        assert_eq!(ctx.state(), ServiceState::Ready);

        time::sleep(Duration::from_secs(30)).await;
        assert!(*rx.borrow(), "100s in, 70s idle");
        assert_eq!(ctx.state(), ServiceState::ShuttingDown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_shutdown_stops_monitor() {
        let ctx = context_with_timeout(60);
        let (tx, _rx) = watch::channel(false);
        let handle = tokio::spawn(IdleMonitor::new(Arc::clone(&ctx), tx.clone()).run());

        let _ = tx.send(true);
        time::sleep(Duration::from_secs(3600)).await;
        assert!(handle.is_finished());
        // The monitor did not initiate this shutdown, so it leaves state alone.
        assert_eq!(ctx.state(), ServiceState::Ready);
    }
}
