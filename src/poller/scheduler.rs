use crate::poller::cycle::PollController;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Clock capability the scheduler waits on between cycles.
#[async_trait]
pub trait Timer: Send + Sync + 'static {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[async_trait]
impl Timer for TokioTimer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Handle to a running scheduler task.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<u64>,
}

impl SchedulerHandle {
    /// Stop arming new cycles and wait for the in-flight one, if any.
    ///
    /// Returns the number of cycles that ran.
    pub async fn shutdown(self) -> Result<u64, tokio::task::JoinError> {
        let _ = self.shutdown_tx.send(true);
        self.join.await
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

pub struct Scheduler;

impl Scheduler {
    /// Spawn the cycle loop. Exactly one cycle is outstanding at a time: the
    /// next one is armed only after the previous one has decided its delay.
    pub fn spawn<T: Timer>(controller: PollController, timer: T) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(run_loop(controller, timer, shutdown_rx));
        SchedulerHandle { shutdown_tx, join }
    }
}

/// Drive cycles until shutdown is signalled. A signal never interrupts a
/// running cycle; it only cancels the sleep before the next one.
pub async fn run_loop<T: Timer>(
    mut controller: PollController,
    timer: T,
    mut shutdown_rx: watch::Receiver<bool>,
) -> u64 {
    let mut cycles = 0u64;
    info!(
        source_id = %controller.settings().source_id,
        interval_secs = controller.settings().interval.as_secs(),
        "Poll scheduler started"
    );

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let outcome = controller.run_cycle().await;
        cycles += 1;

        if *shutdown_rx.borrow() {
            break;
        }

        debug!(
            delay_ms = outcome.next_delay.as_millis() as u64,
            "Arming next poll"
        );

        tokio::select! {
            _ = timer.sleep(outcome.next_delay) => {}
            _ = wait_for_shutdown(&mut shutdown_rx) => break,
        }
    }

    info!(cycles = cycles, "Poll scheduler stopped");
    cycles
}

async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
