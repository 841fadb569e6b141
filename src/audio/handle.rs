// Shared access to the ambient controller
//
// Every UI surface holds a clone of the same handle. The frame driver ticks
// the controller on a fixed interval; `leave` and `shutdown` implement the
// navigation and unmount paths on top of it.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::ambient::{AmbientController, AmbientStatus, DuckLevel, StartOutcome};
use crate::unlock::{arm_unlock, InputBus, InputKind, UnlockGuard};

#[derive(Clone)]
pub struct AmbientHandle {
    inner: Arc<Mutex<AmbientController>>,
}

impl AmbientHandle {
    pub fn new(controller: AmbientController) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    pub fn start(&self) -> StartOutcome {
        self.inner.lock().start()
    }

    pub fn duck(&self, level: DuckLevel) {
        self.inner.lock().duck(level);
    }

    pub fn toggle_pause(&self) -> bool {
        self.inner.lock().toggle_pause()
    }

    pub fn fade_out(&self, duration: Duration) {
        self.inner.lock().fade_out(duration);
    }

    pub fn stop(&self) {
        self.inner.lock().stop();
    }

    pub fn release(&self) {
        self.inner.lock().release();
    }

    pub fn teardown(&self) {
        self.inner.lock().teardown();
    }

    pub fn tick(&self) {
        self.inner.lock().tick();
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().is_playing()
    }

    pub fn status(&self) -> AmbientStatus {
        self.inner.lock().status()
    }

    /// Run `f` with the controller locked
    pub fn with<R>(&self, f: impl FnOnce(&mut AmbientController) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Start now; if that did not produce sound, retry once on the first user input
    pub fn start_with_unlock(&self, inputs: &InputBus) -> (StartOutcome, Option<UnlockGuard>) {
        let outcome = self.start();
        if outcome.is_playing() {
            return (outcome, None);
        }

        let handle = self.clone();
        let guard = arm_unlock(inputs.listen(), InputKind::ALL.to_vec(), move |_| {
            let retry = handle.start();
            tracing::debug!("Ambient retry after user input: {:?}", retry);
        });
        (outcome, Some(guard))
    }

    /// Tick the controller every `interval` until the driver is stopped
    pub fn spawn_driver(&self, interval: Duration) -> FrameDriver {
        let handle = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                handle.tick();
            }
        });
        FrameDriver { task, interval }
    }

    /// Fade out, then wait out the grace period before navigation completes
    pub async fn leave(&self, fade: Duration, grace: Duration) {
        self.fade_out(fade);
        tokio::time::sleep(grace).await;
        // Settle anything due by now without waiting for the next frame
        self.tick();
    }

    /// Tear down and keep the driver running until the controller is quiet
    pub async fn shutdown(&self, driver: FrameDriver) {
        self.teardown();
        while !self.inner.lock().is_quiet() {
            tokio::time::sleep(driver.interval).await;
        }
        driver.stop();
        tracing::info!("Ambient audio shut down");
    }
}

/// Background task ticking the controller; aborted on drop
pub struct FrameDriver {
    task: JoinHandle<()>,
    interval: Duration,
}

impl FrameDriver {
    pub fn stop(self) {
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for FrameDriver {
    fn drop(&mut self) {
        self.task.abort();
    }
}
