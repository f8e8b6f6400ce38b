use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Work run on every timer tick.
pub type Tick = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Drives periodic polling. The synchronizer owns exactly one driver and
/// always cancels it before starting it again.
pub trait TimerDriver: Send + 'static {
    /// Runs `tick` every `period`, first right away if `fire_immediately`.
    fn start(&mut self, period: Duration, fire_immediately: bool, tick: Tick);

    fn cancel(&mut self);

    fn is_running(&self) -> bool;
}

/// Timer on a tokio interval task.
///
/// Each tick is spawned on its own task, so cancelling the timer stops
/// future ticks without aborting a request already in flight.
#[derive(Default)]
pub struct TokioTimer {
    handle: Option<JoinHandle<()>>,
}

impl TokioTimer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimerDriver for TokioTimer {
    fn start(&mut self, period: Duration, fire_immediately: bool, tick: Tick) {
        self.cancel();
        self.handle = Some(tokio::spawn(async move {
            if fire_immediately {
                tokio::spawn(tick());
            }
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tokio::spawn(tick());
            }
        }));
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
