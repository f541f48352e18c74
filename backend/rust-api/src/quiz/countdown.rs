use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// One elapsed countdown second, tagged with the question it was started for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownTick {
    pub generation: u64,
    pub question_index: usize,
}

/// Handle to a running per-question countdown.
///
/// The ticking task is aborted when the handle is dropped.
#[derive(Debug)]
pub struct Countdown {
    handle: JoinHandle<()>,
}

impl Countdown {
    /// Spawn a task that sends `tick` every `period`, first after one full period.
    pub fn start(tick: CountdownTick, period: Duration, tx: UnboundedSender<CountdownTick>) -> Self {
        let first = Instant::now() + period;
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(first, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(tick).is_err() {
                    tracing::trace!("countdown receiver dropped, stopping");
                    break;
                }
            }
        });

        Countdown { handle }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
