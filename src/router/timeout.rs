//! Periodic suspicion-timeout checks
//!
//! A spoken command can stall halfway ("go" and then silence). The monitor
//! ticks on a fixed interval and injects a timeout check into the router's
//! message loop, so the check serializes with fragment handling instead of
//! racing it. Exits on its own once the router channel closes.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::router::RouterMsg;

/// Drives the router's suspicion timeout.
pub struct TimeoutMonitor {
    poll_interval: Duration,
    msg_tx: mpsc::Sender<RouterMsg>,
}

impl TimeoutMonitor {
    /// Create a monitor ticking every `poll_interval`.
    pub fn new(poll_interval: Duration, msg_tx: mpsc::Sender<RouterMsg>) -> Self {
        Self {
            poll_interval,
            msg_tx,
        }
    }

    /// Spawn the periodic task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_ms = self.poll_interval.as_millis() as u64, "timeout monitor started");
            let mut ticker = tokio::time::interval(self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if self.msg_tx.send(RouterMsg::TimeoutCheck).await.is_err() {
                    debug!("router channel closed, timeout monitor exiting");
                    break;
                }
            }
        })
    }
}
