//! Keepalive ping timer
//!
//! While a subscription is open, sends a ping command at a fixed cadence so
//! intermediaries do not close the connection as idle. At most one timer is
//! ever active per instance: starting always cancels the previous timer
//! first, which guards against duplicates across reconnects.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::connection::Command;

/// Default keepalive ping cadence
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_millis(25_000);

/// Periodic ping sender bound to an open subscription
#[derive(Debug)]
pub struct KeepAlive {
    interval: Duration,
    timer: Option<JoinHandle<()>>,
}

impl KeepAlive {
    /// Create a keepalive with the given cadence
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timer: None,
        }
    }

    /// Start ticking, feeding ping commands into the subscription loop.
    ///
    /// Any previously running timer is cancelled first.
    pub fn start(&mut self, commands: mpsc::Sender<Command>) {
        self.stop();

        let interval = self.interval;
        self.timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick of a tokio interval fires immediately; skip it
            // so the first ping goes out one full interval after open.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if commands.send(Command::Ping).await.is_err() {
                    debug!("Keepalive channel closed, stopping");
                    break;
                }
            }
        }));
    }

    /// Stop the timer. Idempotent; safe on every close path.
    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// Whether a timer is currently active
    pub fn is_running(&self) -> bool {
        self.timer
            .as_ref()
            .map(|timer| !timer.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.stop();
    }
}
