//! ---
//! pvz_section: "04-executors"
//! pvz_subsection: "module"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Tick pacing and shutdown signalling for executors."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

/// Async rate limiter producing evenly spaced ticks.
#[derive(Debug)]
pub struct RateLimiter {
    interval: tokio::time::Interval,
}

impl RateLimiter {
    /// Ticks every `period`; a late tick pushes the schedule back.
    pub fn new(period: Duration) -> Self {
        Self::with_behavior(period, MissedTickBehavior::Delay)
    }

    /// `rate` ticks per `time_unit`. Missed ticks fire back to back so the
    /// long-run rate holds even when the timer wakes late.
    pub fn paced(rate: u64, time_unit: Duration) -> Self {
        Self::with_behavior(pacing_period(rate, time_unit), MissedTickBehavior::Burst)
    }

    fn with_behavior(period: Duration, behavior: MissedTickBehavior) -> Self {
        let mut interval = tokio::time::interval(period.max(Duration::from_nanos(1)));
        interval.set_missed_tick_behavior(behavior);
        Self { interval }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }
}

/// Spacing between consecutive starts for `rate` starts per `time_unit`.
pub fn pacing_period(rate: u64, time_unit: Duration) -> Duration {
    let rate = u32::try_from(rate.max(1)).unwrap_or(u32::MAX);
    (time_unit / rate).max(Duration::from_nanos(1))
}

/// Creates a linked shutdown trigger and signal.
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

/// Requests that executors stop starting iterations.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested. Pends forever when the trigger
    /// was dropped without firing.
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
