//! Per-question countdown and the scheduled task that drives it.
//!
//! `TimerController` is a pure state machine advanced by `tick()`.
//! `TickSchedule` is the ≈1 Hz tokio task that calls into it; it is cancelled
//! by dropping it or calling `cancel()`.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not running, paused, or already expired. Nothing changed.
    Idle,
    /// One second elapsed; carries the new remaining value.
    Ticked(u32),
    /// The countdown reached zero on this tick. Returned once per reset.
    Expired,
}

#[derive(Debug, Clone, Default)]
pub struct TimerController {
    remaining: u32,
    running: bool,
    paused: bool,
    expired: bool,
    expirations: u32,
}

impl TimerController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Total expiries since construction.
    pub fn expirations(&self) -> u32 {
        self.expirations
    }

    pub fn start(&mut self, limit: u32) {
        self.remaining = limit;
        self.running = true;
        self.paused = false;
        self.expired = false;
    }

    /// Rebinds the countdown to a new question. Keeps the paused flag so a
    /// paused session stays paused across navigation.
    pub fn reset(&mut self, limit: u32) {
        self.remaining = limit;
        self.running = true;
        self.expired = false;
    }

    pub fn tick(&mut self) -> TickOutcome {
        if !self.running || self.paused || self.expired {
            return TickOutcome::Idle;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.expired = true;
            self.running = false;
            self.expirations += 1;
            return TickOutcome::Expired;
        }
        TickOutcome::Ticked(self.remaining)
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.paused = false;
    }
}

/// A periodic task scoped to one active session.
///
/// The first tick fires one `period` after spawning. Cancellation is checked
/// before every tick, so a tick already in flight runs to completion.
#[derive(Debug)]
pub struct TickSchedule {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl TickSchedule {
    pub fn spawn<F, Fut>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        if on_tick().await.is_break() {
                            break;
                        }
                    }
                }
            }
        });

        Self { token, handle }
    }

    #[cfg(test)]
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Not cancelled and the task has not stopped on its own.
    pub fn is_live(&self) -> bool {
        !self.token.is_cancelled() && !self.is_finished()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TickSchedule {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
