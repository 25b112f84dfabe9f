//! Per-session timer arena.
//!
//! Every timer is a spawned task sending `TimerTick`s into the session's
//! tick channel. The arena owns the task handles; replacing or cancelling a
//! timer aborts its task and bumps the generation so ticks already queued
//! by the old task are recognized as stale and dropped.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Timers a session may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    MetricsPoll,
    PlaybackPoll,
    LookAhead,
    DeferredLoad,
}

/// One firing of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick {
    pub kind: TimerKind,
    pub generation: u64,
}

#[derive(Debug)]
struct ActiveTimer {
    generation: u64,
    period: Option<Duration>,
    handle: JoinHandle<()>,
}

/// Owns all timer tasks of one session.
#[derive(Debug)]
pub struct TimerArena {
    ticks: mpsc::UnboundedSender<TimerTick>,
    timers: HashMap<TimerKind, ActiveTimer>,
    next_generation: u64,
}

impl TimerArena {
    /// Creates an arena and the receiver its ticks arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerTick>) {
        let (ticks, receiver) = mpsc::unbounded_channel();
        (
            Self {
                ticks,
                timers: HashMap::new(),
                next_generation: 0,
            },
            receiver,
        )
    }

    /// Starts a periodic timer, replacing any timer of the same kind.
    ///
    /// The first tick fires one `period` after the call.
    pub fn start_interval(&mut self, kind: TimerKind, period: Duration) {
        let generation = self.bump_generation();
        let ticks = self.ticks.clone();
        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if ticks.send(TimerTick { kind, generation }).is_err() {
                    break;
                }
            }
        });
        self.install(kind, generation, Some(period), handle);
    }

    /// Starts a one-shot timer, replacing any timer of the same kind.
    pub fn start_once(&mut self, kind: TimerKind, delay: Duration) {
        let generation = self.bump_generation();
        let ticks = self.ticks.clone();
        let handle = tokio::spawn(async move {
            time::sleep(delay).await;
            let _ = ticks.send(TimerTick { kind, generation });
        });
        self.install(kind, generation, None, handle);
    }

    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn install(
        &mut self,
        kind: TimerKind,
        generation: u64,
        period: Option<Duration>,
        handle: JoinHandle<()>,
    ) {
        if let Some(previous) = self.timers.insert(
            kind,
            ActiveTimer {
                generation,
                period,
                handle,
            },
        ) {
            previous.handle.abort();
        }
    }

    /// Cancels one timer. Returns whether it was running.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        match self.timers.remove(&kind) {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancels every timer. Returns how many were running.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.timers.len();
        for (_, timer) in self.timers.drain() {
            timer.handle.abort();
        }
        count
    }

    /// Whether `tick` comes from the currently installed timer of its kind.
    pub fn is_current(&self, tick: &TimerTick) -> bool {
        self.timers
            .get(&tick.kind)
            .is_some_and(|timer| timer.generation == tick.generation)
    }

    /// Accepts a tick, retiring one-shot timers once they fire.
    ///
    /// Returns false for stale ticks.
    pub fn accept(&mut self, tick: &TimerTick) -> bool {
        if !self.is_current(tick) {
            return false;
        }
        if self
            .timers
            .get(&tick.kind)
            .is_some_and(|timer| timer.period.is_none())
        {
            self.timers.remove(&tick.kind);
        }
        true
    }

    pub fn is_running(&self, kind: TimerKind) -> bool {
        self.timers.contains_key(&kind)
    }

    /// Period of a running interval timer.
    pub fn period(&self, kind: TimerKind) -> Option<Duration> {
        self.timers.get(&kind).and_then(|timer| timer.period)
    }

    /// Kinds of all running timers.
    pub fn active(&self) -> Vec<TimerKind> {
        self.timers.keys().copied().collect()
    }
}

impl Drop for TimerArena {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
