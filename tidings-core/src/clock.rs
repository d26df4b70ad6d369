//! Clock abstraction for tick generation.
//!
//! Every component that needs "now" takes a [`Clock`] so tests can pin or
//! advance time deterministically instead of racing the system clock.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

use crate::identity::{Tick, TICKS_PER_SECOND};

/// Source of the current tick.
pub trait Clock: Send + Sync {
    /// Current time as a tick (microseconds since the Unix epoch).
    fn now_tick(&self) -> Tick;
}

/// Production clock using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_tick(&self) -> Tick {
        Utc::now().timestamp_micros()
    }
}

/// Fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Tick);

impl Clock for FixedClock {
    fn now_tick(&self) -> Tick {
        self.0
    }
}

/// Manually driven clock that can be moved forward between calls.
#[derive(Debug, Default)]
pub struct ManualClock {
    tick: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Tick) -> Self {
        Self {
            tick: AtomicI64::new(start),
        }
    }

    /// Set the current tick.
    pub fn set(&self, tick: Tick) {
        self.tick.store(tick, Ordering::SeqCst);
    }

    /// Move the clock forward by `ticks`, returning the new value.
    pub fn advance(&self, ticks: Tick) -> Tick {
        self.tick.fetch_add(ticks, Ordering::SeqCst) + ticks
    }

    /// Move the clock forward by whole seconds.
    pub fn advance_secs(&self, secs: i64) -> Tick {
        self.advance(secs * TICKS_PER_SECOND)
    }
}

impl Clock for ManualClock {
    fn now_tick(&self) -> Tick {
        self.tick.load(Ordering::SeqCst)
    }
}
