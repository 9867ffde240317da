//! Timer scheduler: delayed and periodic callbacks owned by one component.
//!
//! Each component owns one [`Scheduler`] keyed by its own timer enum
//! (e.g. the feeder's end-of-feed timer, the lights' clock tick). The
//! component's dispatch loop awaits [`Scheduler::expired`] alongside its
//! inbox, so a fired timer is handled at the same single dispatch point as
//! requests and never runs concurrently with them.
//!
//! ```text
//!  schedule_once / schedule_every          cancel / clear
//!              │                                 │
//!              ▼                                 ▼
//!  ┌──────────────────────────────────────────────────────┐
//!  │  Scheduler<K>      slot per key, earliest deadline    │
//!  └──────────────────────────┬───────────────────────────┘
//!                             │ expired().await → K
//!                             ▼
//!                    component dispatch loop
//! ```
//!
//! Cancellation is synchronous: once [`cancel`](Scheduler::cancel) or
//! [`clear`](Scheduler::clear) returns, that key can no longer fire.

use core::fmt::Debug;
use core::time::Duration;
use std::time::Instant;

use async_io_mini::Timer;
use log::debug;

// ═══════════════════════════════════════════════════════════════
//  Slot bookkeeping
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
struct Entry<K> {
    key: K,
    due: Instant,
    /// `Some` for periodic timers, re-armed after each fire.
    period: Option<Duration>,
}

/// The scheduler engine.
#[derive(Debug)]
pub struct Scheduler<K> {
    /// Component address, for log lines only.
    owner: String,
    entries: Vec<Entry<K>>,
}

impl<K: Copy + Eq + Debug> Scheduler<K> {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            entries: Vec::new(),
        }
    }

    /// Fire `key` once, `after` from now. Replaces any pending `key`.
    pub fn schedule_once(&mut self, key: K, after: Duration) {
        debug!("{}: timer {:?} in {:?}", self.owner, key, after);
        self.insert(key, Instant::now() + after, None);
    }

    /// Fire `key` every `period`, first after one period. Replaces any
    /// pending `key`.
    pub fn schedule_every(&mut self, key: K, period: Duration) {
        debug!("{}: timer {:?} every {:?}", self.owner, key, period);
        self.insert(key, Instant::now() + period, Some(period));
    }

    /// Cancel `key`. Returns whether it was pending. Idempotent.
    pub fn cancel(&mut self, key: K) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.key != key);
        let removed = self.entries.len() != before;
        if removed {
            debug!("{}: timer {:?} cancelled", self.owner, key);
        }
        removed
    }

    /// Cancel everything.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            debug!("{}: {} timer(s) cleared", self.owner, self.entries.len());
        }
        self.entries.clear();
    }

    pub fn is_pending(&self, key: K) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    /// Number of pending timers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest pending deadline.
    pub fn next_due(&self) -> Option<(K, Instant)> {
        self.entries
            .iter()
            .min_by_key(|e| e.due)
            .map(|e| (e.key, e.due))
    }

    /// Take the earliest timer whose deadline is at or before `now`.
    /// One-shot timers are removed; periodic timers are re-armed one
    /// period after `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<K> {
        let idx = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due <= now)
            .min_by_key(|(_, e)| e.due)
            .map(|(i, _)| i)?;

        let key = self.entries[idx].key;
        match self.entries[idx].period {
            Some(period) => self.entries[idx].due = now + period,
            None => {
                self.entries.swap_remove(idx);
            }
        }
        Some(key)
    }

    /// Resolve with the next timer to fire. Pends forever when nothing is
    /// scheduled. Cancel-safe: dropping the future before it resolves
    /// leaves every slot untouched.
    pub async fn expired(&mut self) -> K {
        loop {
            let Some((_, due)) = self.next_due() else {
                return futures_lite::future::pending().await;
            };
            Timer::at(due).await;
            if let Some(key) = self.pop_due(Instant::now()) {
                debug!("{}: timer {:?} fired", self.owner, key);
                return key;
            }
        }
    }

    fn insert(&mut self, key: K, due: Instant, period: Option<Duration>) {
        self.entries.retain(|e| e.key != key);
        self.entries.push(Entry { key, due, period });
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
