//! Loop Timer Manager: deterministic repeating and delayed timers pulled
//! one firing at a time.

use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use tracing::debug;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

/// Owner of a group of timers, released as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Fires every period until cancelled.
    Interval(Duration),
    /// Fires once after the delay, then completes.
    Delay(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<E> {
    pub id: TimerId,
    pub owner: ScopeId,
    pub due: Duration,
    pub event: E,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerStats {
    pub started: u64,
    pub cancelled: u64,
    pub completed: u64,
    pub fired: u64,
}

#[derive(Debug)]
struct TimerEntry<E> {
    owner: ScopeId,
    kind: TimerKind,
    due: Duration,
    event: E,
}

#[derive(Debug)]
pub struct TimerManager<E> {
    cursor: Duration,
    next_timer: u64,
    next_scope: u64,
    scopes: BTreeSet<ScopeId>,
    timers: BTreeMap<TimerId, TimerEntry<E>>,
    stats: TimerStats,
}

impl<E> Default for TimerManager<E> {
    fn default() -> Self {
        Self {
            cursor: Duration::ZERO,
            next_timer: 1,
            next_scope: 1,
            scopes: BTreeSet::new(),
            timers: BTreeMap::new(),
            stats: TimerStats::default(),
        }
    }
}

impl<E: Clone> TimerManager<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.cursor
    }

    pub fn stats(&self) -> TimerStats {
        self.stats
    }

    pub fn open_scope(&mut self) -> ScopeId {
        let scope = ScopeId(self.next_scope);
        self.next_scope += 1;
        self.scopes.insert(scope);
        scope
    }

    /// Cancel every timer of `scope` and retire it. Returns the number cancelled.
    pub fn close_scope(&mut self, scope: ScopeId) -> usize {
        let cancelled = self.cancel_all(scope);
        self.scopes.remove(&scope);
        cancelled
    }

    pub fn is_scope_open(&self, scope: ScopeId) -> bool {
        self.scopes.contains(&scope)
    }

    /// `None` when `owner` is not an open scope.
    pub fn start(&mut self, owner: ScopeId, kind: TimerKind, event: E) -> Option<TimerId> {
        if !self.scopes.contains(&owner) {
            debug!(scope = owner.0, "refusing timer for closed scope");
            return None;
        }
        let kind = match kind {
            TimerKind::Interval(period) => TimerKind::Interval(period.max(MIN_INTERVAL)),
            delay => delay,
        };
        let offset = match kind {
            TimerKind::Interval(period) => period,
            TimerKind::Delay(delay) => delay,
        };
        let id = TimerId(self.next_timer);
        self.next_timer += 1;
        self.timers.insert(
            id,
            TimerEntry {
                owner,
                kind,
                due: self.cursor.saturating_add(offset),
                event,
            },
        );
        self.stats.started += 1;
        Some(id)
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        if self.timers.remove(&id).is_some() {
            self.stats.cancelled += 1;
            true
        } else {
            false
        }
    }

    pub fn cancel_all(&mut self, owner: ScopeId) -> usize {
        let ids: Vec<TimerId> = self
            .timers
            .iter()
            .filter(|(_, entry)| entry.owner == owner)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            self.timers.remove(id);
        }
        self.stats.cancelled += ids.len() as u64;
        if !ids.is_empty() {
            debug!(
                scope = owner.0,
                cancelled = ids.len(),
                "cancelled scope timers"
            );
        }
        ids.len()
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    pub fn active_count(&self) -> usize {
        self.timers.len()
    }

    pub fn active_in(&self, owner: ScopeId) -> usize {
        self.timers
            .values()
            .filter(|entry| entry.owner == owner)
            .count()
    }

    pub fn next_due(&self) -> Option<Duration> {
        self.timers.values().map(|entry| entry.due).min()
    }

    /// Yield the next firing due at or before `now`, or advance the cursor
    /// to `now` and return `None`.
    pub fn poll_due(&mut self, now: Duration) -> Option<Fired<E>> {
        let next = self
            .timers
            .iter()
            .filter(|(_, entry)| entry.due <= now)
            .min_by_key(|(id, entry)| (entry.due, **id))
            .map(|(id, _)| *id);

        let Some(id) = next else {
            if now > self.cursor {
                self.cursor = now;
            }
            return None;
        };

        let entry = self.timers.get_mut(&id)?;
        let due = entry.due;
        let owner = entry.owner;
        let kind = entry.kind;
        let event = entry.event.clone();
        if let TimerKind::Interval(period) = kind {
            entry.due = due.saturating_add(period);
        } else {
            self.timers.remove(&id);
            self.stats.completed += 1;
        }
        self.cursor = self.cursor.max(due);
        self.stats.fired += 1;

        Some(Fired {
            id,
            owner,
            due,
            event,
        })
    }

    /// `handle` may cancel or start timers; later firings of this call see it.
    pub fn run_until<F>(&mut self, now: Duration, mut handle: F) -> usize
    where
        F: FnMut(&mut TimerManager<E>, Fired<E>),
    {
        let mut handled = 0;
        while let Some(fired) = self.poll_due(now) {
            handle(self, fired);
            handled += 1;
        }
        handled
    }
}

#[cfg(test)]
#[path = "tests/timer_tests.rs"]
mod tests;
