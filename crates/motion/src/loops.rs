//! Micro-animation loops of the hero section, expressed as timer-driven
//! reducers.
//!
//! Timer firings become [`LoopEvent`]s; [`Rotator`] and [`Typewriter`] are
//! pure state-transition functions over those events. [`HeroLoops`] owns the
//! timers of one mounted hero and releases them all on unmount.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    stage::VisualState,
    timer::{ScopeId, TimerId, TimerKind, TimerManager, TimerStats},
};

/// Tunable timing of the hero loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopTimings {
    pub rotation_period_ms: u64,
    pub char_delay_ms: u64,
    pub hold_delay_ms: u64,
}

impl Default for LoopTimings {
    fn default() -> Self {
        Self {
            rotation_period_ms: 3_000,
            char_delay_ms: 50,
            hold_delay_ms: 2_500,
        }
    }
}

impl LoopTimings {
    pub fn rotation_period(&self) -> Duration {
        Duration::from_millis(self.rotation_period_ms)
    }

    pub fn char_delay(&self) -> Duration {
        Duration::from_millis(self.char_delay_ms)
    }

    pub fn hold_delay(&self) -> Duration {
        Duration::from_millis(self.hold_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardRank {
    Active,
    Next,
    Previous,
    /// Only reachable with more than three cards.
    Hidden,
}

/// Which card holds each prominence slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ranking {
    pub active: usize,
    pub next: usize,
    pub previous: usize,
}

impl Ranking {
    pub fn as_tuple(&self) -> (usize, usize, usize) {
        (self.active, self.next, self.previous)
    }
}

/// Cyclic active/next/previous ranking over `len` layered cards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rotator {
    len: usize,
    active: usize,
}

impl Rotator {
    pub fn new(len: usize) -> Self {
        Self {
            len: len.max(1),
            active: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn advance(&mut self) -> Ranking {
        self.active = (self.active + 1) % self.len;
        self.ranking()
    }

    pub fn ranking(&self) -> Ranking {
        Ranking {
            active: self.active,
            next: (self.active + 1) % self.len,
            previous: (self.active + self.len - 1) % self.len,
        }
    }

    pub fn rank_of(&self, card: usize) -> CardRank {
        let offset = (card % self.len + self.len - self.active) % self.len;
        match offset {
            0 => CardRank::Active,
            1 => CardRank::Next,
            o if o == self.len - 1 => CardRank::Previous,
            _ => CardRank::Hidden,
        }
    }

    /// Visual state of a card, decreasing in prominence with its rank.
    pub fn card_state(&self, card: usize) -> VisualState {
        match self.rank_of(card) {
            CardRank::Active => VisualState::IDENTITY,
            CardRank::Next => VisualState::IDENTITY
                .with_opacity(0.7)
                .with_scale(0.95)
                .with_translate_y(-20.0),
            CardRank::Previous => VisualState::IDENTITY
                .with_opacity(0.4)
                .with_scale(0.9)
                .with_translate_y(-40.0),
            CardRank::Hidden => VisualState::IDENTITY.with_opacity(0.0).with_scale(0.85),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypewriterPhase {
    Typing,
    Holding,
}

/// Ticks carry a chain number; ticks of an older chain are ignored.
#[derive(Debug, Clone)]
pub struct Typewriter {
    messages: Vec<String>,
    message_index: usize,
    emitted: usize,
    phase: TypewriterPhase,
    chain: u64,
}

impl Typewriter {
    pub fn new(messages: Vec<String>) -> Self {
        Self {
            messages,
            message_index: 0,
            emitted: 0,
            phase: TypewriterPhase::Typing,
            chain: 0,
        }
    }

    pub fn chain(&self) -> u64 {
        self.chain
    }

    pub fn phase(&self) -> TypewriterPhase {
        self.phase
    }

    pub fn message_index(&self) -> usize {
        self.message_index
    }

    pub fn current_message(&self) -> Option<&str> {
        self.messages.get(self.message_index).map(String::as_str)
    }

    pub fn text(&self) -> &str {
        let Some(message) = self.current_message() else {
            return "";
        };
        match message.char_indices().nth(self.emitted) {
            Some((byte, _)) => &message[..byte],
            None => message,
        }
    }

    /// Invalidate the running chain and rewind to the first message.
    pub fn restart(&mut self) -> u64 {
        self.chain += 1;
        self.message_index = 0;
        self.emitted = 0;
        self.phase = TypewriterPhase::Typing;
        self.chain
    }

    pub fn replace_messages(&mut self, messages: Vec<String>) -> u64 {
        self.messages = messages;
        self.restart()
    }

    /// Reducer for one tick of `chain`. Returns the delay until the next
    /// tick, or `None` when the tick is stale or there is nothing to type.
    pub fn on_tick(&mut self, chain: u64, timings: &LoopTimings) -> Option<Duration> {
        if chain != self.chain || self.messages.is_empty() {
            return None;
        }
        let len = self.current_message().map_or(0, |m| m.chars().count());
        match self.phase {
            TypewriterPhase::Typing => {
                if self.emitted < len {
                    self.emitted += 1;
                }
                if self.emitted >= len {
                    self.phase = TypewriterPhase::Holding;
                    Some(timings.hold_delay())
                } else {
                    Some(timings.char_delay())
                }
            }
            TypewriterPhase::Holding => {
                self.message_index = (self.message_index + 1) % self.messages.len();
                self.emitted = 0;
                self.phase = TypewriterPhase::Typing;
                Some(timings.char_delay())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEvent {
    Rotate,
    Type { chain: u64 },
}

/// Rotator and typewriter loops of one hero instance.
#[derive(Debug)]
pub struct HeroLoops {
    timers: TimerManager<LoopEvent>,
    timings: LoopTimings,
    scope: Option<ScopeId>,
    rotator: Rotator,
    typewriter: Typewriter,
    typing_timer: Option<TimerId>,
}

impl HeroLoops {
    pub fn new(card_count: usize, messages: Vec<String>, timings: LoopTimings) -> Self {
        Self {
            timers: TimerManager::new(),
            timings,
            scope: None,
            rotator: Rotator::new(card_count),
            typewriter: Typewriter::new(messages),
            typing_timer: None,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.scope.is_some()
    }

    /// Acquire the loop timers at `now`. Remounting releases the previous
    /// ones first.
    pub fn mount(&mut self, now: Duration) {
        if self.is_mounted() {
            self.unmount();
        }
        self.timers.run_until(now, |_, _| {});
        let scope = self.timers.open_scope();
        self.scope = Some(scope);
        self.timers.start(
            scope,
            TimerKind::Interval(self.timings.rotation_period()),
            LoopEvent::Rotate,
        );
        let chain = self.typewriter.restart();
        self.typing_timer = self.timers.start(
            scope,
            TimerKind::Delay(self.timings.char_delay()),
            LoopEvent::Type { chain },
        );
        debug!(scope = ?scope, "hero loops mounted");
    }

    /// Release every timer of this instance. Returns the number cancelled.
    pub fn unmount(&mut self) -> usize {
        let Some(scope) = self.scope.take() else {
            return 0;
        };
        self.typing_timer = None;
        let cancelled = self.timers.close_scope(scope);
        debug!(scope = ?scope, cancelled, "hero loops unmounted");
        cancelled
    }

    /// Swap the typewriter rotation, restarting from the first message.
    pub fn set_messages(&mut self, messages: Vec<String>) {
        if let Some(id) = self.typing_timer.take() {
            self.timers.cancel(id);
        }
        let chain = self.typewriter.replace_messages(messages);
        if let Some(scope) = self.scope {
            self.typing_timer = self.timers.start(
                scope,
                TimerKind::Delay(self.timings.char_delay()),
                LoopEvent::Type { chain },
            );
        }
    }

    pub fn advance_to(&mut self, now: Duration) -> usize {
        let Self {
            timers,
            timings,
            rotator,
            typewriter,
            typing_timer,
            ..
        } = self;
        timers.run_until(now, |timers, fired| match fired.event {
            LoopEvent::Rotate => {
                rotator.advance();
            }
            LoopEvent::Type { chain } => {
                if chain != typewriter.chain() {
                    return;
                }
                let next = typewriter.on_tick(chain, timings);
                *typing_timer = next.and_then(|delay| {
                    let event = LoopEvent::Type { chain };
                    timers.start(fired.owner, TimerKind::Delay(delay), event)
                });
            }
        })
    }

    pub fn rotator(&self) -> &Rotator {
        &self.rotator
    }

    pub fn typewriter(&self) -> &Typewriter {
        &self.typewriter
    }

    pub fn active_timers(&self) -> usize {
        self.timers.active_count()
    }

    pub fn timer_stats(&self) -> TimerStats {
        self.timers.stats()
    }
}

#[cfg(test)]
#[path = "tests/loops_tests.rs"]
mod tests;
