//! Timeline Sequencer: ordered, staggered visual transitions.
//!
//! Each later step starts `overlap` before the end of the previous steps,
//! never earlier than the previous step's start. Targets not mounted at run
//! time are skipped.

use std::time::Duration;

use tracing::debug;

use crate::{
    easing::Easing,
    stage::{ElementRef, Stage, VisualState},
};

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineStep {
    pub targets: Vec<ElementRef>,
    pub from: VisualState,
    pub to: VisualState,
    pub duration: Duration,
    pub delay: Duration,
    pub stagger: Duration,
    pub overlap: Duration,
    pub easing: Easing,
}

impl TimelineStep {
    pub fn new<I, T>(targets: I, from: VisualState, to: VisualState, duration: Duration) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ElementRef>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            from,
            to,
            duration,
            delay: Duration::ZERO,
            stagger: Duration::ZERO,
            overlap: Duration::ZERO,
            easing: Easing::default(),
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    pub fn overlap(mut self, overlap: Duration) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Timeline {
    steps: Vec<TimelineStep>,
    one_shot: bool,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, step: TimelineStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Handles of a one-shot timeline refuse to reverse.
    pub fn one_shot(mut self) -> Self {
        self.one_shot = true;
        self
    }

    /// Resolve the schedule, apply the initial states and start playing forward.
    pub fn run<S: Stage>(&self, stage: &mut S) -> TimelineHandle {
        let mut handle = self.prepare(stage);
        handle.play();
        handle
    }

    /// Like [`run`](Self::run) but leaves the handle paused at the start.
    pub fn prepare<S: Stage>(&self, stage: &mut S) -> TimelineHandle {
        let mut tracks = Vec::new();
        let mut snapshot: Vec<(ElementRef, VisualState)> = Vec::new();
        let mut prev: Option<(Duration, Duration)> = None;

        for (index, step) in self.steps.iter().enumerate() {
            let mounted: Vec<&ElementRef> = step
                .targets
                .iter()
                .filter(|target| match stage.read(target) {
                    Some(state) => {
                        if !snapshot.iter().any(|(seen, _)| seen == *target) {
                            snapshot.push(((*target).clone(), state));
                        }
                        true
                    }
                    None => false,
                })
                .collect();

            if mounted.is_empty() {
                debug!(step = index, "timeline step has no mounted targets");
                continue;
            }

            let base = match prev {
                None => Duration::ZERO,
                Some((prev_start, prev_end)) => {
                    prev_end.saturating_sub(step.overlap).max(prev_start)
                }
            };
            let start = base + step.delay;
            let mut end = start;
            for (n, target) in mounted.into_iter().enumerate() {
                let track_start = start + step.stagger * n as u32;
                end = end.max(track_start + step.duration);
                tracks.push(Track {
                    target: target.clone(),
                    start: track_start,
                    duration: step.duration,
                    from: step.from,
                    to: step.to,
                    easing: step.easing,
                });
            }
            let prev_end = prev.map_or(end, |(_, prev_end)| prev_end.max(end));
            prev = Some((start, prev_end));
        }

        let total = prev.map_or(Duration::ZERO, |(_, end)| end);
        let handle = TimelineHandle {
            tracks,
            snapshot,
            total,
            position: Duration::ZERO,
            direction: Direction::Forward,
            playing: false,
            reverted: false,
            one_shot: self.one_shot,
        };
        handle.apply(stage);
        handle
    }
}

#[derive(Debug, Clone)]
struct Track {
    target: ElementRef,
    start: Duration,
    duration: Duration,
    from: VisualState,
    to: VisualState,
    easing: Easing,
}

impl Track {
    fn sample(&self, position: Duration) -> Option<VisualState> {
        if position < self.start {
            return None;
        }
        let t = if self.duration.is_zero() {
            1.0
        } else {
            ((position - self.start).as_secs_f64() / self.duration.as_secs_f64()) as f32
        };
        Some(self.from.lerp(&self.to, self.easing.apply(t)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

#[derive(Debug, Clone)]
pub struct TimelineHandle {
    tracks: Vec<Track>,
    snapshot: Vec<(ElementRef, VisualState)>,
    total: Duration,
    position: Duration,
    direction: Direction,
    playing: bool,
    reverted: bool,
    one_shot: bool,
}

impl TimelineHandle {
    pub fn duration(&self) -> Duration {
        self.total
    }

    pub fn position(&self) -> Duration {
        self.position
    }

    pub fn progress(&self) -> f32 {
        if self.total.is_zero() {
            return 1.0;
        }
        (self.position.as_secs_f64() / self.total.as_secs_f64()).clamp(0.0, 1.0) as f32
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_reverted(&self) -> bool {
        self.reverted
    }

    /// Start of the first track driving `target`.
    pub fn start_of(&self, target: &str) -> Option<Duration> {
        self.tracks
            .iter()
            .find(|track| track.target.as_str() == target)
            .map(|track| track.start)
    }

    /// Finished in the current direction and no longer playing.
    pub fn is_complete(&self) -> bool {
        !self.playing
            && match self.direction {
                Direction::Forward => self.position >= self.total,
                Direction::Reverse => self.position.is_zero(),
            }
    }

    pub fn play(&mut self) {
        if self.reverted {
            return;
        }
        self.direction = Direction::Forward;
        self.playing = self.position < self.total || self.total.is_zero();
    }

    /// Play backwards from the current position. Returns `false` for one-shot
    /// timelines, which never reverse.
    pub fn reverse(&mut self) -> bool {
        if self.reverted || self.one_shot {
            return false;
        }
        self.direction = Direction::Reverse;
        self.playing = !self.position.is_zero();
        true
    }

    /// Move the playhead by `dt` in the current direction and write the
    /// sampled states. Returns whether the handle is still playing.
    pub fn advance<S: Stage>(&mut self, dt: Duration, stage: &mut S) -> bool {
        if self.reverted || !self.playing {
            return false;
        }
        match self.direction {
            Direction::Forward => {
                self.position = self.position.saturating_add(dt).min(self.total);
                if self.position >= self.total {
                    self.playing = false;
                }
            }
            Direction::Reverse => {
                self.position = self.position.saturating_sub(dt);
                if self.position.is_zero() {
                    self.playing = false;
                }
            }
        }
        self.apply(stage);
        self.playing
    }

    /// Jump to `position`, clamped to the total duration.
    pub fn seek<S: Stage>(&mut self, position: Duration, stage: &mut S) {
        if self.reverted {
            return;
        }
        self.position = position.min(self.total);
        self.apply(stage);
    }

    /// Restore every target to its pre-run state. Later calls are no-ops.
    pub fn revert<S: Stage>(&mut self, stage: &mut S) {
        if self.reverted {
            return;
        }
        for (target, state) in &self.snapshot {
            stage.write(target, *state);
        }
        self.reverted = true;
        self.playing = false;
    }

    fn apply<S: Stage>(&self, stage: &mut S) {
        for (target, _) in &self.snapshot {
            let mut state = None;
            for track in self.tracks.iter().filter(|track| &track.target == target) {
                match track.sample(self.position) {
                    Some(sampled) => state = Some(sampled),
                    None => {
                        if state.is_none() {
                            state = Some(track.from);
                        }
                        break;
                    }
                }
            }
            if let Some(state) = state {
                stage.write(target, state);
            }
        }
    }
}

/// Timeline bound to a toggle trigger: plays forward on enter and reverses
/// on leave, on every direction change.
#[derive(Debug, Clone)]
pub struct RevealToggle {
    handle: TimelineHandle,
    active: bool,
    toggles: u32,
}

impl RevealToggle {
    /// Prepare `timeline` paused at its start state.
    pub fn new<S: Stage>(timeline: &Timeline, stage: &mut S) -> Self {
        Self {
            handle: timeline.prepare(stage),
            active: false,
            toggles: 0,
        }
    }

    pub fn set_active(&mut self, active: bool) {
        if active == self.active {
            return;
        }
        self.active = active;
        self.toggles += 1;
        if active {
            self.handle.play();
        } else {
            self.handle.reverse();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn toggles(&self) -> u32 {
        self.toggles
    }

    pub fn advance<S: Stage>(&mut self, dt: Duration, stage: &mut S) -> bool {
        self.handle.advance(dt, stage)
    }

    pub fn handle(&self) -> &TimelineHandle {
        &self.handle
    }

    pub fn revert<S: Stage>(&mut self, stage: &mut S) {
        self.handle.revert(stage);
    }
}

#[cfg(test)]
#[path = "tests/timeline_tests.rs"]
mod tests;
