//! Scroll Trigger Coordinator: pin, scrub and toggle regions in document order.
//!
//! A sample reads every region's bounds, then computes the frame. The
//! coordinator never reads the stage and never moves the scroll position.

use std::fmt;

use tracing::debug;

use crate::stage::{ElementRef, Stage, VisualState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionId(pub u32);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region#{}", self.0)
    }
}

/// Document-space vertical bounds of a region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub top: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(top: f32, height: f32) -> Self {
        Self { top, height }
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollSample {
    pub scroll_y: f32,
    pub viewport_height: f32,
}

impl ScrollSample {
    pub fn new(scroll_y: f32, viewport_height: f32) -> Self {
        Self {
            scroll_y,
            viewport_height,
        }
    }
}

/// Geometry source of one region.
pub trait BoundsProvider {
    fn bounds(&self) -> Option<Rect>;
}

impl<F> BoundsProvider for F
where
    F: Fn() -> Option<Rect>,
{
    fn bounds(&self) -> Option<Rect> {
        self()
    }
}

impl BoundsProvider for Rect {
    fn bounds(&self) -> Option<Rect> {
        Some(*self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Inactive,
    Entering,
    Pinned,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    OneShot,
    Reversible,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrubEffect {
    pub from: VisualState,
    pub to: VisualState,
}

impl ScrubEffect {
    pub fn new(from: VisualState, to: VisualState) -> Self {
        Self { from, to }
    }

    /// Background drift of `distance` units against the scroll direction.
    pub fn parallax(distance: f32) -> Self {
        Self {
            from: VisualState::IDENTITY,
            to: VisualState::IDENTITY.with_translate_y(distance),
        }
    }

    pub fn state_at(&self, progress: f32) -> VisualState {
        self.from.lerp(&self.to, progress.clamp(0.0, 1.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinFrame {
    pub id: RegionId,
    pub phase: Phase,
    pub offset_y: f32,
    pub z_index: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrubFrame {
    pub id: RegionId,
    pub progress: f32,
    pub state: VisualState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleChange {
    pub id: RegionId,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTransition {
    pub id: RegionId,
    pub from: Phase,
    pub to: Phase,
}

/// Output of one coordinator pass.
#[derive(Debug, Clone, Default)]
pub struct ScrollFrame {
    pub pins: Vec<PinFrame>,
    pub scrubs: Vec<ScrubFrame>,
    pub toggles: Vec<ToggleChange>,
    pub transitions: Vec<PhaseTransition>,
    writes: Vec<(ElementRef, FrameWrite)>,
}

#[derive(Debug, Clone, Copy)]
enum FrameWrite {
    TranslateY(f32),
    Replace(VisualState),
}

impl ScrollFrame {
    pub fn pin(&self, id: RegionId) -> Option<&PinFrame> {
        self.pins.iter().find(|frame| frame.id == id)
    }

    pub fn scrub(&self, id: RegionId) -> Option<&ScrubFrame> {
        self.scrubs.iter().find(|frame| frame.id == id)
    }

    /// Write the computed transforms. Unmounted targets are ignored.
    pub fn apply<S: Stage>(&self, stage: &mut S) {
        for (target, write) in &self.writes {
            let Some(current) = stage.read(target) else {
                continue;
            };
            let next = match write {
                FrameWrite::TranslateY(offset) => current.with_translate_y(*offset),
                FrameWrite::Replace(state) => *state,
            };
            stage.write(target, next);
        }
    }

    fn write(&mut self, target: &ElementRef, write: FrameWrite) {
        self.writes.push((target.clone(), write));
    }
}

enum Trigger {
    Pin { mode: PinMode, phase: Phase },
    Scrub { effect: ScrubEffect },
    Toggle { start_fraction: f32, active: bool },
}

struct Region {
    id: RegionId,
    order: i32,
    target: Option<ElementRef>,
    bounds: Box<dyn BoundsProvider>,
    trigger: Trigger,
}

#[derive(Default)]
pub struct ScrollCoordinator {
    regions: Vec<Region>,
    samples: u64,
}

impl fmt::Debug for ScrollCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollCoordinator")
            .field("regions", &self.regions.len())
            .field("samples", &self.samples)
            .finish()
    }
}

impl ScrollCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_pin(
        &mut self,
        id: RegionId,
        order: i32,
        target: impl Into<ElementRef>,
        mode: PinMode,
        bounds: impl BoundsProvider + 'static,
    ) {
        self.insert(Region {
            id,
            order,
            target: Some(target.into()),
            bounds: Box::new(bounds),
            trigger: Trigger::Pin {
                mode,
                phase: Phase::Inactive,
            },
        });
    }

    pub fn register_scrub(
        &mut self,
        id: RegionId,
        order: i32,
        target: impl Into<ElementRef>,
        effect: ScrubEffect,
        bounds: impl BoundsProvider + 'static,
    ) {
        self.insert(Region {
            id,
            order,
            target: Some(target.into()),
            bounds: Box::new(bounds),
            trigger: Trigger::Scrub { effect },
        });
    }

    /// `start_fraction` is the viewport height fraction the region's top must
    /// cross to activate (0.8 = "top 80%").
    pub fn register_toggle(
        &mut self,
        id: RegionId,
        order: i32,
        start_fraction: f32,
        bounds: impl BoundsProvider + 'static,
    ) {
        self.insert(Region {
            id,
            order,
            target: None,
            bounds: Box::new(bounds),
            trigger: Trigger::Toggle {
                start_fraction: start_fraction.clamp(0.0, 1.0),
                active: false,
            },
        });
    }

    /// Keeps document order; a region with the same id is replaced.
    fn insert(&mut self, region: Region) {
        self.regions.retain(|existing| existing.id != region.id);
        let pos = self.regions.partition_point(|r| r.order <= region.order);
        self.regions.insert(pos, region);
    }

    pub fn unregister(&mut self, id: RegionId) -> bool {
        let before = self.regions.len();
        self.regions.retain(|region| region.id != id);
        before != self.regions.len()
    }

    pub fn clear(&mut self) {
        self.regions.clear();
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn order(&self) -> Vec<RegionId> {
        self.regions.iter().map(|region| region.id).collect()
    }

    pub fn phase(&self, id: RegionId) -> Option<Phase> {
        self.regions.iter().find_map(|region| match region.trigger {
            Trigger::Pin { phase, .. } if region.id == id => Some(phase),
            _ => None,
        })
    }

    pub fn is_toggle_active(&self, id: RegionId) -> Option<bool> {
        self.regions.iter().find_map(|region| match region.trigger {
            Trigger::Toggle { active, .. } if region.id == id => Some(active),
            _ => None,
        })
    }

    pub fn sample(&mut self, sample: ScrollSample) -> ScrollFrame {
        self.samples += 1;
        let vh = sample.viewport_height.max(0.0);

        // Read pass: geometry only.
        let bounds: Vec<Option<Rect>> = self
            .regions
            .iter()
            .map(|region| region.bounds.bounds())
            .collect();

        let mut frame = ScrollFrame::default();
        self.compute_pins(&bounds, sample.scroll_y, vh, &mut frame);

        for (region, rect) in self.regions.iter_mut().zip(&bounds) {
            let Some(rect) = rect else {
                continue;
            };
            let top = rect.top - sample.scroll_y;
            let bottom = top + rect.height;
            match &mut region.trigger {
                Trigger::Pin { .. } => {}
                Trigger::Scrub { effect } => {
                    let span = vh + rect.height;
                    let progress = if span <= 0.0 {
                        if top < 0.0 {
                            1.0
                        } else {
                            0.0
                        }
                    } else {
                        ((vh - top) / span).clamp(0.0, 1.0)
                    };
                    let state = effect.state_at(progress);
                    frame.scrubs.push(ScrubFrame {
                        id: region.id,
                        progress,
                        state,
                    });
                    if let Some(target) = &region.target {
                        frame.write(target, FrameWrite::Replace(state));
                    }
                }
                Trigger::Toggle {
                    start_fraction,
                    active,
                } => {
                    let now_active = top <= vh * *start_fraction && bottom > 0.0;
                    if now_active != *active {
                        *active = now_active;
                        debug!(region = %region.id, active = now_active, "toggle trigger flipped");
                        frame.toggles.push(ToggleChange {
                            id: region.id,
                            active: now_active,
                        });
                    }
                }
            }
        }

        frame
    }

    fn compute_pins(
        &mut self,
        bounds: &[Option<Rect>],
        scroll_y: f32,
        vh: f32,
        frame: &mut ScrollFrame,
    ) {
        let pins: Vec<(usize, Rect)> = self
            .regions
            .iter()
            .zip(bounds)
            .enumerate()
            .filter_map(|(index, (region, rect))| match (&region.trigger, rect) {
                (Trigger::Pin { .. }, Some(rect)) => Some((index, *rect)),
                _ => None,
            })
            .collect();

        let mut next_phases = Vec::with_capacity(pins.len());
        for (k, (index, rect)) in pins.iter().enumerate() {
            let top = rect.top - scroll_y;
            let next = pins.get(k + 1).map(|(_, next)| *next);
            let superseded = match next {
                Some(next) => next.top - scroll_y <= 0.0,
                None => top + rect.height <= 0.0,
            };
            let geometric = if superseded {
                Phase::Released
            } else if top <= 0.0 {
                Phase::Pinned
            } else if top < vh {
                Phase::Entering
            } else {
                Phase::Inactive
            };
            let phase = match self.regions[*index].trigger {
                Trigger::Pin {
                    mode: PinMode::OneShot,
                    phase,
                } => phase.max(geometric),
                _ => geometric,
            };
            next_phases.push(phase);
        }

        // At most one pinned region: a later pin supersedes every earlier one.
        let mut seen_pinned = false;
        for phase in next_phases.iter_mut().rev() {
            if *phase == Phase::Pinned {
                if seen_pinned {
                    *phase = Phase::Released;
                }
                seen_pinned = true;
            }
        }

        for (k, ((index, rect), phase)) in pins.iter().zip(next_phases).enumerate() {
            let region = &mut self.regions[*index];
            let hold = pins
                .get(k + 1)
                .map_or(rect.height, |(_, next)| next.top - rect.top)
                .max(0.0);
            let offset_y = (scroll_y - rect.top).clamp(0.0, hold);

            if let Trigger::Pin { phase: current, .. } = &mut region.trigger {
                if *current != phase {
                    debug!(
                        region = %region.id,
                        from = ?current,
                        to = ?phase,
                        "pin phase transition"
                    );
                    frame.transitions.push(PhaseTransition {
                        id: region.id,
                        from: *current,
                        to: phase,
                    });
                    *current = phase;
                }
            }

            frame.pins.push(PinFrame {
                id: region.id,
                phase,
                offset_y,
                z_index: k as i32,
            });
            if let Some(target) = &region.target {
                frame.write(target, FrameWrite::TranslateY(offset_y));
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/scroll_tests.rs"]
mod tests;
