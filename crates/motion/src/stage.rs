//! Element visual state and the write target shared by every engine.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Stable handle of a rendered element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementRef(pub String);

impl ElementRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ElementRef {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Animatable properties of one element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisualState {
    pub opacity: f32,
    pub translate_x: f32,
    pub translate_y: f32,
    pub scale: f32,
}

impl Default for VisualState {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl VisualState {
    pub const IDENTITY: VisualState = VisualState {
        opacity: 1.0,
        translate_x: 0.0,
        translate_y: 0.0,
        scale: 1.0,
    };

    pub fn hidden_below(offset: f32) -> Self {
        Self {
            opacity: 0.0,
            translate_y: offset,
            ..Self::IDENTITY
        }
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_translate_y(mut self, translate_y: f32) -> Self {
        self.translate_y = translate_y;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Linear interpolation; `t` is expected in 0.0..=1.0.
    pub fn lerp(&self, to: &VisualState, t: f32) -> VisualState {
        let mix = |a: f32, b: f32| a + (b - a) * t;
        VisualState {
            opacity: mix(self.opacity, to.opacity),
            translate_x: mix(self.translate_x, to.translate_x),
            translate_y: mix(self.translate_y, to.translate_y),
            scale: mix(self.scale, to.scale),
        }
    }

    pub fn approx_eq(&self, other: &VisualState) -> bool {
        const EPS: f32 = 1e-4;
        (self.opacity - other.opacity).abs() < EPS
            && (self.translate_x - other.translate_x).abs() < EPS
            && (self.translate_y - other.translate_y).abs() < EPS
            && (self.scale - other.scale).abs() < EPS
    }
}

/// `read` returns `None` for elements that are not mounted.
pub trait Stage {
    fn read(&self, target: &ElementRef) -> Option<VisualState>;
    fn write(&mut self, target: &ElementRef, state: VisualState);
}

/// In-memory stage keyed by element handle.
#[derive(Debug, Default, Clone)]
pub struct SceneStage {
    elements: HashMap<ElementRef, VisualState>,
    writes: u64,
}

impl SceneStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(&mut self, target: impl Into<ElementRef>, state: VisualState) {
        self.elements.insert(target.into(), state);
    }

    pub fn unmount(&mut self, target: &ElementRef) -> Option<VisualState> {
        self.elements.remove(target)
    }

    pub fn get(&self, target: &str) -> Option<VisualState> {
        self.elements.get(&ElementRef::new(target)).copied()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn write_count(&self) -> u64 {
        self.writes
    }
}

impl Stage for SceneStage {
    fn read(&self, target: &ElementRef) -> Option<VisualState> {
        self.elements.get(target).copied()
    }

    fn write(&mut self, target: &ElementRef, state: VisualState) {
        if let Some(slot) = self.elements.get_mut(target) {
            *slot = state;
            self.writes += 1;
        }
    }
}
