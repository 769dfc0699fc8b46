#![forbid(unsafe_code)]

//! Presentation-timing engines for the landing page. No I/O.

pub mod clock;
pub mod easing;
pub mod loops;
pub mod scroll;
pub mod stage;
pub mod timeline;
pub mod timer;

pub use clock::{Clock, SystemClock, VirtualClock};
pub use easing::Easing;
pub use loops::{HeroLoops, LoopEvent, LoopTimings, Ranking, Rotator, Typewriter};
pub use scroll::{
    BoundsProvider, Phase, PinMode, Rect, RegionId, ScrollCoordinator, ScrollFrame, ScrollSample,
    ScrubEffect,
};
pub use stage::{ElementRef, SceneStage, Stage, VisualState};
pub use timeline::{RevealToggle, Timeline, TimelineHandle, TimelineStep};
pub use timer::{Fired, ScopeId, TimerId, TimerKind, TimerManager, TimerStats};
