//! Root view: composes the animation engines, the two tool panels and the
//! element stage they write to.

use std::time::Duration;

use client_core::{Conversation, GenerationPanel};
use motion::{
    scroll::PhaseTransition, Easing, ElementRef, HeroLoops, LoopTimings, Phase, PinMode, Rect,
    RegionId, RevealToggle, SceneStage, ScrollCoordinator, ScrollFrame, ScrollSample, ScrubEffect,
    Stage, Timeline, TimelineHandle, TimelineStep, VisualState,
};
use shared::domain::RequestTicket;
use tracing::{debug, info};

pub const HERO_BACKGROUND: &str = "hero-bg";
pub const HERO_CARD_COUNT: usize = 3;
pub const PROTOCOL_PANELS: [&str; 3] = ["protocol-panel-1", "protocol-panel-2", "protocol-panel-3"];
pub const PARAGRAPHS: [&str; 3] = ["paragraph-1", "paragraph-2", "paragraph-3"];

const HERO_TEXT: [&str; 3] = ["hero-title", "hero-subtitle", "hero-cta"];
const HERO_CARDS: &str = "hero-cards";

pub const HERO_SCRUB: RegionId = RegionId(1);
pub const PANEL_REGIONS: [RegionId; 3] = [RegionId(10), RegionId(11), RegionId(12)];
pub const REVEAL_REGIONS: [RegionId; 3] = [RegionId(20), RegionId(21), RegionId(22)];

const SECTION_HEIGHT: f32 = 900.0;
const PARAGRAPH_TOP: f32 = 3_600.0;
const PARAGRAPH_HEIGHT: f32 = 240.0;
const PARAGRAPH_GAP: f32 = 60.0;
const FOOTER_HEIGHT: f32 = 300.0;
const PARALLAX_DISTANCE: f32 = 180.0;
const REVEAL_START: f32 = 0.8;

const TYPEWRITER_MESSAGES: [&str; 4] = [
    "Restore deep sleep.",
    "Recover faster.",
    "Renew at the cellular level.",
    "Measure what matters.",
];

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

pub fn hero_card(index: usize) -> String {
    format!("hero-card-{index}")
}

/// Document-space rects of every scroll-driven section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub hero: Rect,
    pub panels: [Rect; 3],
    pub paragraphs: [Rect; 3],
}

impl Default for PageLayout {
    fn default() -> Self {
        let panel = |i: usize| Rect::new(SECTION_HEIGHT * (i as f32 + 1.0), SECTION_HEIGHT);
        let paragraph = |i: usize| {
            Rect::new(
                PARAGRAPH_TOP + (PARAGRAPH_HEIGHT + PARAGRAPH_GAP) * i as f32,
                PARAGRAPH_HEIGHT,
            )
        };
        Self {
            hero: Rect::new(0.0, SECTION_HEIGHT),
            panels: [panel(0), panel(1), panel(2)],
            paragraphs: [paragraph(0), paragraph(1), paragraph(2)],
        }
    }
}

impl PageLayout {
    pub fn document_height(&self) -> f32 {
        self.paragraphs[2].bottom() + FOOTER_HEIGHT
    }

    pub fn max_scroll(&self, viewport_height: f32) -> f32 {
        (self.document_height() - viewport_height).max(0.0)
    }
}

fn hero_intro() -> Timeline {
    Timeline::new()
        .step(
            TimelineStep::new(
                HERO_TEXT,
                VisualState::hidden_below(40.0),
                VisualState::IDENTITY,
                ms(800),
            )
            .stagger(ms(120))
            .easing(Easing::EaseOutCubic),
        )
        .step(
            TimelineStep::new(
                [HERO_CARDS],
                VisualState::hidden_below(60.0).with_scale(0.9),
                VisualState::IDENTITY,
                ms(900),
            )
            .overlap(ms(400))
            .easing(Easing::EaseOutQuart),
        )
        .one_shot()
}

fn paragraph_reveal(target: &str) -> Timeline {
    Timeline::new().step(
        TimelineStep::new(
            [target],
            VisualState::hidden_below(30.0),
            VisualState::IDENTITY,
            ms(600),
        )
        .easing(Easing::EaseOutQuad),
    )
}

pub struct LandingPage {
    layout: PageLayout,
    stage: SceneStage,
    loops: HeroLoops,
    hero: Option<TimelineHandle>,
    scroll: ScrollCoordinator,
    reveals: Vec<(RegionId, RevealToggle)>,
    transitions: Vec<PhaseTransition>,
    conversation: Conversation,
    generation: GenerationPanel,
    chat_open: bool,
    image_open: bool,
    last_tick: Option<Duration>,
}

impl LandingPage {
    pub fn new(timings: LoopTimings) -> Self {
        let mut stage = SceneStage::new();
        stage.mount(HERO_BACKGROUND, VisualState::IDENTITY);
        for target in HERO_TEXT.into_iter().chain([HERO_CARDS]) {
            stage.mount(target, VisualState::IDENTITY);
        }
        for card in 0..HERO_CARD_COUNT {
            stage.mount(ElementRef::new(hero_card(card)), VisualState::IDENTITY);
        }
        for target in PROTOCOL_PANELS.into_iter().chain(PARAGRAPHS) {
            stage.mount(target, VisualState::IDENTITY);
        }

        let messages = TYPEWRITER_MESSAGES.iter().map(|m| m.to_string()).collect();
        Self {
            layout: PageLayout::default(),
            stage,
            loops: HeroLoops::new(HERO_CARD_COUNT, messages, timings),
            hero: None,
            scroll: ScrollCoordinator::new(),
            reveals: Vec::new(),
            transitions: Vec::new(),
            conversation: Conversation::default(),
            generation: GenerationPanel::new(),
            chat_open: false,
            image_open: false,
            last_tick: None,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.last_tick.is_some()
    }

    /// Start the hero loops and intro, and register the scroll regions.
    pub fn mount(&mut self, now: Duration) {
        if self.is_mounted() {
            self.unmount();
        }

        self.loops.mount(now);
        self.hero = Some(hero_intro().run(&mut self.stage));
        self.register_regions();
        self.reveals = REVEAL_REGIONS
            .into_iter()
            .zip(PARAGRAPHS)
            .map(|(id, target)| (id, RevealToggle::new(&paragraph_reveal(target), &mut self.stage)))
            .collect();
        self.write_cards();
        self.last_tick = Some(now);
        info!(regions = self.scroll.len(), "landing page mounted");
    }

    fn register_regions(&mut self) {
        let layout = self.layout;
        self.scroll.register_scrub(
            HERO_SCRUB,
            0,
            HERO_BACKGROUND,
            ScrubEffect::parallax(PARALLAX_DISTANCE),
            layout.hero,
        );
        for (index, ((id, target), rect)) in PANEL_REGIONS
            .into_iter()
            .zip(PROTOCOL_PANELS)
            .zip(layout.panels)
            .enumerate()
        {
            self.scroll
                .register_pin(id, 10 + index as i32, target, PinMode::OneShot, rect);
        }
        for (index, (id, rect)) in REVEAL_REGIONS
            .into_iter()
            .zip(layout.paragraphs)
            .enumerate()
        {
            self.scroll
                .register_toggle(id, 20 + index as i32, REVEAL_START, rect);
        }
    }

    /// Tear everything down. No timer fires and no late response is applied
    /// after this returns. Returns the number of timers cancelled.
    pub fn unmount(&mut self) -> usize {
        if !self.is_mounted() {
            return 0;
        }
        let cancelled = self.loops.unmount();
        if let Some(mut hero) = self.hero.take() {
            hero.revert(&mut self.stage);
        }
        for (_, reveal) in &mut self.reveals {
            reveal.revert(&mut self.stage);
        }
        self.reveals.clear();
        self.scroll.clear();
        self.close_chat();
        self.close_image();
        self.last_tick = None;
        info!(cancelled, "landing page unmounted");
        cancelled
    }

    /// Advance timers and running timelines to `now`. Returns the number of
    /// timer firings handled.
    pub fn tick(&mut self, now: Duration) -> usize {
        let Some(last) = self.last_tick else {
            return 0;
        };
        let dt = now.saturating_sub(last);
        self.last_tick = Some(last.max(now));

        let fired = self.loops.advance_to(now);
        if fired > 0 {
            self.write_cards();
        }
        if let Some(hero) = &mut self.hero {
            hero.advance(dt, &mut self.stage);
        }
        for (_, reveal) in &mut self.reveals {
            reveal.advance(dt, &mut self.stage);
        }
        fired
    }

    /// Process one scroll sample and write its frame to the stage.
    pub fn on_scroll(&mut self, sample: ScrollSample) -> ScrollFrame {
        if !self.is_mounted() {
            return ScrollFrame::default();
        }
        let frame = self.scroll.sample(sample);
        frame.apply(&mut self.stage);

        for change in &frame.toggles {
            if let Some((_, reveal)) = self.reveals.iter_mut().find(|(id, _)| *id == change.id) {
                reveal.set_active(change.active);
            }
        }
        for transition in &frame.transitions {
            debug!(
                region = %transition.id,
                from = ?transition.from,
                to = ?transition.to,
                "region phase"
            );
        }
        self.transitions.extend(frame.transitions.iter().copied());
        frame
    }

    fn write_cards(&mut self) {
        let rotator = self.loops.rotator();
        for card in 0..HERO_CARD_COUNT {
            let target = ElementRef::new(hero_card(card));
            self.stage.write(&target, rotator.card_state(card));
        }
    }

    pub fn open_chat(&mut self) {
        self.chat_open = true;
    }

    /// Hide the assistant. Its transcript survives, an outstanding reply does not.
    pub fn close_chat(&mut self) -> Option<RequestTicket> {
        self.chat_open = false;
        self.conversation.abandon()
    }

    pub fn open_image(&mut self) {
        self.image_open = true;
    }

    pub fn close_image(&mut self) -> Option<RequestTicket> {
        self.image_open = false;
        self.generation.abandon()
    }

    pub fn chat_open(&self) -> bool {
        self.chat_open
    }

    pub fn image_open(&self) -> bool {
        self.image_open
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    pub fn generation(&self) -> &GenerationPanel {
        &self.generation
    }

    pub fn generation_mut(&mut self) -> &mut GenerationPanel {
        &mut self.generation
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn stage(&self) -> &SceneStage {
        &self.stage
    }

    pub fn loops(&self) -> &HeroLoops {
        &self.loops
    }

    pub fn hero_intro(&self) -> Option<&TimelineHandle> {
        self.hero.as_ref()
    }

    pub fn scroll(&self) -> &ScrollCoordinator {
        &self.scroll
    }

    pub fn phase(&self, id: RegionId) -> Option<Phase> {
        self.scroll.phase(id)
    }

    pub fn is_revealed(&self, id: RegionId) -> bool {
        self.reveals
            .iter()
            .any(|(region, reveal)| *region == id && reveal.is_active())
    }

    /// Every phase change since mount, in processing order.
    pub fn transitions(&self) -> &[PhaseTransition] {
        &self.transitions
    }
}

#[cfg(test)]
#[path = "tests/page_tests.rs"]
mod tests;
