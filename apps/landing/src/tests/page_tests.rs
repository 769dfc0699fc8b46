use super::*;

use client_core::{ConversationState, Settled};
use motion::Phase;

const VH: f32 = 900.0;

fn mounted_page() -> LandingPage {
    let mut page = LandingPage::new(LoopTimings::default());
    page.mount(Duration::ZERO);
    page
}

fn scroll(page: &mut LandingPage, y: f32) -> ScrollFrame {
    page.on_scroll(ScrollSample::new(y, VH))
}

fn state(page: &LandingPage, target: &str) -> VisualState {
    page.stage().get(target).expect("mounted element")
}

fn at_rest(page: &LandingPage, target: &str) -> bool {
    state(page, target).approx_eq(&VisualState::IDENTITY)
}

#[test]
fn mount_starts_intro_from_hidden_and_finishes_it() {
    let mut page = mounted_page();
    assert!(page.is_mounted());
    assert_eq!(state(&page, "hero-title").opacity, 0.0);
    assert_eq!(page.scroll().len(), 7);

    page.tick(ms(2_000));
    let intro = page.hero_intro().expect("intro handle");
    assert!(intro.is_complete());
    assert!(at_rest(&page, "hero-title"));
    assert!(at_rest(&page, "hero-cards"));
}

#[test]
fn hero_cards_follow_the_rotator() {
    let mut page = mounted_page();
    assert!(at_rest(&page, &hero_card(0)));
    assert!(state(&page, &hero_card(1)).opacity < 1.0);

    page.tick(ms(3_000));
    assert_eq!(page.loops().rotator().active(), 1);
    assert!(at_rest(&page, &hero_card(1)));
    assert!(state(&page, &hero_card(0)).opacity < 1.0);
}

#[test]
fn typewriter_types_on_virtual_time() {
    let mut page = mounted_page();
    assert_eq!(page.loops().typewriter().text(), "");
    page.tick(ms(50));
    assert_eq!(page.loops().typewriter().text(), "R");
    page.tick(ms(150));
    assert_eq!(page.loops().typewriter().text(), "Res");
}

#[test]
fn protocol_panels_pin_in_document_order() {
    let mut page = mounted_page();
    scroll(&mut page, 0.0);
    assert_eq!(page.phase(PANEL_REGIONS[0]), Some(Phase::Inactive));

    scroll(&mut page, 450.0);
    assert_eq!(page.phase(PANEL_REGIONS[0]), Some(Phase::Entering));

    let frame = scroll(&mut page, 1_350.0);
    assert_eq!(page.phase(PANEL_REGIONS[0]), Some(Phase::Pinned));
    let pin = frame.pin(PANEL_REGIONS[0]).expect("pin frame");
    assert_eq!(pin.offset_y, 450.0);
    assert_eq!(state(&page, PROTOCOL_PANELS[0]).translate_y, 450.0);

    scroll(&mut page, 1_800.0);
    assert_eq!(page.phase(PANEL_REGIONS[0]), Some(Phase::Released));
    assert_eq!(page.phase(PANEL_REGIONS[1]), Some(Phase::Pinned));

    let order: Vec<RegionId> = page
        .transitions()
        .iter()
        .filter(|t| t.to == Phase::Pinned)
        .map(|t| t.id)
        .collect();
    assert_eq!(order, vec![PANEL_REGIONS[0], PANEL_REGIONS[1]]);
}

#[test]
fn released_panels_never_repin_but_visuals_restore() {
    let mut page = mounted_page();
    let max = page.layout().max_scroll(VH);
    let mut y = 0.0;
    while y < max {
        scroll(&mut page, y);
        y += 150.0;
    }
    scroll(&mut page, max);
    for id in PANEL_REGIONS {
        let phase = page.phase(id);
        assert_eq!(phase, Some(Phase::Released), "{id} after sweep down");
    }

    let pinned_before = page
        .transitions()
        .iter()
        .filter(|t| t.to == Phase::Pinned)
        .count();
    while y > 0.0 {
        y -= 150.0;
        scroll(&mut page, y.max(0.0));
    }
    for id in PANEL_REGIONS {
        assert_eq!(page.phase(id), Some(Phase::Released), "{id} after sweep up");
    }
    let pinned_after = page
        .transitions()
        .iter()
        .filter(|t| t.to == Phase::Pinned)
        .count();
    assert_eq!(pinned_before, pinned_after);
    for target in PROTOCOL_PANELS {
        assert_eq!(state(&page, target).translate_y, 0.0);
    }
}

#[test]
fn hero_background_parallax_tracks_scroll() {
    let mut page = mounted_page();
    let frame = scroll(&mut page, 0.0);
    assert_eq!(frame.scrub(HERO_SCRUB).map(|s| s.progress), Some(0.5));
    assert_eq!(state(&page, HERO_BACKGROUND).translate_y, 90.0);

    scroll(&mut page, 900.0);
    assert_eq!(state(&page, HERO_BACKGROUND).translate_y, 180.0);
}

#[test]
fn paragraphs_reveal_on_enter_and_hide_on_leave() {
    let mut page = mounted_page();
    assert_eq!(state(&page, PARAGRAPHS[0]).opacity, 0.0);

    scroll(&mut page, 3_300.0);
    assert!(page.is_revealed(REVEAL_REGIONS[0]));
    assert!(page.is_revealed(REVEAL_REGIONS[1]));
    assert!(!page.is_revealed(REVEAL_REGIONS[2]));

    page.tick(ms(700));
    assert!(at_rest(&page, PARAGRAPHS[0]));

    scroll(&mut page, 0.0);
    assert!(!page.is_revealed(REVEAL_REGIONS[0]));
    page.tick(ms(1_400));
    assert_eq!(state(&page, PARAGRAPHS[0]).opacity, 0.0);
}

#[test]
fn unmount_releases_timers_and_stops_engines() {
    let mut page = mounted_page();
    page.tick(ms(400));
    let cancelled = page.unmount();
    assert!(cancelled >= 1);
    assert_eq!(page.loops().active_timers(), 0);
    let stats = page.loops().timer_stats();
    assert_eq!(stats.started, stats.cancelled + stats.completed);

    assert!(at_rest(&page, "hero-title"));
    let text = page.loops().typewriter().text().to_string();
    assert_eq!(page.tick(ms(10_000)), 0);
    assert_eq!(page.loops().typewriter().text(), text);
    assert!(scroll(&mut page, 1_000.0).pins.is_empty());
    assert!(page.scroll().is_empty());
}

#[test]
fn closing_chat_discards_late_reply_but_keeps_transcript() {
    let mut page = mounted_page();
    page.open_chat();
    assert!(page.chat_open());
    let conversation = page.conversation_mut();
    conversation.set_input("What is optimal protocol?");
    let request = conversation.submit().expect("accepted");

    assert_eq!(page.close_chat(), Some(request.ticket));
    assert!(!page.chat_open());
    let late = page
        .conversation_mut()
        .resolve(request.ticket, Ok("late".into()));
    assert_eq!(late, Settled::Discarded);
    assert_eq!(page.conversation().len(), 2);
    assert_eq!(page.conversation().state(), ConversationState::Idle);
}

#[test]
fn closing_image_panel_abandons_generation() {
    let mut page = mounted_page();
    page.open_image();
    page.generation_mut().set_prompt("cellular renewal");
    let request = page.generation_mut().submit().expect("accepted");

    assert_eq!(page.close_image(), Some(request.ticket));
    assert!(!page.image_open());
    let outcome = Err(client_core::ServiceError::NoImage);
    assert!(!page.generation_mut().resolve(request.ticket, outcome));
    assert!(page.generation().notice().is_none());
}
