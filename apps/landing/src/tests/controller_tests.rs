use super::*;

use std::{
    io::Cursor,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use client_core::{GenerationState, ImageSynthesisService, TextCompletionService};
use crossbeam_channel::bounded;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use motion::LoopTimings;
use shared::{
    domain::{ResolutionTier, TurnRole},
    error::{FailureKind, FailureNotice, CONVERSATION_FALLBACK_REPLY},
    protocol::{Candidate, Content, GenerateContentResponse, Part},
};

use crate::backend_bridge::runtime::{launch, BackendServices};

const WAIT: Duration = Duration::from_secs(5);

struct StubServices {
    reply: String,
    picture: Option<String>,
    tiers: Mutex<Vec<ResolutionTier>>,
}

#[async_trait]
impl TextCompletionService for StubServices {
    fn has_credentials(&self) -> bool {
        true
    }

    async fn complete(&self, _prompt: &str) -> Result<String, ServiceError> {
        Ok(self.reply.clone())
    }
}

#[async_trait]
impl ImageSynthesisService for StubServices {
    fn has_credentials(&self) -> bool {
        true
    }

    async fn synthesize(
        &self,
        _prompt: &str,
        tier: ResolutionTier,
    ) -> Result<GenerateContentResponse, ServiceError> {
        self.tiers.lock().expect("lock").push(tier);
        let part = match &self.picture {
            Some(data) => Part::inline("image/png", data.clone()),
            None => Part::text("no picture today"),
        };
        Ok(GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(Content {
                    role: Some("model".into()),
                    parts: vec![part],
                }),
                finish_reason: None,
            }],
        })
    }
}

fn with_worker(services: BackendServices) -> (LandingController, std::thread::JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = bounded(16);
    let (ui_tx, ui_rx) = bounded(64);
    let worker = launch(cmd_rx, ui_tx, services);
    (idle_controller(cmd_tx, ui_rx), worker)
}

fn idle_controller(cmd_tx: Sender<BackendCommand>, ui_rx: Receiver<UiEvent>) -> LandingController {
    LandingController::new(LandingPage::new(LoopTimings::default()), cmd_tx, ui_rx)
}

fn png_base64(width: u32, height: u32) -> String {
    let pixels = RgbaImage::from_pixel(width, height, Rgba([40, 90, 220, 255]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(pixels)
        .write_to(&mut buffer, ImageFormat::Png)
        .expect("encode png");
    STANDARD.encode(buffer.into_inner())
}

fn stub_services() -> (Arc<StubServices>, BackendServices) {
    stub_services_with(None)
}

fn stub_services_with(picture: Option<String>) -> (Arc<StubServices>, BackendServices) {
    let stub = Arc::new(StubServices {
        reply: "Prioritise consistent sleep and light exposure.".into(),
        picture,
        tiers: Mutex::new(Vec::new()),
    });
    let services = BackendServices {
        text: stub.clone(),
        image: stub.clone(),
    };
    (stub, services)
}

#[test]
fn chat_round_trip_through_backend_worker() {
    let (_stub, services) = stub_services();
    let (mut controller, worker) = with_worker(services);

    controller.page_mut().open_chat();
    controller
        .page_mut()
        .conversation_mut()
        .set_input("What is optimal protocol?");
    controller.send_chat().expect("queued");
    assert!(controller.page().conversation().is_sending());

    assert!(controller.wait_until_idle(WAIT));
    let transcript = controller.page().conversation().transcript();
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[1].role, TurnRole::User);
    let reply = &transcript[2].text;
    assert_eq!(reply, "Prioritise consistent sleep and light exposure.");

    drop(controller);
    worker.join().expect("worker exits once the queue closes");
}

#[test]
fn generation_without_image_fails_after_generating() {
    let (stub, services) = stub_services();
    let (mut controller, worker) = with_worker(services);

    controller.page_mut().open_image();
    assert!(!controller.page().generation().can_generate());
    assert_eq!(
        controller.generate(),
        Err(ActionRejected::Generation(GenerateRejected::EmptyPrompt))
    );

    let panel = controller.page_mut().generation_mut();
    panel.set_prompt("cellular renewal");
    panel.select_tier(ResolutionTier::TwoK);
    controller.generate().expect("queued");
    assert!(matches!(
        controller.page().generation().state(),
        GenerationState::Generating { tier: ResolutionTier::TwoK, .. }
    ));

    assert!(controller.wait_until_idle(WAIT));
    assert!(controller.page().generation().image().is_none());
    assert_eq!(
        controller.page().generation().notice().map(|n| n.kind),
        Some(FailureKind::MalformedResponse)
    );
    let tiers = stub.tiers.lock().expect("lock").clone();
    assert_eq!(tiers, vec![ResolutionTier::TwoK]);

    drop(controller);
    worker.join().expect("worker exit");
}

#[test]
fn worker_delivers_decoded_image() {
    let (_stub, services) = stub_services_with(Some(png_base64(3, 2)));
    let (mut controller, worker) = with_worker(services);

    controller.page_mut().open_image();
    let panel = controller.page_mut().generation_mut();
    panel.set_prompt("cellular renewal");
    panel.select_tier(ResolutionTier::FourK);
    controller.generate().expect("queued");
    assert!(controller.wait_until_idle(WAIT));

    let image = controller.page().generation().image().expect("ready image");
    assert_eq!(image.dimensions(), (3, 2));
    assert_eq!(image.tier(), ResolutionTier::FourK);
    assert!(controller.last_error().is_none());

    drop(controller);
    worker.join().expect("worker exit");
}

#[test]
fn undecodable_image_fails_on_the_worker() {
    let (_stub, services) = stub_services_with(Some("bm90IGFuIGltYWdl".into()));
    let (mut controller, worker) = with_worker(services);

    controller.page_mut().open_image();
    let panel = controller.page_mut().generation_mut();
    panel.set_prompt("cellular renewal");
    controller.generate().expect("queued");
    assert!(controller.wait_until_idle(WAIT));

    let notice = controller.page().generation().notice().map(|n| n.kind);
    assert_eq!(notice, Some(FailureKind::MalformedResponse));
    let err = controller.last_error().expect("recorded error");
    assert_eq!(err.context(), UiErrorContext::Generation);

    drop(controller);
    worker.join().expect("worker exit");
}

#[test]
fn unavailable_services_report_configuration_notice() {
    let (mut controller, worker) = with_worker(BackendServices::unavailable());

    controller.page_mut().open_image();
    controller
        .page_mut()
        .generation_mut()
        .set_prompt("cellular renewal");
    controller.generate().expect("queued");
    assert!(controller.wait_until_idle(WAIT));

    assert_eq!(
        controller.page().generation().notice(),
        Some(&FailureNotice::for_generation(FailureKind::Configuration))
    );
    let err = controller.last_error().expect("recorded error");
    assert_eq!(err.category(), events::UiErrorCategory::Configuration);
    assert_eq!(err.context(), UiErrorContext::Generation);

    drop(controller);
    worker.join().expect("worker exit");
}

#[test]
fn requests_need_an_open_panel() {
    let (cmd_tx, cmd_rx) = bounded(4);
    let (_ui_tx, ui_rx) = bounded::<UiEvent>(4);
    let mut controller = idle_controller(cmd_tx, ui_rx);

    controller.page_mut().conversation_mut().set_input("hello");
    assert_eq!(controller.send_chat(), Err(ActionRejected::PanelClosed));
    assert!(cmd_rx.try_recv().is_err());
    assert_eq!(controller.page().conversation().len(), 1);
}

#[test]
fn reply_for_closed_panel_is_discarded() {
    let (cmd_tx, cmd_rx) = bounded(4);
    let (ui_tx, ui_rx) = bounded(4);
    let mut controller = idle_controller(cmd_tx, ui_rx);

    controller.page_mut().open_chat();
    controller.page_mut().conversation_mut().set_input("hello");
    let ticket = controller.send_chat().expect("queued");
    assert_eq!(
        cmd_rx.try_recv().expect("command queued"),
        BackendCommand::Complete {
            ticket,
            prompt: "hello".into()
        }
    );

    assert_eq!(controller.page_mut().close_chat(), Some(ticket));
    ui_tx
        .send(UiEvent::CompletionFinished {
            ticket,
            outcome: Ok("too late".into()),
        })
        .expect("send event");
    assert_eq!(controller.drain_events(), 1);

    let conversation = controller.page().conversation();
    assert_eq!(conversation.len(), 2);
    assert!(!conversation.is_sending());
    assert!(controller.last_error().is_none());
}

#[test]
fn disconnected_backend_settles_with_fallback() {
    let (cmd_tx, cmd_rx) = bounded(4);
    let (_ui_tx, ui_rx) = bounded::<UiEvent>(4);
    drop(cmd_rx);
    let mut controller = idle_controller(cmd_tx, ui_rx);

    controller.page_mut().open_chat();
    controller.page_mut().conversation_mut().set_input("hello");
    let rejected = controller.send_chat();
    assert_eq!(rejected, Err(ActionRejected::QueueUnavailable));

    let conversation = controller.page().conversation();
    assert!(!conversation.is_sending());
    let reply = &conversation.transcript()[2].text;
    assert_eq!(reply, CONVERSATION_FALLBACK_REPLY);
    assert!(controller.status().contains("disconnected"));
    assert_eq!(
        controller.last_error().map(|err| err.category()),
        Some(events::UiErrorCategory::Transport)
    );
}

#[test]
fn startup_failures_are_classified() {
    let err = UiError::from_message(
        UiErrorContext::BackendStartup,
        "backend worker startup failure: failed to build runtime",
    );
    assert_eq!(err.category(), events::UiErrorCategory::Configuration);
    let err = UiError::from_message(UiErrorContext::Chat, "command queue is full; please retry");
    assert_eq!(err.category(), events::UiErrorCategory::Transport);
}
