use std::{path::PathBuf, thread::JoinHandle, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::GenerationState;
use crossbeam_channel::bounded;
use motion::{Clock, ScrollSample, VirtualClock};
use shared::domain::{ResolutionTier, TurnRole};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod backend_bridge;
mod config;
mod controller;
mod page;

use backend_bridge::{
    commands::BackendCommand,
    runtime::{launch, BackendServices},
};
use config::{load_settings, Settings};
use controller::{events::UiEvent, LandingController};
use page::{LandingPage, PANEL_REGIONS, REVEAL_REGIONS};

const REPLY_WAIT: Duration = Duration::from_secs(90);
const FRAME: Duration = Duration::from_millis(16);
const VIEWPORT_HEIGHT: f32 = 900.0;

#[derive(Parser, Debug)]
#[command(about = "Headless driver for the animated landing page and its tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask the protocol assistant one question.
    Chat { message: String },
    /// Render one image and save it.
    Generate {
        #[arg(long, default_value = "1K")]
        tier: ResolutionTier,
        #[arg(long)]
        out: Option<PathBuf>,
        prompt: String,
    },
    /// Mount the page, drive virtual time and a scroll sweep, then tear down.
    Simulate {
        #[arg(long, default_value_t = 600)]
        steps: u32,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let settings = load_settings();

    match cli.command {
        Command::Chat { message } => run_chat(&settings, message),
        Command::Generate { tier, out, prompt } => run_generate(&settings, tier, out, prompt),
        Command::Simulate { steps } => run_simulate(&settings, steps),
    }
}

fn start_controller(settings: &Settings) -> (LandingController, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(256);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(2048);
    let worker = launch(cmd_rx, ui_tx, BackendServices::from_settings(settings));
    let page = LandingPage::new(settings.loops);
    (LandingController::new(page, cmd_tx, ui_rx), worker)
}

fn shutdown(controller: LandingController, worker: JoinHandle<()>) -> Result<()> {
    drop(controller);
    worker
        .join()
        .map_err(|_| anyhow!("backend worker panicked"))
}

fn report_failure(controller: &LandingController) {
    if let Some(err) = controller.last_error() {
        warn!(context = ?err.context(), category = ?err.category(), "{}", err.message());
    }
}

fn run_chat(settings: &Settings, message: String) -> Result<()> {
    let (mut controller, worker) = start_controller(settings);
    controller.page_mut().open_chat();
    controller.page_mut().conversation_mut().set_input(message);
    controller
        .send_chat()
        .context("assistant rejected the message")?;

    if !controller.wait_until_idle(REPLY_WAIT) {
        bail!("no reply from the assistant: {}", controller.status());
    }
    report_failure(&controller);

    for turn in controller.page().conversation().transcript() {
        let speaker = match turn.role {
            TurnRole::User => "you",
            TurnRole::Assistant => "assistant",
        };
        println!("{speaker}: {}", turn.text);
    }
    shutdown(controller, worker)
}

fn run_generate(
    settings: &Settings,
    tier: ResolutionTier,
    out: Option<PathBuf>,
    prompt: String,
) -> Result<()> {
    let (mut controller, worker) = start_controller(settings);
    controller.page_mut().open_image();
    let panel = controller.page_mut().generation_mut();
    panel.set_prompt(prompt);
    panel.select_tier(tier);
    controller.generate().context("image request rejected")?;

    if !controller.wait_until_idle(REPLY_WAIT) {
        bail!("no image received: {}", controller.status());
    }
    report_failure(&controller);

    match controller.page().generation().state() {
        GenerationState::Ready(image) => {
            let dir = out.unwrap_or_else(|| settings.download_dir());
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("failed to build runtime for download")?;
            let path = runtime.block_on(image.save_to(&dir))?;
            let (width, height) = image.dimensions();
            let tier = image.tier();
            println!("saved {width}x{height} {tier} image to {}", path.display());
        }
        GenerationState::Failed(notice) => bail!("{}", notice.message),
        GenerationState::Idle | GenerationState::Generating { .. } => {
            bail!("image request did not settle")
        }
    }
    shutdown(controller, worker)
}

fn run_simulate(settings: &Settings, steps: u32) -> Result<()> {
    let clock = VirtualClock::new();
    let (mut controller, worker) = start_controller(settings);
    let page = controller.page_mut();
    page.mount(clock.now());

    let max_scroll = page.layout().max_scroll(VIEWPORT_HEIGHT);
    let half = (steps / 2).max(1);
    let mut fired = 0;
    let mut events = 0;
    for step in 0..steps {
        let now = clock.advance(FRAME);
        events += controller.drain_events();
        let page = controller.page_mut();
        fired += page.tick(now);

        let position = if step < half {
            (step + 1) as f32 / half as f32
        } else {
            1.0 - (step + 1 - half) as f32 / (steps - half).max(1) as f32
        };
        page.on_scroll(ScrollSample::new(max_scroll * position, VIEWPORT_HEIGHT));
    }

    let page = controller.page_mut();
    println!(
        "simulated {} ms: {fired} timer firings, {events} backend events",
        clock.now().as_millis()
    );
    let intro = page.hero_intro().map(|intro| intro.is_complete());
    println!(
        "  {} regions, {} elements, intro complete: {intro:?}",
        page.scroll().len(),
        page.stage().len()
    );
    println!("  {} phase transitions", page.transitions().len());
    for id in PANEL_REGIONS {
        println!("  {id}: {:?}", page.phase(id));
    }
    for id in REVEAL_REGIONS {
        println!("  {id}: revealed={}", page.is_revealed(id));
    }
    println!("  typewriter: {:?}", page.loops().typewriter().text());

    let cancelled = page.unmount();
    let leaked = page.loops().active_timers();
    let stats = page.loops().timer_stats();
    info!(cancelled, ?stats, "page torn down");
    println!("leaked timers: {leaked}");
    shutdown(controller, worker)?;
    if leaked > 0 {
        bail!("{leaked} timers still active after unmount");
    }
    Ok(())
}
