//! Worker thread that owns the tokio runtime and the service clients.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

use client_core::{
    GenAiClient, GeneratedImage, ImageSynthesisService, ServiceError, TextCompletionService,
    UnavailableService,
};
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info, warn};

use crate::backend_bridge::commands::BackendCommand;
use crate::config::Settings;
use crate::controller::events::{UiError, UiErrorContext, UiEvent};

#[derive(Clone)]
pub struct BackendServices {
    pub text: Arc<dyn TextCompletionService>,
    pub image: Arc<dyn ImageSynthesisService>,
}

impl BackendServices {
    /// Falls back to a stand-in that reports a configuration failure on every
    /// call when the client cannot be built.
    pub fn from_settings(settings: &Settings) -> Self {
        match GenAiClient::new(&settings.service_config()) {
            Ok(client) => {
                let client = Arc::new(client);
                Self {
                    text: client.clone(),
                    image: client,
                }
            }
            Err(err) => {
                warn!(%err, "service client unavailable; tools will report failures");
                Self::unavailable()
            }
        }
    }

    pub fn unavailable() -> Self {
        Self {
            text: Arc::new(UnavailableService),
            image: Arc::new(UnavailableService),
        }
    }
}

/// Run commands from `cmd_rx` until every sender is dropped. Each request
/// runs as its own task on the worker runtime.
pub fn launch(
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
    services: BackendServices,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                    UiErrorContext::BackendStartup,
                    format!("backend worker startup failure: runtime: {err}"),
                )));
                error!("failed to build backend runtime: {err}");
                return;
            }
        };
        let _ = ui_tx.try_send(UiEvent::Info("Backend worker ready".to_string()));
        info!("backend worker ready");

        runtime.block_on(async move {
            while let Ok(cmd) = cmd_rx.recv() {
                debug!(command = cmd.name(), "backend command received");
                let services = services.clone();
                let ui_tx = ui_tx.clone();
                tokio::spawn(async move {
                    let event = run_command(&services, cmd).await;
                    if ui_tx.try_send(event).is_err() {
                        warn!("ui event queue unavailable; dropping backend result");
                    }
                });
            }
            debug!("backend command queue closed");
        });
    })
}

async fn run_command(services: &BackendServices, cmd: BackendCommand) -> UiEvent {
    match cmd {
        BackendCommand::Complete { ticket, prompt } => {
            let outcome = if services.text.has_credentials() {
                services.text.complete(&prompt).await
            } else {
                Err(ServiceError::MissingCredential)
            };
            UiEvent::CompletionFinished { ticket, outcome }
        }
        BackendCommand::Generate {
            ticket,
            prompt,
            tier,
        } => {
            let response = if services.image.has_credentials() {
                services.image.synthesize(&prompt, tier).await
            } else {
                Err(ServiceError::MissingCredential)
            };
            // Decoded here so the UI loop only ever sees validated images.
            let outcome = response.and_then(|resp| GeneratedImage::from_response(&resp, tier));
            UiEvent::SynthesisFinished { ticket, outcome }
        }
    }
}
