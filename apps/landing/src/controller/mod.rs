//! Controller layer: owns the root view, queues panel requests to the backend
//! worker and applies the events it sends back.

pub mod events;
pub mod orchestration;

use std::time::{Duration, Instant};

use client_core::{GenerateRejected, ServiceError, Settled, SubmitRejected};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use shared::domain::RequestTicket;
use thiserror::Error;
use tracing::{debug, warn};

use crate::backend_bridge::commands::BackendCommand;
use crate::page::LandingPage;
use events::{UiError, UiErrorContext, UiEvent};
use orchestration::dispatch_backend_command;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionRejected {
    #[error("the panel is closed")]
    PanelClosed,
    #[error(transparent)]
    Chat(#[from] SubmitRejected),
    #[error(transparent)]
    Generation(#[from] GenerateRejected),
    #[error("backend worker is not accepting requests")]
    QueueUnavailable,
}

pub struct LandingController {
    page: LandingPage,
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    status: String,
    last_error: Option<UiError>,
}

impl LandingController {
    pub fn new(
        page: LandingPage,
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
    ) -> Self {
        Self {
            page,
            cmd_tx,
            ui_rx,
            status: String::new(),
            last_error: None,
        }
    }

    pub fn page(&self) -> &LandingPage {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut LandingPage {
        &mut self.page
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn last_error(&self) -> Option<&UiError> {
        self.last_error.as_ref()
    }

    /// Submit the assistant input. The panel must be open.
    pub fn send_chat(&mut self) -> Result<RequestTicket, ActionRejected> {
        if !self.page.chat_open() {
            return Err(ActionRejected::PanelClosed);
        }
        let request = self.page.conversation_mut().submit()?;
        let cmd = BackendCommand::Complete {
            ticket: request.ticket,
            prompt: request.prompt,
        };
        if dispatch_backend_command(&self.cmd_tx, cmd, &mut self.status).is_err() {
            let err = ServiceError::Unavailable(self.status.clone());
            self.record_error(UiErrorContext::Chat, &err);
            self.page
                .conversation_mut()
                .resolve(request.ticket, Err(err));
            return Err(ActionRejected::QueueUnavailable);
        }
        Ok(request.ticket)
    }

    /// Submit the image prompt at the selected tier. The panel must be open.
    pub fn generate(&mut self) -> Result<RequestTicket, ActionRejected> {
        if !self.page.image_open() {
            return Err(ActionRejected::PanelClosed);
        }
        let request = self.page.generation_mut().submit()?;
        let cmd = BackendCommand::Generate {
            ticket: request.ticket,
            prompt: request.prompt,
            tier: request.tier,
        };
        if dispatch_backend_command(&self.cmd_tx, cmd, &mut self.status).is_err() {
            let err = ServiceError::Unavailable(self.status.clone());
            self.record_error(UiErrorContext::Generation, &err);
            self.page.generation_mut().resolve(request.ticket, Err(err));
            return Err(ActionRejected::QueueUnavailable);
        }
        Ok(request.ticket)
    }

    /// Apply every event already queued by the backend. Never blocks.
    pub fn drain_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.ui_rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    pub fn has_pending_requests(&self) -> bool {
        self.page.conversation().is_sending() || self.page.generation().is_generating()
    }

    /// Block until no panel request is outstanding. Returns `false` on
    /// timeout or when the backend went away.
    pub fn wait_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.has_pending_requests() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.ui_rx.recv_timeout(remaining) {
                Ok(event) => self.apply(event),
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => {
                    self.status = "Backend worker stopped".to_string();
                    return false;
                }
            }
        }
        true
    }

    fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::Info(message) => self.status = message,
            UiEvent::Error(err) => {
                warn!(context = ?err.context(), category = ?err.category(), "{}", err.message());
                self.status = err.message().to_string();
                self.last_error = Some(err);
            }
            UiEvent::CompletionFinished { ticket, outcome } => {
                let failure = failure_of(UiErrorContext::Chat, &outcome);
                match self.page.conversation_mut().resolve(ticket, outcome) {
                    Settled::Discarded => debug!(ticket = ticket.0, "late reply ignored"),
                    Settled::Failed(_) if failure.is_some() => self.last_error = failure,
                    Settled::Failed(_) | Settled::Succeeded => {}
                }
            }
            UiEvent::SynthesisFinished { ticket, outcome } => {
                let failure = failure_of(UiErrorContext::Generation, &outcome);
                if !self.page.generation_mut().resolve(ticket, outcome) {
                    debug!(ticket = ticket.0, "late image ignored");
                } else if failure.is_some() {
                    self.last_error = failure;
                }
            }
        }
    }

    fn record_error(&mut self, context: UiErrorContext, err: &ServiceError) {
        self.last_error = Some(UiError::from_service(context, err));
    }
}

fn failure_of<T>(context: UiErrorContext, outcome: &Result<T, ServiceError>) -> Option<UiError> {
    outcome
        .as_ref()
        .err()
        .map(|err| UiError::from_service(context, err))
}

#[cfg(test)]
#[path = "../tests/controller_tests.rs"]
mod tests;
