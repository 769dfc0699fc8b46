//! Conversation State Machine: one append-only transcript and at most one
//! outstanding text-completion request.

use shared::{
    domain::{ConversationTurn, RequestTicket},
    error::{FailureKind, CONVERSATION_FALLBACK_REPLY},
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{error::ServiceError, TextCompletionService};

pub const DEFAULT_GREETING: &str =
    "Welcome. I'm the protocol assistant. Ask me anything about sleep, recovery or cellular renewal.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Idle,
    Sending { ticket: RequestTicket },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitRejected {
    #[error("message is empty")]
    EmptyInput,
    #[error("a reply is still pending")]
    AlreadySending,
}

/// The single request issued for a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub ticket: RequestTicket,
    pub prompt: String,
}

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    Succeeded,
    /// A fallback reply was appended.
    Failed(FailureKind),
    /// The ticket was no longer outstanding; nothing was applied.
    Discarded,
}

#[derive(Debug, Clone)]
pub struct Conversation {
    transcript: Vec<ConversationTurn>,
    input: String,
    state: ConversationState,
    next_ticket: u64,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(DEFAULT_GREETING)
    }
}

impl Conversation {
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            transcript: vec![ConversationTurn::assistant(greeting)],
            input: String::new(),
            state: ConversationState::Idle,
            next_ticket: 1,
        }
    }

    pub fn transcript(&self) -> &[ConversationTurn] {
        &self.transcript
    }

    pub fn len(&self) -> usize {
        self.transcript.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty()
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn is_sending(&self) -> bool {
        matches!(self.state, ConversationState::Sending { .. })
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    /// Drives the enabled state of the send affordance.
    pub fn can_submit(&self) -> bool {
        !self.is_sending() && !self.input.trim().is_empty()
    }

    /// Index of the turn the transcript view should be scrolled to.
    pub fn scroll_anchor(&self) -> Option<usize> {
        self.transcript.len().checked_sub(1)
    }

    /// Append the user's turn, clear the input and hand out the one request
    /// to issue. The user turn stays even if the request later fails.
    pub fn submit(&mut self) -> Result<CompletionRequest, SubmitRejected> {
        if self.is_sending() {
            return Err(SubmitRejected::AlreadySending);
        }
        let prompt = self.input.trim().to_string();
        if prompt.is_empty() {
            return Err(SubmitRejected::EmptyInput);
        }

        let ticket = RequestTicket(self.next_ticket);
        self.next_ticket += 1;
        self.input.clear();
        self.transcript.push(ConversationTurn::user(&prompt));
        self.state = ConversationState::Sending { ticket };
        debug!(ticket = ticket.0, "conversation request issued");

        Ok(CompletionRequest { ticket, prompt })
    }

    /// Apply the outcome of `ticket`. Outcomes for anything but the
    /// outstanding ticket are discarded.
    pub fn resolve(
        &mut self,
        ticket: RequestTicket,
        outcome: Result<String, ServiceError>,
    ) -> Settled {
        if self.state != (ConversationState::Sending { ticket }) {
            debug!(ticket = ticket.0, "discarding late conversation reply");
            return Settled::Discarded;
        }
        self.state = ConversationState::Idle;

        let outcome = outcome.and_then(|text| {
            if text.trim().is_empty() {
                Err(ServiceError::EmptyResponse)
            } else {
                Ok(text)
            }
        });

        match outcome {
            Ok(text) => {
                self.transcript.push(ConversationTurn::assistant(text));
                info!(
                    ticket = ticket.0,
                    turns = self.transcript.len(),
                    "assistant replied"
                );
                Settled::Succeeded
            }
            Err(err) => {
                let kind = err.kind();
                warn!(ticket = ticket.0, ?kind, error = %err, "assistant request failed");
                self.transcript
                    .push(ConversationTurn::assistant(CONVERSATION_FALLBACK_REPLY));
                Settled::Failed(kind)
            }
        }
    }

    /// Forget the outstanding request (its panel went away).
    pub fn abandon(&mut self) -> Option<RequestTicket> {
        match self.state {
            ConversationState::Sending { ticket } => {
                self.state = ConversationState::Idle;
                debug!(ticket = ticket.0, "conversation request abandoned");
                Some(ticket)
            }
            ConversationState::Idle => None,
        }
    }

    /// Submit the current input and wait for the reply in place.
    pub async fn send<S>(&mut self, service: &S) -> Result<Settled, SubmitRejected>
    where
        S: TextCompletionService + ?Sized,
    {
        let request = self.submit()?;
        let outcome = if service.has_credentials() {
            service.complete(&request.prompt).await
        } else {
            Err(ServiceError::MissingCredential)
        };
        Ok(self.resolve(request.ticket, outcome))
    }
}

#[cfg(test)]
#[path = "tests/conversation_tests.rs"]
mod tests;
