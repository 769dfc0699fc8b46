//! Backend-to-UI events and error modeling for the landing controller.

use client_core::{GeneratedImage, ServiceError};
use shared::{domain::RequestTicket, error::FailureKind};

#[derive(Debug)]
pub enum UiEvent {
    Info(String),
    Error(UiError),
    CompletionFinished {
        ticket: RequestTicket,
        outcome: Result<String, ServiceError>,
    },
    SynthesisFinished {
        ticket: RequestTicket,
        outcome: Result<GeneratedImage, ServiceError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Configuration,
    Transport,
    Validation,
    Unknown,
}

impl From<FailureKind> for UiErrorCategory {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Configuration => UiErrorCategory::Configuration,
            FailureKind::Transport => UiErrorCategory::Transport,
            FailureKind::MalformedResponse => UiErrorCategory::Validation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    Chat,
    Generation,
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let message_lower = message.to_ascii_lowercase();
        let category = if message_lower.contains("api key")
            || message_lower.contains("not configured")
            || message_lower.contains("startup failure")
        {
            UiErrorCategory::Configuration
        } else if message_lower.contains("timeout")
            || message_lower.contains("connection")
            || message_lower.contains("network")
            || message_lower.contains("transport")
            || message_lower.contains("unavailable")
            || message_lower.contains("disconnected")
            || message_lower.contains("queue is full")
        {
            UiErrorCategory::Transport
        } else if message_lower.contains("invalid")
            || message_lower.contains("missing")
            || message_lower.contains("malformed")
            || message_lower.contains("empty")
        {
            UiErrorCategory::Validation
        } else {
            UiErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    pub fn from_service(context: UiErrorContext, err: &ServiceError) -> Self {
        Self {
            category: err.kind().into(),
            context,
            message: err.to_string(),
        }
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
