use serde::{Deserialize, Serialize};

/// Failure taxonomy shared by both request state machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Credential missing at client construction.
    Configuration,
    /// Network or service failure.
    Transport,
    /// Empty or structurally invalid payload.
    MalformedResponse,
}

/// What the user sees when a request fails. Never carries raw error detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureNotice {
    pub kind: FailureKind,
    pub message: String,
}

pub const CONVERSATION_FALLBACK_REPLY: &str =
    "I'm having trouble reaching the protocol network right now. Please try again in a moment.";

const GENERATION_CONFIGURATION_NOTICE: &str =
    "Image generation is not configured on this device.";
const GENERATION_FAILURE_NOTICE: &str = "Failed to generate image. Please try again.";

impl FailureNotice {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn for_generation(kind: FailureKind) -> Self {
        let message = match kind {
            FailureKind::Configuration => GENERATION_CONFIGURATION_NOTICE,
            FailureKind::Transport | FailureKind::MalformedResponse => GENERATION_FAILURE_NOTICE,
        };
        Self::new(kind, message)
    }
}
