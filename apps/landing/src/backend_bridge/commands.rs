//! Backend commands queued from UI to backend worker.

use shared::domain::{RequestTicket, ResolutionTier};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCommand {
    Complete {
        ticket: RequestTicket,
        prompt: String,
    },
    Generate {
        ticket: RequestTicket,
        prompt: String,
        tier: ResolutionTier,
    },
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BackendCommand::Complete { .. } => "complete",
            BackendCommand::Generate { .. } => "generate",
        }
    }
}
