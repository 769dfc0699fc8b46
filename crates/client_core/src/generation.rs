//! Generation State Machine: one live image-synthesis request at a time.
//!
//! A payload only becomes visible after it has been located, base64-decoded
//! and fully decoded as a raster image. Decoding happens wherever the
//! response arrives (the backend worker in the app), so the panel only ever
//! receives a validated [`GeneratedImage`] or an error.

use std::path::{Path, PathBuf};

use anyhow::Context;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use image::GenericImageView;
use shared::{
    domain::{RequestTicket, ResolutionTier},
    error::FailureNotice,
    protocol::{GenerateContentResponse, InlineData},
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{error::ServiceError, ImageSynthesisService};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    bytes: Vec<u8>,
    mime_type: String,
    width: u32,
    height: u32,
    tier: ResolutionTier,
    created_at: DateTime<Utc>,
}

impl GeneratedImage {
    /// Locate the first inline image of `response` and decode it.
    pub fn from_response(
        response: &GenerateContentResponse,
        tier: ResolutionTier,
    ) -> Result<Self, ServiceError> {
        let inline = response.first_inline_image().ok_or(ServiceError::NoImage)?;
        Self::decode(inline, tier)
    }

    pub fn decode(inline: &InlineData, tier: ResolutionTier) -> Result<Self, ServiceError> {
        let bytes = STANDARD.decode(inline.data.trim()).map_err(not_base64)?;
        let decoded = image::load_from_memory(&bytes).map_err(undecodable)?;
        let (width, height) = decoded.dimensions();

        let mime_type = if inline.mime_type.starts_with("image/") {
            inline.mime_type.clone()
        } else {
            image::guess_format(&bytes)
                .map(|format| format.to_mime_type().to_string())
                .unwrap_or_else(|_| "image/png".to_string())
        };

        Ok(Self {
            bytes,
            mime_type,
            width,
            height,
            tier,
            created_at: Utc::now(),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn tier(&self) -> ResolutionTier {
        self.tier
    }

    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }

    /// Suggested name of the downloadable asset.
    pub fn file_name(&self) -> String {
        format!(
            "render-{}-{}.{}",
            self.tier.label().to_ascii_lowercase(),
            self.created_at.format("%Y%m%d-%H%M%S"),
            self.extension()
        )
    }

    pub fn to_data_url(&self) -> String {
        let payload = STANDARD.encode(&self.bytes);
        format!("data:{};base64,{payload}", self.mime_type)
    }

    /// Write the asset into `dir` under [`file_name`](Self::file_name).
    pub async fn save_to(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create download dir '{}'", dir.display()))?;
        let path = dir.join(self.file_name());
        tokio::fs::write(&path, &self.bytes)
            .await
            .with_context(|| format!("failed to write image to '{}'", path.display()))?;
        Ok(path)
    }
}

fn not_base64(err: base64::DecodeError) -> ServiceError {
    ServiceError::MalformedResponse(format!("image payload is not base64: {err}"))
}

fn undecodable(err: image::ImageError) -> ServiceError {
    ServiceError::MalformedResponse(format!("image payload does not decode: {err}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    Generating {
        ticket: RequestTicket,
        tier: ResolutionTier,
    },
    Ready(GeneratedImage),
    Failed(FailureNotice),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenerateRejected {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("an image is already being generated")]
    AlreadyGenerating,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub ticket: RequestTicket,
    pub prompt: String,
    pub tier: ResolutionTier,
}

#[derive(Debug, Clone)]
pub struct GenerationPanel {
    prompt: String,
    tier: ResolutionTier,
    state: GenerationState,
    next_ticket: u64,
}

impl Default for GenerationPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationPanel {
    pub fn new() -> Self {
        Self {
            prompt: String::new(),
            tier: ResolutionTier::default(),
            state: GenerationState::Idle,
            next_ticket: 1,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    pub fn tier(&self) -> ResolutionTier {
        self.tier
    }

    /// Takes effect from the next submission; an in-flight request keeps its tier.
    pub fn select_tier(&mut self, tier: ResolutionTier) {
        self.tier = tier;
    }

    pub fn state(&self) -> &GenerationState {
        &self.state
    }

    pub fn is_generating(&self) -> bool {
        matches!(self.state, GenerationState::Generating { .. })
    }

    /// Drives the enabled state of the generate affordance.
    pub fn can_generate(&self) -> bool {
        !self.is_generating() && !self.prompt.trim().is_empty()
    }

    pub fn image(&self) -> Option<&GeneratedImage> {
        match &self.state {
            GenerationState::Ready(image) => Some(image),
            _ => None,
        }
    }

    pub fn notice(&self) -> Option<&FailureNotice> {
        match &self.state {
            GenerationState::Failed(notice) => Some(notice),
            _ => None,
        }
    }

    /// Start a new request, discarding any previous result.
    pub fn submit(&mut self) -> Result<SynthesisRequest, GenerateRejected> {
        if self.is_generating() {
            return Err(GenerateRejected::AlreadyGenerating);
        }
        let prompt = self.prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(GenerateRejected::EmptyPrompt);
        }

        let ticket = RequestTicket(self.next_ticket);
        self.next_ticket += 1;
        let tier = self.tier;
        self.state = GenerationState::Generating { ticket, tier };
        debug!(ticket = ticket.0, %tier, "image request issued");

        Ok(SynthesisRequest {
            ticket,
            prompt,
            tier,
        })
    }

    /// Apply the outcome of `ticket`. Returns `false` when the ticket is no
    /// longer outstanding and the outcome was dropped.
    pub fn resolve(
        &mut self,
        ticket: RequestTicket,
        outcome: Result<GeneratedImage, ServiceError>,
    ) -> bool {
        match self.state {
            GenerationState::Generating {
                ticket: outstanding,
                ..
            } if outstanding == ticket => {}
            _ => {
                debug!(ticket = ticket.0, "discarding late image result");
                return false;
            }
        }

        self.state = match outcome {
            Ok(image) => {
                let (width, height) = image.dimensions();
                let tier = image.tier();
                info!(ticket = ticket.0, %tier, width, height, "image ready");
                GenerationState::Ready(image)
            }
            Err(err) => {
                let kind = err.kind();
                warn!(ticket = ticket.0, ?kind, error = %err, "image generation failed");
                GenerationState::Failed(FailureNotice::for_generation(kind))
            }
        };
        true
    }

    /// Forget the outstanding request (its panel went away).
    pub fn abandon(&mut self) -> Option<RequestTicket> {
        match self.state {
            GenerationState::Generating { ticket, .. } => {
                self.state = GenerationState::Idle;
                debug!(ticket = ticket.0, "image request abandoned");
                Some(ticket)
            }
            _ => None,
        }
    }

    /// Submit and wait for the result in place.
    pub async fn generate<S>(&mut self, service: &S) -> Result<&GenerationState, GenerateRejected>
    where
        S: ImageSynthesisService + ?Sized,
    {
        let request = self.submit()?;
        let outcome = if service.has_credentials() {
            service.synthesize(&request.prompt, request.tier).await
        } else {
            Err(ServiceError::MissingCredential)
        };
        let tier = request.tier;
        let decoded = outcome.and_then(|resp| GeneratedImage::from_response(&resp, tier));
        self.resolve(request.ticket, decoded);
        Ok(&self.state)
    }
}

#[cfg(test)]
#[path = "tests/generation_tests.rs"]
mod tests;
