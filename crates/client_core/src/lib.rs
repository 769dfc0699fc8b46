use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::ResolutionTier,
    protocol::{GenerateContentRequest, GenerateContentResponse},
};
use tracing::{debug, info};
use url::Url;

pub mod conversation;
pub mod error;
pub mod generation;

pub use conversation::{CompletionRequest, Conversation, ConversationState, Settled, SubmitRejected};
pub use error::ServiceError;
pub use generation::{
    GenerateRejected, GeneratedImage, GenerationPanel, GenerationState, SynthesisRequest,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const API_KEY_HEADER: &str = "x-goog-api-key";
const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Process-wide secret for the hosted model API.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Blank keys count as missing.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// `explicit` first, then the conventional environment variables.
    pub fn resolve(explicit: Option<&str>) -> Option<Self> {
        explicit.and_then(|raw| Self::new(raw)).or_else(|| {
            API_KEY_ENV_VARS
                .iter()
                .find_map(|var| std::env::var(var).ok().and_then(Self::new))
        })
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub request_timeout: Option<Duration>,
    pub api_key: Option<ApiKey>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            api_key: None,
        }
    }
}

#[async_trait]
pub trait TextCompletionService: Send + Sync {
    /// Whether a call could be issued at all; checked before any I/O.
    fn has_credentials(&self) -> bool;
    async fn complete(&self, prompt: &str) -> Result<String, ServiceError>;
}

#[async_trait]
pub trait ImageSynthesisService: Send + Sync {
    fn has_credentials(&self) -> bool;
    async fn synthesize(
        &self,
        prompt: &str,
        tier: ResolutionTier,
    ) -> Result<GenerateContentResponse, ServiceError>;
}

/// Stand-in used when the real client could not be constructed.
pub struct UnavailableService;

#[async_trait]
impl TextCompletionService for UnavailableService {
    fn has_credentials(&self) -> bool {
        false
    }

    async fn complete(&self, _prompt: &str) -> Result<String, ServiceError> {
        Err(ServiceError::MissingCredential)
    }
}

#[async_trait]
impl ImageSynthesisService for UnavailableService {
    fn has_credentials(&self) -> bool {
        false
    }

    async fn synthesize(
        &self,
        _prompt: &str,
        _tier: ResolutionTier,
    ) -> Result<GenerateContentResponse, ServiceError> {
        Err(ServiceError::MissingCredential)
    }
}

/// HTTP client for the hosted `generateContent` API.
pub struct GenAiClient {
    http: Client,
    base_url: Url,
    text_model: String,
    image_model: String,
    api_key: Option<ApiKey>,
}

impl GenAiClient {
    /// A missing key is not an error here; every call reports it instead.
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let mut raw = config.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw)?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        if config.api_key.is_none() {
            info!("no API key configured; tools will report failures");
        }

        Ok(Self {
            http,
            base_url,
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn endpoint(&self, model: &str) -> Result<Url, ServiceError> {
        Ok(self
            .base_url
            .join(&format!("v1beta/models/{model}:generateContent"))?)
    }

    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ServiceError> {
        let key = self
            .api_key
            .as_ref()
            .ok_or(ServiceError::MissingCredential)?;
        let url = self.endpoint(model)?;
        debug!(%url, "issuing generateContent request");

        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, key.expose())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(ServiceError::malformed)
    }
}

#[async_trait]
impl TextCompletionService for GenAiClient {
    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        let request = GenerateContentRequest::user_text(prompt);
        let response = self.generate(&self.text_model, &request).await?;
        response.text().ok_or(ServiceError::EmptyResponse)
    }
}

#[async_trait]
impl ImageSynthesisService for GenAiClient {
    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    async fn synthesize(
        &self,
        prompt: &str,
        tier: ResolutionTier,
    ) -> Result<GenerateContentResponse, ServiceError> {
        let request = GenerateContentRequest::image(prompt, tier);
        self.generate(&self.image_model, &request).await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
