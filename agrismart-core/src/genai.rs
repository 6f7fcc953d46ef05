//! Abstraction over the generative model used for chat and alert generation.

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::{Config, ServiceId};

pub mod gemini;

pub use gemini::GeminiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    InlineData { mime_type: String, data: Vec<u8> },
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self { role: Role::User, parts }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![Part::Text(text.into())])
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self { role: Role::Model, parts: vec![Part::Text(text.into())] }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenerationRequest {
    pub system_instruction: Option<String>,
    pub contents: Vec<Content>,
    /// Ask the model for a bare JSON document.
    pub json_response: bool,
}

impl GenerationRequest {
    /// Single-turn request carrying one text prompt.
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self { contents: vec![Content::user_text(prompt)], ..Self::default() }
    }
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("generation quota exceeded")]
    QuotaExceeded,

    #[error("model overloaded")]
    Overloaded,

    #[error("generation service unavailable: {0}")]
    Unavailable(String),

    #[error("generation request timed out")]
    Timeout,

    #[error("invalid generation response: {0}")]
    InvalidResponse(String),

    #[error("generation request failed: {0}")]
    Request(String),
}

#[async_trait]
pub trait TextGenerator: Send + Sync + Debug {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    /// Stream text chunks into `chunks` as they arrive and return the full text.
    ///
    /// The default implementation delivers the buffered answer as one chunk.
    async fn generate_stream(
        &self,
        request: &GenerationRequest,
        chunks: mpsc::Sender<String>,
    ) -> Result<String, GenerationError> {
        let text = self.generate(request).await?;
        // A dropped receiver only means nobody is listening any more.
        let _ = chunks.send(text.clone()).await;
        Ok(text)
    }
}

/// Build the Gemini client if an API key is configured.
pub fn text_generator_from_config(
    config: &Config,
) -> anyhow::Result<Option<Arc<dyn TextGenerator>>> {
    if !config.is_service_configured(ServiceId::Gemini) {
        return Ok(None);
    }
    let service = config.service_config(ServiceId::Gemini).cloned().unwrap_or_default();

    let mut client = GeminiClient::new(service.api_key, service.model)?;
    if let Some(base_url) = service.base_url {
        client = client.with_base_url(base_url);
    }
    info!(model = client.model(), "Gemini text generator enabled");

    Ok(Some(Arc::new(client)))
}
