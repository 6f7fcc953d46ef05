//! Gemini REST client.
//!
//! Uses `generateContent` for buffered answers and
//! `streamGenerateContent?alt=sse` for incremental delivery.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use super::{Content, GenerationError, GenerationRequest, Part, Role, TextGenerator};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const STREAM_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    http: Client,
}

impl GeminiClient {
    pub fn new(api_key: String, model: Option<String>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client for Gemini")?;

        Ok(Self {
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: DEFAULT_BASE_URL.to_string(),
            http,
        })
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let res = self
            .http
            .post(self.endpoint("generateContent"))
            .query(&[("key", self.api_key.as_str())])
            .timeout(REQUEST_TIMEOUT)
            .json(&GeminiRequest::from(request))
            .send()
            .await
            .map_err(transport_error)?;

        let status = res.status();
        let body = res.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        let parsed: GeminiResponse = serde_json::from_str(&body)
            .map_err(|e| GenerationError::InvalidResponse(format!("malformed JSON: {e}")))?;

        if parsed.candidates.is_empty() {
            return Err(GenerationError::InvalidResponse("no candidates returned".to_string()));
        }

        debug!(chars = parsed.text().len(), "Gemini answer received");
        Ok(parsed.text())
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate_stream(
        &self,
        request: &GenerationRequest,
        chunks: mpsc::Sender<String>,
    ) -> Result<String, GenerationError> {
        let mut res = self
            .http
            .post(self.endpoint("streamGenerateContent"))
            .query(&[("alt", "sse"), ("key", self.api_key.as_str())])
            .timeout(STREAM_TIMEOUT)
            .json(&GeminiRequest::from(request))
            .send()
            .await
            .map_err(transport_error)?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let mut buffer: Vec<u8> = Vec::new();
        let mut full = String::new();

        while let Some(bytes) = res.chunk().await.map_err(transport_error)? {
            buffer.extend_from_slice(&bytes);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if let Some(text) = parse_sse_line(&line)? {
                    full.push_str(&text);
                    let _ = chunks.send(text).await;
                }
            }
        }

        if let Some(text) = parse_sse_line(&buffer)? {
            full.push_str(&text);
            let _ = chunks.send(text).await;
        }

        debug!(chars = full.len(), "Gemini stream finished");
        Ok(full)
    }
}

/// Extract the text carried by one `data:` line of the event stream.
fn parse_sse_line(line: &[u8]) -> Result<Option<String>, GenerationError> {
    let line = std::str::from_utf8(line)
        .map_err(|e| GenerationError::InvalidResponse(format!("stream is not UTF-8: {e}")))?
        .trim();

    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let payload = payload.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return Ok(None);
    }

    let parsed: GeminiResponse = serde_json::from_str(payload)
        .map_err(|e| GenerationError::InvalidResponse(format!("malformed stream event: {e}")))?;

    let text = parsed.text();
    Ok((!text.is_empty()).then_some(text))
}

fn status_error(status: StatusCode, body: &str) -> GenerationError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => GenerationError::QuotaExceeded,
        StatusCode::SERVICE_UNAVAILABLE => GenerationError::Overloaded,
        StatusCode::GATEWAY_TIMEOUT => GenerationError::Timeout,
        s if s.is_server_error() => GenerationError::Unavailable(format!(
            "Gemini answered {}: {}",
            s,
            truncate_body(body)
        )),
        s => GenerationError::Request(format!(
            "Gemini request failed with status {}: {}",
            s,
            truncate_body(body)
        )),
    }
}

fn transport_error(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Unavailable(err.to_string())
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<GeminiContent>,
}

impl GeminiResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content.parts.iter().filter_map(|p| p.text.as_deref()).collect::<String>()
            })
            .unwrap_or_default()
    }
}

impl From<&Content> for GeminiContent {
    fn from(content: &Content) -> Self {
        let role = match content.role {
            Role::User => "user",
            Role::Model => "model",
        };

        let parts = content
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => GeminiPart { text: Some(text.clone()), inline_data: None },
                Part::InlineData { mime_type, data } => GeminiPart {
                    text: None,
                    inline_data: Some(InlineData {
                        mime_type: mime_type.clone(),
                        data: STANDARD.encode(data),
                    }),
                },
            })
            .collect();

        Self { role: Some(role.to_string()), parts }
    }
}

impl From<&GenerationRequest> for GeminiRequest {
    fn from(request: &GenerationRequest) -> Self {
        let system_instruction = request.system_instruction.as_ref().map(|text| GeminiContent {
            role: None,
            parts: vec![GeminiPart { text: Some(text.clone()), inline_data: None }],
        });

        Self {
            system_instruction,
            contents: request.contents.iter().map(GeminiContent::from).collect(),
            generation_config: request
                .json_response
                .then_some(GenerationConfig { response_mime_type: "application/json" }),
        }
    }
}
