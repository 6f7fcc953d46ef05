//! Multimodal chat assistant with per-session history.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::{
    config::ChatSettings,
    error::{AgriError, AgriResult},
    genai::{Content, GenerationRequest, Part, TextGenerator},
    store::Store,
};

pub const DEFAULT_SESSION_ID: &str = "default";

pub const SYSTEM_INSTRUCTION: &str = "\
Tu es AgriSmart, un assistant IA expert en agriculture intelligente et durable, spécialisé dans \
l'accompagnement des agriculteurs ivoiriens et tropicaux (climat chaud, cultures comme le cacao, \
café, riz, maïs, manioc, légumes, élevage).

Ton ton est amical, encourageant, positif et très direct. Tu tutoies l'utilisateur (\"tu\", \
\"ton champ\", etc.). Tu réponds EXCLUSIVEMENT en français simple et clair.

Règle la plus importante : SOIS TOUJOURS CONCIS.
Les agriculteurs ont peu de temps et de data. Évite les longues introductions et le bavardage. \
Va droit au but.

Structure obligatoire de tes réponses :
1. Reformule brièvement la question (1 phrase max).
2. Donne la réponse principale directement.
3. Si besoin, liste les conseils en puces courtes (max 5 points).
4. Pose une question courte seulement si nécessaire.

Quand il y a une photo : décris rapidement ce que tu vois, identifie le problème, donne 2-3 \
solutions (priorité naturelle).
Quand il y a une note vocale : transcris brièvement et réponds directement.

Reste pratique et efficace.
Si sujet hors agriculture : dis-le poliment.";

const EMPTY_REQUEST: &str = "Envoie un message, une photo ou une note vocale.";

const IMAGE_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(15);
const AUDIO_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Audio MIME type used for uploaded files with an unknown extension.
const DEFAULT_FILE_AUDIO_MIME: &str = "audio/m4a";
/// Audio MIME type used for URL and base64 payloads with an unknown extension.
const DEFAULT_REMOTE_AUDIO_MIME: &str = "audio/mpeg";

/// Where an image or a voice note comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaInput {
    /// Plain base64 or a `data:<mime>;base64,` URL.
    Base64(String),
    Url(String),
    File { file_name: String, data: Vec<u8> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<String>,
    pub image: Option<MediaInput>,
    pub audio: Option<MediaInput>,
}

impl ChatRequest {
    pub fn text(message: impl Into<String>) -> Self {
        Self { message: message.into(), ..Self::default() }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    fn resolved_session_id(&self) -> String {
        self.session_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(DEFAULT_SESSION_ID)
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub session_id: String,
}

/// Incremental chat output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Text(String),
    Done,
    /// User-facing error message; no further events follow.
    Error(String),
}

impl ChatEvent {
    /// Render as one server-sent event.
    pub fn to_sse(&self) -> String {
        match self {
            ChatEvent::Text(text) => format!("data: {}\n\n", json!({ "text": text })),
            ChatEvent::Error(message) => format!("data: {}\n\n", json!({ "error": message })),
            ChatEvent::Done => "data: [DONE]\n\n".to_string(),
        }
    }
}

/// A user turn ready to send, with the history it continues.
struct Turn {
    session_id: String,
    history: Vec<Content>,
    user: Content,
}

impl Turn {
    fn generation_request(&self) -> GenerationRequest {
        let mut contents = self.history.clone();
        contents.push(self.user.clone());

        GenerationRequest {
            system_instruction: Some(SYSTEM_INSTRUCTION.to_string()),
            contents,
            json_response: false,
        }
    }
}

pub struct ChatService {
    generator: Arc<dyn TextGenerator>,
    sessions: Arc<dyn Store<Vec<Content>>>,
    session_ttl: Duration,
    http: Client,
}

impl ChatService {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        sessions: Arc<dyn Store<Vec<Content>>>,
        settings: &ChatSettings,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .build()
            .context("Failed to build HTTP client for media downloads")?;

        Ok(Self { generator, sessions, session_ttl: settings.session_ttl(), http })
    }

    /// Send one turn and wait for the whole answer.
    #[instrument(skip_all, fields(session_id = tracing::field::Empty))]
    pub async fn send(&self, request: ChatRequest) -> AgriResult<ChatReply> {
        let turn = self.prepare(request).await?;
        tracing::Span::current().record("session_id", turn.session_id.as_str());

        let response = self.generator.generate(&turn.generation_request()).await.map_err(|e| {
            warn!(error = %e, "Chat generation failed");
            AgriError::from(e)
        })?;

        let session_id = turn.session_id.clone();
        self.remember(turn, &response);
        Ok(ChatReply { response, session_id })
    }

    /// Send one turn and forward the answer as it is produced.
    ///
    /// Emits `Text` for every non-empty chunk and then `Done`, or a single
    /// `Error` carrying the user-facing message.
    #[instrument(skip_all, fields(session_id = tracing::field::Empty))]
    pub async fn send_stream(&self, request: ChatRequest, events: mpsc::Sender<ChatEvent>) {
        let turn = match self.prepare(request).await {
            Ok(turn) => turn,
            Err(err) => {
                let _ = events.send(ChatEvent::Error(err.user_message())).await;
                return;
            }
        };
        tracing::Span::current().record("session_id", turn.session_id.as_str());

        let generation = turn.generation_request();
        let (chunk_tx, mut chunk_rx) = mpsc::channel::<String>(32);

        let forward = async {
            while let Some(chunk) = chunk_rx.recv().await {
                if chunk.is_empty() {
                    continue;
                }
                if events.send(ChatEvent::Text(chunk)).await.is_err() {
                    debug!("Chat stream receiver dropped");
                    chunk_rx.close();
                    break;
                }
            }
        };

        let (result, ()) =
            tokio::join!(self.generator.generate_stream(&generation, chunk_tx), forward);

        let last = match result {
            Ok(text) => {
                self.remember(turn, &text);
                ChatEvent::Done
            }
            Err(e) => {
                warn!(error = %e, "Chat stream generation failed");
                ChatEvent::Error(AgriError::from(e).user_message())
            }
        };
        let _ = events.send(last).await;
    }

    /// Forget the history of a session.
    pub fn reset(&self, session_id: &str) {
        self.sessions.evict(session_id);
    }

    async fn prepare(&self, request: ChatRequest) -> AgriResult<Turn> {
        let session_id = request.resolved_session_id();
        let mut parts = Vec::new();

        let text = request.message.trim();
        if !text.is_empty() {
            parts.push(Part::Text(text.to_string()));
        }
        if let Some(image) = request.image {
            parts.push(self.image_part(image).await?);
        }
        if let Some(audio) = request.audio {
            parts.push(self.audio_part(audio).await?);
        }

        if parts.is_empty() {
            return Err(AgriError::InvalidInput(EMPTY_REQUEST.to_string()));
        }

        let history = self.sessions.get(&session_id).unwrap_or_default();
        debug!(%session_id, turns = history.len(), parts = parts.len(), "Chat turn prepared");

        Ok(Turn { session_id, history, user: Content::user(parts) })
    }

    fn remember(&self, turn: Turn, reply: &str) {
        let Turn { session_id, mut history, user } = turn;
        history.push(user);
        history.push(Content::model_text(reply));
        info!(%session_id, turns = history.len(), "Chat session updated");
        self.sessions.set(&session_id, history, self.session_ttl);
    }

    async fn image_part(&self, media: MediaInput) -> AgriResult<Part> {
        let data = match media {
            MediaInput::Base64(encoded) => decode_base64(&encoded)
                .map_err(|e| AgriError::InvalidInput(format!("Image base64 invalide: {e}")))?,
            MediaInput::Url(url) => {
                self.download(&url, IMAGE_DOWNLOAD_TIMEOUT).await.map_err(|e| {
                    AgriError::InvalidInput(format!("Impossible de télécharger l'image: {e:#}"))
                })?
            }
            MediaInput::File { data, .. } => data,
        };

        let mime_type = sniff_image(&data).ok_or_else(|| {
            AgriError::InvalidInput("Image invalide: format non reconnu".to_string())
        })?;

        Ok(Part::InlineData { mime_type: mime_type.to_string(), data })
    }

    async fn audio_part(&self, media: MediaInput) -> AgriResult<Part> {
        let (mime_type, data) = match media {
            MediaInput::Base64(encoded) => {
                let data = decode_base64(&encoded)
                    .map_err(|e| AgriError::InvalidInput(format!("Audio base64 invalide: {e}")))?;
                (DEFAULT_REMOTE_AUDIO_MIME, data)
            }
            MediaInput::Url(url) => {
                let data = self.download(&url, AUDIO_DOWNLOAD_TIMEOUT).await.map_err(|e| {
                    AgriError::InvalidInput(format!("Impossible de télécharger l'audio: {e:#}"))
                })?;
                (audio_mime(&url).unwrap_or(DEFAULT_REMOTE_AUDIO_MIME), data)
            }
            MediaInput::File { file_name, data } => {
                (audio_mime(&file_name).unwrap_or(DEFAULT_FILE_AUDIO_MIME), data)
            }
        };

        if data.is_empty() {
            return Err(AgriError::InvalidInput("Note vocale vide".to_string()));
        }

        Ok(Part::InlineData { mime_type: mime_type.to_string(), data })
    }

    async fn download(&self, url: &str, timeout: Duration) -> anyhow::Result<Vec<u8>> {
        debug!(url, "Downloading chat media");

        let res = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = res.status();
        if !status.is_success() {
            anyhow::bail!("{url} answered with status {status}");
        }

        let bytes = res.bytes().await.context("failed to read media body")?;
        Ok(bytes.to_vec())
    }
}

/// Decode base64, accepting a `data:` URL prefix.
fn decode_base64(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = match encoded.split_once(',') {
        Some((_, rest)) => rest,
        None => encoded,
    };
    STANDARD.decode(payload.trim())
}

fn sniff_image(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

/// Guess an audio MIME type from a file name or URL extension.
fn audio_mime(name: &str) -> Option<&'static str> {
    let path = name.split(['?', '#']).next().unwrap_or(name);
    let file = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = file.rsplit_once('.')?;

    let mime = match ext.to_ascii_lowercase().as_str() {
        "mp3" | "mpga" => "audio/mpeg",
        "m4a" | "mp4a" => "audio/mp4",
        "aac" => "audio/aac",
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "flac" => "audio/flac",
        "weba" | "webm" => "audio/webm",
        "amr" => "audio/amr",
        "3gp" => "audio/3gpp",
        _ => return None,
    };
    Some(mime)
}
