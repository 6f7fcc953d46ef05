use std::{
    io::{self, Write},
    path::Path,
    sync::Arc,
};

use agrismart_core::{
    AgriError, AgriResult, AlertOrchestrator, ChatEvent, ChatRequest, ChatService, Config,
    Coordinates, InMemoryStore, MediaInput, ServiceId, WeatherProvider, WeatherResponse,
    WeatherService,
    genai::{Content, gemini::DEFAULT_MODEL},
    provider_from_config, text_generator_from_config,
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use inquire::{InquireError, Password, PasswordDisplayMode, Text};
use tokio::sync::mpsc;
use tracing::info;

use crate::output::render_weather;

/// Reference point used by `check`: Abidjan.
const CHECK_LOCATION: (f64, f64) = (5.3599517, -4.0082563);

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "agrismart",
    version,
    about = "Agricultural weather alerts and farming assistant"
)]
pub struct Cli {
    /// Print JSON (report, reply or error body) instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a service ("openweather" or "gemini").
    Configure { service: String },

    /// Weather report and alerts for GPS coordinates.
    Coords {
        #[arg(allow_negative_numbers = true)]
        latitude: f64,

        #[arg(allow_negative_numbers = true)]
        longitude: f64,

        /// Display name for the location.
        #[arg(long)]
        name: Option<String>,
    },

    /// Weather report and alerts for a city in the configured country.
    City { name: String },

    /// Quick end-to-end check against Abidjan.
    Check,

    /// Talk to the assistant. Without a message or media, starts an interactive session.
    Chat {
        message: Option<String>,

        /// Image file path or http(s) URL.
        #[arg(long)]
        image: Option<String>,

        /// Voice note file path or http(s) URL.
        #[arg(long)]
        audio: Option<String>,

        #[arg(long)]
        session: Option<String>,

        /// Print the answer as it is generated.
        #[arg(long)]
        stream: bool,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let json = self.json;

        match self.command {
            Command::Configure { service } => configure(&service),
            Command::Coords { latitude, longitude, name } => {
                let service = weather_service(&runtime_config()?)?;
                let coords = Coordinates { latitude, longitude };
                report(service.weather_for_location(coords, name.as_deref()).await, json)
            }
            Command::City { name } => {
                let service = weather_service(&runtime_config()?)?;
                report(service.weather_by_city(&name).await, json)
            }
            Command::Check => {
                let service = weather_service(&runtime_config()?)?;
                let (lat, lon) = CHECK_LOCATION;
                let coords = Coordinates { latitude: lat, longitude: lon };
                report(service.weather_for_location(coords, Some("Abidjan")).await, json)
            }
            Command::Chat { message, image, audio, session, stream } => {
                let service = chat_service(&runtime_config()?)?;
                let interactive = message.is_none() && image.is_none() && audio.is_none();

                if interactive {
                    return chat_loop(&service, session, json).await;
                }

                let request = ChatRequest {
                    message: message.unwrap_or_default(),
                    session_id: session,
                    image: image.as_deref().map(media_input).transpose()?,
                    audio: audio.as_deref().map(media_input).transpose()?,
                };
                if stream {
                    chat_stream(&service, request, json).await
                } else {
                    chat_once(&service, request, json).await
                }
            }
        }
    }
}

/// Config from disk with `*_API_KEY` environment overrides applied.
fn runtime_config() -> Result<Config> {
    Ok(Config::load()?.with_env_overrides())
}

fn configure(service: &str) -> Result<()> {
    let id = ServiceId::try_from(service)?;
    let mut config = Config::load()?;

    let api_key = Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .prompt()
        .context("Failed to read API key")?;
    let api_key = api_key.trim();
    if api_key.is_empty() {
        return Err(anyhow!("API key for {id} must not be empty"));
    }
    config.upsert_service_api_key(id, api_key.to_string());

    if id == ServiceId::Gemini {
        let current = config
            .service_config(id)
            .and_then(|s| s.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let model =
            Text::new("Model:").with_default(&current).prompt().context("Failed to read model")?;

        if let Some(entry) = config.services.get_mut(id.as_str()) {
            entry.model = Some(model.trim().to_string()).filter(|m| !m.is_empty());
        }
    }

    config.save()?;
    println!("Saved {id} credentials to {}", Config::config_file_path()?.display());
    Ok(())
}

fn weather_service(config: &Config) -> Result<WeatherService> {
    let provider: Arc<dyn WeatherProvider> = Arc::from(provider_from_config(config)?);

    let alerts = match text_generator_from_config(config)? {
        Some(generator) => AlertOrchestrator::new(generator),
        None => {
            info!("No Gemini key configured, alerts come from the rule engine");
            AlertOrchestrator::rules_only()
        }
    };

    Ok(WeatherService::new(
        provider,
        alerts,
        Arc::new(InMemoryStore::<WeatherResponse>::new()),
        config.weather.clone(),
    ))
}

fn chat_service(config: &Config) -> Result<ChatService> {
    let id = ServiceId::Gemini;
    let generator = text_generator_from_config(config)?.ok_or_else(|| {
        anyhow!(
            "No API key configured for service '{id}'.\n\
                 Hint: run `agrismart configure {id}` or set {}.",
            id.api_key_env()
        )
    })?;

    ChatService::new(generator, Arc::new(InMemoryStore::<Vec<Content>>::new()), &config.chat)
}

fn report(result: AgriResult<WeatherResponse>, json: bool) -> Result<()> {
    let weather = result.map_err(|err| failure(err, json))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&weather)?);
    } else {
        print!("{}", render_weather(&weather));
    }
    Ok(())
}

/// Print the error body in JSON mode and turn the error into a user-facing failure.
fn failure(err: AgriError, json: bool) -> anyhow::Error {
    if json {
        if let Ok(body) = serde_json::to_string_pretty(&err.to_body()) {
            println!("{body}");
        }
    }
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}

/// A path is read from disk; anything starting with http(s):// is downloaded by the service.
fn media_input(source: &str) -> Result<MediaInput> {
    if source.starts_with("http://") || source.starts_with("https://") {
        return Ok(MediaInput::Url(source.to_string()));
    }

    let path = Path::new(source);
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name =
        path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();

    Ok(MediaInput::File { file_name, data })
}

async fn chat_once(service: &ChatService, request: ChatRequest, json: bool) -> Result<()> {
    let reply = service.send(request).await.map_err(|err| failure(err, json))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reply)?);
    } else {
        println!("{}", reply.response);
    }
    Ok(())
}

async fn chat_stream(service: &ChatService, request: ChatRequest, json: bool) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<ChatEvent>(32);

    let print = async {
        let mut failed = None;
        while let Some(event) = rx.recv().await {
            if json {
                print!("{}", event.to_sse());
            }
            match event {
                ChatEvent::Text(text) if !json => print!("{text}"),
                ChatEvent::Done if !json => println!(),
                ChatEvent::Error(message) => failed = Some(message),
                _ => {}
            }
            let _ = io::stdout().flush();
        }
        failed
    };

    let ((), failed) = tokio::join!(service.send_stream(request, tx), print);

    match failed {
        Some(message) => Err(anyhow!(message)),
        None => Ok(()),
    }
}

async fn chat_loop(service: &ChatService, session: Option<String>, json: bool) -> Result<()> {
    println!("AgriSmart : pose ta question (ligne vide ou Ctrl-C pour quitter).");

    loop {
        let message = match Text::new("Toi :").prompt() {
            Ok(message) => message,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(err) => return Err(err).context("Failed to read message"),
        };
        if message.trim().is_empty() {
            break;
        }

        let request = ChatRequest { message, session_id: session.clone(), ..ChatRequest::default() };
        // A failed turn is reported and the conversation goes on.
        if let Err(err) = chat_stream(service, request, json).await {
            eprintln!("{err}");
        }
    }

    Ok(())
}
