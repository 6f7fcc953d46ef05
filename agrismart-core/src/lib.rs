//! Core library for the `agrismart` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Weather providers and the forecast aggregation pipeline
//! - Agricultural alerts, rule-based or generated by a language model
//! - The multimodal chat assistant
//!
//! It is used by `agrismart-cli`, but can also back an HTTP service.

pub mod aggregate;
pub mod alerts;
pub mod chat;
pub mod config;
pub mod error;
pub mod genai;
pub mod model;
pub mod provider;
pub mod service;
pub mod store;

pub use alerts::AlertOrchestrator;
pub use chat::{ChatEvent, ChatReply, ChatRequest, ChatService, MediaInput};
pub use config::{Config, ServiceId};
pub use error::{AgriError, AgriResult, ErrorBody};
pub use genai::{TextGenerator, text_generator_from_config};
pub use model::{Alert, Coordinates, CurrentConditions, DailySummary, Severity, WeatherResponse};
pub use provider::{WeatherProvider, provider_from_config};
pub use service::WeatherService;
pub use store::{InMemoryStore, Store};
