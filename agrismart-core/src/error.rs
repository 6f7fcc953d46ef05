//! Error types surfaced by the weather and chat services.
//!
//! Every failure a caller can observe is one of a small closed set of kinds,
//! each mapped to a French message suitable for the end user and to the HTTP
//! status a transport layer should answer with.

use serde::Serialize;
use thiserror::Error;

use crate::genai::GenerationError;

pub type AgriResult<T> = Result<T, AgriError>;

#[derive(Error, Debug)]
pub enum AgriError {
    /// Malformed coordinates, empty city, unreadable image or audio payload.
    /// The message is already user-facing.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Weather, geocoding or media download failure.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("AI quota exceeded")]
    QuotaExceeded,

    #[error("AI service overloaded")]
    Overloaded,

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

/// `{"error": ..., "details": ...}` body returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AgriError {
    pub fn user_message(&self) -> String {
        match self {
            AgriError::InvalidInput(message) | AgriError::NotFound(message) => message.clone(),
            AgriError::UpstreamUnavailable(_) => {
                "Impossible de récupérer les données météo".to_string()
            }
            AgriError::QuotaExceeded => {
                "⚠️ Limite quotidienne atteinte. Réessaie demain.".to_string()
            }
            AgriError::Overloaded => {
                "⏳ Serveur IA temporairement surchargé. Réessaie dans quelques minutes."
                    .to_string()
            }
            AgriError::Unknown(_) => "❌ Erreur temporaire du serveur IA.".to_string(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            AgriError::InvalidInput(_) => 400,
            AgriError::NotFound(_) => 404,
            AgriError::QuotaExceeded => 429,
            AgriError::UpstreamUnavailable(_) => 502,
            AgriError::Overloaded => 503,
            AgriError::Unknown(_) => 500,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        let details = match self {
            AgriError::UpstreamUnavailable(detail) | AgriError::Unknown(detail) => {
                Some(detail.clone())
            }
            _ => None,
        };

        ErrorBody { error: self.user_message(), details }
    }
}

impl From<GenerationError> for AgriError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::QuotaExceeded => AgriError::QuotaExceeded,
            GenerationError::Overloaded => AgriError::Overloaded,
            other => AgriError::Unknown(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_error_maps_to_retry_tomorrow_message() {
        let err = AgriError::from(GenerationError::QuotaExceeded);
        assert_eq!(err.status_code(), 429);
        assert!(err.user_message().contains("Limite quotidienne"));
    }

    #[test]
    fn overloaded_error_is_not_a_generic_500() {
        let err = AgriError::from(GenerationError::Overloaded);
        assert_eq!(err.status_code(), 503);
        assert!(err.user_message().contains("surchargé"));
    }

    #[test]
    fn timeout_collapses_into_unknown_with_details() {
        let err = AgriError::from(GenerationError::Timeout);
        assert_eq!(err.status_code(), 500);

        let body = err.to_body();
        assert_eq!(body.error, "❌ Erreur temporaire du serveur IA.");
        assert!(body.details.is_some());
    }

    #[test]
    fn invalid_input_body_has_no_details() {
        let err = AgriError::InvalidInput("Coordonnées GPS invalides".into());
        let json = serde_json::to_value(err.to_body()).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "Coordonnées GPS invalides" }));
    }
}
