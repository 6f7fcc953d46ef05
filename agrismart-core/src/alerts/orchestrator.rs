use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use super::{AlertPayloadError, build_prompt, parse_alert_payload, rules::derive_alerts};
use crate::{
    genai::{GenerationError, GenerationRequest, TextGenerator},
    model::{Alert, CurrentConditions, DailySummary},
};

/// Chooses between AI-generated alerts and the rule engine.
#[derive(Debug, Clone, Default)]
pub struct AlertOrchestrator {
    generator: Option<Arc<dyn TextGenerator>>,
}

#[derive(Error, Debug)]
enum AiAlertError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Payload(#[from] AlertPayloadError),
}

impl AlertOrchestrator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator: Some(generator) }
    }

    /// Orchestrator that always uses the rule engine.
    pub fn rules_only() -> Self {
        Self::default()
    }

    /// Alerts for the given conditions. Never fails: any AI problem falls back
    /// to [`derive_alerts`].
    #[instrument(skip_all, fields(location = %location_name))]
    pub async fn generate_alerts(
        &self,
        location_name: &str,
        current: &CurrentConditions,
        days: &[DailySummary],
    ) -> Vec<Alert> {
        let Some(generator) = &self.generator else {
            return derive_alerts(current, days);
        };

        match ai_alerts(generator.as_ref(), location_name, current, days).await {
            Ok(alerts) => {
                info!(count = alerts.len(), "AI alerts generated");
                alerts
            }
            Err(err) => {
                warn!(error = %err, "AI alert generation failed, using rule engine");
                derive_alerts(current, days)
            }
        }
    }
}

async fn ai_alerts(
    generator: &dyn TextGenerator,
    location_name: &str,
    current: &CurrentConditions,
    days: &[DailySummary],
) -> Result<Vec<Alert>, AiAlertError> {
    let request = GenerationRequest {
        json_response: true,
        ..GenerationRequest::from_prompt(build_prompt(location_name, current, days))
    };

    let text = generator.generate(&request).await?;
    Ok(parse_alert_payload(&text)?)
}
