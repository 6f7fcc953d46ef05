//! Agricultural alerts: rule engine, AI prompt rendering and AI payload parsing.

use std::collections::HashSet;

use thiserror::Error;

use crate::model::{Alert, CurrentConditions, DailySummary};

pub mod orchestrator;
pub mod rules;

pub use orchestrator::AlertOrchestrator;
pub use rules::derive_alerts;

#[derive(Error, Debug)]
pub enum AlertPayloadError {
    #[error("no JSON object found in model output")]
    NoJsonObject,

    #[error("model output is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("`alerts` list missing from model output")]
    MissingAlerts,

    #[error("alert #{index} is malformed: {source}")]
    InvalidAlert {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("model returned no alerts")]
    Empty,

    #[error("duplicate alert id `{0}`")]
    DuplicateId(String),
}

/// Parse the model's answer into alerts, or fail.
///
/// The JSON document is taken from the first `{` to the last `}` so that prose
/// around it is tolerated. Every alert must match the [`Alert`] schema.
pub fn parse_alert_payload(text: &str) -> Result<Vec<Alert>, AlertPayloadError> {
    let start = text.find('{').ok_or(AlertPayloadError::NoJsonObject)?;
    let end = text.rfind('}').ok_or(AlertPayloadError::NoJsonObject)?;
    if end < start {
        return Err(AlertPayloadError::NoJsonObject);
    }

    let document: serde_json::Value =
        serde_json::from_str(&text[start..=end]).map_err(AlertPayloadError::InvalidJson)?;

    let raw_alerts = document
        .get("alerts")
        .and_then(serde_json::Value::as_array)
        .ok_or(AlertPayloadError::MissingAlerts)?;

    let alerts = raw_alerts
        .iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value::<Alert>(value.clone())
                .map_err(|source| AlertPayloadError::InvalidAlert { index, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if alerts.is_empty() {
        return Err(AlertPayloadError::Empty);
    }

    let mut seen = HashSet::new();
    if let Some(dup) = alerts.iter().find(|a| !seen.insert(a.id.as_str())) {
        return Err(AlertPayloadError::DuplicateId(dup.id.clone()));
    }

    Ok(alerts)
}

/// Render one line per forecast day.
pub fn forecast_digest(days: &[DailySummary]) -> String {
    days.iter()
        .map(|day| {
            format!(
                "- {} ({}): {}–{}°C, humidité {}%, pluie {}%, vent {} km/h",
                day.day_name,
                day.date.format("%Y-%m-%d"),
                day.temp_min,
                day.temp_max,
                day.humidity,
                day.rain_probability,
                day.wind_speed,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Agronomist prompt asking for 0 to 6 alerts as a JSON document.
pub fn build_prompt(location_name: &str, current: &CurrentConditions, days: &[DailySummary]) -> String {
    format!(
        r#"Tu es un expert agronome spécialisé en agriculture tropicale en Côte d'Ivoire.
Analyse les données météo ci-dessous et génère entre 0 et 6 alertes agricoles pertinentes pour les cultures principales : cacao, riz, manioc, café, igname, banane plantain.

Priorités connues :
- Cacao : très sensible à l'humidité élevée (>80%) + chaleur → risque black pod et maladies fongiques ; aussi sensible à la sécheresse et à l'harmattan.
- Riz et manioc : risque d'inondation ou de sécheresse prolongée.
- Général : stress thermique (>35°C), vents forts, conditions idéales pour travaux.

Si aucun risque majeur, génère une alerte positive "conditions favorables".

Utilise des emojis pertinents dans les titres et messages.

Réponds EXCLUSIVEMENT en JSON valide avec cette structure :
{{
  "alerts": [
    {{
      "id": "unique_id_en_minuscules",
      "severity": "high|medium|low",
      "title": "Titre court avec emoji",
      "message": "Message clair et engageant",
      "recommendations": ["Conseil 1", "Conseil 2", "Conseil 3", "Conseil 4"]
    }}
  ]
}}

Données météo :
Localisation : {location}
Actuel : {temp}°C (ressenti {feels}°C), humidité {humidity}%, vent {wind} km/h
Prévisions 5 jours :
{digest}
"#,
        location = location_name,
        temp = current.temperature,
        feels = current.feels_like,
        humidity = current.humidity,
        wind = current.wind_speed,
        digest = forecast_digest(days),
    )
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Severity;

    const ONE_ALERT: &str = r#"{"alerts":[{"id":"black_pod","severity":"high","title":"🍫 Risque black pod","message":"Humidité et chaleur.","recommendations":["Récolter les cabosses atteintes","Aérer la plantation"]}]}"#;

    #[test]
    fn payload_surrounded_by_prose_is_extracted() {
        let text = format!("Voici les alertes : {ONE_ALERT} Bonne journée !");
        let alerts = parse_alert_payload(&text).unwrap();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, "black_pod");
        assert_eq!(alerts[0].severity, Severity::High);
        assert_eq!(alerts[0].recommendations.len(), 2);
    }

    #[test]
    fn payload_without_braces_is_rejected() {
        assert!(matches!(parse_alert_payload("rien"), Err(AlertPayloadError::NoJsonObject)));
        assert!(matches!(parse_alert_payload("} puis {"), Err(AlertPayloadError::NoJsonObject)));
    }

    #[test]
    fn payload_with_broken_json_is_rejected() {
        assert!(matches!(
            parse_alert_payload("{\"alerts\": [}"),
            Err(AlertPayloadError::InvalidJson(_))
        ));
    }

    #[test]
    fn payload_without_alert_list_is_rejected() {
        assert!(matches!(
            parse_alert_payload(r#"{"alerts": "none"}"#),
            Err(AlertPayloadError::MissingAlerts)
        ));
        assert!(matches!(
            parse_alert_payload(r#"{"warnings": []}"#),
            Err(AlertPayloadError::MissingAlerts)
        ));
    }

    #[test]
    fn payload_with_unknown_severity_is_rejected() {
        let text = ONE_ALERT.replace("\"high\"", "\"critical\"");
        assert!(matches!(
            parse_alert_payload(&text),
            Err(AlertPayloadError::InvalidAlert { index: 0, .. })
        ));
    }

    #[test]
    fn empty_and_duplicate_payloads_are_rejected() {
        assert!(matches!(parse_alert_payload(r#"{"alerts": []}"#), Err(AlertPayloadError::Empty)));

        let alert = &ONE_ALERT[11..ONE_ALERT.len() - 2];
        let text = format!("{{\"alerts\":[{alert},{alert}]}}");
        assert!(matches!(parse_alert_payload(&text), Err(AlertPayloadError::DuplicateId(id)) if id == "black_pod"));
    }

    #[test]
    fn prompt_embeds_location_current_and_days() {
        let prompt = build_prompt("Daloa", &fixtures::current(), &fixtures::days(2));

        assert!(prompt.contains("Localisation : Daloa"));
        assert!(prompt.contains("Actuel : 27°C (ressenti 29°C), humidité 70%, vent 10 km/h"));
        assert!(prompt.contains(
            "- Aujourd'hui (2026-03-02): 22–28°C, humidité 70%, pluie 45%, vent 20 km/h"
        ));
        assert!(prompt.contains("- Demain (2026-03-03)"));
        assert!(prompt.contains("\"alerts\": ["));
    }
}
