//! Deterministic agronomic alert rules.
//!
//! Used directly when no generative model is configured, and as the fallback
//! whenever AI generation fails.

use crate::model::{Alert, CurrentConditions, DailySummary, Severity};

/// Rain probability (%) above which a day counts as heavy rain.
pub const HEAVY_RAIN_PROBABILITY: u8 = 70;
/// Rain probability (%) below which a day counts as dry.
pub const DRY_DAY_PROBABILITY: u8 = 20;
pub const MIN_DRY_DAYS: usize = 3;
/// °C.
pub const HEAT_THRESHOLD: f64 = 35.0;
/// km/h.
pub const STRONG_WIND_THRESHOLD: f64 = 40.0;
/// Humidity (%) above which a day counts as humid.
pub const HUMIDITY_THRESHOLD: u8 = 85;
pub const MIN_HUMID_DAYS: usize = 2;

/// Days inspected by the favorable-conditions rule.
const FAVORABLE_WINDOW: usize = 3;

type RiskRule = fn(&CurrentConditions, &[DailySummary]) -> Option<Alert>;

const RISK_RULES: [RiskRule; 5] = [heavy_rain, drought, heat_wave, strong_wind, high_humidity];

/// Evaluate every risk rule in order; if none fires, look for a favorable window.
///
/// The result never holds two alerts with the same id, and the favorable alert
/// never appears alongside a risk alert.
pub fn derive_alerts(current: &CurrentConditions, days: &[DailySummary]) -> Vec<Alert> {
    let mut alerts: Vec<Alert> = Vec::new();

    for rule in RISK_RULES {
        if let Some(alert) = rule(current, days) {
            if !alerts.iter().any(|a| a.id == alert.id) {
                alerts.push(alert);
            }
        }
    }

    if alerts.is_empty() {
        alerts.extend(favorable_conditions(days));
    }

    alerts
}

fn heavy_rain(_current: &CurrentConditions, days: &[DailySummary]) -> Option<Alert> {
    let rainy = days.iter().filter(|d| d.rain_probability > HEAVY_RAIN_PROBABILITY).count();
    if rainy == 0 {
        return None;
    }

    Some(alert(
        "heavy_rain",
        Severity::High,
        "Fortes pluies prévues",
        format!("Risque de pluie élevé dans les {rainy} prochains jours."),
        &[
            "Reporter les traitements phytosanitaires",
            "Vérifier le drainage des parcelles",
            "Protéger les jeunes plants",
            "Éviter les applications d'engrais foliaires",
        ],
    ))
}

fn drought(current: &CurrentConditions, days: &[DailySummary]) -> Option<Alert> {
    let dry = days.iter().filter(|d| d.rain_probability < DRY_DAY_PROBABILITY).count();
    if dry < MIN_DRY_DAYS || current.rain_1h != 0.0 {
        return None;
    }

    Some(alert(
        "drought",
        Severity::Medium,
        "Période sèche prolongée",
        format!("Pas de pluie significative prévue sur {dry} jours."),
        &[
            "Prévoir l'irrigation si possible",
            "Pailler le sol pour conserver l'humidité",
            "Surveiller les signes de stress hydrique",
            "Arroser tôt le matin ou tard le soir",
        ],
    ))
}

fn heat_wave(current: &CurrentConditions, days: &[DailySummary]) -> Option<Alert> {
    let hot = days.iter().any(|d| d.temp_max > HEAT_THRESHOLD);
    if !hot && current.temperature <= HEAT_THRESHOLD {
        return None;
    }

    Some(alert(
        "heat_wave",
        Severity::High,
        "Températures élevées",
        "Forte chaleur attendue. Risque de stress thermique pour les cultures.".to_string(),
        &[
            "Augmenter la fréquence d'irrigation",
            "Ombrager les cultures sensibles si possible",
            "Éviter les travaux physiques aux heures chaudes",
            "Surveiller les signes de flétrissement",
        ],
    ))
}

fn strong_wind(current: &CurrentConditions, days: &[DailySummary]) -> Option<Alert> {
    let windy = days.iter().any(|d| d.wind_speed > STRONG_WIND_THRESHOLD);
    if !windy && current.wind_speed <= STRONG_WIND_THRESHOLD {
        return None;
    }

    Some(alert(
        "strong_wind",
        Severity::Medium,
        "Vents forts prévus",
        "Risque de dommages mécaniques aux cultures.".to_string(),
        &[
            "Tutorer les plantes hautes",
            "Reporter les traitements par pulvérisation",
            "Protéger les jeunes plants",
            "Vérifier la solidité des structures",
        ],
    ))
}

fn high_humidity(current: &CurrentConditions, days: &[DailySummary]) -> Option<Alert> {
    let humid = days.iter().filter(|d| d.humidity > HUMIDITY_THRESHOLD).count();
    if humid < MIN_HUMID_DAYS && current.humidity <= HUMIDITY_THRESHOLD {
        return None;
    }

    Some(alert(
        "high_humidity",
        Severity::Medium,
        "Humidité élevée - Risque de maladies",
        "Conditions favorables au développement de champignons.".to_string(),
        &[
            "Surveiller l'apparition de maladies fongiques",
            "Espacer les plants pour améliorer l'aération",
            "Éviter l'arrosage en soirée",
            "Envisager un traitement préventif si nécessaire",
        ],
    ))
}

fn favorable_conditions(days: &[DailySummary]) -> Option<Alert> {
    let favorable = days.iter().take(FAVORABLE_WINDOW).any(|d| {
        d.temp_max > 20.0
            && d.temp_max < 32.0
            && d.rain_probability > 30
            && d.rain_probability < 60
            && d.wind_speed < 30.0
    });
    if !favorable {
        return None;
    }

    Some(alert(
        "optimal",
        Severity::Low,
        "Conditions favorables",
        "Bonnes conditions pour les travaux agricoles.".to_string(),
        &[
            "Bon moment pour planter",
            "Conditions idéales pour les traitements",
            "Période propice aux récoltes",
            "Profitez-en pour les travaux de terrain",
        ],
    ))
}

fn alert(
    id: &str,
    severity: Severity,
    title: &str,
    message: String,
    recommendations: &[&str],
) -> Alert {
    Alert {
        id: id.to_string(),
        severity,
        title: title.to_string(),
        message,
        recommendations: recommendations.iter().map(|r| r.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::fixtures::{current, day, days};

    fn ids(alerts: &[Alert]) -> Vec<&str> {
        alerts.iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn hot_dry_week_raises_heat_wave_and_drought() {
        let mut now = current();
        now.temperature = 38.0;
        now.humidity = 50;
        now.wind_speed = 10.0;
        now.rain_1h = 0.0;

        let forecast: Vec<_> = (0..5)
            .map(|i| DailySummary {
                temp_max: 36.0,
                rain_probability: 10,
                humidity: 40,
                wind_speed: 15.0,
                ..day(i)
            })
            .collect();

        let alerts = derive_alerts(&now, &forecast);
        assert_eq!(ids(&alerts), vec!["drought", "heat_wave"]);

        let heat = alerts.iter().find(|a| a.id == "heat_wave").unwrap();
        assert_eq!(heat.severity, Severity::High);
        let drought = alerts.iter().find(|a| a.id == "drought").unwrap();
        assert_eq!(drought.severity, Severity::Medium);
        assert_eq!(drought.message, "Pas de pluie significative prévue sur 5 jours.");
    }

    #[test]
    fn mild_week_yields_single_optimal_alert() {
        let alerts = derive_alerts(&current(), &days(5));

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, "optimal");
        assert_eq!(alerts[0].severity, Severity::Low);
    }

    #[test]
    fn heavy_rain_counts_qualifying_days() {
        let mut forecast = days(5);
        forecast[1].rain_probability = 85;
        forecast[3].rain_probability = 71;
        forecast[4].rain_probability = 70;

        let alerts = derive_alerts(&current(), &forecast);
        assert_eq!(ids(&alerts), vec!["heavy_rain"]);
        assert_eq!(alerts[0].message, "Risque de pluie élevé dans les 2 prochains jours.");
    }

    #[test]
    fn recent_rain_suppresses_drought() {
        let mut now = current();
        now.rain_1h = 0.3;
        let forecast: Vec<_> =
            (0..5).map(|i| DailySummary { rain_probability: 5, ..day(i) }).collect();

        assert!(derive_alerts(&now, &forecast).iter().all(|a| a.id != "drought"));

        now.rain_1h = 0.0;
        assert_eq!(ids(&derive_alerts(&now, &forecast)), vec!["drought"]);
    }

    #[test]
    fn current_readings_alone_can_trigger() {
        let mut now = current();
        now.wind_speed = 41.0;
        now.humidity = 90;

        let alerts = derive_alerts(&now, &days(5));
        assert_eq!(ids(&alerts), vec!["strong_wind", "high_humidity"]);
    }

    #[test]
    fn one_humid_day_is_not_enough() {
        let mut forecast = days(5);
        forecast[0].humidity = 92;
        assert_eq!(ids(&derive_alerts(&current(), &forecast)), vec!["optimal"]);

        forecast[2].humidity = 88;
        assert_eq!(ids(&derive_alerts(&current(), &forecast)), vec!["high_humidity"]);
    }

    #[test]
    fn favorable_only_looks_at_first_three_days() {
        let mut forecast: Vec<_> =
            (0..5).map(|i| DailySummary { rain_probability: 25, ..day(i) }).collect();
        forecast[4].rain_probability = 45;
        assert!(derive_alerts(&current(), &forecast).is_empty());

        forecast[2].rain_probability = 45;
        assert_eq!(ids(&derive_alerts(&current(), &forecast)), vec!["optimal"]);
    }

    #[test]
    fn empty_forecast_and_calm_current_gives_no_alerts() {
        assert!(derive_alerts(&current(), &[]).is_empty());
    }

    #[test]
    fn everything_at_once_never_exceeds_one_alert_per_rule() {
        let mut now = current();
        now.temperature = 40.0;
        now.wind_speed = 55.0;
        now.humidity = 95;
        let forecast: Vec<_> = (0..5)
            .map(|i| DailySummary { rain_probability: if i < 2 { 90 } else { 5 }, ..day(i) })
            .collect();

        let alerts = derive_alerts(&now, &forecast);
        assert_eq!(
            ids(&alerts),
            vec!["heavy_rain", "drought", "heat_wave", "strong_wind", "high_humidity"]
        );
        assert!(alerts.iter().all(|a| (2..=4).contains(&a.recommendations.len())));
    }

    #[test]
    fn output_is_deterministic() {
        let mut now = current();
        now.temperature = 36.5;
        let forecast = days(5);

        let first = serde_json::to_string(&derive_alerts(&now, &forecast)).unwrap();
        let second = serde_json::to_string(&derive_alerts(&now, &forecast)).unwrap();
        assert_eq!(first, second);
    }
}
