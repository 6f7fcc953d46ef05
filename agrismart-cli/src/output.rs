//! Human-friendly rendering of weather reports.

use std::fmt::Write;

use agrismart_core::{Alert, Severity, WeatherResponse};

pub fn render_weather(report: &WeatherResponse) -> String {
    let mut out = String::new();
    let loc = &report.location;
    let now = &report.current;

    // Writing into a String cannot fail.
    let _ = writeln!(
        out,
        "📍 {} ({:.4}, {:.4}), mis à jour {}",
        loc.name,
        loc.latitude,
        loc.longitude,
        report.updated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(
        out,
        "Maintenant : {:.1}°C (ressenti {:.1}°C), {}",
        now.temperature, now.feels_like, now.description
    );
    let _ = writeln!(
        out,
        "  Min/Max {:.1}°C / {:.1}°C · Humidité {}% · Vent {:.1} km/h ({}°) · Pression {} hPa",
        now.temp_min, now.temp_max, now.humidity, now.wind_speed, now.wind_direction, now.pressure
    );
    let _ = writeln!(
        out,
        "  Nuages {}% · Visibilité {:.1} km · Pluie 1h {:.1} mm · Lever {} · Coucher {}",
        now.clouds, now.visibility, now.rain_1h, now.sunrise, now.sunset
    );

    if !report.forecast.is_empty() {
        let _ = writeln!(out, "\nPrévisions :");
        for day in &report.forecast {
            let _ = writeln!(
                out,
                "  {:<12} {}  {:>4.1}–{:<4.1}°C  {:<20} pluie {:>3}% ({:.1} mm)  vent {:.1} km/h",
                day.day_name,
                day.date,
                day.temp_min,
                day.temp_max,
                day.description,
                day.rain_probability,
                day.rain_mm,
                day.wind_speed
            );
        }
    }

    if !report.alerts.is_empty() {
        let _ = writeln!(out, "\nAlertes :");
        for alert in &report.alerts {
            render_alert(&mut out, alert);
        }
    }

    out
}

fn render_alert(out: &mut String, alert: &Alert) {
    let marker = match alert.severity {
        Severity::High => "🔴",
        Severity::Medium => "🟠",
        Severity::Low => "🟢",
    };

    let _ = writeln!(out, "  {marker} {} [{}]", alert.title, alert.severity);
    let _ = writeln!(out, "     {}", alert.message);
    for rec in &alert.recommendations {
        let _ = writeln!(out, "     • {rec}");
    }
}

#[cfg(test)]
mod tests {
    use agrismart_core::{
        CurrentConditions, DailySummary,
        model::Location,
    };
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;

    fn report() -> WeatherResponse {
        WeatherResponse {
            location: Location { name: "Abidjan".into(), latitude: 5.36, longitude: -4.01 },
            current: CurrentConditions {
                temperature: 29.4,
                feels_like: 33.1,
                temp_min: 23.6,
                temp_max: 28.0,
                humidity: 74,
                pressure: 1011,
                description: "Nuageux".into(),
                icon: "04d".into(),
                main: "Clouds".into(),
                wind_speed: 18.5,
                wind_direction: 210,
                clouds: 75,
                visibility: 8.0,
                rain_1h: 0.0,
                rain_3h: 0.0,
                sunrise: "06:12".into(),
                sunset: "18:16".into(),
            },
            forecast: vec![DailySummary {
                date: NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(),
                day_name: "Aujourd'hui".into(),
                temp: 25.7,
                temp_min: 23.6,
                temp_max: 28.0,
                humidity: 80,
                description: "Légère pluie".into(),
                icon: "10d".into(),
                rain_probability: 80,
                rain_mm: 2.5,
                wind_speed: 14.4,
                clouds: 90,
            }],
            alerts: vec![Alert {
                id: "heavy_rain".into(),
                severity: Severity::High,
                title: "Fortes pluies attendues".into(),
                message: "Risque de pluie élevé dans les 1 prochains jours.".into(),
                recommendations: vec!["Vérifier le drainage des parcelles".into()],
            }],
            updated_at: Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn renders_every_section() {
        let text = render_weather(&report());

        assert!(text.starts_with("📍 Abidjan (5.3600, -4.0100), mis à jour 2026-03-04 12:00 UTC"));
        assert!(text.contains("Maintenant : 29.4°C (ressenti 33.1°C), Nuageux"));
        assert!(text.contains("Lever 06:12 · Coucher 18:16"));
        assert!(text.contains("Aujourd'hui"));
        assert!(text.contains("2026-03-04"));
        assert!(text.contains("pluie  80% (2.5 mm)"));
        assert!(text.contains("🔴 Fortes pluies attendues [high]"));
        assert!(text.contains("     • Vérifier le drainage des parcelles"));
    }

    #[test]
    fn empty_sections_are_omitted() {
        let mut report = report();
        report.forecast.clear();
        report.alerts.clear();

        let text = render_weather(&report);
        assert!(!text.contains("Prévisions"));
        assert!(!text.contains("Alertes"));
    }
}
