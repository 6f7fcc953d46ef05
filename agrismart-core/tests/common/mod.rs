#![allow(dead_code)]

use serde_json::{Value, json};

pub const ABIDJAN_LAT: f64 = 5.36;
pub const ABIDJAN_LON: f64 = -4.01;

/// `/data/2.5/weather` body for a warm, cloudy afternoon in Abidjan.
pub fn current_body() -> Value {
    json!({
        "weather": [{ "id": 803, "main": "Clouds", "description": "nuageux", "icon": "04d" }],
        "main": {
            "temp": 29.44, "feels_like": 33.06, "temp_min": 29.44, "temp_max": 29.44,
            "pressure": 1011, "humidity": 74
        },
        "visibility": 8000,
        "wind": { "speed": 5.14, "deg": 210 },
        "clouds": { "all": 75 },
        "sys": { "sunrise": 1772604720, "sunset": 1772648160 },
        "timezone": 0,
        "name": "Abidjan"
    })
}

fn forecast_entry(dt: i64, temp_min: f64, temp_max: f64, pop: f64, rain: Option<f64>) -> Value {
    let mut entry = json!({
        "dt": dt,
        "main": {
            "temp": (temp_min + temp_max) / 2.0, "feels_like": temp_max,
            "temp_min": temp_min, "temp_max": temp_max, "pressure": 1012, "humidity": 80
        },
        "weather": [{ "id": 500, "main": "Rain", "description": "légère pluie", "icon": "10d" }],
        "clouds": { "all": 90 },
        "wind": { "speed": 4.0, "deg": 220 },
        "pop": pop
    });
    if let Some(mm) = rain {
        entry["rain"] = json!({ "3h": mm });
    }
    entry
}

/// `/data/2.5/forecast` body covering 2026-03-04 and 2026-03-05 (UTC),
/// listed out of order.
pub fn forecast_body() -> Value {
    json!({
        "cod": "200",
        "city": { "name": "Abidjan", "timezone": 0 },
        "list": [
            forecast_entry(1772712000, 25.0, 30.5, 0.9, Some(6.0)),  // 2026-03-05 12:00
            forecast_entry(1772625600, 24.1, 28.0, 0.2, None),       // 2026-03-04 12:00
            forecast_entry(1772636400, 23.6, 27.2, 0.8, Some(2.5)),  // 2026-03-04 15:00
        ]
    })
}

pub fn geocode_body() -> Value {
    json!([{ "name": "Bouaké", "lat": 7.6898, "lon": -5.0318, "country": "CI" }])
}

/// A `generateContent` answer carrying `text`.
pub fn gemini_answer(text: &str) -> Value {
    json!({
        "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
    })
}

/// An SSE body streaming `chunks` as separate events.
pub fn gemini_stream(chunks: &[&str]) -> String {
    chunks.iter().map(|chunk| format!("data: {}\r\n\r\n", gemini_answer(chunk))).collect()
}
