use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AgriError;

/// Location name used when the caller did not supply one.
pub const DEFAULT_LOCATION_NAME: &str = "Votre position";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Build coordinates, rejecting anything outside the WGS84 ranges.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, AgriError> {
        let coords = Self { latitude, longitude };
        coords.validate()?;
        Ok(coords)
    }

    pub fn validate(&self) -> Result<(), AgriError> {
        let lat_ok = self.latitude.is_finite() && (-90.0..=90.0).contains(&self.latitude);
        let lon_ok = self.longitude.is_finite() && (-180.0..=180.0).contains(&self.longitude);

        if lat_ok && lon_ok {
            Ok(())
        } else {
            Err(AgriError::InvalidInput("Coordonnées GPS invalides".to_string()))
        }
    }

    /// Cache key shared by coordinate and city lookups.
    pub fn cache_key(&self) -> String {
        format!("weather_{:.4}_{:.4}", self.latitude, self.longitude)
    }
}

/// A geocoding match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub name: String,
    pub coordinates: Coordinates,
}

/// One 3-hourly forecast point as supplied by the provider.
///
/// `timestamp` carries the location's UTC offset, so its naive date is the
/// local calendar date of the sample.
#[derive(Debug, Clone, PartialEq)]
pub struct RawForecastSample {
    pub timestamp: DateTime<FixedOffset>,
    pub temp: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: f64,
    /// Probability of precipitation, 0..=1.
    pub pop: f64,
    /// Rain accumulated over the 3-hour window, in mm.
    pub rain_3h: f64,
    /// Metres per second.
    pub wind_speed: f64,
    pub clouds: f64,
    pub condition: String,
    pub icon: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub day_name: String,
    pub temp: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: u8,
    pub description: String,
    pub icon: String,
    /// Percentage, 0..=100.
    pub rain_probability: u8,
    pub rain_mm: f64,
    /// Kilometres per hour.
    pub wind_speed: f64,
    pub clouds: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: u8,
    pub pressure: u32,
    pub description: String,
    pub icon: String,
    pub main: String,
    /// Kilometres per hour.
    pub wind_speed: f64,
    pub wind_direction: u16,
    pub clouds: u8,
    /// Kilometres.
    pub visibility: f64,
    pub rain_1h: f64,
    pub rain_3h: f64,
    /// Local `HH:MM`.
    pub sunrise: String,
    pub sunset: String,
}

impl CurrentConditions {
    /// Replace the provider's instantaneous min/max with the day's forecast range.
    pub fn with_daily_range(self, today: Option<&DailySummary>) -> Self {
        match today {
            Some(day) => Self {
                temp_min: round1(day.temp_min),
                temp_max: round1(day.temp_max),
                ..self
            },
            None => self,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherResponse {
    pub location: Location,
    pub current: CurrentConditions,
    pub forecast: Vec<DailySummary>,
    pub alerts: Vec<Alert>,
    pub updated_at: DateTime<Utc>,
}

/// Round to one decimal on the exact binary value, ties to even.
///
/// Scaling by ten first would round `31.95` (stored as `31.9499…`) up to `32.0`.
pub(crate) fn round1(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{value:.1}").parse().unwrap_or(value)
}

/// Upper-case the first character and lower-case the rest.
pub(crate) fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
