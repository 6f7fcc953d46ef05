use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use crate::model::{
    Coordinates, CurrentConditions, GeoLocation, RawForecastSample, capitalize, round1,
};

use super::WeatherProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_VISIBILITY_M: f64 = 10_000.0;
const MPS_TO_KMH: f64 = 3.6;

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client for OpenWeather")?;

        Ok(Self { api_key, base_url: DEFAULT_BASE_URL.to_string(), http })
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        what: &str,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "OpenWeather request");

        let res = self
            .http
            .get(&url)
            .query(query)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await
            .with_context(|| format!("Failed to send request to OpenWeather ({what})"))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .with_context(|| format!("Failed to read OpenWeather {what} response body"))?;

        if !status.is_success() {
            return Err(anyhow!(
                "OpenWeather {} request failed with status {}: {}",
                what,
                status,
                truncate_body(&body),
            ));
        }

        serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse OpenWeather {what} JSON"))
    }
}

fn weather_query(coords: Coordinates) -> Vec<(&'static str, String)> {
    vec![
        ("lat", coords.latitude.to_string()),
        ("lon", coords.longitude.to_string()),
        ("units", "metric".to_string()),
        ("lang", "fr".to_string()),
    ]
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    #[serde(default)]
    pressure: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
    deg: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwClouds {
    all: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwRain {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
    #[serde(rename = "3h")]
    three_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    sunrise: i64,
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
    clouds: OwClouds,
    visibility: Option<f64>,
    rain: Option<OwRain>,
    sys: OwSys,
    #[serde(default)]
    timezone: i32,
}

#[derive(Debug, Deserialize)]
struct OwCity {
    #[serde(default)]
    timezone: i32,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
    clouds: OwClouds,
    #[serde(default)]
    pop: f64,
    rain: Option<OwRain>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    city: OwCity,
    list: Vec<OwForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct OwGeoEntry {
    name: String,
    lat: f64,
    lon: f64,
}

impl OwCurrentResponse {
    fn into_conditions(self) -> Result<CurrentConditions> {
        let weather = self
            .weather
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("OpenWeather current response contained no weather entry"))?;
        let rain = self.rain.unwrap_or_default();

        Ok(CurrentConditions {
            temperature: round1(self.main.temp),
            feels_like: round1(self.main.feels_like),
            temp_min: round1(self.main.temp_min),
            temp_max: round1(self.main.temp_max),
            humidity: self.main.humidity.round().clamp(0.0, 100.0) as u8,
            pressure: self.main.pressure.round().max(0.0) as u32,
            description: capitalize(&weather.description),
            icon: weather.icon,
            main: weather.main,
            wind_speed: round1(self.wind.speed * MPS_TO_KMH),
            wind_direction: self.wind.deg.unwrap_or(0.0).round().rem_euclid(360.0) as u16,
            clouds: self.clouds.all.round().clamp(0.0, 100.0) as u8,
            visibility: self.visibility.unwrap_or(DEFAULT_VISIBILITY_M) / 1000.0,
            rain_1h: rain.one_hour.unwrap_or(0.0),
            rain_3h: rain.three_hours.unwrap_or(0.0),
            sunrise: local_hhmm(self.sys.sunrise, self.timezone)?,
            sunset: local_hhmm(self.sys.sunset, self.timezone)?,
        })
    }
}

impl OwForecastResponse {
    fn into_samples(self) -> Result<Vec<RawForecastSample>> {
        let tz = self.city.timezone;

        self.list
            .into_iter()
            .map(|entry| {
                let weather = entry.weather.into_iter().next().ok_or_else(|| {
                    anyhow!("OpenWeather forecast entry {} contained no weather entry", entry.dt)
                })?;

                Ok(RawForecastSample {
                    timestamp: unix_to_local(entry.dt, tz)?,
                    temp: entry.main.temp,
                    temp_min: entry.main.temp_min,
                    temp_max: entry.main.temp_max,
                    humidity: entry.main.humidity,
                    pop: entry.pop,
                    rain_3h: entry.rain.and_then(|r| r.three_hours).unwrap_or(0.0),
                    wind_speed: entry.wind.speed,
                    clouds: entry.clouds.all,
                    condition: weather.main,
                    icon: weather.icon,
                    description: weather.description,
                })
            })
            .collect()
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current(&self, coords: Coordinates) -> Result<CurrentConditions> {
        let parsed: OwCurrentResponse =
            self.get_json("/data/2.5/weather", &weather_query(coords), "current weather").await?;
        parsed.into_conditions()
    }

    async fn forecast(&self, coords: Coordinates) -> Result<Vec<RawForecastSample>> {
        let parsed: OwForecastResponse =
            self.get_json("/data/2.5/forecast", &weather_query(coords), "5-day forecast").await?;

        let mut samples = parsed.into_samples()?;
        samples.sort_by_key(|s| s.timestamp);
        Ok(samples)
    }

    async fn geocode(&self, city: &str, country_code: &str) -> Result<Option<GeoLocation>> {
        let query = [("q", format!("{city},{country_code}")), ("limit", "1".to_string())];
        let parsed: Vec<OwGeoEntry> =
            self.get_json("/geo/1.0/direct", &query, "geocoding").await?;

        Ok(parsed.into_iter().next().map(|entry| GeoLocation {
            name: entry.name,
            coordinates: Coordinates { latitude: entry.lat, longitude: entry.lon },
        }))
    }
}

fn unix_to_local(ts: i64, offset_secs: i32) -> Result<DateTime<FixedOffset>> {
    let offset = FixedOffset::east_opt(offset_secs)
        .ok_or_else(|| anyhow!("Invalid UTC offset from OpenWeather: {offset_secs}s"))?;
    let utc = DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| anyhow!("Invalid timestamp from OpenWeather: {ts}"))?;

    Ok(utc.with_timezone(&offset))
}

fn local_hhmm(ts: i64, offset_secs: i32) -> Result<String> {
    Ok(unix_to_local(ts, offset_secs)?.format("%H:%M").to_string())
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
