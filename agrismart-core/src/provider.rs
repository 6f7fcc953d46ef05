use crate::{
    Config,
    config::ServiceId,
    model::{Coordinates, CurrentConditions, GeoLocation, RawForecastSample},
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Source of weather observations, forecasts and place names.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Conditions right now, before any forecast-based adjustment.
    async fn current(&self, coords: Coordinates) -> anyhow::Result<CurrentConditions>;

    /// Up to 5 days of 3-hourly samples, in chronological order.
    async fn forecast(&self, coords: Coordinates) -> anyhow::Result<Vec<RawForecastSample>>;

    /// Resolve a city name within `country_code`; `None` if nothing matches.
    async fn geocode(&self, city: &str, country_code: &str) -> anyhow::Result<Option<GeoLocation>>;
}

/// Construct the OpenWeatherMap provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let id = ServiceId::OpenWeather;
    let api_key = config.service_api_key(id).ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for service '{id}'.\n\
                 Hint: run `agrismart configure {id}` or set {}.",
            id.api_key_env()
        )
    })?;

    let mut provider = OpenWeatherProvider::new(api_key.to_owned())?;
    if let Some(base_url) = config.service_config(id).and_then(|s| s.base_url.clone()) {
        provider = provider.with_base_url(base_url);
    }

    Ok(Box::new(provider))
}
