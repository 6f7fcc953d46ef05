//! Weather retrieval facade: fetch, aggregate, alert, cache.

use std::sync::Arc;

use chrono::{FixedOffset, Offset, Utc};
use tracing::{info, instrument};

use crate::{
    aggregate::aggregate,
    alerts::AlertOrchestrator,
    config::WeatherSettings,
    error::{AgriError, AgriResult},
    model::{Coordinates, DEFAULT_LOCATION_NAME, Location, WeatherResponse},
    provider::WeatherProvider,
    store::Store,
};

pub struct WeatherService {
    provider: Arc<dyn WeatherProvider>,
    alerts: AlertOrchestrator,
    cache: Arc<dyn Store<WeatherResponse>>,
    settings: WeatherSettings,
}

impl WeatherService {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        alerts: AlertOrchestrator,
        cache: Arc<dyn Store<WeatherResponse>>,
        settings: WeatherSettings,
    ) -> Self {
        Self { provider, alerts, cache, settings }
    }

    /// Full weather report for a position, served from cache when fresh.
    #[instrument(skip(self), fields(lat = coords.latitude, lon = coords.longitude))]
    pub async fn weather_for_location(
        &self,
        coords: Coordinates,
        location_name: Option<&str>,
    ) -> AgriResult<WeatherResponse> {
        coords.validate()?;

        let cache_key = coords.cache_key();
        if let Some(cached) = self.cache.get(&cache_key) {
            info!(%cache_key, "Weather cache hit");
            return Ok(cached);
        }

        let name = location_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_LOCATION_NAME)
            .to_string();

        let samples = self.provider.forecast(coords).await.map_err(upstream)?;
        let offset: FixedOffset =
            samples.first().map(|s| *s.timestamp.offset()).unwrap_or_else(|| Utc.fix());
        let today = Utc::now().with_timezone(&offset).date_naive();
        let forecast = aggregate(&samples, today);

        let current = self
            .provider
            .current(coords)
            .await
            .map_err(upstream)?
            .with_daily_range(forecast.first());

        let alerts = self.alerts.generate_alerts(&name, &current, &forecast).await;

        let response = WeatherResponse {
            location: Location { name, latitude: coords.latitude, longitude: coords.longitude },
            current,
            forecast,
            alerts,
            updated_at: Utc::now(),
        };

        self.cache.set(&cache_key, response.clone(), self.settings.cache_ttl());
        info!(%cache_key, "Weather response cached");

        Ok(response)
    }

    /// Resolve `city` inside the configured country, then report as for coordinates.
    #[instrument(skip(self))]
    pub async fn weather_by_city(&self, city: &str) -> AgriResult<WeatherResponse> {
        let city = city.trim();
        if city.is_empty() {
            return Err(AgriError::InvalidInput("Le paramètre 'city' est requis".to_string()));
        }

        let place = self
            .provider
            .geocode(city, &self.settings.country_code)
            .await
            .map_err(upstream)?
            .ok_or_else(|| {
                AgriError::NotFound(format!(
                    "Ville '{}' introuvable en {}",
                    city, self.settings.country_name
                ))
            })?;

        info!(city, resolved = %place.name, "City geocoded");
        self.weather_for_location(place.coordinates, Some(&place.name)).await
    }
}

fn upstream(err: anyhow::Error) -> AgriError {
    AgriError::UpstreamUnavailable(format!("{err:#}"))
}
