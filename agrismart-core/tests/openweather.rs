mod common;

use agrismart_core::{
    Coordinates, WeatherProvider, provider::openweather::OpenWeatherProvider,
};
use chrono::NaiveDate;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

use common::{ABIDJAN_LAT, ABIDJAN_LON, current_body, forecast_body, geocode_body};

fn provider(server: &MockServer) -> OpenWeatherProvider {
    OpenWeatherProvider::new("test-key".to_string()).unwrap().with_base_url(server.uri())
}

fn abidjan() -> Coordinates {
    Coordinates::new(ABIDJAN_LAT, ABIDJAN_LON).unwrap()
}

#[tokio::test]
async fn current_conditions_are_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("lat", "5.36"))
        .and(query_param("lon", "-4.01"))
        .and(query_param("units", "metric"))
        .and(query_param("lang", "fr"))
        .and(query_param("appid", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_body()))
        .expect(1)
        .mount(&server)
        .await;

    let current = provider(&server).current(abidjan()).await.unwrap();

    assert_eq!(current.temperature, 29.4);
    assert_eq!(current.feels_like, 33.1);
    assert_eq!(current.humidity, 74);
    assert_eq!(current.pressure, 1011);
    assert_eq!(current.description, "Nuageux");
    assert_eq!(current.main, "Clouds");
    assert_eq!(current.wind_speed, 18.5);
    assert_eq!(current.wind_direction, 210);
    assert_eq!(current.visibility, 8.0);
    assert_eq!(current.rain_1h, 0.0);
    assert_eq!(current.sunrise, "06:12");
    assert_eq!(current.sunset, "18:16");
}

#[tokio::test]
async fn forecast_samples_come_back_sorted_with_local_offset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .and(query_param("appid", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
        .mount(&server)
        .await;

    let samples = provider(&server).forecast(abidjan()).await.unwrap();

    assert_eq!(samples.len(), 3);
    assert!(samples.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    assert_eq!(samples[0].timestamp.date_naive(), NaiveDate::from_ymd_opt(2026, 3, 4).unwrap());
    assert_eq!(samples[0].pop, 0.2);
    assert_eq!(samples[0].rain_3h, 0.0);
    assert_eq!(samples[1].rain_3h, 2.5);
    assert_eq!(samples[2].condition, "Rain");
}

#[tokio::test]
async fn geocoding_restricts_to_country() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .and(query_param("q", "Bouaké,CI"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(geocode_body()))
        .expect(1)
        .mount(&server)
        .await;

    let place = provider(&server).geocode("Bouaké", "CI").await.unwrap().unwrap();

    assert_eq!(place.name, "Bouaké");
    assert_eq!(place.coordinates.latitude, 7.6898);
    assert_eq!(place.coordinates.longitude, -5.0318);
}

#[tokio::test]
async fn empty_geocoding_result_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let place = provider(&server).geocode("Atlantis", "CI").await.unwrap();
    assert!(place.is_none());
}

#[tokio::test]
async fn error_status_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string(r#"{"cod":401,"message":"Invalid API key."}"#),
        )
        .mount(&server)
        .await;

    let err = provider(&server).current(abidjan()).await.unwrap_err();
    let msg = format!("{err:#}");

    assert!(msg.contains("401"), "{msg}");
    assert!(msg.contains("Invalid API key"), "{msg}");
}

#[tokio::test]
async fn malformed_body_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = provider(&server).forecast(abidjan()).await.unwrap_err();
    assert!(err.to_string().contains("Failed to parse OpenWeather 5-day forecast JSON"));
}
