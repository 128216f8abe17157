//! End-to-end tests for WeatherOrchestrator against mock OpenWeather endpoints.
//!
//! Call counts are asserted with wiremock's `expect`, verified when each
//! MockServer is dropped.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use skycast_weather::{
    Coordinate, GeocodingProvider, InputMode, KeyValueStore, LastLocationStore, LocationAction,
    LocationSource, MemoryStore, PermissionState, StaticLocationSource, WeatherOrchestrator,
    WeatherProvider, WeatherReading,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn weather_body(title: &str, icon: &str) -> serde_json::Value {
    serde_json::json!({
        "weather": [{"id": 800, "main": title, "description": "clear sky", "icon": icon}],
        "main": {
            "temp": 300.0,
            "feels_like": 301.5,
            "temp_min": 298.0,
            "temp_max": 302.0,
            "pressure": 1015,
            "humidity": 40
        },
        "name": "Somewhere"
    })
}

fn expected_reading(title: &str, icon: &str) -> WeatherReading {
    WeatherReading {
        condition_title: title.to_string(),
        description: "clear sky".to_string(),
        icon_code: icon.to_string(),
        temp_kelvin: 300.0,
        feels_like_kelvin: 301.5,
        temp_min_kelvin: 298.0,
        temp_max_kelvin: 302.0,
        humidity_percent: 40,
    }
}

struct Harness {
    orchestrator: WeatherOrchestrator,
    backend: Arc<MemoryStore>,
    location: Arc<StaticLocationSource>,
}

fn harness(geo_server: &MockServer, weather_server: &MockServer) -> Harness {
    harness_with_location(
        geo_server,
        weather_server,
        StaticLocationSource::new(PermissionState::Undetermined, None),
    )
}

fn harness_with_location(
    geo_server: &MockServer,
    weather_server: &MockServer,
    location: StaticLocationSource,
) -> Harness {
    let client = Client::new();
    let backend = Arc::new(MemoryStore::new());
    let location = Arc::new(location);

    let orchestrator = WeatherOrchestrator::new(
        Arc::new(GeocodingProvider::new(
            client.clone(),
            &geo_server.uri(),
            "test-key",
            "US",
        )),
        Arc::new(WeatherProvider::new(client, &weather_server.uri(), "test-key")),
        LastLocationStore::new(backend.clone()),
        location.clone(),
    );

    Harness {
        orchestrator,
        backend,
        location,
    }
}

async fn mount_weather(server: &MockServer, lat: &str, lon: &str, title: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("lat", lat))
        .and(query_param("lon", lon))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_body(title, "01d")))
        .expect(times)
        .mount(server)
        .await;
}

/// The save is detached; give it a moment to land.
async fn wait_for_saved(backend: &MemoryStore) -> Option<(f64, f64)> {
    for _ in 0..100 {
        if let (Ok(Some(lat)), Ok(Some(lon))) = (backend.get_f64("lat"), backend.get_f64("lon")) {
            return Some((lat, lon));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}

#[tokio::test]
async fn test_empty_city_sets_message_and_makes_no_calls() {
    let geo = MockServer::start().await;
    let weather = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&geo)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&weather)
        .await;

    let h = harness(&geo, &weather);
    h.orchestrator.set_region("PA");
    h.orchestrator.submit().await;

    let state = h.orchestrator.state();
    assert_eq!(state.error_message, "Please enter a city");
    assert!(state.current_reading.is_none());
}

#[tokio::test]
async fn test_empty_region_sets_message_and_makes_no_calls() {
    let geo = MockServer::start().await;
    let weather = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&geo)
        .await;

    let h = harness(&geo, &weather);
    h.orchestrator.set_city("Philadelphia");
    h.orchestrator.submit().await;

    assert_eq!(h.orchestrator.state().error_message, "Please select a state");
}

#[tokio::test]
async fn test_empty_zip_sets_message_and_makes_no_calls() {
    let geo = MockServer::start().await;
    let weather = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&geo)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&weather)
        .await;

    let h = harness(&geo, &weather);
    h.orchestrator.set_input_mode(InputMode::PostalCode);
    h.orchestrator.submit().await;

    assert_eq!(h.orchestrator.state().error_message, "Please enter a zip code");
}

#[tokio::test]
async fn test_city_submit_success_chain() {
    let geo = MockServer::start().await;
    let weather = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .and(query_param("q", "Philadelphia,PA,US"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"name": "Philadelphia", "lat": 39.95, "lon": -75.16, "country": "US"}
        ])))
        .expect(1)
        .mount(&geo)
        .await;
    mount_weather(&weather, "39.95", "-75.16", "Clear", 1).await;

    let h = harness(&geo, &weather);
    h.orchestrator.set_city("Philadelphia");
    h.orchestrator.set_region("PA");
    h.orchestrator.submit().await;

    let state = h.orchestrator.state();
    assert_eq!(state.current_reading, Some(expected_reading("Clear", "01d")));
    assert!(state.error_message.is_empty());

    assert_eq!(wait_for_saved(&h.backend).await, Some((39.95, -75.16)));
}

#[tokio::test]
async fn test_success_clears_previous_error() {
    let geo = MockServer::start().await;
    let weather = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/zip"))
        .and(query_param("zip", "19103,US"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "zip": "19103", "name": "Philadelphia", "lat": 39.95, "lon": -75.17, "country": "US"
        })))
        .expect(1)
        .mount(&geo)
        .await;
    mount_weather(&weather, "39.95", "-75.17", "Clouds", 1).await;

    let h = harness(&geo, &weather);
    h.orchestrator.set_input_mode(InputMode::PostalCode);
    h.orchestrator.submit().await;
    assert_eq!(h.orchestrator.state().error_message, "Please enter a zip code");

    h.orchestrator.set_postal_code("19103");
    h.orchestrator.submit().await;

    let state = h.orchestrator.state();
    assert!(state.error_message.is_empty());
    assert_eq!(state.current_reading, Some(expected_reading("Clouds", "01d")));
}

#[tokio::test]
async fn test_geocode_failure_keeps_previous_reading() {
    let geo = MockServer::start().await;
    let weather = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"name": "Austin", "lat": 30.27, "lon": -97.74, "country": "US"}
        ])))
        .expect(1)
        .mount(&geo)
        .await;
    Mock::given(method("GET"))
        .and(path("/geo/1.0/zip"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "cod": "404", "message": "not found"
        })))
        .expect(1)
        .mount(&geo)
        .await;
    mount_weather(&weather, "30.27", "-97.74", "Clear", 1).await;

    let h = harness(&geo, &weather);
    h.orchestrator.set_city("Austin");
    h.orchestrator.set_region("TX");
    h.orchestrator.submit().await;
    let before = h.orchestrator.state().current_reading;
    assert!(before.is_some());

    h.orchestrator.set_input_mode(InputMode::PostalCode);
    h.orchestrator.set_postal_code("00000");
    h.orchestrator.submit().await;

    let state = h.orchestrator.state();
    assert_eq!(state.error_message, "Server error: 404 - not found");
    assert_eq!(state.current_reading, before);
}

#[tokio::test]
async fn test_weather_failure_sets_message_and_skips_save() {
    let geo = MockServer::start().await;
    let weather = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/zip"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "zip": "73301", "name": "Austin", "lat": 30.27, "lon": -97.74, "country": "US"
        })))
        .mount(&geo)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&weather)
        .await;

    let h = harness(&geo, &weather);
    h.orchestrator.set_input_mode(InputMode::PostalCode);
    h.orchestrator.set_postal_code("73301");
    h.orchestrator.submit().await;

    let state = h.orchestrator.state();
    assert_eq!(state.error_message, "Server error: 500 - upstream exploded");
    assert!(state.current_reading.is_none());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.backend.get_f64("lat").unwrap(), None);
}

#[tokio::test]
async fn test_mode_switch_clears_other_form_and_error() {
    let geo = MockServer::start().await;
    let weather = MockServer::start().await;
    let h = harness(&geo, &weather);

    h.orchestrator.set_city("Austin");
    h.orchestrator.set_region("TX");
    h.orchestrator.set_postal_code("78701");
    h.orchestrator.set_input_mode(InputMode::CityState);
    h.orchestrator.submit().await; // fails at geocoding, leaves an error behind
    assert!(!h.orchestrator.state().error_message.is_empty());

    h.orchestrator.set_input_mode(InputMode::PostalCode);
    let state = h.orchestrator.state();
    assert_eq!(state.input_mode, InputMode::PostalCode);
    assert_eq!(state.city_input, "");
    assert_eq!(state.region_input, "");
    assert!(state.error_message.is_empty());

    h.orchestrator.set_postal_code("78701");
    h.orchestrator.set_input_mode(InputMode::CityState);
    let state = h.orchestrator.state();
    assert_eq!(state.input_mode, InputMode::CityState);
    assert_eq!(state.postal_input, "");
}

#[tokio::test]
async fn test_restore_with_nothing_saved_is_noop() {
    let geo = MockServer::start().await;
    let weather = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&weather)
        .await;

    let h = harness(&geo, &weather);
    h.orchestrator.restore_last_session().await;

    let state = h.orchestrator.state();
    assert!(state.current_reading.is_none());
    assert!(state.error_message.is_empty());
}

#[tokio::test]
async fn test_restore_zero_sentinel_is_noop() {
    let geo = MockServer::start().await;
    let weather = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&weather)
        .await;

    let h = harness(&geo, &weather);
    h.backend.set_f64("lat", 0.0).unwrap();
    h.backend.set_f64("lon", 0.0).unwrap();
    h.orchestrator.restore_last_session().await;

    assert!(h.orchestrator.state().current_reading.is_none());
}

#[tokio::test]
async fn test_restore_fetches_saved_coordinate_once() {
    let geo = MockServer::start().await;
    let weather = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&geo)
        .await;
    mount_weather(&weather, "40", "-75", "Snow", 1).await;

    let h = harness(&geo, &weather);
    h.backend.set_f64("lat", 40.0).unwrap();
    h.backend.set_f64("lon", -75.0).unwrap();
    h.orchestrator.restore_last_session().await;

    assert_eq!(
        h.orchestrator.state().current_reading,
        Some(expected_reading("Snow", "01d"))
    );
}

#[tokio::test]
async fn test_current_location_denied_sets_flag_without_calls() {
    let geo = MockServer::start().await;
    let weather = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&geo)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&weather)
        .await;

    let h = harness_with_location(
        &geo,
        &weather,
        StaticLocationSource::new(PermissionState::Denied, Some(Coordinate::new(1.0, 2.0))),
    );
    h.orchestrator.use_current_location().await;

    let state = h.orchestrator.state();
    assert!(state.location_permission_denied);
    assert!(state.error_message.is_empty());

    h.orchestrator.acknowledge_permission_denied();
    assert!(!h.orchestrator.state().location_permission_denied);
}

#[tokio::test]
async fn test_current_location_granted_bypasses_geocoder() {
    let geo = MockServer::start().await;
    let weather = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&geo)
        .await;
    mount_weather(&weather, "47.6", "-122.3", "Rain", 1).await;

    let h = harness_with_location(
        &geo,
        &weather,
        StaticLocationSource::new(
            PermissionState::Granted,
            Some(Coordinate::new(47.6, -122.3)),
        ),
    );
    h.orchestrator.use_current_location().await;

    assert_eq!(
        h.orchestrator.state().current_reading,
        Some(expected_reading("Rain", "01d"))
    );
    assert!(!h.location.is_updating());
    assert_eq!(wait_for_saved(&h.backend).await, Some((47.6, -122.3)));
}

#[tokio::test]
async fn test_current_location_without_fix_uses_zero_coordinate() {
    let geo = MockServer::start().await;
    let weather = MockServer::start().await;
    mount_weather(&weather, "0", "0", "Clear", 1).await;

    let h = harness_with_location(
        &geo,
        &weather,
        StaticLocationSource::new(PermissionState::Granted, None),
    );
    h.orchestrator.use_current_location().await;

    assert!(h.orchestrator.state().current_reading.is_some());
}

#[tokio::test]
async fn test_current_location_undetermined_only_requests() {
    let geo = MockServer::start().await;
    let weather = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&weather)
        .await;

    let h = harness_with_location(
        &geo,
        &weather,
        StaticLocationSource::new(
            PermissionState::Undetermined,
            Some(Coordinate::new(47.6, -122.3)),
        ),
    );
    h.orchestrator.use_current_location().await;

    // Request resolved to granted, but that alone does not fetch
    assert_eq!(h.location.permission(), PermissionState::Granted);
    let state = h.orchestrator.state();
    assert!(state.current_reading.is_none());
    assert!(!state.location_permission_denied);
}

#[tokio::test]
async fn test_permission_change_drives_location_stream() {
    let geo = MockServer::start().await;
    let weather = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&weather)
        .await;

    let h = harness(&geo, &weather);

    let action = h.orchestrator.handle_permission_change(PermissionState::Granted);
    assert_eq!(action, LocationAction::StartUpdates);
    assert!(h.location.is_updating());

    h.orchestrator.handle_location_update(Coordinate::new(47.6, -122.3));
    assert!(!h.location.is_updating());

    h.location.start_updates();
    let action = h.orchestrator.handle_permission_change(PermissionState::Denied);
    assert_eq!(action, LocationAction::StopUpdates);
    assert!(!h.location.is_updating());
}

#[tokio::test]
async fn test_subscribers_see_settled_state() {
    let geo = MockServer::start().await;
    let weather = MockServer::start().await;
    mount_weather(&weather, "40", "-75", "Clear", 1).await;

    let h = harness(&geo, &weather);
    h.backend.set_f64("lat", 40.0).unwrap();
    h.backend.set_f64("lon", -75.0).unwrap();

    let mut rx = h.orchestrator.subscribe();
    h.orchestrator.restore_last_session().await;

    assert!(rx.has_changed().unwrap());
    assert!(rx.borrow_and_update().current_reading.is_some());
}
