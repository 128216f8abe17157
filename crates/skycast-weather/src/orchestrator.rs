//! Presentation state and the actions that drive it.
//!
//! A lookup moves through validate → resolve (geocode) → fetch → settled.
//! Every outcome lands in [`PresentationState`]; no entry point returns an
//! error.
//!
//! Entry points are not serialized. Each one writes state only after its
//! own awaits complete, so when two lookups overlap the one that settles
//! last decides `current_reading` and `error_message`.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::instrument;
use url::Url;

use skycast_core::ValidationError;

use crate::cache::icon_url;
use crate::geocode::Geocoder;
use crate::location::{location_action, LocationAction, LocationSource, PermissionState};
use crate::provider::WeatherClient;
use crate::store::LastLocationStore;
use crate::types::{Coordinate, InputMode, LocationDescriptor, WeatherReading};

/// Everything the rendering layer shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresentationState {
    pub input_mode: InputMode,
    pub city_input: String,
    pub region_input: String,
    pub postal_input: String,
    pub current_reading: Option<WeatherReading>,
    pub error_message: String,
    pub location_permission_denied: bool,
}

impl PresentationState {
    /// The descriptor for the active input mode, or the first missing field.
    pub fn descriptor(&self) -> Result<LocationDescriptor, ValidationError> {
        match self.input_mode {
            InputMode::CityState => LocationDescriptor::city_region(
                self.city_input.as_str(),
                self.region_input.as_str(),
            ),
            InputMode::PostalCode => LocationDescriptor::postal_code(self.postal_input.as_str()),
        }
    }

    /// Icon URL for the current reading, when it has an icon code.
    pub fn icon_url(&self, image_base_url: &str) -> Option<Url> {
        let code = self
            .current_reading
            .as_ref()
            .map(|r| r.icon_code.as_str())
            .filter(|code| !code.is_empty())?;

        match icon_url(image_base_url, code) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!("Cannot build icon URL: {}", e);
                None
            }
        }
    }
}

pub struct WeatherOrchestrator {
    state: watch::Sender<PresentationState>,
    geocoder: Arc<dyn Geocoder>,
    weather: Arc<dyn WeatherClient>,
    store: LastLocationStore,
    location: Arc<dyn LocationSource>,
}

impl WeatherOrchestrator {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        weather: Arc<dyn WeatherClient>,
        store: LastLocationStore,
        location: Arc<dyn LocationSource>,
    ) -> Self {
        let (state, _) = watch::channel(PresentationState::default());
        Self {
            state,
            geocoder,
            weather,
            store,
            location,
        }
    }

    /// Snapshot of the current presentation state
    pub fn state(&self) -> PresentationState {
        self.state.borrow().clone()
    }

    /// Change notifications for the rendering layer
    pub fn subscribe(&self) -> watch::Receiver<PresentationState> {
        self.state.subscribe()
    }

    /// Look up the weather for what is typed into the active form.
    #[instrument(skip(self))]
    pub async fn submit(&self) {
        tracing::debug!("Validating input");
        let validated = self.state.borrow().descriptor();
        let descriptor = match validated {
            Ok(descriptor) => descriptor,
            Err(e) => {
                tracing::debug!("Input rejected: {}", e);
                self.set_error(e.to_string());
                return;
            }
        };

        tracing::debug!("Resolving {}", descriptor);
        match self.geocoder.geocode(&descriptor).await {
            Ok(coord) => self.fetch_and_apply(coord).await,
            Err(e) => {
                tracing::warn!("Geocoding {} failed: {}", descriptor, e);
                self.set_error(e.to_string());
            }
        }
    }

    /// Look up the weather at the device position, skipping the geocoder.
    #[instrument(skip(self))]
    pub async fn use_current_location(&self) {
        match self.location.permission() {
            PermissionState::Denied => {
                tracing::info!("Location permission denied");
                self.state.send_modify(|s| s.location_permission_denied = true);
            }
            PermissionState::Granted => {
                self.location.start_updates();
                // No fix yet reads as {0, 0}
                let coord = self.location.last_known().unwrap_or_default();
                self.location.stop_updates();
                self.fetch_and_apply(coord).await;
            }
            PermissionState::Undetermined => {
                tracing::debug!("Location permission undetermined, requesting");
                self.location.request_permission();
            }
        }
    }

    /// Fetch the weather for the last saved coordinate, if there is one.
    #[instrument(skip(self))]
    pub async fn restore_last_session(&self) {
        match self.store.load() {
            Some(coord) => self.fetch_and_apply(coord).await,
            None => tracing::debug!("No saved location to restore"),
        }
    }

    /// Switch forms. Clears the error and the inputs of the form being left.
    pub fn set_input_mode(&self, mode: InputMode) {
        self.state.send_modify(|s| {
            s.error_message.clear();
            match mode {
                InputMode::PostalCode => {
                    s.city_input.clear();
                    s.region_input.clear();
                }
                InputMode::CityState => s.postal_input.clear(),
            }
            s.input_mode = mode;
        });
    }

    pub fn set_city(&self, city: impl Into<String>) {
        let city = city.into();
        self.state.send_modify(|s| s.city_input = city);
    }

    pub fn set_region(&self, region: impl Into<String>) {
        let region = region.into();
        self.state.send_modify(|s| s.region_input = region);
    }

    pub fn set_postal_code(&self, postal_code: impl Into<String>) {
        let postal_code = postal_code.into();
        self.state.send_modify(|s| s.postal_input = postal_code);
    }

    /// The user dismissed the "open settings" prompt.
    pub fn acknowledge_permission_denied(&self) {
        self.state.send_modify(|s| s.location_permission_denied = false);
    }

    /// Apply the transition rule for a permission change. Never fetches.
    pub fn handle_permission_change(&self, permission: PermissionState) -> LocationAction {
        let action = location_action(permission);
        tracing::debug!("Permission changed to {:?}, action {:?}", permission, action);
        match action {
            LocationAction::StartUpdates => self.location.start_updates(),
            LocationAction::StopUpdates => self.location.stop_updates(),
            LocationAction::RequestPermission => self.location.request_permission(),
        }
        action
    }

    /// A fix arrived; one is enough.
    pub fn handle_location_update(&self, coord: Coordinate) {
        tracing::debug!("Location update {}, {}", coord.latitude, coord.longitude);
        self.location.stop_updates();
    }

    async fn fetch_and_apply(&self, coord: Coordinate) {
        tracing::debug!("Fetching weather for {}, {}", coord.latitude, coord.longitude);
        match self.weather.fetch_weather(coord).await {
            Ok(reading) => {
                tracing::info!(
                    "Settled: {} at {}, {}",
                    reading.condition_title,
                    coord.latitude,
                    coord.longitude
                );
                self.state.send_modify(|s| {
                    s.error_message.clear();
                    s.current_reading = Some(reading);
                });
                self.store.save(coord);
            }
            Err(e) => {
                tracing::warn!("Weather fetch failed: {}", e);
                self.set_error(e.to_string());
            }
        }
    }

    fn set_error(&self, message: String) {
        self.state.send_modify(|s| s.error_message = message);
    }
}
