//! Weather core for SkyCast
//!
//! Resolves a city/state, zip code or device location to coordinates,
//! fetches current conditions from OpenWeather, remembers the last
//! coordinate and caches condition icons.

pub mod cache;
pub mod geocode;
pub mod http;
pub mod location;
pub mod orchestrator;
pub mod provider;
pub mod store;
pub mod types;

pub use cache::{icon_url, CachedImage, IconStore, ImageCache};
pub use geocode::{Geocoder, GeocodingProvider};
pub use location::{
    location_action, LocationAction, LocationSource, PermissionState, StaticLocationSource,
};
pub use orchestrator::{PresentationState, WeatherOrchestrator};
pub use provider::{WeatherClient, WeatherProvider};
pub use store::{JsonFileStore, KeyValueStore, LastLocationStore, MemoryStore};
pub use types::*;
