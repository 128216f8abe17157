//! Forward geocoding: city/state or zip code to coordinates.
//! Uses the OpenWeather geocoding API with the same key as the weather endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use skycast_core::NetworkError;
use tracing::instrument;
use url::Url;

use crate::http;
use crate::types::{Coordinate, LocationDescriptor};

const DIRECT_PATH: &str = "/geo/1.0/direct";
const ZIP_PATH: &str = "/geo/1.0/zip";

/// Turns a descriptor into a coordinate. One request per call, no retries.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, descriptor: &LocationDescriptor) -> Result<Coordinate, NetworkError>;
}

/// One candidate from `/geo/1.0/direct` (the endpoint returns an array)
#[derive(Debug, Deserialize)]
struct DirectMatch {
    lat: f64,
    lon: f64,
    #[allow(dead_code)]
    name: Option<String>,
}

/// Body of `/geo/1.0/zip` (a single object)
#[derive(Debug, Deserialize)]
struct ZipMatch {
    lat: f64,
    lon: f64,
    #[allow(dead_code)]
    name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeocodingProvider {
    client: Client,
    base_url: String,
    api_key: String,
    country_code: String,
}

impl GeocodingProvider {
    pub fn new(client: Client, base_url: &str, api_key: &str, country_code: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            country_code: country_code.to_string(),
        }
    }

    /// Request URL for a descriptor. City/region and zip use different endpoints.
    pub fn request_url(&self, descriptor: &LocationDescriptor) -> Result<Url, NetworkError> {
        match descriptor {
            LocationDescriptor::CityRegion { city, region } => {
                let mut url = http::endpoint(&self.base_url, DIRECT_PATH)?;
                url.query_pairs_mut()
                    .append_pair("q", &format!("{},{},{}", city, region, self.country_code))
                    .append_pair("limit", "1")
                    .append_pair("appid", &self.api_key);
                Ok(url)
            }
            LocationDescriptor::PostalCode { postal_code } => {
                let mut url = http::endpoint(&self.base_url, ZIP_PATH)?;
                url.query_pairs_mut()
                    .append_pair("zip", &format!("{},{}", postal_code, self.country_code))
                    .append_pair("appid", &self.api_key);
                Ok(url)
            }
        }
    }
}

#[async_trait]
impl Geocoder for GeocodingProvider {
    #[instrument(skip_all, fields(query = %descriptor), level = "debug")]
    async fn geocode(&self, descriptor: &LocationDescriptor) -> Result<Coordinate, NetworkError> {
        let url = self.request_url(descriptor)?;

        let coordinate = match descriptor {
            LocationDescriptor::CityRegion { .. } => {
                let matches: Vec<DirectMatch> = http::get_json(&self.client, url).await?;
                // First candidate is the best match
                matches
                    .into_iter()
                    .next()
                    .map(|m| Coordinate::new(m.lat, m.lon))
                    .ok_or_else(|| NetworkError::NotFound(descriptor.to_string()))?
            }
            LocationDescriptor::PostalCode { .. } => {
                let found: ZipMatch = http::get_json(&self.client, url).await?;
                Coordinate::new(found.lat, found.lon)
            }
        };

        tracing::debug!(
            "Geocoded {} to {}, {}",
            descriptor,
            coordinate.latitude,
            coordinate.longitude
        );
        Ok(coordinate)
    }
}
