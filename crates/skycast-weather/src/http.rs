//! Shared HTTP plumbing for the OpenWeather clients.

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use skycast_core::{NetworkError, ReqwestErrorExt};
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = concat!("SkyCast/", env!("CARGO_PKG_VERSION"));

/// OpenWeather error bodies look like `{"cod":"404","message":"city not found"}`
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Build the client shared by the geocoder, weather provider and icon cache.
/// `None` leaves requests without a timeout.
pub fn build_client(timeout: Option<Duration>) -> Result<Client, NetworkError> {
    let mut builder = Client::builder().user_agent(USER_AGENT);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(ReqwestErrorExt::into_network_error)
}

/// Join `base` and an endpoint path into a URL, keeping any path prefix on `base`.
pub(crate) fn endpoint(base: &str, path: &str) -> Result<Url, NetworkError> {
    let raw = format!("{}{}", base.trim_end_matches('/'), path);
    Url::parse(&raw).map_err(|e| NetworkError::InvalidUrl(format!("{}: {}", raw, e)))
}

/// Send a GET and decode the JSON body, mapping every failure to `NetworkError`.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: Url,
) -> Result<T, NetworkError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(ReqwestErrorExt::into_network_error)?;

    decode_json(response).await
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, NetworkError> {
    let status = response.status();

    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|body| body.message)
            .unwrap_or(text);
        return Err(NetworkError::ServerError {
            status: status.as_u16(),
            message,
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(ReqwestErrorExt::into_network_error)?;

    serde_json::from_slice(&bytes).map_err(|e| NetworkError::InvalidResponse(e.to_string()))
}
