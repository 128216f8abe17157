use serde::{Deserialize, Serialize};
use skycast_core::ValidationError;

/// Region codes offered by the state picker
pub const US_STATES: [&str; 55] = [
    "AK", "AL", "AR", "AS", "AZ", "CA", "CO", "CT", "DC", "DE", "FL", "GA", "GU", "HI", "IA",
    "ID", "IL", "IN", "KS", "KY", "LA", "MA", "MD", "ME", "MI", "MN", "MO", "MS", "MT", "NC",
    "ND", "NE", "NH", "NJ", "NM", "NV", "NY", "OH", "OK", "OR", "PA", "PR", "RI", "SC", "SD",
    "TN", "TX", "UT", "VA", "VI", "VT", "WA", "WI", "WV", "WY",
];

/// Geographic coordinate.
///
/// No range checks: values come from upstream responses or the device.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// `{0, 0}` doubles as "nothing saved" for the last-location store.
    pub fn is_unset(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }
}

/// Which form the user is filling in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    #[default]
    CityState,
    PostalCode,
}

impl InputMode {
    /// Segmented-control label
    pub fn label(&self) -> &'static str {
        match self {
            Self::CityState => "City & State",
            Self::PostalCode => "Zip Code",
        }
    }
}

/// What the user asked to look up.
///
/// Build one with [`LocationDescriptor::city_region`] or
/// [`LocationDescriptor::postal_code`] so empty fields are rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationDescriptor {
    CityRegion { city: String, region: String },
    PostalCode { postal_code: String },
}

impl LocationDescriptor {
    /// City is checked before region, matching the order of the form.
    pub fn city_region(
        city: impl Into<String>,
        region: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let city = city.into();
        let region = region.into();
        if city.is_empty() {
            return Err(ValidationError::MissingCity);
        }
        if region.is_empty() {
            return Err(ValidationError::MissingRegion);
        }
        Ok(Self::CityRegion { city, region })
    }

    pub fn postal_code(postal_code: impl Into<String>) -> Result<Self, ValidationError> {
        let postal_code = postal_code.into();
        if postal_code.is_empty() {
            return Err(ValidationError::MissingPostalCode);
        }
        Ok(Self::PostalCode { postal_code })
    }
}

impl std::fmt::Display for LocationDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CityRegion { city, region } => write!(f, "{}, {}", city, region),
            Self::PostalCode { postal_code } => write!(f, "{}", postal_code),
        }
    }
}

/// Current conditions at one coordinate. Temperatures are in Kelvin as
/// delivered upstream; use the `*_display` helpers for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub condition_title: String,
    pub description: String,
    pub icon_code: String,
    pub temp_kelvin: f64,
    pub feels_like_kelvin: f64,
    pub temp_min_kelvin: f64,
    pub temp_max_kelvin: f64,
    pub humidity_percent: i32,
}

impl WeatherReading {
    pub fn temperature_display(&self) -> String {
        kelvin_to_fahrenheit(self.temp_kelvin)
    }

    pub fn feels_like_display(&self) -> String {
        kelvin_to_fahrenheit(self.feels_like_kelvin)
    }

    pub fn low_display(&self) -> String {
        kelvin_to_fahrenheit(self.temp_min_kelvin)
    }

    pub fn high_display(&self) -> String {
        kelvin_to_fahrenheit(self.temp_max_kelvin)
    }

    pub fn humidity_display(&self) -> String {
        format!("{}%", self.humidity_percent)
    }
}

/// Kelvin to whole-degree Fahrenheit, e.g. `"32°F"`.
/// Halves round away from zero.
pub fn kelvin_to_fahrenheit(kelvin: f64) -> String {
    let fahrenheit = (kelvin - 273.15) * 9.0 / 5.0 + 32.0;
    format!("{}°F", fahrenheit.round() as i64)
}
