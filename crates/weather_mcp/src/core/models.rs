use std::fmt;
use std::net::IpAddr;

use derive_getters::Getters;
use rmcp::schemars;
use serde::{Deserialize, Deserializer, Serialize};

use crate::core::error::{WeatherServerError, WeatherServerResult};
use crate::core::utils::format_coordinates;

/// Helper function to deserialize optional strings, trimming whitespace and
/// treating blank input as absent
fn deserialize_trimmed_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = Option::<String>::deserialize(deserializer)?;
    Ok(s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
}

/// Which precedence tier produced a resolved location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationOrigin {
    ExplicitCoords,
    PlaceName,
    ClientIp,
    AutoPublicIp,
    DefaultFallback,
}

impl fmt::Display for LocationOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExplicitCoords => write!(f, "explicit coordinates"),
            Self::PlaceName => write!(f, "place name"),
            Self::ClientIp => write!(f, "client IP"),
            Self::AutoPublicIp => write!(f, "auto-detected public IP"),
            Self::DefaultFallback => write!(f, "default fallback"),
        }
    }
}

/// A definitive location produced by the resolver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    /// Latitude in signed degrees
    pub latitude: f64,
    /// Longitude in signed degrees
    pub longitude: f64,
    /// Human-readable label, never empty
    pub display_name: String,
    /// IANA timezone name, when the producing provider reported one
    pub timezone: Option<String>,
    /// Address that was geolocated, for IP-based origins
    pub source_ip: Option<IpAddr>,
    pub origin: LocationOrigin,
}

impl ResolvedLocation {
    pub fn from_coordinates(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            display_name: format!("Coordinates: {}", format_coordinates(latitude, longitude)),
            timezone: None,
            source_ip: None,
            origin: LocationOrigin::ExplicitCoords,
        }
    }

    /// Display name with a suffix telling how indirect the resolution was
    pub fn headline(&self) -> String {
        match self.origin {
            LocationOrigin::ClientIp | LocationOrigin::AutoPublicIp => {
                format!("{} (IP-based)", self.display_name)
            }
            LocationOrigin::DefaultFallback => format!("{} (default fallback)", self.display_name),
            LocationOrigin::ExplicitCoords | LocationOrigin::PlaceName => {
                self.display_name.clone()
            }
        }
    }
}

/// Location inputs shared by every tool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationQuery {
    pub location_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub client_ip: Option<String>,
}

pub trait Validate {
    fn validate(&self) -> WeatherServerResult<()>;
}

fn validate_axis(axis: &'static str, value: Option<f64>, limit: f64) -> WeatherServerResult<()> {
    match value {
        Some(v) if !v.is_finite() || v.abs() > limit => Err(WeatherServerError::InvalidCoordinate {
            axis,
            value: v,
            limit,
        }),
        _ => Ok(()),
    }
}

impl Validate for LocationQuery {
    fn validate(&self) -> WeatherServerResult<()> {
        validate_axis("latitude", self.latitude, 90.0)?;
        validate_axis("longitude", self.longitude, 180.0)
    }
}

/// Request for the current weather at a location
#[derive(Debug, Deserialize, schemars::JsonSchema, Getters)]
pub struct GetCurrentWeatherRequest {
    /// Location name (e.g., 'London, UK', 'New York')
    #[serde(default, deserialize_with = "deserialize_trimmed_option")]
    location_name: Option<String>,
    /// Latitude coordinate (-90 to 90)
    #[serde(default)]
    latitude: Option<f64>,
    /// Longitude coordinate (-180 to 180)
    #[serde(default)]
    longitude: Option<f64>,
    /// Client IP address for geolocation (used if no location provided)
    #[serde(default, deserialize_with = "deserialize_trimmed_option")]
    client_ip: Option<String>,
}

impl GetCurrentWeatherRequest {
    pub fn location_query(&self) -> LocationQuery {
        LocationQuery {
            location_name: self.location_name.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            client_ip: self.client_ip.clone(),
        }
    }
}

pub const DEFAULT_FORECAST_DAYS: i64 = 3;
pub const MAX_FORECAST_DAYS: i64 = 7;

/// Request for a multi-day forecast at a location
#[derive(Debug, Deserialize, schemars::JsonSchema, Getters)]
pub struct GetWeatherForecastRequest {
    /// Location name (e.g., 'London, UK', 'New York')
    #[serde(default, deserialize_with = "deserialize_trimmed_option")]
    location_name: Option<String>,
    /// Latitude coordinate (-90 to 90)
    #[serde(default)]
    latitude: Option<f64>,
    /// Longitude coordinate (-180 to 180)
    #[serde(default)]
    longitude: Option<f64>,
    /// Number of forecast days (1-7, default: 3)
    #[serde(default)]
    days: Option<i64>,
    /// Client IP address for geolocation (used if no location provided)
    #[serde(default, deserialize_with = "deserialize_trimmed_option")]
    client_ip: Option<String>,
}

impl GetWeatherForecastRequest {
    pub fn location_query(&self) -> LocationQuery {
        LocationQuery {
            location_name: self.location_name.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            client_ip: self.client_ip.clone(),
        }
    }

    /// Requested day count clamped into the supported range
    pub fn clamped_days(&self) -> u8 {
        self.days
            .unwrap_or(DEFAULT_FORECAST_DAYS)
            .clamp(1, MAX_FORECAST_DAYS) as u8
    }
}

/// Request for the spoken current time at a location
#[derive(Debug, Deserialize, schemars::JsonSchema, Getters)]
pub struct GetCurrentTimeRequest {
    /// Location name (e.g., 'London, UK', 'New York')
    #[serde(default, deserialize_with = "deserialize_trimmed_option")]
    location_name: Option<String>,
    /// Client IP address for geolocation (used if no location provided)
    #[serde(default, deserialize_with = "deserialize_trimmed_option")]
    client_ip: Option<String>,
}

impl GetCurrentTimeRequest {
    pub fn location_query(&self) -> LocationQuery {
        LocationQuery {
            location_name: self.location_name.clone(),
            client_ip: self.client_ip.clone(),
            ..LocationQuery::default()
        }
    }
}

impl Validate for GetCurrentWeatherRequest {
    fn validate(&self) -> WeatherServerResult<()> {
        self.location_query().validate()
    }
}

impl Validate for GetWeatherForecastRequest {
    fn validate(&self) -> WeatherServerResult<()> {
        self.location_query().validate()
    }
}
