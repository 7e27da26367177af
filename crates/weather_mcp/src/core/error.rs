use std::time::Duration;

use rmcp::ErrorData as McpError;
use rmcp::serde_json::json;
use serde_json::error::Category;

use crate::core::utils::AVAILABLE_RESOURCES;

// Error codes
const ERROR_LOCATION_NOT_FOUND: &str = "location_not_found";
const ERROR_INVALID_COORDINATE: &str = "invalid_coordinate";
const ERROR_INVALID_PARAMS: &str = "invalid_params";
const ERROR_WEATHER_UNAVAILABLE: &str = "weather_unavailable";
const ERROR_RESOURCE_NOT_FOUND: &str = "resource_not_found";
const ERROR_CLIENT_ERROR: &str = "client_error";
const ERROR_INVALID_CONFIG: &str = "invalid_config";

/// Errors surfaced to MCP clients
#[derive(Debug, thiserror::Error)]
pub enum WeatherServerError {
    #[error("Could not find location: {name}")]
    LocationNotFound { name: String },
    #[error("Invalid {axis}: {value}. Must be between -{limit} and {limit}")]
    InvalidCoordinate {
        axis: &'static str,
        value: f64,
        limit: f64,
    },
    #[error("Invalid parameters: {message}")]
    InvalidParams { message: String },
    #[error("Failed to fetch weather data: {message}")]
    WeatherUnavailable { message: String },
    #[error("Resource not found: {uri}")]
    ResourceNotFound { uri: String },
    #[error("HTTP client error: {message}")]
    ClientError { message: String },
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl From<WeatherServerError> for McpError {
    fn from(err: WeatherServerError) -> Self {
        match err {
            WeatherServerError::LocationNotFound { name } => McpError::invalid_params(
                ERROR_LOCATION_NOT_FOUND,
                Some(json!({
                    "location_name": name,
                    "hint": "Try a simpler name such as 'London' or pass latitude and longitude"
                })),
            ),
            WeatherServerError::InvalidCoordinate { axis, value, limit } => {
                McpError::invalid_params(
                    ERROR_INVALID_COORDINATE,
                    Some(json!({ "axis": axis, "value": value, "min": -limit, "max": limit })),
                )
            }
            WeatherServerError::InvalidParams { message } => {
                McpError::invalid_params(ERROR_INVALID_PARAMS, Some(json!({ "message": message })))
            }
            WeatherServerError::WeatherUnavailable { message } => McpError::internal_error(
                ERROR_WEATHER_UNAVAILABLE,
                Some(json!({ "message": message })),
            ),
            WeatherServerError::ResourceNotFound { uri } => McpError::resource_not_found(
                ERROR_RESOURCE_NOT_FOUND,
                Some(json!({
                    "uri": uri,
                    "available_resources": AVAILABLE_RESOURCES
                })),
            ),
            WeatherServerError::ClientError { message } => {
                McpError::internal_error(ERROR_CLIENT_ERROR, Some(json!({ "message": message })))
            }
            WeatherServerError::InvalidConfig { message } => {
                McpError::internal_error(ERROR_INVALID_CONFIG, Some(json!({ "message": message })))
            }
        }
    }
}

/// Failure of a single outbound HTTP call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
    #[error("request to {url} failed: {message}")]
    Unreachable { url: String, message: String },
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("malformed response from {url}: {message}")]
    Malformed { url: String, message: String },
}

/// Why one provider attempt did not produce a usable answer.
///
/// Every variant is non-fatal: the provider chain moves on to the next entry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderMiss {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("unexpected response shape ({kind} error)")]
    Schema { kind: &'static str },
    #[error("no usable coordinates in response")]
    MissingCoordinates,
    #[error("response is not an IP address ({len} bytes)")]
    MalformedAddress { len: usize },
}

impl ProviderMiss {
    /// Decode failure reduced to its category; serde messages quote the
    /// offending values and must not reach the logs
    pub fn schema(error: &serde_json::Error) -> Self {
        let kind = match error.classify() {
            Category::Io => "io",
            Category::Syntax => "syntax",
            Category::Data => "data",
            Category::Eof => "eof",
        };
        ProviderMiss::Schema { kind }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocateError {
    #[error("all {attempted} providers failed")]
    AllProvidersExhausted { attempted: usize },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeocodeError {
    #[error("no geocoding match for '{query}'")]
    NotFound { query: String },
}

/// The only failure the location resolver reports to its caller
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    #[error("Could not find location: {name}")]
    LocationNotFound { name: String },
}

impl From<ResolveError> for WeatherServerError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::LocationNotFound { name } => WeatherServerError::LocationNotFound { name },
        }
    }
}

pub type WeatherServerResult<T> = Result<T, WeatherServerError>;
pub type McpResult<T> = Result<T, McpError>;
