use std::time::Duration;

use clap::Parser;

use crate::config::{DefaultLocation, GeocoderSettings, ServiceConfig};
use crate::core::error::WeatherServerResult;

/// Weather MCP Server
///
/// Current weather, multi-day forecasts and spoken local time for any place.
/// Locations come from explicit coordinates, a place name, the caller's IP
/// address, or the server's own public address, in that order.
///
/// ## Development
/// ```bash
/// npx @modelcontextprotocol/inspector cargo run --bin mcp-server-weather
/// ```
///
/// ## Configuration
/// Add to your MCP client configuration:
/// ```json
/// {
///   "mcpServers": {
///     "weather": {
///       "command": "mcp-server-weather",
///       "env": {
///         "LOG_LEVEL": "info"
///       }
///     }
///   }
/// }
/// ```
///
/// ## Environment Variables
/// - `LOG_LEVEL`: Enables logging to stderr at the given level
/// - `RUST_LOG`: Fine-grained filter directives, takes priority over `LOG_LEVEL`
#[derive(Parser, Debug, Clone)]
#[command(name = "mcp-server-weather")]
#[command(about = "A weather and local time MCP server with automatic location resolution")]
#[command(version)]
#[command(
    long_about = "A Model Context Protocol (MCP) server that reports current weather, forecasts and spoken local time. \nLocations are resolved from coordinates, place names or IP geolocation with a default fallback."
)]
pub struct Cli {
    /// Custom User-Agent for outbound requests
    #[arg(long, value_name = "AGENT")]
    pub user_agent: Option<String>,

    /// Proxy URL for all outbound requests
    #[arg(long, value_name = "URL")]
    pub proxy_url: Option<String>,

    /// Language for place-name geocoding results
    #[arg(long, default_value = "en", value_name = "CODE")]
    pub language: String,

    /// Geocoding candidates requested per search
    #[arg(long, default_value_t = 5, value_name = "COUNT")]
    pub geocode_count: u8,

    /// Per-call timeout for public IP echo services
    #[arg(long, default_value_t = 5, value_name = "SECONDS")]
    pub public_ip_timeout_secs: u64,

    /// Per-call timeout for geolocation, geocoding and weather requests
    #[arg(long, default_value_t = 10, value_name = "SECONDS")]
    pub lookup_timeout_secs: u64,

    /// Latitude used when no location can be determined
    #[arg(long, default_value_t = 40.7128, allow_hyphen_values = true, value_name = "DEGREES")]
    pub default_latitude: f64,

    /// Longitude used when no location can be determined
    #[arg(long, default_value_t = -74.0060, allow_hyphen_values = true, value_name = "DEGREES")]
    pub default_longitude: f64,

    /// Display name of the default location
    #[arg(long, default_value = "New York, USA", value_name = "NAME")]
    pub default_name: String,

    /// IANA timezone of the default location
    #[arg(long, default_value = "America/New_York", value_name = "ZONE")]
    pub default_timezone: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Build the runtime configuration, keeping the stock provider lists
    pub fn into_config(self) -> ServiceConfig {
        let defaults = ServiceConfig::default();
        let timezone = Some(self.default_timezone.trim().to_string()).filter(|tz| !tz.is_empty());

        ServiceConfig {
            geocoder: GeocoderSettings {
                language: self.language,
                count: self.geocode_count,
                ..defaults.geocoder.clone()
            },
            public_ip_timeout: Duration::from_secs(self.public_ip_timeout_secs),
            lookup_timeout: Duration::from_secs(self.lookup_timeout_secs),
            default_location: DefaultLocation {
                latitude: self.default_latitude,
                longitude: self.default_longitude,
                name: self.default_name,
                timezone,
            },
            user_agent: self.user_agent,
            proxy_url: self.proxy_url,
            ..defaults
        }
    }

    /// Parse CLI arguments into a validated configuration
    pub fn parse_config() -> WeatherServerResult<(ServiceConfig, Option<String>)> {
        let cli = Self::parse();
        let log_level = cli.log_level.clone();
        let config = cli.into_config();
        config.validate()?;
        Ok((config, log_level))
    }
}
