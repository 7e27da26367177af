use std::time::Duration;

use url::Url;

use crate::core::error::{WeatherServerError, WeatherServerResult};

/// Placeholder substituted with the address being geolocated
pub const IP_PLACEHOLDER: &str = "{ip}";

/// Response shape of a public-address echo service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoShape {
    /// `{ "ip": "..." }`
    JsonIp,
    /// Bare address, usually newline-terminated
    PlainText,
}

/// One public-address echo service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicIpEndpoint {
    pub url: String,
    pub shape: EchoShape,
}

impl PublicIpEndpoint {
    pub fn new(url: impl Into<String>, shape: EchoShape) -> Self {
        Self {
            url: url.into(),
            shape,
        }
    }
}

/// Response schema of an IP geolocation provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoShape {
    /// ipapi.co: `latitude`, `longitude`, `country_name`
    IpApiCo,
    /// ipinfo.io: `loc` as "lat,lon", `country`
    IpInfo,
    /// ip-api.com: `lat`, `lon`, `regionName`, `query`
    IpApiCom,
}

/// One IP geolocation provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoEndpoint {
    /// URL answering for the caller's own address
    pub url: String,
    /// URL template answering for a given address, containing `{ip}`.
    /// `None` for providers that only support caller lookups.
    pub address_url: Option<String>,
    pub shape: GeoShape,
}

impl GeoEndpoint {
    pub fn new(url: impl Into<String>, address_url: Option<&str>, shape: GeoShape) -> Self {
        Self {
            url: url.into(),
            address_url: address_url.map(str::to_string),
            shape,
        }
    }
}

/// Place-name geocoding settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocoderSettings {
    pub url: String,
    pub language: String,
    /// Candidates requested per query; only the best is used
    pub count: u8,
}

/// Location used when every implicit resolution tier fails
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
    pub timezone: Option<String>,
}

impl Default for DefaultLocation {
    fn default() -> Self {
        Self {
            latitude: 40.7128,
            longitude: -74.0060,
            name: "New York, USA".to_string(),
            timezone: Some("America/New_York".to_string()),
        }
    }
}

/// Runtime configuration for the weather server
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub public_ip_endpoints: Vec<PublicIpEndpoint>,
    pub geo_endpoints: Vec<GeoEndpoint>,
    pub geocoder: GeocoderSettings,
    pub forecast_url: String,
    /// Per-call timeout for public-address echo services
    pub public_ip_timeout: Duration,
    /// Per-call timeout for geolocation, geocoding and forecast calls
    pub lookup_timeout: Duration,
    pub default_location: DefaultLocation,
    pub user_agent: Option<String>,
    pub proxy_url: Option<String>,
}

pub fn default_public_ip_endpoints() -> Vec<PublicIpEndpoint> {
    vec![
        PublicIpEndpoint::new("https://api.ipify.org?format=json", EchoShape::JsonIp),
        PublicIpEndpoint::new("https://icanhazip.com/", EchoShape::PlainText),
        PublicIpEndpoint::new("https://checkip.amazonaws.com/", EchoShape::PlainText),
    ]
}

pub fn default_geo_endpoints() -> Vec<GeoEndpoint> {
    vec![
        GeoEndpoint::new(
            "https://ipapi.co/json/",
            Some("https://ipapi.co/{ip}/json/"),
            GeoShape::IpApiCo,
        ),
        GeoEndpoint::new(
            "https://ipinfo.io/json",
            Some("https://ipinfo.io/{ip}/json"),
            GeoShape::IpInfo,
        ),
        GeoEndpoint::new("http://ip-api.com/json/", None, GeoShape::IpApiCom),
    ]
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            public_ip_endpoints: default_public_ip_endpoints(),
            geo_endpoints: default_geo_endpoints(),
            geocoder: GeocoderSettings {
                url: "https://geocoding-api.open-meteo.com/v1/search".to_string(),
                language: "en".to_string(),
                count: 5,
            },
            forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            public_ip_timeout: Duration::from_secs(5),
            lookup_timeout: Duration::from_secs(10),
            default_location: DefaultLocation::default(),
            user_agent: None,
            proxy_url: None,
        }
    }
}

fn invalid(message: impl Into<String>) -> WeatherServerError {
    WeatherServerError::InvalidConfig {
        message: message.into(),
    }
}

fn check_url(label: &str, url: &str) -> WeatherServerResult<()> {
    let sample = url.replace(IP_PLACEHOLDER, "192.0.2.1");
    Url::parse(&sample)
        .map(|_| ())
        .map_err(|e| invalid(format!("{} URL '{}' is invalid: {}", label, url, e)))
}

impl ServiceConfig {
    /// Check every endpoint, timeout and the default location
    pub fn validate(&self) -> WeatherServerResult<()> {
        if self.public_ip_endpoints.is_empty() {
            return Err(invalid("at least one public IP endpoint is required"));
        }
        if self.geo_endpoints.is_empty() {
            return Err(invalid("at least one geolocation endpoint is required"));
        }

        for endpoint in &self.public_ip_endpoints {
            check_url("public IP", &endpoint.url)?;
        }
        for endpoint in &self.geo_endpoints {
            check_url("geolocation", &endpoint.url)?;
            let Some(template) = &endpoint.address_url else {
                continue;
            };
            if !template.contains(IP_PLACEHOLDER) {
                return Err(invalid(format!(
                    "geolocation URL template '{}' lacks {}",
                    template, IP_PLACEHOLDER
                )));
            }
            check_url("geolocation", template)?;
        }
        check_url("geocoding", &self.geocoder.url)?;
        check_url("forecast", &self.forecast_url)?;

        if self.public_ip_timeout.is_zero() || self.lookup_timeout.is_zero() {
            return Err(invalid("timeouts must be greater than zero"));
        }
        if self.geocoder.count == 0 {
            return Err(invalid("geocoding candidate count must be at least 1"));
        }
        if self.geocoder.language.trim().is_empty() {
            return Err(invalid("geocoding language must not be empty"));
        }

        let default = &self.default_location;
        if !(-90.0..=90.0).contains(&default.latitude)
            || !(-180.0..=180.0).contains(&default.longitude)
        {
            return Err(invalid(format!(
                "default location {}, {} is out of range",
                default.latitude, default.longitude
            )));
        }
        if default.name.trim().is_empty() {
            return Err(invalid("default location name must not be empty"));
        }
        if let Some(tz) = &default.timezone
            && tz.parse::<chrono_tz::Tz>().is_err()
        {
            return Err(invalid(format!("unknown default timezone '{}'", tz)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.public_ip_endpoints.len(), 3);
        assert_eq!(config.geo_endpoints.len(), 3);
    }

    #[test]
    fn test_default_provider_order() {
        let config = ServiceConfig::default();
        assert_eq!(config.public_ip_endpoints[0].shape, EchoShape::JsonIp);
        assert_eq!(config.public_ip_endpoints[1].shape, EchoShape::PlainText);
        assert_eq!(config.geo_endpoints[0].shape, GeoShape::IpApiCo);
        assert_eq!(config.geo_endpoints[2].shape, GeoShape::IpApiCom);
        assert!(config.geo_endpoints[2].address_url.is_none());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ServiceConfig {
            lookup_timeout: Duration::ZERO,
            ..ServiceConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(WeatherServerError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_template_without_placeholder_rejected() {
        let mut config = ServiceConfig::default();
        config.geo_endpoints[0].address_url = Some("https://ipapi.co/json/".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_address_templates_are_checked() {
        let mut config = ServiceConfig::default();
        config.geo_endpoints[0].address_url = None;
        assert!(config.validate().is_ok());

        config.geo_endpoints[1].address_url = Some(format!("ipinfo io/{}/json", IP_PLACEHOLDER));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ipinfo io"));
    }

    #[test]
    fn test_bad_default_location_rejected() {
        let mut config = ServiceConfig::default();
        config.default_location.latitude = 91.0;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.default_location.timezone = Some("Mars/Olympus_Mons".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unparsable_endpoint_rejected() {
        let mut config = ServiceConfig::default();
        config.forecast_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }
}
