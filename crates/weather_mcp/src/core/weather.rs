//! Open-Meteo forecast client and Markdown rendering.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::core::error::{WeatherServerError, WeatherServerResult};
use crate::core::http::HttpFetch;
use crate::core::models::ResolvedLocation;
use crate::core::utils::or_na;

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,is_day,\
precipitation,rain,showers,snowfall,weather_code,cloud_cover,pressure_msl,surface_pressure,\
wind_speed_10m,wind_direction_10m,wind_gusts_10m";

const DAILY_FIELDS: &str = "weather_code,temperature_2m_max,temperature_2m_min,\
apparent_temperature_max,apparent_temperature_min,sunrise,sunset,precipitation_sum,rain_sum,\
showers_sum,snowfall_sum,precipitation_hours,precipitation_probability_max,wind_speed_10m_max,\
wind_gusts_10m_max,wind_direction_10m_dominant";

/// Human-readable description of a WMO weather interpretation code
pub fn describe_weather_code(code: Option<u32>) -> &'static str {
    match code {
        Some(0) => "Clear sky",
        Some(1) => "Mainly clear",
        Some(2) => "Partly cloudy",
        Some(3) => "Overcast",
        Some(45) => "Fog",
        Some(48) => "Depositing rime fog",
        Some(51) => "Light drizzle",
        Some(53) => "Moderate drizzle",
        Some(55) => "Dense drizzle",
        Some(56) => "Light freezing drizzle",
        Some(57) => "Dense freezing drizzle",
        Some(61) => "Slight rain",
        Some(63) => "Moderate rain",
        Some(65) => "Heavy rain",
        Some(66) => "Light freezing rain",
        Some(67) => "Heavy freezing rain",
        Some(71) => "Slight snow fall",
        Some(73) => "Moderate snow fall",
        Some(75) => "Heavy snow fall",
        Some(77) => "Snow grains",
        Some(80) => "Slight rain showers",
        Some(81) => "Moderate rain showers",
        Some(82) => "Violent rain showers",
        Some(85) => "Slight snow showers",
        Some(86) => "Heavy snow showers",
        Some(95) => "Thunderstorm",
        Some(96) => "Thunderstorm with slight hail",
        Some(99) => "Thunderstorm with heavy hail",
        _ => "Unknown",
    }
}

/// Unit labels keyed by variable name, as reported in `*_units`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Units(HashMap<String, String>);

impl Units {
    fn get(&self, variable: &str, fallback: &str) -> String {
        self.0
            .get(variable)
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentValues {
    pub time: Option<String>,
    pub temperature_2m: Option<f64>,
    pub relative_humidity_2m: Option<f64>,
    pub apparent_temperature: Option<f64>,
    pub precipitation: Option<f64>,
    pub rain: Option<f64>,
    pub snowfall: Option<f64>,
    pub weather_code: Option<u32>,
    pub cloud_cover: Option<f64>,
    pub pressure_msl: Option<f64>,
    pub wind_speed_10m: Option<f64>,
    pub wind_direction_10m: Option<f64>,
    pub wind_gusts_10m: Option<f64>,
}

/// Current conditions as returned by the forecast endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentReport {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    #[serde(default)]
    pub current: CurrentValues,
    #[serde(default)]
    pub current_units: Units,
}

/// Column-oriented daily series; every vector is indexed by day
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DailySeries {
    pub time: Vec<String>,
    pub weather_code: Vec<Option<u32>>,
    pub temperature_2m_max: Vec<Option<f64>>,
    pub temperature_2m_min: Vec<Option<f64>>,
    pub apparent_temperature_max: Vec<Option<f64>>,
    pub apparent_temperature_min: Vec<Option<f64>>,
    pub sunrise: Vec<Option<String>>,
    pub sunset: Vec<Option<String>>,
    pub precipitation_sum: Vec<Option<f64>>,
    pub precipitation_probability_max: Vec<Option<f64>>,
    pub wind_speed_10m_max: Vec<Option<f64>>,
    pub wind_gusts_10m_max: Vec<Option<f64>>,
}

fn nth<T: Clone>(series: &[Option<T>], day: usize) -> Option<T> {
    series.get(day).cloned().flatten()
}

/// Clock part of an ISO local datetime such as "2024-06-01T05:12"
fn clock_part(datetime: Option<String>) -> String {
    match datetime {
        Some(dt) => dt.get(11..).unwrap_or(dt.as_str()).to_string(),
        None => "N/A".to_string(),
    }
}

/// Multi-day forecast as returned by the forecast endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastReport {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    #[serde(default)]
    pub daily: DailySeries,
    #[serde(default)]
    pub daily_units: Units,
}

/// Fetches weather data for resolved coordinates
#[derive(Clone)]
pub struct WeatherClient {
    fetcher: Arc<dyn HttpFetch>,
    forecast_url: String,
    timeout: Duration,
}

impl WeatherClient {
    pub fn new(fetcher: Arc<dyn HttpFetch>, forecast_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            fetcher,
            forecast_url: forecast_url.into(),
            timeout,
        }
    }

    pub async fn current(&self, latitude: f64, longitude: f64) -> WeatherServerResult<CurrentReport> {
        tracing::info!("Getting current weather for coordinates: {}, {}", latitude, longitude);

        let params = [
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("current", CURRENT_FIELDS.to_string()),
            ("timezone", "auto".to_string()),
            ("forecast_days", "1".to_string()),
        ];
        let report = self.fetch(&params).await?;

        tracing::info!("Successfully retrieved current weather data");
        Ok(report)
    }

    pub async fn forecast(
        &self,
        latitude: f64,
        longitude: f64,
        days: u8,
    ) -> WeatherServerResult<ForecastReport> {
        tracing::info!(
            "Getting {}-day forecast for coordinates: {}, {}",
            days,
            latitude,
            longitude
        );

        let params = [
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("daily", DAILY_FIELDS.to_string()),
            ("timezone", "auto".to_string()),
            ("forecast_days", days.to_string()),
        ];
        let report = self.fetch(&params).await?;

        tracing::info!("Successfully retrieved {}-day forecast data", days);
        Ok(report)
    }

    async fn fetch<T: DeserializeOwned>(&self, params: &[(&str, String)]) -> WeatherServerResult<T> {
        let body = self
            .fetcher
            .get_json(&self.forecast_url, params, self.timeout)
            .await
            .map_err(|e| {
                tracing::error!("Error getting weather data: {}", e);
                WeatherServerError::WeatherUnavailable {
                    message: e.to_string(),
                }
            })?;

        serde_json::from_value(body).map_err(|e| {
            tracing::error!("Unexpected weather response: {}", e);
            WeatherServerError::WeatherUnavailable {
                message: e.to_string(),
            }
        })
    }
}

fn footer_coordinates(location: &ResolvedLocation, latitude: Option<f64>, longitude: Option<f64>) -> String {
    format!(
        "{:.4}, {:.4}",
        latitude.unwrap_or(location.latitude),
        longitude.unwrap_or(location.longitude)
    )
}

/// Markdown summary of current conditions
pub fn render_current(location: &ResolvedLocation, report: &CurrentReport) -> String {
    let c = &report.current;
    let units = &report.current_units;
    let temp_unit = units.get("temperature_2m", "°C");
    let precip_unit = units.get("precipitation", "mm");
    let wind_unit = units.get("wind_speed_10m", "km/h");

    let mut text = format!("# Current Weather - {}\n\n", location.headline());
    let _ = writeln!(
        text,
        "**Temperature**: {}{} (Feels like {}{})",
        or_na(c.temperature_2m),
        temp_unit,
        or_na(c.apparent_temperature),
        temp_unit
    );
    let _ = writeln!(text, "**Conditions**: {}", describe_weather_code(c.weather_code));
    let _ = writeln!(
        text,
        "**Humidity**: {}{}",
        or_na(c.relative_humidity_2m),
        units.get("relative_humidity_2m", "%")
    );
    let _ = writeln!(
        text,
        "**Cloud Cover**: {}{}",
        or_na(c.cloud_cover),
        units.get("cloud_cover", "%")
    );
    let _ = writeln!(
        text,
        "**Pressure**: {}{}",
        or_na(c.pressure_msl),
        units.get("pressure_msl", "hPa")
    );
    let _ = writeln!(
        text,
        "**Wind**: {}{} from {}° direction",
        or_na(c.wind_speed_10m),
        wind_unit,
        or_na(c.wind_direction_10m)
    );
    let _ = writeln!(text, "**Precipitation**: {}{}", or_na(c.precipitation), precip_unit);
    let _ = writeln!(text, "**Rain**: {}{}", or_na(c.rain), precip_unit);
    let _ = writeln!(text, "**Snowfall**: {}{}", or_na(c.snowfall), precip_unit);
    text.push('\n');
    let _ = writeln!(
        text,
        "*Location*: {}",
        footer_coordinates(location, report.latitude, report.longitude)
    );
    let _ = writeln!(text, "*Timezone*: {}", or_na(report.timezone.as_deref()));
    let _ = write!(text, "*Last Updated*: {}", or_na(c.time.as_deref()));

    text
}

/// Markdown day-by-day forecast
pub fn render_forecast(location: &ResolvedLocation, report: &ForecastReport, days: u8) -> String {
    let d = &report.daily;
    let units = &report.daily_units;
    let temp_unit = units.get("temperature_2m_max", "°C");
    let precip_unit = units.get("precipitation_sum", "mm");
    let wind_unit = units.get("wind_speed_10m_max", "km/h");

    let mut text = format!("# {}-Day Weather Forecast - {}\n\n", days, location.headline());

    for (i, date) in d.time.iter().enumerate() {
        let _ = writeln!(text, "## {}", date);
        let _ = writeln!(
            text,
            "**Conditions**: {}",
            describe_weather_code(nth(&d.weather_code, i))
        );
        let _ = writeln!(
            text,
            "**Temperature**: {} to {}{}",
            or_na(nth(&d.temperature_2m_min, i)),
            or_na(nth(&d.temperature_2m_max, i)),
            temp_unit
        );
        let _ = writeln!(
            text,
            "**Feels like**: {} to {}{}",
            or_na(nth(&d.apparent_temperature_min, i)),
            or_na(nth(&d.apparent_temperature_max, i)),
            temp_unit
        );
        let _ = write!(
            text,
            "**Precipitation**: {}{}",
            or_na(nth(&d.precipitation_sum, i)),
            precip_unit
        );
        if let Some(chance) = nth(&d.precipitation_probability_max, i)
            && chance > 0.0
        {
            let _ = write!(text, " ({}% chance)", chance);
        }
        text.push('\n');
        let _ = writeln!(
            text,
            "**Wind**: Up to {}{} with gusts to {}{}",
            or_na(nth(&d.wind_speed_10m_max, i)),
            wind_unit,
            or_na(nth(&d.wind_gusts_10m_max, i)),
            wind_unit
        );
        let _ = writeln!(
            text,
            "**Sunrise**: {} | **Sunset**: {}\n",
            clock_part(nth(&d.sunrise, i)),
            clock_part(nth(&d.sunset, i))
        );
    }

    let _ = writeln!(
        text,
        "*Location*: {}",
        footer_coordinates(location, report.latitude, report.longitude)
    );
    let _ = write!(text, "*Timezone*: {}", or_na(report.timezone.as_deref()));

    text
}
