use std::sync::Arc;

use rmcp::{
    RoleServer, ServerHandler,
    handler::server::{
        router::{prompt::PromptRouter, tool::ToolRouter},
        wrapper::Parameters,
    },
    model::*,
    prompt, prompt_handler, prompt_router,
    service::RequestContext,
    tool, tool_handler, tool_router,
};

use crate::config::ServiceConfig;
use crate::core::{
    error::{McpResult, WeatherServerError, WeatherServerResult},
    http::{HttpFetch, ReqwestFetcher, build_client},
    models::{
        GetCurrentTimeRequest, GetCurrentWeatherRequest, GetWeatherForecastRequest, LocationQuery,
        ResolvedLocation, Validate,
    },
    resolver::LocationResolver,
    spoken::{current_time_for, render_time},
    weather::{WeatherClient, render_current, render_forecast},
};

/// Weather MCP Server with location resolution
#[derive(Clone)]
pub struct WeatherService {
    config: Arc<ServiceConfig>,
    resolver: LocationResolver,
    weather: WeatherClient,
    tool_router: ToolRouter<WeatherService>,
    prompt_router: PromptRouter<WeatherService>,
}

impl WeatherService {
    pub fn new(config: ServiceConfig, fetcher: Arc<dyn HttpFetch>) -> Self {
        let resolver = LocationResolver::new(&config, fetcher.clone());
        let weather = WeatherClient::new(fetcher, config.forecast_url.clone(), config.lookup_timeout);

        Self {
            config: Arc::new(config),
            resolver,
            weather,
            tool_router: Self::tool_router(),
            prompt_router: Self::prompt_router(),
        }
    }

    fn create_resource_text(&self, uri: &str, name: &str) -> Resource {
        RawResource::new(uri, name.to_string()).no_annotation()
    }

    async fn resolve(&self, query: &LocationQuery) -> WeatherServerResult<ResolvedLocation> {
        let location = self
            .resolver
            .resolve(query)
            .await
            .map_err(WeatherServerError::from)?;
        tracing::info!(
            "Resolved location: {} ({}, {}) via {}",
            location.display_name,
            location.latitude,
            location.longitude,
            location.origin
        );
        Ok(location)
    }

    fn generate_status_content(&self) -> String {
        let config = &self.config;
        let list = |urls: Vec<&str>| {
            urls.iter()
                .enumerate()
                .map(|(i, url)| format!("  {}. {}", i + 1, url))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let default = &config.default_location;

        format!(
            r#"Weather MCP Server Status

Server: Running
Tools Available: 3
Prompts Available: 1
Resources Available: 2

Public IP services:
{}

Geolocation providers:
{}

Geocoding: {} (language: {}, candidates: {})
Forecast: {}

Timeouts:
- Public IP lookup: {}s
- Geolocation, geocoding and weather: {}s

Default location: {} ({}, {}), timezone {}"#,
            list(config.public_ip_endpoints.iter().map(|e| e.url.as_str()).collect()),
            list(config.geo_endpoints.iter().map(|e| e.url.as_str()).collect()),
            config.geocoder.url,
            config.geocoder.language,
            config.geocoder.count,
            config.forecast_url,
            config.public_ip_timeout.as_secs(),
            config.lookup_timeout.as_secs(),
            default.name,
            default.latitude,
            default.longitude,
            default.timezone.as_deref().unwrap_or("UTC")
        )
    }

    fn generate_help_content(&self) -> &'static str {
        r#"Weather MCP Server Help

TOOLS:
- get_current_weather: Current conditions for a location
  - location_name: Place name, e.g. 'London, UK' (optional)
  - latitude / longitude: Coordinates, both required together (optional)
  - client_ip: Caller IP address used for geolocation (optional)
  - Example: {"location_name": "Paris, France"}

- get_weather_forecast: Day-by-day forecast for a location
  - Same location arguments as get_current_weather
  - days: Number of days, 1-7 (default 3)
  - Example: {"latitude": 35.6895, "longitude": 139.6917, "days": 5}

- get_current_time: Spoken local time for a location
  - location_name: Place name (optional)
  - client_ip: Caller IP address used for geolocation (optional)
  - Example: {"location_name": "Tokyo"}

PROMPTS:
- location_guidance: How locations are resolved

RESOURCES:
- weather://status: Configured providers, timeouts and default location
- weather://help: This help documentation

LOCATION RESOLUTION:
1. latitude + longitude, when both are given
2. location_name, geocoded; an unknown name is an error
3. client_ip, when it is a public address
4. the server's own public IP address
5. the configured default location

Results resolved from an IP address are marked "(IP-based)" and the default
location is marked "(default fallback)"."#
    }
}

#[tool_router]
impl WeatherService {
    #[tool(
        description = "Get current weather for a location. Provide a location name, coordinates, or a client IP; with none of these the server's own location is used."
    )]
    pub(crate) async fn get_current_weather(
        &self,
        Parameters(req): Parameters<GetCurrentWeatherRequest>,
    ) -> McpResult<CallToolResult> {
        req.validate()?;
        let location = self.resolve(&req.location_query()).await?;

        tracing::info!("Fetching current weather for {}", location.headline());
        let report = self
            .weather
            .current(location.latitude, location.longitude)
            .await?;

        Ok(CallToolResult::success(vec![Content::text(render_current(
            &location, &report,
        ))]))
    }

    #[tool(
        description = "Get a multi-day weather forecast (1-7 days, default 3) for a location given by name, coordinates, or client IP."
    )]
    pub(crate) async fn get_weather_forecast(
        &self,
        Parameters(req): Parameters<GetWeatherForecastRequest>,
    ) -> McpResult<CallToolResult> {
        req.validate()?;
        let days = req.clamped_days();
        let location = self.resolve(&req.location_query()).await?;

        tracing::info!("Fetching {}-day forecast for {}", days, location.headline());
        let report = self
            .weather
            .forecast(location.latitude, location.longitude, days)
            .await?;

        Ok(CallToolResult::success(vec![Content::text(
            render_forecast(&location, &report, days),
        )]))
    }

    #[tool(description = "Get the current local time in words for a location given by name or client IP.")]
    pub(crate) async fn get_current_time(
        &self,
        Parameters(req): Parameters<GetCurrentTimeRequest>,
    ) -> McpResult<CallToolResult> {
        let location = self.resolve(&req.location_query()).await?;
        let time = current_time_for(&location);

        Ok(CallToolResult::success(vec![Content::text(render_time(
            &time,
        ))]))
    }
}

#[prompt_router]
impl WeatherService {
    /// Explain how the server decides which location a request is about
    #[prompt(name = "location_guidance")]
    async fn location_guidance(
        &self,
        _ctx: RequestContext<rmcp::RoleServer>,
    ) -> McpResult<Vec<PromptMessage>> {
        let guidance = format!(
            r#"Location Resolution Guide:

1. **Coordinates**
   - Pass both latitude (-90 to 90) and longitude (-180 to 180)
   - They always win over every other argument
   - A single coordinate on its own is ignored

2. **Place Names**
   - Pass location_name, e.g. 'Springfield, Illinois, USA'
   - If the full name is unknown, shorter forms are tried ('Springfield, Illinois', then 'Springfield')
   - A name that cannot be found is reported as an error; the server never silently switches to IP lookup

3. **IP Geolocation**
   - Pass client_ip with the end user's public address
   - Private addresses (192.168.x.x, 10.x.x.x, 127.0.0.1) are replaced by the server's own public address
   - Results are marked "(IP-based)" and are approximate, often city-level

4. **Default Location**
   - When every geolocation provider fails, {} is used
   - Results are marked "(default fallback)"

5. **Tips**
   - Prefer coordinates for precise results
   - Add the country to ambiguous names: 'Paris, France' rather than 'Paris'"#,
            self.config.default_location.name
        );

        Ok(vec![PromptMessage {
            role: PromptMessageRole::Assistant,
            content: PromptMessageContent::text(guidance),
        }])
    }
}

#[tool_handler]
#[prompt_handler]
impl ServerHandler for WeatherService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_prompts()
                .enable_resources()
                .enable_tools()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(format!(
                "Weather MCP Server. Tools: get_current_weather, get_weather_forecast, get_current_time. Locations resolve from coordinates, a place name, a client IP or the server's public IP, falling back to {}.",
                self.config.default_location.name
            )),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _: RequestContext<rmcp::RoleServer>,
    ) -> McpResult<ListResourcesResult> {
        Ok(ListResourcesResult {
            resources: vec![
                self.create_resource_text("weather://status", "server-status"),
                self.create_resource_text("weather://help", "help-documentation"),
            ],
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri }: ReadResourceRequestParam,
        _: RequestContext<rmcp::RoleServer>,
    ) -> McpResult<ReadResourceResult> {
        match uri.as_str() {
            "weather://status" => {
                let status = self.generate_status_content();
                Ok(ReadResourceResult {
                    contents: vec![ResourceContents::text(status, uri)],
                })
            }
            "weather://help" => Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(self.generate_help_content(), uri)],
            }),
            _ => Err(WeatherServerError::ResourceNotFound {
                uri: uri.to_string(),
            }
            .into()),
        }
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParam>,
        _: RequestContext<rmcp::RoleServer>,
    ) -> McpResult<ListResourceTemplatesResult> {
        Ok(ListResourceTemplatesResult {
            next_cursor: None,
            resource_templates: Vec::new(),
        })
    }

    async fn initialize(
        &self,
        _request: InitializeRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> McpResult<InitializeResult> {
        tracing::info!("Weather MCP Server initialized successfully");
        Ok(self.get_info())
    }
}

pub async fn run(config: ServiceConfig) -> Result<(), Box<dyn std::error::Error>> {
    use rmcp::{ServiceExt, transport::stdio};

    let client = build_client(config.user_agent.as_deref(), config.proxy_url.as_deref())?;
    let fetcher: Arc<dyn HttpFetch> = Arc::new(ReqwestFetcher::new(client));

    let service = WeatherService::new(config, fetcher)
        .serve(stdio())
        .await
        .inspect_err(|e| {
            tracing::error!("serving error: {:?}", e);
        })?;

    service.waiting().await?;
    Ok(())
}
