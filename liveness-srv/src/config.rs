//! Application configuration loaded from environment variables.

use std::time::Duration;

use liveness_stream::{ConfidenceScale, StreamConfig};

use crate::api::server::ApiServerConfig;
use crate::error::{Error, Result};

pub const DEFAULT_REGION: &str = "us-east-1";

/// Remote analysis service endpoints.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the JSON API (session creation, results)
    pub api_url: String,
    /// `wss://` endpoint of the streaming API
    pub stream_url: String,
    pub region: String,
    /// Sent as `x-api-key` on every remote call when set
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    /// Scale of the `Confidence` field in analysis results
    pub confidence_scale: ConfidenceScale,
}

impl RemoteConfig {
    pub fn for_region(region: &str) -> Self {
        Self {
            api_url: format!("https://rekognition.{region}.amazonaws.com"),
            stream_url: format!(
                "wss://streaming-rekognition.{region}.amazonaws.com:443/start-face-liveness-session-websocket"
            ),
            region: region.to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(30),
            confidence_scale: ConfidenceScale::Unit,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self::for_region(DEFAULT_REGION)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub server: ApiServerConfig,
    pub remote: RemoteConfig,
    pub stream: StreamConfig,
    /// Daily-rotated log files are written here when set
    pub log_dir: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::config(format!("{name} must be a boolean, got `{value}`"))),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| Error::config(format!("{name} must be a positive integer, got `{value}`")))
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    ///
    /// Supported variables:
    /// - `PORT` / `API_PORT`, `API_BIND_ADDRESS`, `CLIENT_URL`
    /// - `LIVENESS_REGION` (falls back to `AWS_REGION`), `LIVENESS_API_URL`,
    ///   `LIVENESS_STREAM_URL`, `LIVENESS_API_KEY`, `LIVENESS_REQUEST_TIMEOUT_SECS`,
    ///   `LIVENESS_CONFIDENCE_SCALE` (`unit` or `percent`)
    /// - `MAX_VIDEO_BYTES`, `PACE_LOCALLY`
    /// - `LOG_DIR`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_empty(lookup(key));

        let server = ApiServerConfig::from_lookup(&get);

        let region = get("LIVENESS_REGION")
            .or_else(|| get("AWS_REGION"))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let mut remote = RemoteConfig::for_region(&region);
        if let Some(api_url) = get("LIVENESS_API_URL") {
            remote.api_url = api_url;
        }
        if let Some(stream_url) = get("LIVENESS_STREAM_URL") {
            remote.stream_url = stream_url;
        }
        remote.api_key = get("LIVENESS_API_KEY");
        if let Some(secs) = get("LIVENESS_REQUEST_TIMEOUT_SECS") {
            remote.request_timeout =
                Duration::from_secs(parse_number("LIVENESS_REQUEST_TIMEOUT_SECS", &secs)?);
        }
        if let Some(scale) = get("LIVENESS_CONFIDENCE_SCALE") {
            remote.confidence_scale = scale.parse()?;
        }

        let mut stream = StreamConfig::default();
        if let Some(max) = get("MAX_VIDEO_BYTES") {
            stream = stream.with_max_video_bytes(parse_number("MAX_VIDEO_BYTES", &max)?);
        }
        if let Some(pace) = get("PACE_LOCALLY") {
            stream = stream.with_local_pacing(parse_flag("PACE_LOCALLY", &pace)?);
        }
        stream.validate()?;

        Ok(Self {
            server,
            remote,
            stream,
            log_dir: get("LOG_DIR"),
        })
    }
}
