//! Client for the remote liveness analysis API.
//!
//! Session creation, result retrieval and the connectivity probe are one-shot JSON
//! calls. The video itself goes through the streaming transport, not this client.

use std::sync::OnceLock;

use async_trait::async_trait;
use liveness_stream::LivenessError;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::RemoteConfig;
use crate::error::{Error, Result};

const TARGET_PREFIX: &str = "RekognitionService";
const JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate installed one first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// A freshly created remote session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
    pub session_id: String,
    pub raw: Value,
}

/// The analysis result of a session, with the fields the verdict needs pulled out.
#[derive(Debug, Clone)]
pub struct SessionResult {
    pub confidence: Option<f64>,
    pub status: Option<String>,
    pub raw: Value,
}

impl SessionResult {
    pub fn from_raw(raw: Value) -> Self {
        Self {
            confidence: raw.get("Confidence").and_then(Value::as_f64),
            status: raw.get("Status").and_then(Value::as_str).map(str::to_string),
            raw,
        }
    }
}

#[async_trait]
pub trait LivenessApi: Send + Sync {
    async fn create_session(&self) -> Result<CreatedSession>;

    async fn fetch_result(&self, session_id: &str) -> Result<SessionResult>;

    /// A cheap authenticated call proving the remote service is reachable.
    async fn check_connectivity(&self) -> Result<Value>;
}

pub struct HttpLivenessApi {
    client: reqwest::Client,
    config: RemoteConfig,
}

impl HttpLivenessApi {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        install_rustls_provider();
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    async fn call(&self, operation: &str, body: Value) -> Result<Value> {
        let mut request = self
            .client
            .post(&self.config.api_url)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{operation}"))
            .body(serde_json::to_vec(&body)?);
        if let Some(api_key) = &self.config.api_key {
            request = request.header("x-api-key", api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(operation, status = status.as_u16(), "Remote call failed");
            return Err(Error::RemoteStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        debug!(operation, "Remote call succeeded");
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl LivenessApi for HttpLivenessApi {
    async fn create_session(&self) -> Result<CreatedSession> {
        let token = Uuid::new_v4().to_string();
        let raw = self
            .call(
                "CreateFaceLivenessSession",
                json!({ "ClientRequestToken": token }),
            )
            .await?;

        let session_id = raw
            .get("SessionId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| LivenessError::invalid_result("session response has no SessionId"))?;

        Ok(CreatedSession { session_id, raw })
    }

    async fn fetch_result(&self, session_id: &str) -> Result<SessionResult> {
        let raw = self
            .call(
                "GetFaceLivenessSessionResults",
                json!({ "SessionId": session_id }),
            )
            .await?;
        Ok(SessionResult::from_raw(raw))
    }

    async fn check_connectivity(&self) -> Result<Value> {
        self.call("ListCollections", json!({ "MaxResults": 1 })).await
    }
}
