use std::sync::Arc;

use liveness_srv::api::{ApiServer, AppState};
use liveness_srv::config::AppConfig;
use liveness_srv::logging::init_logging;
use liveness_srv::remote::{HttpLivenessApi, install_rustls_provider};
use liveness_srv::service::LivenessService;
use liveness_stream::{WebSocketTransport, WebSocketTransportConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    let _log_guard = init_logging(config.log_dir.as_deref())?;
    install_rustls_provider();

    let api = Arc::new(HttpLivenessApi::new(config.remote.clone())?);

    let mut transport_config = WebSocketTransportConfig::new(config.remote.stream_url.clone());
    if let Some(api_key) = &config.remote.api_key {
        transport_config = transport_config.with_header("x-api-key", api_key.clone());
    }
    let transport = Arc::new(WebSocketTransport::new(transport_config));

    let service = Arc::new(
        LivenessService::new(api, transport, config.stream.clone())
            .with_confidence_scale(config.remote.confidence_scale),
    );
    let server = ApiServer::new(config.server.clone(), AppState::new(service));

    let cancel_token = server.cancel_token();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            return;
        }
        info!("Received Ctrl-C, shutting down");
        cancel_token.cancel();
    });

    info!(
        region = %config.remote.region,
        max_video_bytes = config.stream.max_video_bytes,
        pace_locally = config.stream.pace_locally,
        "liveness-srv starting"
    );

    server.run().await?;
    Ok(())
}
