use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use liveness_srv::config::RemoteConfig;
use liveness_srv::error::Error;
use liveness_srv::remote::{HttpLivenessApi, LivenessApi};
use serde_json::{Value, json};
use tokio::net::TcpListener;

async fn upstream_handler(headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let body: Value = serde_json::from_slice(&body).unwrap_or_default();
    let target = headers
        .get("x-amz-target")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let api_key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    match target.as_str() {
        "RekognitionService.CreateFaceLivenessSession" => {
            let token = body["ClientRequestToken"].as_str().unwrap_or_default();
            (
                StatusCode::OK,
                Json(json!({
                    "SessionId": "remote-session",
                    "EchoToken": token,
                    "EchoKey": api_key
                })),
            )
        }
        "RekognitionService.GetFaceLivenessSessionResults" => {
            if body["SessionId"] == "unknown" {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"__type": "SessionNotFoundException", "Message": "no such session"})),
                )
            } else {
                (
                    StatusCode::OK,
                    Json(json!({
                        "SessionId": body["SessionId"],
                        "Status": "LIVENESS_CONFIRMED",
                        "Confidence": 0.97
                    })),
                )
            }
        }
        "RekognitionService.ListCollections" => {
            (StatusCode::OK, Json(json!({"CollectionIds": []})))
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({"__type": "UnknownOperationException"})),
        ),
    }
}

async fn spawn_upstream() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/", post(upstream_handler));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/")
}

fn client(api_url: String) -> HttpLivenessApi {
    let config = RemoteConfig {
        api_url,
        api_key: Some("test-key".to_string()),
        request_timeout: Duration::from_secs(5),
        ..RemoteConfig::default()
    };
    HttpLivenessApi::new(config).unwrap()
}

#[tokio::test]
async fn test_create_session_sends_request_token() {
    let api = client(spawn_upstream().await);

    let session = api.create_session().await.unwrap();

    assert_eq!(session.session_id, "remote-session");
    let token = session.raw["EchoToken"].as_str().unwrap();
    assert_eq!(token.len(), 36);
    assert_eq!(session.raw["EchoKey"], "test-key");
}

#[tokio::test]
async fn test_fetch_result_parses_fields() {
    let api = client(spawn_upstream().await);

    let result = api.fetch_result("session-9").await.unwrap();

    assert_eq!(result.confidence, Some(0.97));
    assert_eq!(result.status.as_deref(), Some("LIVENESS_CONFIRMED"));
    assert_eq!(result.raw["SessionId"], "session-9");
}

#[tokio::test]
async fn test_remote_error_keeps_status_and_body() {
    let api = client(spawn_upstream().await);

    let err = api.fetch_result("unknown").await.unwrap_err();

    match err {
        Error::RemoteStatus { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("SessionNotFoundException"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_connectivity_check() {
    let api = client(spawn_upstream().await);
    let response = api.check_connectivity().await.unwrap();
    assert!(response["CollectionIds"].is_array());
}

#[tokio::test]
async fn test_unreachable_remote_is_http_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = client(format!("http://{addr}/"));
    let err = api.check_connectivity().await.unwrap_err();
    assert!(matches!(err, Error::Http(_)));
}
