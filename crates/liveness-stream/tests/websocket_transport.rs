use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::{SinkExt, StreamExt};
use liveness_stream::{
    Challenge, LivenessError, SegmentDecoder, StreamConfig, StreamSession, WebSocketTransport,
    WebSocketTransportConfig, video_events,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// What the fake streaming service does after accepting the connection.
#[derive(Clone, Copy)]
enum Behavior {
    /// Reads until the end marker, answers, then closes normally.
    Answer,
    /// Reports an exception after reading this many events.
    FailAfter(usize),
}

struct FakeService {
    endpoint: String,
    query: Arc<Mutex<Option<String>>>,
    handle: JoinHandle<Vec<Value>>,
}

async fn spawn_service(behavior: Behavior) -> FakeService {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let query = Arc::new(Mutex::new(None));
    let captured = query.clone();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
            *captured.lock().unwrap() = req.uri().query().map(str::to_string);
            Ok::<_, ErrorResponse>(resp)
        })
        .await
        .unwrap();

        let mut received = Vec::new();
        while let Some(Ok(message)) = ws.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            let value: Value = serde_json::from_str(text.as_str()).unwrap();
            let ended = value.get("EndOfStream").is_some();
            received.push(value);

            match behavior {
                Behavior::Answer if ended => {
                    let answer = json!({"ServerSessionInformationEvent": {"Received": received.len()}});
                    ws.send(Message::Text(answer.to_string().into())).await.unwrap();
                    break;
                }
                Behavior::FailAfter(limit) if received.len() == limit => {
                    let exception = json!({"ValidationException": {"Message": "video is too short"}});
                    ws.send(Message::Text(exception.to_string().into())).await.unwrap();
                    break;
                }
                _ => {}
            }
        }

        let _ = ws
            .close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "done".into(),
            }))
            .await;
        // Drain until the client completes the close handshake.
        while let Some(Ok(_)) = ws.next().await {}
        received
    });

    FakeService {
        endpoint: format!("ws://{addr}/liveness"),
        query,
        handle,
    }
}

fn challenge() -> Challenge {
    Challenge {
        challenge_id: "challenge-ws".to_string(),
        initial_face: json!({"BoundingBox": {"Width": 0.4}}),
        target_face: json!({"BoundingBox": {"Width": 0.6}}),
        color_displayed: json!({"SequenceNumber": 0}),
    }
}

fn config() -> StreamConfig {
    StreamConfig {
        chunk_size: 4,
        ..Default::default()
    }
}

async fn stream(endpoint: &str) -> liveness_stream::StreamOutcome {
    // 20 bytes in chunks of 4: five video events after the header.
    let segments = [STANDARD.encode(b"0123456789abcdefghij")];
    let video = SegmentDecoder::new(1024).decode(&segments).unwrap();
    let events = video_events(challenge(), 640, 480, video, &config(), 10_000).unwrap();

    let transport = Arc::new(WebSocketTransport::new(WebSocketTransportConfig::new(endpoint)));
    StreamSession::new(transport, config())
        .run("session-ws", 640, 480, events)
        .await
}

#[tokio::test]
async fn test_stream_reaches_service_and_returns_response() {
    let service = spawn_service(Behavior::Answer).await;

    let result = stream(&service.endpoint).await.unwrap();
    let received = service.handle.await.unwrap();

    assert_eq!(result.events_sent, 6);
    assert_eq!(result.chunks_sent, 5);
    assert_eq!(result.bytes_sent, 20);
    assert_eq!(result.response["ServerSessionInformationEvent"]["Received"], 7);

    // Header, five chunks, end marker.
    assert_eq!(received.len(), 7);
    let header = &received[0]["ClientSessionInformationEvent"]["Challenge"]["FaceMovementAndLightChallenge"];
    assert_eq!(header["ChallengeId"], "challenge-ws");
    assert_eq!(header["VideoStartTimestamp"], 10_000);
    assert_eq!(header["VideoEndTimestamp"], 10_250);

    let timestamps: Vec<u64> = received[1..6]
        .iter()
        .map(|event| event["VideoEvent"]["TimestampMillis"].as_u64().unwrap())
        .collect();
    assert_eq!(timestamps, vec![10_000, 10_050, 10_100, 10_150, 10_200]);
    assert_eq!(received[1]["VideoEvent"]["VideoChunk"], STANDARD.encode(b"0123"));
    assert!(received[6].get("EndOfStream").is_some());

    let query = service.query.lock().unwrap().clone().unwrap();
    assert!(query.contains("session-id=session-ws"));
    assert!(query.contains("video-width=640"));
    assert!(query.contains("video-height=480"));
}

#[tokio::test]
async fn test_service_exception_surfaces_raw_diagnostic() {
    let service = spawn_service(Behavior::FailAfter(3)).await;

    let err = stream(&service.endpoint).await.unwrap_err();
    let received = service.handle.await.unwrap();

    assert_eq!(received.len(), 3);
    match &err {
        LivenessError::Transport { raw, .. } => {
            let raw = raw.as_deref().expect("diagnostic payload");
            assert!(raw.contains("ValidationException"));
            assert!(raw.contains("video is too short"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_service_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = stream(&format!("ws://{addr}/liveness")).await.unwrap_err();
    assert!(matches!(err, LivenessError::Transport { .. }));
}
