use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use crate::error::{LivenessError, Result};
use crate::framer::ProtocolEvent;
use crate::session::{EventSink, StreamParams, StreamTransport};
use crate::transport::wire;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a failed send waits for the server's diagnostic message.
const DIAGNOSTIC_GRACE: Duration = Duration::from_millis(500);

/// How long an abort waits for the close frame to be written.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct WebSocketTransportConfig {
    /// `ws://` or `wss://` endpoint of the streaming service
    pub endpoint: String,
    /// Extra headers sent with the upgrade request
    pub headers: Vec<(String, String)>,
}

impl WebSocketTransportConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Streams liveness events over a WebSocket, one JSON text frame per event.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    config: WebSocketTransportConfig,
}

impl WebSocketTransport {
    pub fn new(config: WebSocketTransportConfig) -> Self {
        Self { config }
    }
}

fn connect_error(error: tungstenite::Error) -> LivenessError {
    match error {
        tungstenite::Error::Http(response) => {
            let status = response.status();
            match response.body().as_deref() {
                Some(body) if !body.is_empty() => LivenessError::transport_with_raw(
                    format!("stream upgrade rejected with HTTP {status}"),
                    String::from_utf8_lossy(body).into_owned(),
                ),
                _ => LivenessError::transport(format!("stream upgrade rejected with HTTP {status}")),
            }
        }
        other => LivenessError::transport(format!("failed to connect stream: {other}")),
    }
}

#[async_trait]
impl StreamTransport for WebSocketTransport {
    async fn open(&self, params: &StreamParams) -> Result<Box<dyn EventSink>> {
        let url = wire::stream_url(&self.config.endpoint, params)?;

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| LivenessError::configuration(format!("invalid stream request: {e}")))?;

        for (name, value) in &self.config.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                LivenessError::configuration(format!("invalid header name `{name}`: {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                LivenessError::configuration(format!("invalid value for header `{name}`: {e}"))
            })?;
            request.headers_mut().insert(name, value);
        }

        let (stream, response) = connect_async(request).await.map_err(connect_error)?;
        info!(
            session_id = %params.session_id,
            status = %response.status(),
            "Connected liveness stream"
        );

        let (writer, reader) = stream.split();
        let (terminal_tx, terminal_rx) = oneshot::channel();
        let reader = tokio::spawn(read_responses(
            reader,
            terminal_tx,
            params.session_id.clone(),
        ));

        Ok(Box::new(WebSocketSink {
            session_id: params.session_id.clone(),
            writer,
            terminal_rx,
            reader,
        }))
    }
}

fn parse_message(payload: &[u8]) -> Result<Value> {
    let value: Value = serde_json::from_slice(payload).map_err(|e| {
        LivenessError::transport_with_raw(
            format!("undecodable stream response: {e}"),
            String::from_utf8_lossy(payload).into_owned(),
        )
    })?;

    if let Some(name) = wire::exception_name(&value) {
        return Err(LivenessError::transport_with_raw(
            format!("remote reported {name}"),
            value.to_string(),
        ));
    }
    Ok(value)
}

fn close_outcome(last: Option<Value>, frame: Option<CloseFrame>) -> Result<Value> {
    if let Some(frame) = frame
        && !matches!(frame.code, CloseCode::Normal | CloseCode::Away)
    {
        return Err(LivenessError::transport_with_raw(
            format!("stream closed with code {}", frame.code),
            (*frame.reason).to_string(),
        ));
    }
    last.ok_or_else(|| LivenessError::transport("stream closed without a response"))
}

/// Reads server messages until the stream terminates.
///
/// The last regular message before a clean close is the session response. An
/// exception message, a protocol error or an abnormal close end the stream with an
/// error instead.
async fn read_responses(
    mut reader: SplitStream<WsStream>,
    terminal_tx: oneshot::Sender<Result<Value>>,
    session_id: String,
) {
    let mut last: Option<Value> = None;

    let outcome = loop {
        match reader.next().await {
            Some(Ok(Message::Text(text))) => match parse_message(text.as_bytes()) {
                Ok(value) => {
                    trace!(session_id = %session_id, "Received stream message");
                    last = Some(value);
                }
                Err(e) => break Err(e),
            },
            Some(Ok(Message::Binary(data))) => match parse_message(&data) {
                Ok(value) => last = Some(value),
                Err(e) => break Err(e),
            },
            Some(Ok(Message::Close(frame))) => break close_outcome(last.take(), frame),
            // Ping/pong are answered by tungstenite itself.
            Some(Ok(_)) => {}
            Some(Err(e)) => break Err(LivenessError::transport(format!("websocket error: {e}"))),
            None => break close_outcome(last.take(), None),
        }
    };

    if let Err(e) = &outcome {
        debug!(session_id = %session_id, error = %e, "Liveness stream terminated");
    }
    let _ = terminal_tx.send(outcome);
}

struct WebSocketSink {
    session_id: String,
    writer: SplitSink<WsStream, Message>,
    terminal_rx: oneshot::Receiver<Result<Value>>,
    reader: JoinHandle<()>,
}

impl WebSocketSink {
    /// Fails if the remote already ended the stream.
    fn check_terminal(&mut self) -> Result<()> {
        match self.terminal_rx.try_recv() {
            Err(oneshot::error::TryRecvError::Empty) => Ok(()),
            Ok(Ok(value)) => Err(LivenessError::transport_with_raw(
                "remote ended the stream before all events were sent",
                value.to_string(),
            )),
            Ok(Err(e)) => Err(e),
            Err(oneshot::error::TryRecvError::Closed) => {
                Err(LivenessError::transport("stream response reader stopped"))
            }
        }
    }

    /// Builds a send failure, attaching the server's diagnostic if it arrives shortly.
    async fn failure(&mut self, reason: String) -> LivenessError {
        match tokio::time::timeout(DIAGNOSTIC_GRACE, &mut self.terminal_rx).await {
            Ok(Ok(Err(LivenessError::Transport { raw: Some(raw), .. }))) => {
                LivenessError::transport_with_raw(reason, raw)
            }
            Ok(Ok(Ok(value))) => LivenessError::transport_with_raw(reason, value.to_string()),
            _ => LivenessError::transport(reason),
        }
    }

    async fn write(&mut self, payload: String, kind: &str) -> Result<()> {
        if let Err(e) = self.writer.send(Message::Text(payload.into())).await {
            warn!(session_id = %self.session_id, error = %e, "Failed to write {} event", kind);
            return Err(self.failure(format!("failed to send {kind} event: {e}")).await);
        }
        Ok(())
    }
}

#[async_trait]
impl EventSink for WebSocketSink {
    async fn send(&mut self, event: ProtocolEvent) -> Result<()> {
        self.check_terminal()?;
        let payload = wire::encode_event(&event)?;
        self.write(payload, event.kind()).await
    }

    async fn finish(mut self: Box<Self>) -> Result<Value> {
        self.check_terminal()?;
        self.write(wire::end_of_stream()?, "end_of_stream").await?;

        let outcome = match (&mut self.terminal_rx).await {
            Ok(outcome) => outcome,
            Err(_) => Err(LivenessError::transport(
                "stream response reader stopped without a result",
            )),
        };

        let _ = self.writer.close().await;
        outcome
    }

    async fn abort(mut self: Box<Self>, reason: &str) {
        debug!(session_id = %self.session_id, reason, "Aborting liveness stream");
        let close = Message::Close(Some(CloseFrame {
            code: CloseCode::Away,
            reason: reason.to_string().into(),
        }));
        let _ = tokio::time::timeout(CLOSE_GRACE, self.writer.send(close)).await;
        self.reader.abort();
    }
}

impl Drop for WebSocketSink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
