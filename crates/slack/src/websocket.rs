use std::time::Duration;

use async_trait::async_trait;
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{net::TcpStream, sync::Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use u360_core::config::SlackConfig;

use crate::{
    envelope::EventEnvelope,
    socket::{SocketError, SocketTransport},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Deserialize)]
struct ConnectionsOpenResponse {
    ok: bool,
    url: Option<String>,
    error: Option<String>,
}

/// Socket Mode over a websocket whose URL comes from `apps.connections.open`.
///
/// Every drop of the connection, including Slack's periodic `disconnect`
/// request, surfaces as a receive error so the runner reconnects.
pub struct WebSocketTransport {
    http: Client,
    app_token: SecretString,
    api_base_url: String,
    reader: Mutex<Option<SplitStream<WsStream>>>,
    writer: Mutex<Option<SplitSink<WsStream, Message>>>,
}

impl WebSocketTransport {
    pub fn new(
        app_token: SecretString,
        api_base_url: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let api_base_url = api_base_url.into().trim_end_matches('/').to_owned();
        Ok(Self {
            http,
            app_token,
            api_base_url,
            reader: Mutex::new(None),
            writer: Mutex::new(None),
        })
    }

    pub fn from_config(config: &SlackConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.app_token.clone(), config.api_base_url.clone())
    }

    /// Asks Slack for a fresh websocket URL, authenticated with the app token.
    async fn open_connection(&self) -> Result<String, SocketError> {
        let endpoint = format!("{}/apps.connections.open", self.api_base_url);
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(self.app_token.expose_secret())
            .send()
            .await
            .map_err(|error| {
                SocketError::Connect(format!("apps.connections.open request failed: {error}"))
            })?;

        let body: ConnectionsOpenResponse = response.json().await.map_err(|error| {
            SocketError::Connect(format!("apps.connections.open returned invalid json: {error}"))
        })?;

        if !body.ok {
            let error = body.error.as_deref().unwrap_or("unknown_error");
            return Err(SocketError::Connect(format!("apps.connections.open failed: {error}")));
        }

        body.url.ok_or_else(|| {
            SocketError::Connect("apps.connections.open returned no url".to_owned())
        })
    }

    async fn send(&self, message: Message) -> Result<(), String> {
        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or_else(|| "websocket is not connected".to_owned())?;
        sink.send(message).await.map_err(|error| error.to_string())
    }
}

#[async_trait]
impl SocketTransport for WebSocketTransport {
    async fn connect(&self) -> Result<(), SocketError> {
        let url = self.open_connection().await?;
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|error| SocketError::Connect(format!("websocket handshake failed: {error}")))?;

        let (sink, source) = stream.split();
        *self.writer.lock().await = Some(sink);
        *self.reader.lock().await = Some(source);
        info!(transport = self.name(), "socket mode websocket established");
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<EventEnvelope>, SocketError> {
        let mut reader = self.reader.lock().await;
        let source = reader
            .as_mut()
            .ok_or_else(|| SocketError::Receive("websocket is not connected".to_owned()))?;

        loop {
            let message = match source.next().await {
                Some(Ok(message)) => message,
                Some(Err(error)) => return Err(SocketError::Receive(error.to_string())),
                None => return Err(SocketError::Receive("websocket stream ended".to_owned())),
            };

            match message {
                Message::Text(text) => {
                    let frame: Value = match serde_json::from_str(&text) {
                        Ok(frame) => frame,
                        Err(error) => {
                            warn!(error = %error, "discarding socket frame that is not json");
                            continue;
                        }
                    };

                    if frame.get("type").and_then(Value::as_str) == Some("disconnect") {
                        let reason =
                            frame.get("reason").and_then(Value::as_str).unwrap_or("unspecified");
                        return Err(SocketError::Receive(format!(
                            "slack requested a reconnect ({reason})"
                        )));
                    }

                    match EventEnvelope::from_socket_frame(&frame) {
                        Ok(Some(envelope)) => return Ok(Some(envelope)),
                        Ok(None) => debug!("socket mode control frame received"),
                        Err(error) => warn!(error = %error, "discarding undecodable socket frame"),
                    }
                }
                Message::Ping(data) => {
                    self.send(Message::Pong(data)).await.map_err(SocketError::Receive)?;
                }
                Message::Close(frame) => {
                    return Err(SocketError::Receive(format!("websocket closed: {frame:?}")));
                }
                _ => {}
            }
        }
    }

    async fn acknowledge(
        &self,
        envelope_id: &str,
        payload: Option<Value>,
    ) -> Result<(), SocketError> {
        let mut ack = json!({ "envelope_id": envelope_id });
        if let Some(payload) = payload {
            ack["payload"] = payload;
        }
        self.send(Message::Text(ack.to_string().into())).await.map_err(SocketError::Acknowledge)
    }

    async fn disconnect(&self) -> Result<(), SocketError> {
        let sink = self.writer.lock().await.take();
        self.reader.lock().await.take();
        if let Some(mut sink) = sink {
            sink.close().await.map_err(|error| SocketError::Disconnect(error.to_string()))?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}
