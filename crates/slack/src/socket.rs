use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use u360_core::config::SocketConfig;

use crate::{
    ack::{AckHandle, Acknowledger},
    dispatch::EventDispatcher,
    envelope::{AckMode, EventEnvelope},
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SocketError {
    #[error("socket failed to connect: {0}")]
    Connect(String),
    #[error("socket read failed: {0}")]
    Receive(String),
    #[error("socket ack failed: {0}")]
    Acknowledge(String),
    #[error("socket disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    pub fn from_config(config: &SocketConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Inbound side of a Slack socket connection. Implementations decode frames
/// into envelopes; `Ok(None)` means the stream closed cleanly.
#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), SocketError>;
    async fn next_envelope(&self) -> Result<Option<EventEnvelope>, SocketError>;
    async fn acknowledge(
        &self,
        envelope_id: &str,
        payload: Option<Value>,
    ) -> Result<(), SocketError>;
    async fn disconnect(&self) -> Result<(), SocketError>;

    fn name(&self) -> &'static str {
        "socket"
    }
}

#[derive(Default)]
pub struct NoopSocketTransport;

#[async_trait]
impl SocketTransport for NoopSocketTransport {
    async fn connect(&self) -> Result<(), SocketError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<EventEnvelope>, SocketError> {
        Ok(None)
    }

    async fn acknowledge(
        &self,
        _envelope_id: &str,
        _payload: Option<Value>,
    ) -> Result<(), SocketError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SocketError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Routes handler acknowledgements back through the transport that delivered
/// the envelope.
struct TransportAcknowledger {
    transport: Arc<dyn SocketTransport>,
}

#[async_trait]
impl Acknowledger for TransportAcknowledger {
    async fn acknowledge(
        &self,
        envelope_id: &str,
        payload: Option<Value>,
    ) -> Result<(), SocketError> {
        self.transport.acknowledge(envelope_id, payload).await
    }
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: Arc<EventDispatcher>,
    reconnect_policy: ReconnectPolicy,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: Arc<EventDispatcher>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    pub fn transport_mode(&self) -> &'static str {
        self.transport.name()
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Runs until the stream closes or reconnect retries are exhausted.
    /// Transport failures never escape as errors. Every established
    /// connection restores the full retry budget.
    pub async fn start(&self) -> Result<()> {
        let mut attempt = 0;
        loop {
            info!(attempt, transport = self.transport.name(), "opening socket mode connection");
            let result = match self.transport.connect().await {
                Ok(()) => {
                    info!(attempt, "socket mode transport connected");
                    attempt = 0;
                    self.serve(attempt).await
                }
                Err(connect_error) => Err(connect_error),
            };

            let Err(socket_error) = result else {
                return Ok(());
            };
            warn!(
                attempt,
                max_retries = self.reconnect_policy.max_retries,
                error = %socket_error,
                "socket mode transport failed"
            );

            if attempt >= self.reconnect_policy.max_retries {
                warn!(
                    max_retries = self.reconnect_policy.max_retries,
                    "socket mode retries exhausted; continuing process without crash"
                );
                return Ok(());
            }

            let delay = self.reconnect_policy.backoff(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    async fn serve(&self, attempt: u32) -> Result<(), SocketError> {
        let mut in_flight = JoinSet::new();
        let result = self.pump(attempt, &mut in_flight).await;

        // Dispatches already started finish even when the stream failed.
        while in_flight.join_next().await.is_some() {}
        result
    }

    async fn pump(&self, attempt: u32, in_flight: &mut JoinSet<()>) -> Result<(), SocketError> {
        loop {
            while in_flight.try_join_next().is_some() {}

            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "socket mode transport stream closed");
                return self.transport.disconnect().await;
            };
            let (channel_id, user_id) = correlation_fields(&envelope);

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_kind = %envelope.kind,
                correlation_id = %envelope.envelope_id,
                channel_id = channel_id.as_deref().unwrap_or("unknown"),
                user_id = user_id.as_deref().unwrap_or("unknown"),
                "received slack envelope"
            );

            let ack = match envelope.ack_mode {
                AckMode::Automatic => {
                    self.auto_acknowledge(&envelope).await;
                    AckHandle::acknowledged(envelope.envelope_id.clone())
                }
                AckMode::Handler => AckHandle::new(
                    envelope.envelope_id.clone(),
                    Arc::new(TransportAcknowledger { transport: self.transport.clone() }),
                ),
            };

            let dispatcher = self.dispatcher.clone();
            in_flight.spawn(async move {
                dispatcher.dispatch(envelope, Arc::new(ack)).await;
            });
        }
    }

    async fn auto_acknowledge(&self, envelope: &EventEnvelope) {
        match self.transport.acknowledge(&envelope.envelope_id, None).await {
            Ok(()) => debug!(
                event_name = "ingress.slack.ack_sent",
                envelope_id = %envelope.envelope_id,
                correlation_id = %envelope.envelope_id,
                "acknowledged slack envelope"
            ),
            Err(error) => warn!(
                event_name = "ingress.slack.ack_sent",
                envelope_id = %envelope.envelope_id,
                correlation_id = %envelope.envelope_id,
                error = %error,
                "failed to acknowledge slack envelope"
            ),
        }
    }
}

fn correlation_fields(envelope: &EventEnvelope) -> (Option<String>, Option<String>) {
    (envelope.channel_id().map(str::to_owned), envelope.user_id().map(str::to_owned))
}
