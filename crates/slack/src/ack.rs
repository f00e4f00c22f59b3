use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::socket::SocketError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AckError {
    #[error("envelope `{0}` was already acknowledged")]
    AlreadyAcknowledged(String),
    #[error(transparent)]
    Transport(#[from] SocketError),
}

/// Signals receipt of an envelope back to the transport.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn acknowledge(
        &self,
        envelope_id: &str,
        payload: Option<Value>,
    ) -> Result<(), SocketError>;
}

/// Per-envelope acknowledgement capability shared by every handler the
/// envelope matched. The transport is reached at most once.
pub struct AckHandle {
    envelope_id: String,
    acknowledger: Option<Arc<dyn Acknowledger>>,
    acknowledged: AtomicBool,
}

impl AckHandle {
    pub fn new(envelope_id: impl Into<String>, acknowledger: Arc<dyn Acknowledger>) -> Self {
        Self {
            envelope_id: envelope_id.into(),
            acknowledger: Some(acknowledger),
            acknowledged: AtomicBool::new(false),
        }
    }

    /// Handle for an envelope the runner has already acknowledged.
    pub fn acknowledged(envelope_id: impl Into<String>) -> Self {
        Self {
            envelope_id: envelope_id.into(),
            acknowledger: None,
            acknowledged: AtomicBool::new(true),
        }
    }

    pub fn envelope_id(&self) -> &str {
        &self.envelope_id
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged.load(Ordering::SeqCst)
    }

    pub async fn acknowledge(&self, payload: Option<Value>) -> Result<(), AckError> {
        if self.acknowledged.swap(true, Ordering::SeqCst) {
            return Err(AckError::AlreadyAcknowledged(self.envelope_id.clone()));
        }

        let Some(acknowledger) = &self.acknowledger else {
            return Ok(());
        };

        match acknowledger.acknowledge(&self.envelope_id, payload).await {
            Ok(()) => {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %self.envelope_id,
                    correlation_id = %self.envelope_id,
                    "handler acknowledged slack envelope"
                );
                Ok(())
            }
            Err(error) => {
                // The flag stays set; a failed ack is not retried.
                warn!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %self.envelope_id,
                    correlation_id = %self.envelope_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
                Err(AckError::Transport(error))
            }
        }
    }
}
