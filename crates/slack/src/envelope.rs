use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Envelope kinds produced by [`EventEnvelope::from_socket_frame`].
///
/// Events API deliveries use the Slack event type verbatim, so any event the
/// app subscribes to (not only the ones listed here) can be registered.
pub mod kind {
    pub const APP_MENTION: &str = "app_mention";
    pub const APP_HOME_OPENED: &str = "app_home_opened";
    pub const MESSAGE: &str = "message";
    pub const BLOCK_ACTIONS: &str = "block_actions";
    pub const VIEW_SUBMISSION: &str = "view_submission";
    pub const SHORTCUT: &str = "shortcut";
    pub const SLASH_COMMAND: &str = "slash_command";
}

/// Who is responsible for acknowledging an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AckMode {
    /// The runner acknowledges on receipt (Events API deliveries).
    Automatic,
    /// A handler must call `ack()` (interactive payloads and slash commands).
    Handler,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EventEnvelope {
    pub envelope_id: String,
    pub kind: String,
    pub payload: Value,
    pub ack_mode: AckMode,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("socket frame is missing `{0}`")]
    MissingField(&'static str),
    #[error("unsupported socket frame type `{0}`")]
    UnsupportedFrame(String),
}

impl EventEnvelope {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            envelope_id: Uuid::new_v4().to_string(),
            kind: kind.into(),
            payload,
            ack_mode: AckMode::Automatic,
        }
    }

    pub fn with_envelope_id(mut self, envelope_id: impl Into<String>) -> Self {
        self.envelope_id = envelope_id.into();
        self
    }

    pub fn requiring_ack(mut self) -> Self {
        self.ack_mode = AckMode::Handler;
        self
    }

    /// Normalizes a raw Socket Mode frame.
    ///
    /// Returns `Ok(None)` for control frames (`hello`, `disconnect`) that carry
    /// nothing to dispatch.
    pub fn from_socket_frame(frame: &Value) -> Result<Option<Self>, EnvelopeError> {
        let frame_type =
            frame.get("type").and_then(Value::as_str).ok_or(EnvelopeError::MissingField("type"))?;

        let (kind, payload, ack_mode) = match frame_type {
            "hello" | "disconnect" => return Ok(None),
            "events_api" => {
                let event = frame
                    .pointer("/payload/event")
                    .ok_or(EnvelopeError::MissingField("payload.event"))?;
                let kind = event
                    .get("type")
                    .and_then(Value::as_str)
                    .ok_or(EnvelopeError::MissingField("payload.event.type"))?;
                (kind.to_owned(), event.clone(), AckMode::Automatic)
            }
            "interactive" => {
                let payload = frame.get("payload").ok_or(EnvelopeError::MissingField("payload"))?;
                let kind = payload
                    .get("type")
                    .and_then(Value::as_str)
                    .ok_or(EnvelopeError::MissingField("payload.type"))?;
                (kind.to_owned(), payload.clone(), AckMode::Handler)
            }
            "slash_commands" => {
                let payload = frame.get("payload").ok_or(EnvelopeError::MissingField("payload"))?;
                (kind::SLASH_COMMAND.to_owned(), payload.clone(), AckMode::Handler)
            }
            other => return Err(EnvelopeError::UnsupportedFrame(other.to_owned())),
        };

        let envelope_id = frame
            .get("envelope_id")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(Some(Self { envelope_id, kind, payload, ack_mode }))
    }

    pub fn str_at(&self, pointer: &str) -> Option<&str> {
        self.payload.pointer(pointer).and_then(Value::as_str)
    }

    /// Channel the occurrence happened in, whatever the payload shape.
    pub fn channel_id(&self) -> Option<&str> {
        self.str_at("/channel")
            .or_else(|| self.str_at("/channel_id"))
            .or_else(|| self.str_at("/channel/id"))
    }

    pub fn user_id(&self) -> Option<&str> {
        self.str_at("/user")
            .or_else(|| self.str_at("/user_id"))
            .or_else(|| self.str_at("/user/id"))
    }
}
