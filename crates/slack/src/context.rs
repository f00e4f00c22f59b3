use std::sync::Arc;

use serde_json::Value;

use crate::{
    ack::AckHandle,
    client::SlackClient,
    dispatch::HandlerError,
    envelope::EventEnvelope,
};

/// Read-only view handed to one handler invocation.
///
/// Cloning is cheap; every field is shared with the other handlers the same
/// envelope matched.
#[derive(Clone)]
pub struct Context {
    envelope: Arc<EventEnvelope>,
    matches: Arc<[String]>,
    client: Arc<dyn SlackClient>,
    ack: Arc<AckHandle>,
}

impl Context {
    pub fn new(
        envelope: Arc<EventEnvelope>,
        matches: Vec<String>,
        client: Arc<dyn SlackClient>,
        ack: Arc<AckHandle>,
    ) -> Self {
        Self { envelope, matches: matches.into(), client, ack }
    }

    pub fn envelope(&self) -> &EventEnvelope {
        &self.envelope
    }

    pub fn kind(&self) -> &str {
        &self.envelope.kind
    }

    pub fn payload(&self) -> &Value {
        &self.envelope.payload
    }

    /// Capture groups from a pattern matcher; empty for other matchers.
    pub fn matches(&self) -> &[String] {
        &self.matches
    }

    pub fn client(&self) -> &dyn SlackClient {
        self.client.as_ref()
    }

    /// Required string field of the payload.
    pub fn field(&self, pointer: &'static str) -> Result<&str, HandlerError> {
        self.envelope.str_at(pointer).ok_or(HandlerError::MissingField(pointer))
    }

    pub async fn ack(&self) -> Result<(), HandlerError> {
        self.ack.acknowledge(None).await.map_err(HandlerError::from)
    }

    /// Acknowledges with a response body (e.g. view submission errors).
    pub async fn ack_with(&self, payload: Value) -> Result<(), HandlerError> {
        self.ack.acknowledge(Some(payload)).await.map_err(HandlerError::from)
    }

    pub fn is_acknowledged(&self) -> bool {
        self.ack.is_acknowledged()
    }

    /// Posts `content` into the channel the envelope came from.
    pub async fn say(&self, content: Value) -> Result<Value, HandlerError> {
        let channel = self.envelope.channel_id().ok_or(HandlerError::MissingField("channel"))?;
        self.client.post_message(channel, content).await.map_err(HandlerError::from)
    }

    /// Replies through the envelope's `response_url`.
    pub async fn respond(&self, content: Value) -> Result<Value, HandlerError> {
        let response_url = self.field("/response_url")?;
        self.client.respond(response_url, content).await.map_err(HandlerError::from)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::Context;
    use crate::{
        ack::AckHandle,
        client::text_content,
        dispatch::HandlerError,
        envelope::{kind, EventEnvelope},
        testing::{ApiCall, RecordingClient},
    };

    fn context_for(envelope: EventEnvelope, client: Arc<RecordingClient>) -> Context {
        let ack = Arc::new(AckHandle::acknowledged(envelope.envelope_id.clone()));
        Context::new(Arc::new(envelope), Vec::new(), client, ack)
    }

    #[tokio::test]
    async fn say_posts_into_interactive_channel() {
        let client = Arc::new(RecordingClient::default());
        let envelope = EventEnvelope::new(
            kind::BLOCK_ACTIONS,
            json!({ "channel": { "id": "C9" }, "actions": [{ "action_id": "first_button" }] }),
        );
        let ctx = context_for(envelope, client.clone());

        ctx.say(text_content("clicked")).await.expect("say");

        assert_eq!(
            client.calls(),
            vec![ApiCall::PostMessage {
                channel: "C9".to_owned(),
                content: text_content("clicked"),
            }]
        );
    }

    #[tokio::test]
    async fn say_without_channel_is_a_handler_error() {
        let client = Arc::new(RecordingClient::default());
        let ctx = context_for(
            EventEnvelope::new(kind::APP_HOME_OPENED, json!({ "user": "U1" })),
            client.clone(),
        );

        let error = ctx.say(text_content("hi")).await.expect_err("no channel");

        assert!(matches!(error, HandlerError::MissingField("channel")));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn respond_uses_response_url() {
        let client = Arc::new(RecordingClient::default());
        let ctx = context_for(
            EventEnvelope::new(
                kind::SLASH_COMMAND,
                json!({ "command": "/mirror", "response_url": "https://hooks.example/r1" }),
            ),
            client.clone(),
        );

        ctx.respond(text_content("echo")).await.expect("respond");

        assert_eq!(
            client.calls(),
            vec![ApiCall::Respond {
                response_url: "https://hooks.example/r1".to_owned(),
                content: text_content("echo"),
            }]
        );
    }
}
