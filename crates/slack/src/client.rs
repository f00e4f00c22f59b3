use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

/// Failure of an outbound Web API call. Calls are never retried.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to `{method}` failed: {source}")]
    Http {
        method: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("`{method}` returned HTTP {status}: {body}")]
    Status { method: String, status: u16, body: String },
    #[error("`{method}` returned error `{error}`")]
    Api { method: String, error: String },
    #[error("could not decode `{method}` response: {detail}")]
    Decode { method: String, detail: String },
}

impl TransportError {
    pub fn method(&self) -> &str {
        match self {
            Self::Http { method, .. }
            | Self::Status { method, .. }
            | Self::Api { method, .. }
            | Self::Decode { method, .. } => method,
        }
    }
}

/// Outbound Slack capabilities handed to handlers through their `Context`.
///
/// Message `content` and `view` documents are passed through unchanged; each
/// method returns the decoded API response.
#[async_trait]
pub trait SlackClient: Send + Sync {
    /// `chat.postMessage`
    async fn post_message(&self, channel: &str, content: Value) -> Result<Value, TransportError>;

    /// `chat.update`
    async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        content: Value,
    ) -> Result<Value, TransportError>;

    /// `views.open`
    async fn open_view(&self, trigger_id: &str, view: Value) -> Result<Value, TransportError>;

    /// `views.update`; `hash` guards against concurrent updates.
    async fn update_view(
        &self,
        view_id: &str,
        hash: Option<&str>,
        view: Value,
    ) -> Result<Value, TransportError>;

    /// `views.publish` (home tab)
    async fn publish_view(&self, user_id: &str, view: Value) -> Result<Value, TransportError>;

    /// POST to a slash command / interaction `response_url`.
    async fn respond(&self, response_url: &str, content: Value) -> Result<Value, TransportError>;
}

pub fn text_content(text: impl Into<String>) -> Value {
    json!({ "text": text.into() })
}

/// Merges `extra` fields into an object `content`; non-object content is
/// wrapped as `text`.
pub(crate) fn with_fields(content: Value, extra: Value) -> Value {
    let mut body = match content {
        Value::Object(map) => map,
        Value::String(text) => {
            let mut map = serde_json::Map::new();
            map.insert("text".to_owned(), Value::String(text));
            map
        }
        other => {
            let mut map = serde_json::Map::new();
            map.insert("text".to_owned(), Value::String(other.to_string()));
            map
        }
    };
    if let Value::Object(extra) = extra {
        body.extend(extra);
    }
    Value::Object(body)
}
