use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::debug;
use u360_core::config::SlackConfig;

use crate::{
    client::{with_fields, SlackClient, TransportError},
    dispatch::BotIdentity,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Slack Web API client authenticated with the bot token.
#[derive(Clone)]
pub struct WebApiClient {
    client: Client,
    bot_token: SecretString,
    base_url: String,
}

impl WebApiClient {
    pub fn new(
        bot_token: SecretString,
        base_url: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self { client, bot_token, base_url })
    }

    pub fn from_config(config: &SlackConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.bot_token.clone(), config.api_base_url.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolves the app's own user and bot ids.
    pub async fn auth_test(&self) -> Result<BotIdentity, TransportError> {
        let response = self.call("auth.test", json!({})).await?;
        let id = |name: &str| response.get(name).and_then(Value::as_str).map(str::to_owned);
        Ok(BotIdentity { user_id: id("user_id"), bot_id: id("bot_id") })
    }

    /// Calls a Web API method and returns the response body when `ok` is true.
    pub async fn call(&self, method: &str, body: Value) -> Result<Value, TransportError> {
        let url = format!("{}/{method}", self.base_url);
        debug!(method, "calling slack web api");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|source| TransportError::Http { method: method.to_owned(), source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                method: method.to_owned(),
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await.map_err(|error| TransportError::Decode {
            method: method.to_owned(),
            detail: error.to_string(),
        })?;

        if payload.get("ok").and_then(Value::as_bool) != Some(true) {
            let error = payload
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error")
                .to_owned();
            return Err(TransportError::Api { method: method.to_owned(), error });
        }

        Ok(payload)
    }
}

#[async_trait]
impl SlackClient for WebApiClient {
    async fn post_message(&self, channel: &str, content: Value) -> Result<Value, TransportError> {
        self.call("chat.postMessage", with_fields(content, json!({ "channel": channel }))).await
    }

    async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        content: Value,
    ) -> Result<Value, TransportError> {
        self.call("chat.update", with_fields(content, json!({ "channel": channel, "ts": ts })))
            .await
    }

    async fn open_view(&self, trigger_id: &str, view: Value) -> Result<Value, TransportError> {
        self.call("views.open", json!({ "trigger_id": trigger_id, "view": view })).await
    }

    async fn update_view(
        &self,
        view_id: &str,
        hash: Option<&str>,
        view: Value,
    ) -> Result<Value, TransportError> {
        let mut body = json!({ "view_id": view_id, "view": view });
        if let Some(hash) = hash {
            body["hash"] = Value::String(hash.to_owned());
        }
        self.call("views.update", body).await
    }

    async fn publish_view(&self, user_id: &str, view: Value) -> Result<Value, TransportError> {
        self.call("views.publish", json!({ "user_id": user_id, "view": view })).await
    }

    async fn respond(&self, response_url: &str, content: Value) -> Result<Value, TransportError> {
        const METHOD: &str = "response_url";

        let response = self
            .client
            .post(response_url)
            .json(&with_fields(content, json!({})))
            .send()
            .await
            .map_err(|source| TransportError::Http { method: METHOD.to_owned(), source })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(TransportError::Status {
                method: METHOD.to_owned(),
                status: status.as_u16(),
                body,
            });
        }

        // Response URLs answer with plain `ok` rather than a JSON envelope.
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{body_partial_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::WebApiClient;
    use crate::{
        client::{SlackClient, TransportError},
        dispatch::BotIdentity,
    };

    async fn client_for(server: &MockServer) -> WebApiClient {
        WebApiClient::new("xoxb-test".to_owned().into(), server.uri()).expect("client")
    }

    #[tokio::test]
    async fn post_message_sends_channel_and_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(header("authorization", "Bearer xoxb-test"))
            .and(body_partial_json(json!({ "channel": "C1", "text": "hi" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "ts": "1.0" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let response =
            client.post_message("C1", json!({ "text": "hi" })).await.expect("post should succeed");

        assert_eq!(response["ts"], "1.0");
    }

    #[tokio::test]
    async fn auth_test_resolves_the_bot_identity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth.test"))
            .and(header("authorization", "Bearer xoxb-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "user_id": "UBOT",
                "bot_id": "BBOT",
                "team_id": "T1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let identity = client_for(&server).await.auth_test().await.expect("auth.test");

        assert_eq!(
            identity,
            BotIdentity { user_id: Some("UBOT".to_owned()), bot_id: Some("BBOT".to_owned()) }
        );
    }

    #[tokio::test]
    async fn api_error_flag_maps_to_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/views.open"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "ok": false, "error": "expired_trigger_id" })),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let error = client
            .open_view("trigger-1", json!({ "type": "modal" }))
            .await
            .expect_err("expired trigger should fail");

        assert!(matches!(
            error,
            TransportError::Api { ref method, ref error }
                if method == "views.open" && error == "expired_trigger_id"
        ));
    }

    #[tokio::test]
    async fn http_status_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/views.publish"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let error = client
            .publish_view("U1", json!({ "type": "home" }))
            .await
            .expect_err("rate limited call should fail");

        assert!(matches!(error, TransportError::Status { status: 429, .. }));
        assert_eq!(error.method(), "views.publish");
    }

    #[tokio::test]
    async fn update_view_forwards_hash() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/views.update"))
            .and(body_partial_json(json!({ "view_id": "V1", "hash": "h-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client
            .update_view("V1", Some("h-1"), json!({ "type": "modal" }))
            .await
            .expect("update should succeed");
    }

    #[tokio::test]
    async fn respond_accepts_plain_ok_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/commands/reply"))
            .and(body_partial_json(json!({ "text": "echo" })))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let url = format!("{}/commands/reply", server.uri());
        let response = client.respond(&url, json!({ "text": "echo" })).await.expect("respond");

        assert_eq!(response, json!("ok"));
    }
}
